use glam::Vec3;
use wgpu::Color;

/// Distance and height fog of a world, unpacked into the fog-aware
/// transparent tuple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogParams {
    pub max_density: f32,
    pub start_height: f32,
    pub end_height: f32,
    pub start: f32,
    pub end: f32,
    pub color: Vec3,
}

impl Default for FogParams {
    fn default() -> Self {
        Self {
            max_density: 1.0,
            start_height: 0.0,
            end_height: 100.0,
            start: 50.0,
            end: 300.0,
            color: Vec3::splat(0.5),
        }
    }
}

/// Per-world rendering parameters of the active world.
///
/// The renderer falls back to [`WorldEnvironment::DEFAULT_CLEAR_COLOR`] when
/// no world is active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldEnvironment {
    clear_color: [u8; 4],
    fog: Option<FogParams>,
    ambient: Vec3,
    wind: Vec3,
    displacement_speed: f32,
}

impl WorldEnvironment {
    /// RGBA 150, 150, 150, 0.
    pub const DEFAULT_CLEAR_COLOR: [u8; 4] = [150, 150, 150, 0];

    pub fn new(clear_color: [u8; 4]) -> Self {
        Self {
            clear_color,
            fog: None,
            ambient: Vec3::splat(0.2),
            wind: Vec3::ZERO,
            displacement_speed: 1.0,
        }
    }

    pub fn with_fog(mut self, fog: FogParams) -> Self {
        self.fog = Some(fog);
        self
    }

    pub fn with_ambient(mut self, ambient: Vec3) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn with_wind(mut self, wind: Vec3) -> Self {
        self.wind = wind;
        self
    }

    pub fn with_displacement_speed(mut self, speed: f32) -> Self {
        self.displacement_speed = speed;
        self
    }

    pub fn fog(&self) -> Option<&FogParams> {
        self.fog.as_ref()
    }

    pub fn is_fog_enabled(&self) -> bool {
        self.fog.is_some()
    }

    pub fn ambient(&self) -> Vec3 {
        self.ambient
    }

    pub fn wind(&self) -> Vec3 {
        self.wind
    }

    pub fn displacement_speed(&self) -> f32 {
        self.displacement_speed
    }

    pub fn clear_color(&self) -> Color {
        rgba8_to_color(self.clear_color)
    }
}

impl Default for WorldEnvironment {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CLEAR_COLOR)
    }
}

/// Clear color of the lit pass for an optional active world.
pub fn clear_color_for(world: Option<&WorldEnvironment>) -> Color {
    world.map_or_else(
        || rgba8_to_color(WorldEnvironment::DEFAULT_CLEAR_COLOR),
        WorldEnvironment::clear_color,
    )
}

fn rgba8_to_color(rgba: [u8; 4]) -> Color {
    Color {
        r: rgba[0] as f64 / 255.0,
        g: rgba[1] as f64 / 255.0,
        b: rgba[2] as f64 / 255.0,
        a: rgba[3] as f64 / 255.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_world_clears_to_default_gray() {
        let color = clear_color_for(None);
        assert!((color.r - 150.0 / 255.0).abs() < 1e-9);
        assert_eq!(color.r, color.g);
        assert_eq!(color.g, color.b);
        assert_eq!(color.a, 0.0);
    }

    #[test]
    fn world_clear_color_is_normalized() {
        let world = WorldEnvironment::new([255, 0, 51, 255]);
        let color = clear_color_for(Some(&world));
        assert_eq!(color.r, 1.0);
        assert_eq!(color.g, 0.0);
        assert!((color.b - 0.2).abs() < 1e-9);
        assert_eq!(color.a, 1.0);
        assert!(!world.is_fog_enabled());
        assert!(world.with_fog(FogParams::default()).is_fog_enabled());
    }
}
