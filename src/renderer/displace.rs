use glam::{Vec2, Vec3};

/// Animated distortion directions of the displacement effect.
///
/// Two independently oscillating offsets, both drifting along the world's
/// wind, sampled by the displace program as `dir` and `dir2`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DisplaceProvider {
    dir: Vec2,
    dir2: Vec2,
}

impl DisplaceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes both directions for frame time `time` in seconds.
    pub fn update(&mut self, time: f32, wind: Vec3, speed: f32) {
        let t = time * speed;
        let drift = wind_direction(wind);

        let strength = (t / 10.0).sin().abs() * 0.006 + 0.002;
        self.dir = drift * strength;

        let phase = t * 0.56 + t.sin();
        let strength2 = (phase / 6.0).sin().abs() * 0.0095 + 0.0025;
        self.dir2 = Vec2::from_angle(t.cos()).rotate(drift) * strength2;
    }

    pub fn dir(&self) -> Vec2 {
        self.dir
    }

    pub fn dir2(&self) -> Vec2 {
        self.dir2
    }
}

/// Wind projected onto the ground plane, `+X` when there is no wind.
fn wind_direction(wind: Vec3) -> Vec2 {
    Vec2::new(wind.x, wind.z).try_normalize().unwrap_or(Vec2::X)
}
