use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default = "RenderSettings::default_shadow_map_size")]
    pub shadow_map_size: u32,
    #[serde(default = "RenderSettings::default_rsm_size")]
    pub rsm_size: u32,
    #[serde(default)]
    pub features: FeatureFlags,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            shadow_map_size: Self::default_shadow_map_size(),
            rsm_size: Self::default_rsm_size(),
            features: FeatureFlags::default(),
        }
    }
}

impl RenderSettings {
    /// Reads `settings.json` from the working directory.
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    /// Like [`RenderSettings::read`], but any failure yields the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::read(path.as_ref()) {
            Ok(settings) => settings,
            Err(err) if err.is_not_found() => {
                info!("{}; using default render settings", err);
                Self::default()
            }
            Err(err) => {
                warn!("{}; falling back to default render settings", err);
                Self::default()
            }
        }
    }

    pub fn read(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self =
            serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Loaded render settings from {:?}", path);
        Ok(settings.validate())
    }

    pub fn validate(mut self) -> Self {
        if self.shadow_map_size == 0 {
            warn!("shadow_map_size is 0, using {}", Self::default_shadow_map_size());
            self.shadow_map_size = Self::default_shadow_map_size();
        }

        if self.rsm_size == 0 {
            warn!("rsm_size is 0, using {}", Self::default_rsm_size());
            self.rsm_size = Self::default_rsm_size();
        }

        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!(
                "resolution {}x{} is empty, using the default",
                self.resolution.width, self.resolution.height
            );
            self.resolution = Resolution::default();
        }

        self
    }

    const fn default_shadow_map_size() -> u32 {
        4096
    }

    const fn default_rsm_size() -> u32 {
        1024
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Runtime switches read by the passes every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Deferred lighting. Off means the lit pass writes depth itself and no
    /// displacement is rendered.
    pub dynamic_lights: bool,
    /// Reflective shadow map after the shadow pass.
    pub global_illumination: bool,
    pub weather_effects: bool,
    /// Show lighting only, with white albedo.
    pub light_viz: bool,
    pub texture_compression: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            dynamic_lights: true,
            global_illumination: false,
            weather_effects: true,
            light_viz: false,
            texture_compression: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_settings() -> RenderSettings {
        RenderSettings {
            resolution: Resolution {
                width: 0,
                height: 0,
            },
            shadow_map_size: 0,
            rsm_size: 0,
            features: FeatureFlags::default(),
        }
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let validated = invalid_settings().validate();
        let defaults = RenderSettings::default();

        assert_eq!(validated.shadow_map_size, defaults.shadow_map_size);
        assert_eq!(validated.rsm_size, defaults.rsm_size);
        assert_eq!(validated.resolution, Resolution::default());
    }

    #[test]
    fn validate_preserves_valid_values() {
        let valid = RenderSettings {
            resolution: Resolution {
                width: 1920,
                height: 1080,
            },
            shadow_map_size: 2048,
            rsm_size: 512,
            features: FeatureFlags {
                global_illumination: true,
                ..FeatureFlags::default()
            },
        };

        let validated = valid.clone().validate();

        assert_eq!(validated.shadow_map_size, valid.shadow_map_size);
        assert_eq!(validated.rsm_size, valid.rsm_size);
        assert_eq!(validated.resolution, valid.resolution);
        assert_eq!(validated.features, valid.features);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{ "features": { "global_illumination": true } }"#).unwrap();

        assert!(settings.features.global_illumination);
        assert!(settings.features.dynamic_lights);
        assert!(settings.features.texture_compression);
        assert_eq!(settings.shadow_map_size, 4096);
        assert_eq!(settings.rsm_size, 1024);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = Path::new("does/not/exist/settings.json");
        assert!(RenderSettings::read(path).is_err_and(|err| err.is_not_found()));

        let settings = RenderSettings::load_from_path(path);
        assert_eq!(settings.features, FeatureFlags::default());
        assert_eq!(settings.resolution, Resolution::default());
    }
}
