use thiserror::Error;

/// Failures reported by a [`GpuBackend`](crate::renderer::backend::GpuBackend).
///
/// The renderer never propagates these past its public API: a texture that
/// cannot be loaded is replaced with the fallback texture and logged.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("texture {0:?} was not found")]
    TextureNotFound(String),

    #[error("failed to decode texture {name:?}: {reason}")]
    TextureDecode { name: String, reason: String },
}

/// Why a settings file could not be used.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SettingsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
