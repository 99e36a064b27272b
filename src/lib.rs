pub mod asset;
pub mod environment;
pub mod error;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use environment::{FogParams, WorldEnvironment};
pub use error::{BackendError, SettingsError};
pub use renderer::{FrameParams, Renderer, RendererStats};
pub use settings::{FeatureFlags, RenderSettings};

/// Installs `env_logger` at info level unless `RUST_LOG` says otherwise.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}
