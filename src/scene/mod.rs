// scene/mod.rs

pub mod components;
pub mod manager;
pub mod scene;

pub use components::{Placement, Renderable, SurfaceMaterial, Visible, WeatherEffect};
pub use manager::{RenderPhase, SceneManager, TraversalContext};
pub use scene::EntityScene;
