pub mod args;
pub mod backend;
pub mod displace;
pub mod draw;
pub mod lists;
mod passes;
pub mod renderer_core;
pub mod shaders;
pub mod state;
pub mod targets;
pub mod texture;
pub mod vertex;

pub use args::{
    DisplaceArgs, DrawArgs, FogArgs, GrassArgs, Selection, SolidArgs, TransparentArgs,
    UniformKind, UniformValue,
};
pub use backend::{FrameUniforms, GpuBackend, RecordingBackend, WgpuBackend};
pub use draw::{DrawInvoker, DrawMode};
pub use lists::{MaterialClass, MaterialLists, SolidClass, TransparentBlend};
pub use renderer_core::{FrameParams, Renderer, RendererStats};
pub use shaders::{ShaderKind, ShaderProgram, ShaderRegistry};
pub use targets::{Fbo, RenderTargetSet, Rtt, SHADOW_CASCADES};
pub use texture::TextureBinder;
pub use vertex::VertexLayout;
