//! The GPU seam.
//!
//! Passes never talk to a graphics API directly; they drive a [`GpuBackend`]
//! with immediate-mode calls in strict submission order. Resource creation
//! (programs, textures, framebuffers) happens once at startup, except for
//! lazily created fallback and named textures.

pub mod device;
pub mod recording;
pub mod uniforms;
mod wgsl;

pub use device::{IndexType, WgpuBackend};
pub use recording::{DrawRecord, GpuCommand, RecordingBackend};
pub use uniforms::{FrameUniforms, UniformBlock};

use crate::error::BackendError;
use crate::renderer::args::UniformValue;
use crate::renderer::shaders::ShaderKind;
use crate::renderer::state::{ClearFlags, Filtering, PipelineState, Swizzle};
use crate::renderer::VertexLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub format: wgpu::TextureFormat,
}

impl RenderTextureDesc {
    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width.max(1),
            height: self.height.max(1),
            depth_or_array_layers: self.layers.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferDesc {
    pub label: &'static str,
    pub color: Vec<TextureId>,
    pub depth: Option<TextureId>,
}

/// One indexed draw with a base vertex offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub topology: wgpu::PrimitiveTopology,
    pub index_format: wgpu::IndexFormat,
    pub index_count: u32,
    /// Byte offset into the index buffer.
    pub offset: u64,
    pub base_vertex: i32,
    pub instance_count: u32,
}

impl DrawCall {
    pub fn first_index(&self) -> u32 {
        let index_size = match self.index_format {
            wgpu::IndexFormat::Uint16 => 2,
            wgpu::IndexFormat::Uint32 => 4,
        };
        (self.offset / index_size) as u32
    }

    pub fn is_instanced(&self) -> bool {
        self.instance_count > 1
    }
}

pub trait GpuBackend {
    fn create_program(&mut self, kind: ShaderKind) -> ProgramId;

    fn create_render_texture(&mut self, desc: &RenderTextureDesc) -> TextureId;

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> FramebufferId;

    /// 1x1 texture of a single RGBA8 color.
    fn create_solid_texture(&mut self, color: [u8; 4]) -> TextureId;

    fn load_texture(&mut self, name: &str) -> Result<TextureId, BackendError>;

    /// Re-encode the texture in a compressed format. Callers memoize.
    fn compress_texture(&mut self, texture: TextureId);

    /// Binding a framebuffer implicitly releases the previous one.
    fn bind_framebuffer(&mut self, framebuffer: FramebufferId);

    fn clear(&mut self, flags: ClearFlags, color: wgpu::Color);

    fn set_pipeline_state(&mut self, state: &PipelineState);

    fn use_program(&mut self, program: ProgramId);

    fn bind_vertex_layout(&mut self, layout: VertexLayout);

    fn bind_texture(&mut self, unit: u32, texture: TextureId, filtering: Filtering);

    fn set_swizzle(&mut self, unit: u32, swizzle: Swizzle);

    /// Uniform values for the program in use, in declaration order.
    fn set_uniforms(&mut self, program: ProgramId, values: &[UniformValue]);

    fn draw_indexed(&mut self, call: &DrawCall);

    /// Full-screen triangle sampling `source` on unit 0.
    fn draw_fullscreen(&mut self, program: ProgramId, source: TextureId);

    /// Called once after the last pass of a frame.
    fn end_frame(&mut self) {}
}
