use std::collections::{BTreeMap, HashMap, HashSet};

use super::{
    DrawCall, FramebufferDesc, FramebufferId, GpuBackend, ProgramId, RenderTextureDesc, TextureId,
};
use crate::error::BackendError;
use crate::renderer::args::UniformValue;
use crate::renderer::shaders::ShaderKind;
use crate::renderer::state::{ClearFlags, Filtering, PipelineState, Swizzle};
use crate::renderer::VertexLayout;

/// A backend call as submitted by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    BindFramebuffer(FramebufferId),
    Clear {
        flags: ClearFlags,
        color: wgpu::Color,
    },
    SetState(PipelineState),
    UseProgram(ProgramId),
    BindVertexLayout(VertexLayout),
    BindTexture {
        unit: u32,
        texture: TextureId,
        filtering: Filtering,
    },
    SetSwizzle {
        unit: u32,
        swizzle: Swizzle,
    },
    CompressTexture(TextureId),
    SetUniforms {
        program: ProgramId,
        values: Vec<UniformValue>,
    },
    Draw(DrawCall),
    DrawFullscreen {
        program: ProgramId,
        source: TextureId,
    },
}

/// Everything bound at the moment a draw was submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub framebuffer: Option<FramebufferId>,
    pub program: Option<ShaderKind>,
    pub layout: Option<VertexLayout>,
    pub state: Option<PipelineState>,
    pub uniforms: Vec<UniformValue>,
    pub textures: BTreeMap<u32, TextureId>,
    pub call: DrawCall,
}

/// Backend that executes nothing and records every call in order.
///
/// Used by the frame-dump tool and by tests to observe exactly what the
/// passes submit. Resource ids are allocated sequentially.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<GpuCommand>,
    draws: Vec<DrawRecord>,

    programs: Vec<ShaderKind>,
    framebuffers: Vec<FramebufferDesc>,
    render_textures: HashMap<TextureId, RenderTextureDesc>,
    solid_textures: Vec<TextureId>,
    loaded_textures: HashMap<String, TextureId>,
    missing_textures: HashSet<String>,
    next_texture: u32,

    current_framebuffer: Option<FramebufferId>,
    current_program: Option<ProgramId>,
    current_layout: Option<VertexLayout>,
    current_state: Option<PipelineState>,
    current_uniforms: Vec<UniformValue>,
    bound_textures: BTreeMap<u32, TextureId>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `load_texture(name)` fail with
    /// [`BackendError::TextureNotFound`].
    pub fn mark_missing(&mut self, name: impl Into<String>) {
        self.missing_textures.insert(name.into());
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Forgets recorded commands and draws. Resources and bindings survive.
    pub fn clear_log(&mut self) {
        self.commands.clear();
        self.draws.clear();
    }

    pub fn program_kind(&self, program: ProgramId) -> Option<ShaderKind> {
        self.programs.get(program.0 as usize).copied()
    }

    pub fn programs_created(&self) -> usize {
        self.programs.len()
    }

    pub fn framebuffer(&self, framebuffer: FramebufferId) -> Option<&FramebufferDesc> {
        self.framebuffers.get(framebuffer.0 as usize)
    }

    pub fn render_texture(&self, texture: TextureId) -> Option<&RenderTextureDesc> {
        self.render_textures.get(&texture)
    }

    pub fn solid_textures_created(&self) -> usize {
        self.solid_textures.len()
    }

    pub fn texture_loads(&self) -> usize {
        self.loaded_textures.len()
    }

    pub fn draws_with(&self, kind: ShaderKind) -> impl Iterator<Item = &DrawRecord> {
        self.draws
            .iter()
            .filter(move |record| record.program == Some(kind))
    }

    pub fn framebuffer_binds(&self, framebuffer: FramebufferId) -> usize {
        self.commands
            .iter()
            .filter(|command| **command == GpuCommand::BindFramebuffer(framebuffer))
            .count()
    }

    fn allocate_texture(&mut self) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        id
    }
}

impl GpuBackend for RecordingBackend {
    fn create_program(&mut self, kind: ShaderKind) -> ProgramId {
        let id = ProgramId(self.programs.len() as u32);
        self.programs.push(kind);
        id
    }

    fn create_render_texture(&mut self, desc: &RenderTextureDesc) -> TextureId {
        let id = self.allocate_texture();
        self.render_textures.insert(id, desc.clone());
        id
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> FramebufferId {
        let id = FramebufferId(self.framebuffers.len() as u32);
        self.framebuffers.push(desc.clone());
        id
    }

    fn create_solid_texture(&mut self, _color: [u8; 4]) -> TextureId {
        let id = self.allocate_texture();
        self.solid_textures.push(id);
        id
    }

    fn load_texture(&mut self, name: &str) -> Result<TextureId, BackendError> {
        if self.missing_textures.contains(name) {
            return Err(BackendError::TextureNotFound(name.to_owned()));
        }
        let id = self.allocate_texture();
        self.loaded_textures.insert(name.to_owned(), id);
        Ok(id)
    }

    fn compress_texture(&mut self, texture: TextureId) {
        self.commands.push(GpuCommand::CompressTexture(texture));
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.current_framebuffer = Some(framebuffer);
        self.commands.push(GpuCommand::BindFramebuffer(framebuffer));
    }

    fn clear(&mut self, flags: ClearFlags, color: wgpu::Color) {
        self.commands.push(GpuCommand::Clear { flags, color });
    }

    fn set_pipeline_state(&mut self, state: &PipelineState) {
        self.current_state = Some(*state);
        self.commands.push(GpuCommand::SetState(*state));
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
        self.commands.push(GpuCommand::UseProgram(program));
    }

    fn bind_vertex_layout(&mut self, layout: VertexLayout) {
        self.current_layout = Some(layout);
        self.commands.push(GpuCommand::BindVertexLayout(layout));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId, filtering: Filtering) {
        self.bound_textures.insert(unit, texture);
        self.commands.push(GpuCommand::BindTexture {
            unit,
            texture,
            filtering,
        });
    }

    fn set_swizzle(&mut self, unit: u32, swizzle: Swizzle) {
        self.commands.push(GpuCommand::SetSwizzle { unit, swizzle });
    }

    fn set_uniforms(&mut self, program: ProgramId, values: &[UniformValue]) {
        self.current_uniforms.clear();
        self.current_uniforms.extend_from_slice(values);
        self.commands.push(GpuCommand::SetUniforms {
            program,
            values: values.to_vec(),
        });
    }

    fn draw_indexed(&mut self, call: &DrawCall) {
        self.commands.push(GpuCommand::Draw(*call));
        self.draws.push(DrawRecord {
            framebuffer: self.current_framebuffer,
            program: self
                .current_program
                .and_then(|program| self.programs.get(program.0 as usize).copied()),
            layout: self.current_layout,
            state: self.current_state,
            uniforms: self.current_uniforms.clone(),
            textures: self.bound_textures.clone(),
            call: *call,
        });
    }

    fn draw_fullscreen(&mut self, program: ProgramId, source: TextureId) {
        self.bound_textures.insert(0, source);
        self.commands
            .push(GpuCommand::DrawFullscreen { program, source });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_capture_current_bindings() {
        let mut backend = RecordingBackend::new();
        let program = backend.create_program(ShaderKind::Shadow);
        let texture = backend.create_solid_texture([255; 4]);

        backend.use_program(program);
        backend.bind_vertex_layout(VertexLayout::TwoTCoords);
        backend.bind_texture(0, texture, Filtering::Linear);
        backend.set_uniforms(program, &[UniformValue::Float(2.0)]);
        backend.draw_indexed(&DrawCall {
            topology: wgpu::PrimitiveTopology::TriangleList,
            index_format: wgpu::IndexFormat::Uint16,
            index_count: 3,
            offset: 0,
            base_vertex: 0,
            instance_count: 1,
        });

        let record = &backend.draws()[0];
        assert_eq!(record.program, Some(ShaderKind::Shadow));
        assert_eq!(record.layout, Some(VertexLayout::TwoTCoords));
        assert_eq!(record.uniforms, vec![UniformValue::Float(2.0)]);
        assert_eq!(record.textures.get(&0), Some(&texture));
    }

    #[test]
    fn missing_textures_fail_to_load() {
        let mut backend = RecordingBackend::new();
        backend.mark_missing("displace.png");

        assert!(matches!(
            backend.load_texture("displace.png"),
            Err(BackendError::TextureNotFound(name)) if name == "displace.png"
        ));
        assert!(backend.load_texture("grass.png").is_ok());
        assert_eq!(backend.texture_loads(), 1);
    }
}
