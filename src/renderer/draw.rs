use crate::asset::MeshBatch;
use crate::renderer::args::UniformValue;
use crate::renderer::backend::GpuBackend;
use crate::renderer::shaders::ShaderProgram;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Single,
    /// One draw covering `n` instances, e.g. one per shadow cascade.
    Instanced(u32),
}

impl DrawMode {
    pub fn instance_count(self) -> u32 {
        match self {
            Self::Single => 1,
            Self::Instanced(count) => count,
        }
    }
}

/// Issues one draw per argument tuple and counts what was drawn.
#[derive(Debug, Default)]
pub struct DrawInvoker {
    scratch: Vec<UniformValue>,
    drawn_objects: u32,
    skipped_entries: u32,
}

impl DrawInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw<B, I>(
        &mut self,
        backend: &mut B,
        program: &ShaderProgram,
        mesh: &MeshBatch,
        uniforms: I,
        mode: DrawMode,
    ) where
        B: GpuBackend,
        I: IntoIterator<Item = UniformValue>,
    {
        self.scratch.clear();
        self.scratch.extend(uniforms);

        debug_assert!(
            self.scratch
                .iter()
                .map(UniformValue::kind)
                .eq(program.uniforms().iter().copied()),
            "uniforms for {:?} do not match its declaration",
            program.kind()
        );

        self.drawn_objects += 1;
        backend.set_uniforms(program.id(), &self.scratch);
        backend.draw_indexed(&mesh.draw_call(mode.instance_count()));
    }

    pub fn skip(&mut self) {
        self.skipped_entries += 1;
    }

    pub fn drawn_objects(&self) -> u32 {
        self.drawn_objects
    }

    pub fn skipped_entries(&self) -> u32 {
        self.skipped_entries
    }

    pub fn reset(&mut self) {
        self.drawn_objects = 0;
        self.skipped_entries = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::RecordingBackend;
    use crate::renderer::shaders::{ShaderKind, ShaderRegistry};
    use crate::renderer::VertexLayout;
    use glam::{Mat4, Vec3};

    #[test]
    fn instanced_draw_counts_one_object() {
        let mut backend = RecordingBackend::new();
        let shaders = ShaderRegistry::new(&mut backend);
        let mesh = MeshBatch::new("crate", VertexLayout::Standard, 12);
        let mut invoker = DrawInvoker::new();

        invoker.draw(
            &mut backend,
            shaders.get(ShaderKind::GrassShadow),
            &mesh,
            [Mat4::IDENTITY.into(), Vec3::Y.into()],
            DrawMode::Instanced(4),
        );
        invoker.skip();

        assert_eq!(invoker.drawn_objects(), 1);
        assert_eq!(invoker.skipped_entries(), 1);
        assert_eq!(backend.draws()[0].call.instance_count, 4);
        assert_eq!(backend.draws()[0].uniforms.len(), 2);

        invoker.reset();
        assert_eq!(invoker.drawn_objects(), 0);
        assert_eq!(invoker.skipped_entries(), 0);
    }
}
