use glam::Mat4;

use crate::asset::MeshStore;
use crate::environment::WorldEnvironment;
use crate::renderer::args::{GrassArgs, Selection, SolidArgs};
use crate::renderer::backend::GpuBackend;
use crate::renderer::shaders::ShaderKind;
use crate::renderer::state::{ClearFlags, PipelineState};
use crate::renderer::targets::SHADOW_CASCADES;
use crate::renderer::{Renderer, VertexLayout};
use crate::scene::{RenderPhase, SceneManager};

use super::MeshPass;

const MODEL: Selection<SolidArgs> = Selection::new(&[1]);
const GRASS_MODEL_WIND: Selection<GrassArgs> = Selection::new(&[1, 3]);

/// Slope-scaled depth bias against shadow acne.
const SHADOW_POLYGON_OFFSET: f32 = 1.5;

const SHADOW_STATE: PipelineState = PipelineState::opaque()
    .with_polygon_offset(Some(SHADOW_POLYGON_OFFSET))
    .with_color_writes(false);

impl<B: GpuBackend> Renderer<B> {
    /// Depth-only render of every solid batch into all shadow cascades, one
    /// instanced draw per batch.
    pub fn render_shadows<S>(
        &mut self,
        scene: &mut S,
        meshes: &mut MeshStore,
        world: Option<&WorldEnvironment>,
    ) where
        S: SceneManager + ?Sized,
    {
        self.backend.bind_framebuffer(self.targets.shadow_fbo());
        self.backend.set_pipeline_state(&SHADOW_STATE);
        self.backend.clear(ClearFlags::DEPTH, wgpu::Color::TRANSPARENT);

        self.lists.clear_solid();
        self.traverse(scene, RenderPhase::Shadow, world);

        let ctx = self.pass_context(meshes);
        let shaders = ctx.shaders;
        let lists = ctx.lists;
        let mut drawer = ctx.drawer;

        let shadow = |layout: VertexLayout| {
            MeshPass::new(shaders, ShaderKind::Shadow, layout, MODEL).instanced(SHADOW_CASCADES)
        };
        drawer.render_meshes(&shadow(VertexLayout::Standard), &lists.default);
        drawer.render_meshes(&shadow(VertexLayout::Standard), &lists.sphere_map);
        drawer.render_meshes(&shadow(VertexLayout::Standard), &lists.unlit);
        drawer.render_meshes(&shadow(VertexLayout::TwoTCoords), &lists.details);
        drawer.render_meshes(&shadow(VertexLayout::TwoTCoords), &lists.splatting);
        drawer.render_meshes(&shadow(VertexLayout::Tangents), &lists.normal_map);

        let alpha_ref = MeshPass::new(shaders, ShaderKind::RefShadow, VertexLayout::Standard, MODEL)
            .instanced(SHADOW_CASCADES);
        drawer.render_meshes(&alpha_ref, &lists.alpha_ref);

        let grass = MeshPass::new(
            shaders,
            ShaderKind::GrassShadow,
            VertexLayout::Standard,
            GRASS_MODEL_WIND,
        )
        .instanced(SHADOW_CASCADES);
        drawer.render_meshes(&grass, &lists.grass);

        drawer
            .backend
            .set_pipeline_state(&SHADOW_STATE.with_polygon_offset(None));
    }

    /// Reflective shadow map for global illumination, drawn from the lists
    /// the shadow pass populated.
    pub fn render_rsm(&mut self, meshes: &mut MeshStore, rsm_matrix: Mat4) {
        self.backend.bind_framebuffer(self.targets.rsm_fbo());
        self.backend.set_pipeline_state(&PipelineState::opaque());
        self.backend.clear(
            ClearFlags::COLOR | ClearFlags::DEPTH,
            wgpu::Color::TRANSPARENT,
        );

        let ctx = self.pass_context(meshes);
        let shaders = ctx.shaders;
        let lists = ctx.lists;
        let mut drawer = ctx.drawer;

        let rsm = |layout: VertexLayout| {
            MeshPass::new(shaders, ShaderKind::Rsm, layout, MODEL).with_leading(rsm_matrix)
        };
        drawer.render_meshes(&rsm(VertexLayout::Standard), &lists.default);
        drawer.render_meshes(&rsm(VertexLayout::Standard), &lists.sphere_map);
        drawer.render_meshes(&rsm(VertexLayout::Standard), &lists.unlit);
        drawer.render_meshes(&rsm(VertexLayout::TwoTCoords), &lists.details);
        drawer.render_meshes(&rsm(VertexLayout::TwoTCoords), &lists.splatting);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadow_state_biases_depth_and_masks_color() {
        let depth = SHADOW_STATE.depth_stencil_state(wgpu::TextureFormat::Depth32Float);
        assert_eq!(depth.bias.slope_scale, 1.5);
        assert!(depth.depth_write_enabled);
        assert_eq!(depth.depth_compare, wgpu::CompareFunction::LessEqual);
        assert_eq!(SHADOW_STATE.blend, None);
        assert_eq!(SHADOW_STATE.color_write_mask(), wgpu::ColorWrites::empty());
    }

    #[test]
    fn shadow_selections_match_program_uniforms() {
        use crate::asset::Handle;
        use glam::Vec3;

        let grass = GrassArgs::new(Handle::new(0), Mat4::IDENTITY, Vec3::Z);
        let kinds: Vec<_> = GRASS_MODEL_WIND.values(&grass).map(|v| v.kind()).collect();
        assert_eq!(ShaderKind::GrassShadow.uniforms(), kinds.as_slice());
        assert_eq!(ShaderKind::Shadow.uniforms().len(), MODEL.len());
        assert_eq!(ShaderKind::Rsm.uniforms().len(), MODEL.len() + 1);
    }
}
