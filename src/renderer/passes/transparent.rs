use crate::asset::MeshStore;
use crate::environment::WorldEnvironment;
use crate::renderer::args::{
    DisplaceArgs, DrawArgs, FogArgs, Selection, TransparentArgs, UniformValue,
};
use crate::renderer::backend::GpuBackend;
use crate::renderer::draw::DrawMode;
use crate::renderer::shaders::{displace_units, ShaderKind};
use crate::renderer::state::{BlendMode, ClearFlags, Filtering, PipelineState, StencilMode};
use crate::renderer::targets::{Fbo, Rtt};
use crate::renderer::{Renderer, VertexLayout};
use crate::scene::{RenderPhase, SceneManager};

use super::{drawable_mesh, MeshPass};

const MODEL_TEXTURE: Selection<TransparentArgs> = Selection::new(&[1, 2]);
const MODEL_TEXTURE_FOG: Selection<FogArgs> = Selection::new(&[1, 2, 3, 4, 5, 6, 7, 8]);
const DISPLACE_MODEL: Selection<DisplaceArgs> = Selection::new(&[1]);

const DISPLACE_TEXTURE: &str = "displace.png";
const DISPLACE_STENCIL: u32 = 1;

/// Depth tested, never written, both faces drawn.
const TRANSPARENT_STATE: PipelineState = PipelineState::opaque()
    .with_depth_write(false)
    .with_blend(Some(BlendMode::Alpha))
    .with_cull(None);

const DISPLACE_STATE: PipelineState = PipelineState::opaque()
    .with_depth_write(false)
    .with_blend(None)
    .with_stencil(StencilMode::Write {
        reference: DISPLACE_STENCIL,
    });

impl<B: GpuBackend> Renderer<B> {
    /// Blended and additive surfaces followed, with dynamic lights, by the
    /// displacement effect.
    pub fn render_transparent<S>(
        &mut self,
        scene: &mut S,
        meshes: &mut MeshStore,
        world: Option<&WorldEnvironment>,
        time: f32,
    ) where
        S: SceneManager + ?Sized,
    {
        self.render_transparent_surfaces(scene, meshes, world);
        if self.settings.features.dynamic_lights {
            self.render_displacement(meshes, world, time);
        }
    }

    pub(crate) fn render_transparent_surfaces<S>(
        &mut self,
        scene: &mut S,
        meshes: &mut MeshStore,
        world: Option<&WorldEnvironment>,
    ) where
        S: SceneManager + ?Sized,
    {
        self.backend.set_pipeline_state(&TRANSPARENT_STATE);
        self.lists.clear_transparent();
        self.traverse(scene, RenderPhase::Transparent, world);

        let fog = world.is_some_and(WorldEnvironment::is_fog_enabled);
        let ctx = self.pass_context(meshes);
        let shaders = ctx.shaders;
        let lists = ctx.lists;
        let mut drawer = ctx.drawer;

        let additive = TRANSPARENT_STATE.with_blend(Some(BlendMode::Additive));

        if fog {
            let pass = MeshPass::new(
                shaders,
                ShaderKind::TransparentFog,
                VertexLayout::Standard,
                MODEL_TEXTURE_FOG,
            );
            drawer.backend.set_pipeline_state(&TRANSPARENT_STATE);
            drawer.render_meshes(&pass, &lists.blend_transparent_fog);
            drawer.backend.set_pipeline_state(&additive);
            drawer.render_meshes(&pass, &lists.additive_transparent_fog);
        } else {
            let pass = MeshPass::new(
                shaders,
                ShaderKind::Transparent,
                VertexLayout::Standard,
                MODEL_TEXTURE,
            );
            drawer.backend.set_pipeline_state(&TRANSPARENT_STATE);
            drawer.render_meshes(&pass, &lists.blend_transparent);
            drawer.backend.set_pipeline_state(&additive);
            drawer.render_meshes(&pass, &lists.additive_transparent);
        }
    }

    /// Screen-space distortion of displacement surfaces.
    ///
    /// Covered pixels are marked in the stencil buffer while the mask is
    /// drawn into Tmp1; the distorted color is then composited back onto
    /// the color target only where the stencil is set.
    pub(crate) fn render_displacement(
        &mut self,
        meshes: &mut MeshStore,
        world: Option<&WorldEnvironment>,
        time: f32,
    ) {
        let tmp1 = self.targets.fbo(Fbo::Tmp1WithDs);
        let displace = self.targets.fbo(Fbo::Displace);
        let transparent_black = wgpu::Color::TRANSPARENT;

        self.backend.bind_framebuffer(tmp1);
        self.backend.clear(ClearFlags::COLOR, transparent_black);
        self.backend.bind_framebuffer(displace);
        self.backend.clear(ClearFlags::COLOR, transparent_black);

        let defaults = WorldEnvironment::default();
        let env = world.unwrap_or(&defaults);
        self.displace
            .update(time, env.wind(), env.displacement_speed());
        let dir = self.displace.dir();
        let dir2 = self.displace.dir2();

        self.backend.set_pipeline_state(&DISPLACE_STATE);
        self.backend.clear(ClearFlags::STENCIL, transparent_black);

        let displace_texture = self.textures.named(&mut self.backend, DISPLACE_TEXTURE);
        let mask_texture = self.targets.render_target(Rtt::Tmp1);
        let color_texture = self.targets.render_target(Rtt::Color);
        let displaced = self.targets.render_target(Rtt::Displace);

        let ctx = self.pass_context(meshes);
        let shaders = ctx.shaders;
        let lists = ctx.lists;
        let mut drawer = ctx.drawer;

        drawer.backend.bind_framebuffer(tmp1);
        let mask = MeshPass::new(
            shaders,
            ShaderKind::DisplaceMask,
            VertexLayout::TwoTCoords,
            DISPLACE_MODEL,
        );
        drawer.render_meshes(&mask, &lists.displacement);

        drawer.backend.bind_framebuffer(displace);
        let program = shaders.get(ShaderKind::Displace);
        drawer.backend.use_program(program.id());
        drawer.backend.bind_vertex_layout(VertexLayout::TwoTCoords);
        for args in &lists.displacement {
            let Some(mesh) = drawable_mesh(
                drawer.meshes,
                drawer.invoker,
                program.kind(),
                VertexLayout::TwoTCoords,
                args.mesh(),
            ) else {
                continue;
            };

            drawer.backend.bind_texture(
                displace_units::DISPLACEMENT,
                displace_texture,
                Filtering::Linear,
            );
            drawer
                .backend
                .bind_texture(displace_units::MASK, mask_texture, Filtering::Linear);
            drawer
                .backend
                .bind_texture(displace_units::COLOR, color_texture, Filtering::Linear);
            drawer.textures.bind(
                drawer.backend,
                displace_units::TEXTURE,
                mesh,
                0,
                Filtering::Linear,
            );

            let uniforms = DISPLACE_MODEL
                .values(args)
                .chain([UniformValue::from(dir), UniformValue::from(dir2)]);
            drawer
                .invoker
                .draw(drawer.backend, program, mesh, uniforms, DrawMode::Single);
        }

        let colors = self.targets.fbo(Fbo::Colors);
        let pass_through = self.shaders.get(ShaderKind::PassThrough).id();
        self.backend.bind_framebuffer(colors);
        self.backend
            .set_pipeline_state(&DISPLACE_STATE.with_stencil(StencilMode::Equal {
                reference: DISPLACE_STENCIL,
            }));
        self.backend.draw_fullscreen(pass_through, displaced);
        self.backend
            .set_pipeline_state(&DISPLACE_STATE.with_stencil(StencilMode::Disabled));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Handle;
    use crate::environment::FogParams;
    use glam::Mat4;

    #[test]
    fn transparent_state_blends_without_writing_depth() {
        let depth = TRANSPARENT_STATE.depth_stencil_state(wgpu::TextureFormat::Depth24PlusStencil8);
        assert!(!depth.depth_write_enabled);
        assert_eq!(TRANSPARENT_STATE.cull, None);
        assert_eq!(
            TRANSPARENT_STATE.blend_state(),
            Some(wgpu::BlendState::ALPHA_BLENDING)
        );
    }

    #[test]
    fn displacement_state_marks_stencil_without_blending() {
        assert_eq!(DISPLACE_STATE.blend, None);
        assert_eq!(DISPLACE_STATE.stencil.reference(), Some(DISPLACE_STENCIL));
        let stencil = DISPLACE_STATE.stencil.to_wgpu();
        assert_eq!(stencil.front.pass_op, wgpu::StencilOperation::Replace);
    }

    #[test]
    fn transparent_selections_match_program_uniforms() {
        let plain = TransparentArgs::new(Handle::new(0), Mat4::IDENTITY);
        let fog = FogArgs::new(Handle::new(0), Mat4::IDENTITY, FogParams::default());
        let displaced = DisplaceArgs::new(Handle::new(0), Mat4::IDENTITY);

        let plain: Vec<_> = MODEL_TEXTURE.values(&plain).map(|v| v.kind()).collect();
        let fog: Vec<_> = MODEL_TEXTURE_FOG.values(&fog).map(|v| v.kind()).collect();
        let mask: Vec<_> = DISPLACE_MODEL.values(&displaced).map(|v| v.kind()).collect();

        assert_eq!(ShaderKind::Transparent.uniforms(), plain.as_slice());
        assert_eq!(ShaderKind::TransparentFog.uniforms(), fog.as_slice());
        assert_eq!(ShaderKind::DisplaceMask.uniforms(), mask.as_slice());
    }
}
