use crate::asset::MeshStore;
use crate::environment::{clear_color_for, WorldEnvironment};
use crate::renderer::args::{GrassArgs, Selection, SolidArgs};
use crate::renderer::backend::GpuBackend;
use crate::renderer::shaders::ShaderKind;
use crate::renderer::state::{ClearFlags, Filtering, PipelineState, Swizzle};
use crate::renderer::targets::{Fbo, Rtt};
use crate::renderer::{Renderer, VertexLayout};
use crate::scene::{RenderPhase, SceneManager};

use super::MeshPass;

// Normal and depth pass.
const MODEL_INVERSE: Selection<SolidArgs> = Selection::new(&[1, 2]);
const MODEL_INVERSE_TEXTURE: Selection<SolidArgs> = Selection::new(&[1, 2, 3]);
const GRASS_MODEL_INVERSE_WIND: Selection<GrassArgs> = Selection::new(&[1, 2, 3]);

// Lit pass.
const MODEL_TEXTURE_AMBIENT: Selection<SolidArgs> = Selection::new(&[1, 3, 4]);
const MODEL_INVERSE_AMBIENT: Selection<SolidArgs> = Selection::new(&[1, 2, 4]);
const MODEL_AMBIENT: Selection<SolidArgs> = Selection::new(&[1, 4]);
const MODEL_TEXTURE: Selection<SolidArgs> = Selection::new(&[1, 3]);
const MODEL: Selection<SolidArgs> = Selection::new(&[1]);
const GRASS_MODEL_WIND_AMBIENT: Selection<GrassArgs> = Selection::new(&[1, 3, 4]);

const TRANSPARENT_BLACK: wgpu::Color = wgpu::Color::TRANSPARENT;

impl<B: GpuBackend> Renderer<B> {
    /// Writes normals and depth for every solid batch.
    ///
    /// The solid lists are refilled here and stay valid for the lit pass of
    /// the same frame.
    pub fn render_first_pass<S>(
        &mut self,
        scene: &mut S,
        meshes: &mut MeshStore,
        world: Option<&WorldEnvironment>,
    ) where
        S: SceneManager + ?Sized,
    {
        self.backend
            .bind_framebuffer(self.targets.fbo(Fbo::NormalAndDepths));
        self.backend.set_pipeline_state(&PipelineState::opaque());
        self.backend.clear(ClearFlags::all(), TRANSPARENT_BLACK);

        self.lists.clear_solid();
        self.traverse(scene, RenderPhase::SolidNormalAndDepth, world);

        if !self.settings.features.dynamic_lights {
            return;
        }

        let ctx = self.pass_context(meshes);
        let shaders = ctx.shaders;
        let lists = ctx.lists;
        let mut drawer = ctx.drawer;

        let object = |layout: VertexLayout| {
            MeshPass::new(shaders, ShaderKind::ObjectPass1, layout, MODEL_INVERSE)
        };
        drawer.render_meshes(&object(VertexLayout::Standard), &lists.default);
        drawer.render_meshes(&object(VertexLayout::Standard), &lists.sphere_map);
        drawer.render_meshes(&object(VertexLayout::Standard), &lists.unlit);
        drawer.render_meshes(&object(VertexLayout::TwoTCoords), &lists.details);
        drawer.render_meshes(&object(VertexLayout::TwoTCoords), &lists.splatting);

        let alpha_ref = MeshPass::new(
            shaders,
            ShaderKind::ObjectRefPass1,
            VertexLayout::Standard,
            MODEL_INVERSE_TEXTURE,
        );
        drawer.render_meshes(&alpha_ref, &lists.alpha_ref);

        let grass = MeshPass::new(
            shaders,
            ShaderKind::GrassPass1,
            VertexLayout::Standard,
            GRASS_MODEL_INVERSE_WIND,
        );
        drawer.render_meshes(&grass, &lists.grass);

        let normal_map = MeshPass::new(
            shaders,
            ShaderKind::NormalMap,
            VertexLayout::Tangents,
            MODEL_INVERSE,
        );
        drawer.render_meshes(&normal_map, &lists.normal_map);
    }

    /// Shades solid batches with the accumulated light buffers into the
    /// currently bound color target.
    pub fn render_second_pass<S>(
        &mut self,
        scene: &mut S,
        meshes: &mut MeshStore,
        world: Option<&WorldEnvironment>,
    ) where
        S: SceneManager + ?Sized,
    {
        let dynamic_lights = self.settings.features.dynamic_lights;

        self.backend
            .set_pipeline_state(&PipelineState::opaque().with_depth_write(!dynamic_lights));
        let clear = if dynamic_lights {
            ClearFlags::COLOR
        } else {
            ClearFlags::COLOR | ClearFlags::DEPTH
        };
        self.backend.clear(clear, clear_color_for(world));

        self.traverse(scene, RenderPhase::SolidLit, world);

        let light_inputs = [
            (Rtt::Tmp1, Filtering::Nearest),
            (Rtt::Tmp2, Filtering::Nearest),
            (Rtt::Half1R, Filtering::Linear),
        ];
        for (unit, (rtt, filtering)) in light_inputs.into_iter().enumerate() {
            self.backend
                .bind_texture(unit as u32, self.targets.render_target(rtt), filtering);
        }

        let swizzle = Swizzle::for_light_viz(self.settings.features.light_viz);
        let ctx = self.pass_context(meshes);
        let shaders = ctx.shaders;
        let lists = ctx.lists;
        let mut drawer = ctx.drawer;

        let solid = |kind: ShaderKind, layout: VertexLayout, selection: Selection<SolidArgs>| {
            MeshPass::new(shaders, kind, layout, selection).with_swizzle(swizzle)
        };

        drawer.render_meshes(
            &solid(ShaderKind::ObjectPass2, VertexLayout::Standard, MODEL_TEXTURE_AMBIENT),
            &lists.default,
        );
        drawer.render_meshes(
            &solid(ShaderKind::ObjectRefPass2, VertexLayout::Standard, MODEL_TEXTURE_AMBIENT),
            &lists.alpha_ref,
        );
        drawer.render_meshes(
            &solid(ShaderKind::SphereMap, VertexLayout::Standard, MODEL_INVERSE_AMBIENT),
            &lists.sphere_map,
        );
        drawer.render_meshes(
            &solid(ShaderKind::DetailledObjectPass2, VertexLayout::TwoTCoords, MODEL_AMBIENT),
            &lists.details,
        );

        let grass = MeshPass::new(
            shaders,
            ShaderKind::GrassPass2,
            VertexLayout::Standard,
            GRASS_MODEL_WIND_AMBIENT,
        )
        .with_swizzle(swizzle);
        drawer.render_meshes(&grass, &lists.grass);

        drawer.render_meshes(
            &solid(ShaderKind::ObjectUnlit, VertexLayout::Standard, MODEL),
            &lists.unlit,
        );
        drawer.render_meshes(
            &solid(ShaderKind::Splatting, VertexLayout::TwoTCoords, MODEL_TEXTURE),
            &lists.splatting,
        );
        drawer.render_meshes(
            &solid(ShaderKind::ObjectPass2, VertexLayout::Tangents, MODEL_TEXTURE_AMBIENT),
            &lists.normal_map,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Handle;
    use crate::renderer::args::{DrawArgs, UniformKind};
    use glam::{Mat4, Vec3};

    fn kinds<A: DrawArgs>(selection: Selection<A>, args: &A) -> Vec<UniformKind> {
        selection.values(args).map(|value| value.kind()).collect()
    }

    #[test]
    fn solid_selections_match_program_uniforms() {
        let solid = SolidArgs::new(Handle::new(0), Mat4::IDENTITY);
        let grass = GrassArgs::new(Handle::new(0), Mat4::IDENTITY, Vec3::X);

        let cases: [(ShaderKind, Vec<UniformKind>); 11] = [
            (ShaderKind::ObjectPass1, kinds(MODEL_INVERSE, &solid)),
            (ShaderKind::NormalMap, kinds(MODEL_INVERSE, &solid)),
            (ShaderKind::ObjectRefPass1, kinds(MODEL_INVERSE_TEXTURE, &solid)),
            (ShaderKind::GrassPass1, kinds(GRASS_MODEL_INVERSE_WIND, &grass)),
            (ShaderKind::ObjectPass2, kinds(MODEL_TEXTURE_AMBIENT, &solid)),
            (ShaderKind::ObjectRefPass2, kinds(MODEL_TEXTURE_AMBIENT, &solid)),
            (ShaderKind::SphereMap, kinds(MODEL_INVERSE_AMBIENT, &solid)),
            (ShaderKind::DetailledObjectPass2, kinds(MODEL_AMBIENT, &solid)),
            (ShaderKind::GrassPass2, kinds(GRASS_MODEL_WIND_AMBIENT, &grass)),
            (ShaderKind::ObjectUnlit, kinds(MODEL, &solid)),
            (ShaderKind::Splatting, kinds(MODEL_TEXTURE, &solid)),
        ];

        for (kind, selected) in cases {
            assert_eq!(kind.uniforms(), selected.as_slice(), "{kind:?}");
        }
    }
}
