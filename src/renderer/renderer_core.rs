use glam::Mat4;

use crate::asset::MeshStore;
use crate::environment::WorldEnvironment;
use crate::renderer::backend::GpuBackend;
use crate::renderer::displace::DisplaceProvider;
use crate::renderer::draw::DrawInvoker;
use crate::renderer::lists::MaterialLists;
use crate::renderer::passes::{MeshDrawer, PassContext};
use crate::renderer::shaders::ShaderRegistry;
use crate::renderer::targets::{Fbo, RenderTargetSet};
use crate::renderer::texture::TextureBinder;
use crate::scene::{RenderPhase, SceneManager, TraversalContext};
use crate::settings::{FeatureFlags, RenderSettings};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RendererStats {
    pub drawn_objects: u32,
    pub first_pass_draws: u32,
    pub second_pass_draws: u32,
    pub transparent_draws: u32,
    pub displacement_draws: u32,
    pub shadow_draws: u32,
    pub rsm_draws: u32,
    pub skipped_entries: u32,
}

impl RendererStats {
    pub fn total_draw_calls(&self) -> u32 {
        self.first_pass_draws
            + self.second_pass_draws
            + self.transparent_draws
            + self.displacement_draws
            + self.shadow_draws
            + self.rsm_draws
    }
}

/// Per-frame inputs that do not live in the scene.
#[derive(Clone, Copy, Debug)]
pub struct FrameParams {
    /// Active world, `None` outside of a race (menus, loading screens).
    pub world: Option<WorldEnvironment>,
    /// Light-space matrix of the reflective shadow map.
    pub rsm_matrix: Mat4,
    /// Seconds since start, drives the displacement animation.
    pub time: f32,
}

impl Default for FrameParams {
    fn default() -> Self {
        Self {
            world: None,
            rsm_matrix: Mat4::IDENTITY,
            time: 0.0,
        }
    }
}

/// Frame driver. Owns every piece of per-frame state so passes borrow it
/// instead of reaching for globals.
pub struct Renderer<B: GpuBackend> {
    pub(crate) backend: B,
    pub(crate) shaders: ShaderRegistry,
    pub(crate) targets: RenderTargetSet,
    pub(crate) textures: TextureBinder,
    pub(crate) lists: MaterialLists,
    pub(crate) invoker: DrawInvoker,
    pub(crate) displace: DisplaceProvider,
    pub(crate) settings: RenderSettings,
    stats: RendererStats,
}

impl<B: GpuBackend> Renderer<B> {
    pub fn new(mut backend: B, settings: RenderSettings) -> Self {
        let shaders = ShaderRegistry::new(&mut backend);
        let targets = RenderTargetSet::new(&mut backend, &settings);
        let textures = TextureBinder::new(settings.features.texture_compression);

        Self {
            backend,
            shaders,
            targets,
            textures,
            lists: MaterialLists::new(),
            invoker: DrawInvoker::new(),
            displace: DisplaceProvider::new(),
            settings,
            stats: RendererStats::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn shaders(&self) -> &ShaderRegistry {
        &self.shaders
    }

    pub fn targets(&self) -> &RenderTargetSet {
        &self.targets
    }

    pub fn lists(&self) -> &MaterialLists {
        &self.lists
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn features(&self) -> FeatureFlags {
        self.settings.features
    }

    pub fn set_features(&mut self, features: FeatureFlags) {
        self.settings.features = features;
        self.textures.set_compression(features.texture_compression);
    }

    pub fn last_frame_stats(&self) -> RendererStats {
        self.stats
    }

    pub fn displacement(&self) -> &DisplaceProvider {
        &self.displace
    }

    /// Renders one frame: normal/depth, lit solids, transparents, shadows,
    /// then the reflective shadow map when global illumination is on.
    pub fn render_frame<S>(
        &mut self,
        scene: &mut S,
        meshes: &mut MeshStore,
        frame: &FrameParams,
    ) -> RendererStats
    where
        S: SceneManager + ?Sized,
    {
        self.invoker.reset();
        let world = frame.world.as_ref();
        let mut stats = RendererStats::default();

        stats.first_pass_draws = self.counted(|r| r.render_first_pass(scene, meshes, world));

        self.backend.bind_framebuffer(self.targets.fbo(Fbo::Colors));
        stats.second_pass_draws = self.counted(|r| r.render_second_pass(scene, meshes, world));

        stats.transparent_draws =
            self.counted(|r| r.render_transparent_surfaces(scene, meshes, world));
        if self.settings.features.dynamic_lights {
            stats.displacement_draws =
                self.counted(|r| r.render_displacement(meshes, world, frame.time));
        }

        stats.shadow_draws = self.counted(|r| r.render_shadows(scene, meshes, world));
        if self.settings.features.global_illumination {
            stats.rsm_draws = self.counted(|r| r.render_rsm(meshes, frame.rsm_matrix));
        }

        self.backend.end_frame();

        stats.drawn_objects = self.invoker.drawn_objects();
        stats.skipped_entries = self.invoker.skipped_entries();

        log::debug!(
            "Frame: {} draws, {} skipped entries",
            stats.total_draw_calls(),
            stats.skipped_entries
        );
        self.stats = stats;
        stats
    }

    /// Lets the scene fill the material lists for `phase`.
    pub(crate) fn traverse<S>(
        &mut self,
        scene: &mut S,
        phase: RenderPhase,
        world: Option<&WorldEnvironment>,
    ) where
        S: SceneManager + ?Sized,
    {
        let ctx = TraversalContext {
            phase,
            world,
            features: self.settings.features,
        };
        scene.draw_all(&ctx, &mut self.lists);
    }

    pub(crate) fn pass_context<'a>(&'a mut self, meshes: &'a mut MeshStore) -> PassContext<'a, B> {
        PassContext {
            drawer: MeshDrawer {
                backend: &mut self.backend,
                textures: &mut self.textures,
                invoker: &mut self.invoker,
                meshes,
            },
            shaders: &self.shaders,
            lists: &self.lists,
        }
    }

    fn counted(&mut self, pass: impl FnOnce(&mut Self)) -> u32 {
        let before = self.invoker.drawn_objects();
        pass(self);
        self.invoker.drawn_objects() - before
    }
}
