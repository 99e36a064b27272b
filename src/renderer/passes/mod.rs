//! Pass orchestrators.
//!
//! Each pass is an `impl` block on [`Renderer`](super::Renderer): it applies
//! its [`PipelineState`](super::state::PipelineState), lets the scene fill
//! the material lists, then walks every list with one generic mesh loop.

mod shadow;
mod solid;
mod transparent;

use crate::asset::{Handle, MeshBatch, MeshStore};
use crate::renderer::args::{DrawArgs, Selection, UniformValue};
use crate::renderer::backend::GpuBackend;
use crate::renderer::draw::{DrawInvoker, DrawMode};
use crate::renderer::lists::MaterialLists;
use crate::renderer::shaders::{ShaderKind, ShaderProgram, ShaderRegistry};
use crate::renderer::state::{Filtering, Swizzle};
use crate::renderer::texture::TextureBinder;
use crate::renderer::VertexLayout;

/// How one material list is drawn.
pub(crate) struct MeshPass<'s, A> {
    program: &'s ShaderProgram,
    layout: VertexLayout,
    selection: Selection<A>,
    mode: DrawMode,
    swizzle: Option<Swizzle>,
    /// Pass-wide uniform presented before the selected fields.
    leading: Option<UniformValue>,
}

impl<'s, A: DrawArgs> MeshPass<'s, A> {
    pub(crate) fn new(
        shaders: &'s ShaderRegistry,
        kind: ShaderKind,
        layout: VertexLayout,
        selection: Selection<A>,
    ) -> Self {
        Self {
            program: shaders.get(kind),
            layout,
            selection,
            mode: DrawMode::Single,
            swizzle: None,
            leading: None,
        }
    }

    pub(crate) fn instanced(mut self, count: u32) -> Self {
        self.mode = DrawMode::Instanced(count);
        self
    }

    pub(crate) fn with_swizzle(mut self, swizzle: Swizzle) -> Self {
        self.swizzle = Some(swizzle);
        self
    }

    pub(crate) fn with_leading(mut self, value: impl Into<UniformValue>) -> Self {
        self.leading = Some(value.into());
        self
    }
}

/// Disjoint borrows of the renderer state a pass draws with.
pub(crate) struct MeshDrawer<'a, B> {
    pub(crate) backend: &'a mut B,
    pub(crate) textures: &'a mut TextureBinder,
    pub(crate) invoker: &'a mut DrawInvoker,
    pub(crate) meshes: &'a mut MeshStore,
}

impl<B: GpuBackend> MeshDrawer<'_, B> {
    /// Draws every entry of `entries` whose mesh uses `pass.layout`.
    ///
    /// Entries with another layout are skipped; the remaining entries are
    /// still drawn.
    pub(crate) fn render_meshes<A: DrawArgs>(&mut self, pass: &MeshPass<'_, A>, entries: &[A]) {
        if entries.is_empty() {
            return;
        }

        let program = pass.program;
        self.backend.use_program(program.id());
        self.backend.bind_vertex_layout(pass.layout);

        for args in entries {
            let Some(mesh) =
                drawable_mesh(self.meshes, self.invoker, program.kind(), pass.layout, args.mesh())
            else {
                continue;
            };

            for (slot, &unit) in program.texture_units().iter().enumerate() {
                self.textures
                    .bind(self.backend, unit, mesh, slot, Filtering::Trilinear);
                if let Some(swizzle) = pass.swizzle {
                    self.backend.set_swizzle(unit, swizzle);
                }
            }

            let uniforms = pass.leading.into_iter().chain(pass.selection.values(args));
            self.invoker
                .draw(self.backend, program, mesh, uniforms, pass.mode);
        }
    }
}

/// The mesh an entry draws, or `None` after counting the entry as skipped
/// when its handle is stale or its vertex layout differs from `layout`.
pub(crate) fn drawable_mesh<'m>(
    meshes: &'m mut MeshStore,
    invoker: &mut DrawInvoker,
    kind: ShaderKind,
    layout: VertexLayout,
    handle: Handle<MeshBatch>,
) -> Option<&'m mut MeshBatch> {
    let Some(mesh) = meshes.get_mut(handle) else {
        log::warn!("Skipping draw entry with invalid mesh handle");
        invoker.skip();
        return None;
    };

    if mesh.layout != layout {
        if cfg!(debug_assertions) {
            log::error!(
                "{:?}: mesh {} has vertex layout {:?}, expected {:?}",
                kind,
                mesh.texture_hint(),
                mesh.layout,
                layout
            );
        }
        invoker.skip();
        return None;
    }

    Some(mesh)
}

/// Everything a pass reads or writes for one frame.
pub(crate) struct PassContext<'a, B> {
    pub(crate) drawer: MeshDrawer<'a, B>,
    pub(crate) shaders: &'a ShaderRegistry,
    pub(crate) lists: &'a MaterialLists,
}
