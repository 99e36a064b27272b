use super::AssetCache;
use crate::renderer::backend::{DrawCall, TextureId};
use crate::renderer::VertexLayout;

/// Texture slots carried by a mesh batch. Terrain splatting uses all six.
pub const MAX_MESH_TEXTURES: usize = 6;

/// One drawable range of the shared vertex/index buffers.
///
/// Owned by the [`MeshStore`]; argument lists only hold handles to it. The
/// texture slots are the only part that changes after creation: the texture
/// binder writes the fallback texture back into empty slots.
#[derive(Debug, Clone)]
pub struct MeshBatch {
    pub label: String,
    pub topology: wgpu::PrimitiveTopology,
    pub index_format: wgpu::IndexFormat,
    pub index_count: u32,
    /// Byte offset of the first index.
    pub vao_offset: u64,
    pub base_vertex: i32,
    pub textures: [Option<TextureId>; MAX_MESH_TEXTURES],
    pub layout: VertexLayout,
}

pub type MeshStore = AssetCache<MeshBatch>;

impl MeshBatch {
    pub fn new(label: impl Into<String>, layout: VertexLayout, index_count: u32) -> Self {
        Self {
            label: label.into(),
            topology: wgpu::PrimitiveTopology::TriangleList,
            index_format: wgpu::IndexFormat::Uint16,
            index_count,
            vao_offset: 0,
            base_vertex: 0,
            textures: [None; MAX_MESH_TEXTURES],
            layout,
        }
    }

    pub fn with_range(mut self, vao_offset: u64, base_vertex: i32) -> Self {
        self.vao_offset = vao_offset;
        self.base_vertex = base_vertex;
        self
    }

    pub fn with_index_format(mut self, format: wgpu::IndexFormat) -> Self {
        self.index_format = format;
        self
    }

    pub fn with_topology(mut self, topology: wgpu::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_texture(mut self, slot: usize, texture: TextureId) -> Self {
        self.textures[slot] = Some(texture);
        self
    }

    /// Indexed, base-vertex-offset draw of the whole batch.
    pub fn draw_call(&self, instance_count: u32) -> DrawCall {
        DrawCall {
            topology: self.topology,
            index_format: self.index_format,
            index_count: self.index_count,
            offset: self.vao_offset,
            base_vertex: self.base_vertex,
            instance_count,
        }
    }

    /// Name of the first texture slot, used as a hint in diagnostics.
    pub(crate) fn texture_hint(&self) -> String {
        match self.textures[0] {
            Some(texture) => format!("{} (texture {:?})", self.label, texture),
            None => self.label.clone(),
        }
    }
}
