use std::collections::{HashMap, HashSet};

use crate::asset::{MeshBatch, MAX_MESH_TEXTURES};
use crate::renderer::backend::{GpuBackend, TextureId};
use crate::renderer::state::Filtering;

const FALLBACK_COLOR: [u8; 4] = [255, 255, 255, 255];

/// Binds mesh texture slots to texture units.
///
/// Empty slots receive a lazily created opaque white texture, which is also
/// written back into the mesh so later passes find the slot populated.
/// Compression is requested once per texture.
#[derive(Debug)]
pub struct TextureBinder {
    fallback: Option<TextureId>,
    compressed: HashSet<TextureId>,
    named: HashMap<String, TextureId>,
    compression: bool,
}

impl TextureBinder {
    pub fn new(compression: bool) -> Self {
        Self {
            fallback: None,
            compressed: HashSet::new(),
            named: HashMap::new(),
            compression,
        }
    }

    pub fn set_compression(&mut self, enabled: bool) {
        self.compression = enabled;
    }

    /// The white fallback texture, created on first use.
    pub fn fallback<B: GpuBackend>(&mut self, backend: &mut B) -> TextureId {
        *self.fallback.get_or_insert_with(|| {
            log::debug!("Creating white fallback texture");
            backend.create_solid_texture(FALLBACK_COLOR)
        })
    }

    /// Binds `mesh.textures[slot]` on `unit`.
    pub fn bind<B: GpuBackend>(
        &mut self,
        backend: &mut B,
        unit: u32,
        mesh: &mut MeshBatch,
        slot: usize,
        filtering: Filtering,
    ) {
        debug_assert!(slot < MAX_MESH_TEXTURES);
        let texture = match mesh.textures[slot] {
            Some(texture) => texture,
            None => {
                let fallback = self.fallback(backend);
                mesh.textures[slot] = Some(fallback);
                fallback
            }
        };
        self.compress(backend, texture);
        backend.bind_texture(unit, texture, filtering);
    }

    /// Texture loaded by name once and cached. Missing textures resolve to
    /// the fallback.
    pub fn named<B: GpuBackend>(&mut self, backend: &mut B, name: &str) -> TextureId {
        if let Some(texture) = self.named.get(name) {
            return *texture;
        }

        let texture = match backend.load_texture(name) {
            Ok(texture) => texture,
            Err(err) => {
                log::warn!("{}. Using fallback texture.", err);
                self.fallback(backend)
            }
        };
        self.named.insert(name.to_owned(), texture);
        texture
    }

    fn compress<B: GpuBackend>(&mut self, backend: &mut B, texture: TextureId) {
        if !self.compression || Some(texture) == self.fallback {
            return;
        }
        if self.compressed.insert(texture) {
            backend.compress_texture(texture);
        }
    }
}

impl Default for TextureBinder {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::{GpuCommand, RecordingBackend};
    use crate::renderer::VertexLayout;

    fn compress_count(backend: &RecordingBackend) -> usize {
        backend
            .commands()
            .iter()
            .filter(|command| matches!(command, GpuCommand::CompressTexture(_)))
            .count()
    }

    #[test]
    fn empty_slot_gets_fallback_written_back() {
        let mut backend = RecordingBackend::new();
        let mut binder = TextureBinder::default();
        let mut mesh = MeshBatch::new("rock", VertexLayout::Standard, 3);

        binder.bind(&mut backend, 3, &mut mesh, 0, Filtering::Trilinear);
        let fallback = mesh.textures[0].unwrap();

        let mut other = MeshBatch::new("tree", VertexLayout::Standard, 3);
        binder.bind(&mut backend, 3, &mut other, 1, Filtering::Trilinear);

        assert_eq!(other.textures[1], Some(fallback));
        assert_eq!(backend.solid_textures_created(), 1);
    }

    #[test]
    fn compression_is_requested_once_per_texture() {
        let mut backend = RecordingBackend::new();
        let texture = backend.create_solid_texture([1, 2, 3, 4]);
        let mut binder = TextureBinder::new(true);
        let mut mesh = MeshBatch::new("road", VertexLayout::Standard, 6).with_texture(0, texture);

        for _ in 0..3 {
            binder.bind(&mut backend, 0, &mut mesh, 0, Filtering::Trilinear);
        }
        assert_eq!(compress_count(&backend), 1);

        let mut disabled = TextureBinder::new(false);
        backend.clear_log();
        disabled.bind(&mut backend, 0, &mut mesh, 0, Filtering::Trilinear);
        assert_eq!(compress_count(&backend), 0);
    }

    #[test]
    fn missing_named_texture_resolves_to_fallback() {
        let mut backend = RecordingBackend::new();
        backend.mark_missing("displace.png");
        let mut binder = TextureBinder::default();

        let first = binder.named(&mut backend, "displace.png");
        let second = binder.named(&mut backend, "displace.png");

        assert_eq!(first, second);
        assert_eq!(first, binder.fallback(&mut backend));
        assert_eq!(backend.solid_textures_created(), 1);
    }
}
