pub mod cache;
pub mod handle;
pub mod mesh;

pub use cache::AssetCache;
pub use handle::Handle;
pub use mesh::{MeshBatch, MeshStore, MAX_MESH_TEXTURES};
