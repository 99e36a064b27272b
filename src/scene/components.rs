// scene/components.rs
// Pure hecs components

use glam::Mat4;

use crate::asset::{Handle, MeshBatch};
use crate::renderer::{SolidClass, TransparentBlend};

/// How a surface is batched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceMaterial {
    Solid(SolidClass),
    Grass,
    Transparent(TransparentBlend),
    Displacement,
}

/// Mesh component
#[derive(Debug, Clone, Copy)]
pub struct Renderable {
    pub mesh: Handle<MeshBatch>,
    pub material: SurfaceMaterial,
}

/// World placement of a mesh.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub model: Mat4,
    pub texture_matrix: Mat4,
}

impl Placement {
    pub fn new(model: Mat4) -> Self {
        Self {
            model,
            texture_matrix: Mat4::IDENTITY,
        }
    }

    pub fn with_texture_matrix(mut self, texture_matrix: Mat4) -> Self {
        self.texture_matrix = texture_matrix;
        self
    }
}

/// Visibility component
#[derive(Debug, Clone, Copy)]
pub struct Visible(pub bool);

impl Default for Visible {
    fn default() -> Self {
        Self(true)
    }
}

/// Marker for rain, snow and similar nodes, hidden when weather effects are
/// disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherEffect;
