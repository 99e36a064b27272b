//! Draw argument tuples and the field selections that feed shader uniforms.
//!
//! Every material class stores a fixed-shape record per visible batch. Field
//! 0 is always the mesh; the remaining fields are uniform values. A pass
//! picks which fields reach its program, and in which order, with a
//! [`Selection`] built in a `const` item so that an out-of-range field index
//! is a compile error rather than a runtime check.

use std::marker::PhantomData;

use glam::{Mat4, Vec2, Vec3};

use crate::asset::{Handle, MeshBatch};
use crate::environment::FogParams;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Vec3(Vec3),
    Vec2(Vec2),
    Float(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Mat4,
    Vec3,
    Vec2,
    Float,
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            Self::Mat4(_) => UniformKind::Mat4,
            Self::Vec3(_) => UniformKind::Vec3,
            Self::Vec2(_) => UniformKind::Vec2,
            Self::Float(_) => UniformKind::Float,
        }
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        Self::Mat4(value)
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        Self::Vec3(value)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        Self::Vec2(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

/// A fixed-arity draw argument tuple.
pub trait DrawArgs {
    /// Number of fields including the mesh at index 0.
    const ARITY: usize;

    fn mesh(&self) -> Handle<MeshBatch>;

    /// Uniform value stored at `index`, `1 <= index < ARITY`.
    fn field(&self, index: usize) -> UniformValue;
}

/// Ordered list of tuple fields presented to a program as its uniforms.
pub struct Selection<A> {
    fields: &'static [usize],
    _marker: PhantomData<fn(&A)>,
}

impl<A: DrawArgs> Selection<A> {
    /// Evaluated at compile time when bound to a `const`.
    pub const fn new(fields: &'static [usize]) -> Self {
        let mut i = 0;
        while i < fields.len() {
            assert!(
                fields[i] > 0 && fields[i] < A::ARITY,
                "selected field is the mesh or outside the tuple"
            );
            i += 1;
        }
        Self {
            fields,
            _marker: PhantomData,
        }
    }

    pub fn fields(&self) -> &'static [usize] {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn values<'a>(&self, args: &'a A) -> impl Iterator<Item = UniformValue> + 'a {
        let fields = self.fields;
        fields.iter().map(move |&index| args.field(index))
    }
}

impl<A> Clone for Selection<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for Selection<A> {}

impl<A> std::fmt::Debug for Selection<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Selection").field(&self.fields).finish()
    }
}

fn inverse_or_identity(model: Mat4) -> Mat4 {
    if model.determinant().abs() <= f32::EPSILON {
        Mat4::IDENTITY
    } else {
        model.inverse()
    }
}

/// Shape shared by the solid classes other than grass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolidArgs {
    pub mesh: Handle<MeshBatch>,
    pub model: Mat4,
    pub inverse_model: Mat4,
    pub texture_matrix: Mat4,
    pub ambient: Vec3,
}

impl SolidArgs {
    pub fn new(mesh: Handle<MeshBatch>, model: Mat4) -> Self {
        Self {
            mesh,
            model,
            inverse_model: inverse_or_identity(model),
            texture_matrix: Mat4::IDENTITY,
            ambient: Vec3::ZERO,
        }
    }

    pub fn with_texture_matrix(mut self, texture_matrix: Mat4) -> Self {
        self.texture_matrix = texture_matrix;
        self
    }

    pub fn with_ambient(mut self, ambient: Vec3) -> Self {
        self.ambient = ambient;
        self
    }
}

impl DrawArgs for SolidArgs {
    const ARITY: usize = 5;

    fn mesh(&self) -> Handle<MeshBatch> {
        self.mesh
    }

    fn field(&self, index: usize) -> UniformValue {
        match index {
            1 => self.model.into(),
            2 => self.inverse_model.into(),
            3 => self.texture_matrix.into(),
            4 => self.ambient.into(),
            _ => unreachable!("SolidArgs has no uniform field {index}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrassArgs {
    pub mesh: Handle<MeshBatch>,
    pub model: Mat4,
    pub inverse_model: Mat4,
    pub wind: Vec3,
    pub ambient: Vec3,
}

impl GrassArgs {
    pub fn new(mesh: Handle<MeshBatch>, model: Mat4, wind: Vec3) -> Self {
        Self {
            mesh,
            model,
            inverse_model: inverse_or_identity(model),
            wind,
            ambient: Vec3::ZERO,
        }
    }

    pub fn with_ambient(mut self, ambient: Vec3) -> Self {
        self.ambient = ambient;
        self
    }
}

impl DrawArgs for GrassArgs {
    const ARITY: usize = 5;

    fn mesh(&self) -> Handle<MeshBatch> {
        self.mesh
    }

    fn field(&self, index: usize) -> UniformValue {
        match index {
            1 => self.model.into(),
            2 => self.inverse_model.into(),
            3 => self.wind.into(),
            4 => self.ambient.into(),
            _ => unreachable!("GrassArgs has no uniform field {index}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransparentArgs {
    pub mesh: Handle<MeshBatch>,
    pub model: Mat4,
    pub texture_matrix: Mat4,
}

impl TransparentArgs {
    pub fn new(mesh: Handle<MeshBatch>, model: Mat4) -> Self {
        Self {
            mesh,
            model,
            texture_matrix: Mat4::IDENTITY,
        }
    }

    pub fn with_texture_matrix(mut self, texture_matrix: Mat4) -> Self {
        self.texture_matrix = texture_matrix;
        self
    }
}

impl DrawArgs for TransparentArgs {
    const ARITY: usize = 3;

    fn mesh(&self) -> Handle<MeshBatch> {
        self.mesh
    }

    fn field(&self, index: usize) -> UniformValue {
        match index {
            1 => self.model.into(),
            2 => self.texture_matrix.into(),
            _ => unreachable!("TransparentArgs has no uniform field {index}"),
        }
    }
}

/// Transparent tuple with the world's fog parameters unpacked into fields
/// 3 to 8.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogArgs {
    pub mesh: Handle<MeshBatch>,
    pub model: Mat4,
    pub texture_matrix: Mat4,
    pub fog: FogParams,
}

impl FogArgs {
    pub fn new(mesh: Handle<MeshBatch>, model: Mat4, fog: FogParams) -> Self {
        Self {
            mesh,
            model,
            texture_matrix: Mat4::IDENTITY,
            fog,
        }
    }

    pub fn with_texture_matrix(mut self, texture_matrix: Mat4) -> Self {
        self.texture_matrix = texture_matrix;
        self
    }
}

impl DrawArgs for FogArgs {
    const ARITY: usize = 9;

    fn mesh(&self) -> Handle<MeshBatch> {
        self.mesh
    }

    fn field(&self, index: usize) -> UniformValue {
        match index {
            1 => self.model.into(),
            2 => self.texture_matrix.into(),
            3 => self.fog.max_density.into(),
            4 => self.fog.start_height.into(),
            5 => self.fog.end_height.into(),
            6 => self.fog.start.into(),
            7 => self.fog.end.into(),
            8 => self.fog.color.into(),
            _ => unreachable!("FogArgs has no uniform field {index}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaceArgs {
    pub mesh: Handle<MeshBatch>,
    pub model: Mat4,
}

impl DisplaceArgs {
    pub fn new(mesh: Handle<MeshBatch>, model: Mat4) -> Self {
        Self { mesh, model }
    }
}

impl DrawArgs for DisplaceArgs {
    const ARITY: usize = 2;

    fn mesh(&self) -> Handle<MeshBatch> {
        self.mesh
    }

    fn field(&self, index: usize) -> UniformValue {
        match index {
            1 => self.model.into(),
            _ => unreachable!("DisplaceArgs has no uniform field {index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REVERSED: Selection<SolidArgs> = Selection::new(&[4, 3, 1]);
    const FOG_ALL: Selection<FogArgs> = Selection::new(&[1, 2, 3, 4, 5, 6, 7, 8]);

    fn solid() -> SolidArgs {
        SolidArgs::new(Handle::new(0), Mat4::from_translation(Vec3::X))
            .with_texture_matrix(Mat4::from_scale(Vec3::splat(2.0)))
            .with_ambient(Vec3::new(0.1, 0.2, 0.3))
    }

    #[test]
    fn values_follow_selection_order_not_tuple_order() {
        let args = solid();
        let values: Vec<_> = REVERSED.values(&args).collect();

        assert_eq!(
            values,
            vec![
                UniformValue::Vec3(Vec3::new(0.1, 0.2, 0.3)),
                UniformValue::Mat4(Mat4::from_scale(Vec3::splat(2.0))),
                UniformValue::Mat4(Mat4::from_translation(Vec3::X)),
            ]
        );
    }

    #[test]
    fn subset_selection_skips_unselected_fields() {
        const MODEL_ONLY: Selection<SolidArgs> = Selection::new(&[1]);
        let values: Vec<_> = MODEL_ONLY.values(&solid()).collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].kind(), UniformKind::Mat4);
    }

    #[test]
    fn fog_tuple_unpacks_every_parameter() {
        let fog = FogParams {
            max_density: 0.5,
            start_height: 1.0,
            end_height: 2.0,
            start: 3.0,
            end: 4.0,
            color: Vec3::ONE,
        };
        let args = FogArgs::new(Handle::new(1), Mat4::IDENTITY, fog);
        let kinds: Vec<_> = FOG_ALL.values(&args).map(|value| value.kind()).collect();

        assert_eq!(FOG_ALL.len(), 8);
        assert_eq!(kinds[..2], [UniformKind::Mat4, UniformKind::Mat4]);
        assert!(kinds[2..7].iter().all(|kind| *kind == UniformKind::Float));
        assert_eq!(kinds[7], UniformKind::Vec3);
    }

    #[test]
    fn singular_model_keeps_identity_inverse() {
        let args = SolidArgs::new(Handle::new(0), Mat4::ZERO);
        assert_eq!(args.inverse_model, Mat4::IDENTITY);

        let scaled = SolidArgs::new(Handle::new(0), Mat4::from_scale(Vec3::splat(4.0)));
        assert!(scaled
            .inverse_model
            .abs_diff_eq(Mat4::from_scale(Vec3::splat(0.25)), 1e-6));
    }
}
