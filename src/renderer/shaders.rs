//! Program registry.
//!
//! One program per (material class × pass) combination, created through the
//! backend when the renderer starts and shared by reference afterwards.

use crate::renderer::args::UniformKind;
use crate::renderer::backend::{GpuBackend, ProgramId};

use UniformKind::{Float, Mat4, Vec2, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    ObjectPass1,
    ObjectRefPass1,
    GrassPass1,
    NormalMap,
    ObjectPass2,
    ObjectRefPass2,
    SphereMap,
    DetailledObjectPass2,
    GrassPass2,
    ObjectUnlit,
    Splatting,
    Transparent,
    TransparentFog,
    DisplaceMask,
    Displace,
    Shadow,
    RefShadow,
    GrassShadow,
    Rsm,
    PassThrough,
}

/// Texture units of the displacement program.
pub mod displace_units {
    pub const DISPLACEMENT: u32 = 0;
    pub const MASK: u32 = 1;
    pub const COLOR: u32 = 2;
    pub const TEXTURE: u32 = 3;
}

impl ShaderKind {
    pub const COUNT: usize = 20;

    pub const ALL: [ShaderKind; Self::COUNT] = [
        Self::ObjectPass1,
        Self::ObjectRefPass1,
        Self::GrassPass1,
        Self::NormalMap,
        Self::ObjectPass2,
        Self::ObjectRefPass2,
        Self::SphereMap,
        Self::DetailledObjectPass2,
        Self::GrassPass2,
        Self::ObjectUnlit,
        Self::Splatting,
        Self::Transparent,
        Self::TransparentFog,
        Self::DisplaceMask,
        Self::Displace,
        Self::Shadow,
        Self::RefShadow,
        Self::GrassShadow,
        Self::Rsm,
        Self::PassThrough,
    ];

    /// Uniforms the program declares, in binding order.
    pub fn uniforms(self) -> &'static [UniformKind] {
        match self {
            Self::ObjectPass1 | Self::NormalMap => &[Mat4, Mat4],
            Self::ObjectRefPass1 => &[Mat4, Mat4, Mat4],
            Self::GrassPass1 => &[Mat4, Mat4, Vec3],
            Self::ObjectPass2 | Self::ObjectRefPass2 | Self::SphereMap => &[Mat4, Mat4, Vec3],
            Self::DetailledObjectPass2 => &[Mat4, Vec3],
            Self::GrassPass2 => &[Mat4, Vec3, Vec3],
            Self::ObjectUnlit | Self::DisplaceMask | Self::Shadow | Self::RefShadow => &[Mat4],
            Self::Splatting | Self::Transparent | Self::Rsm => &[Mat4, Mat4],
            Self::TransparentFog => &[Mat4, Mat4, Float, Float, Float, Float, Float, Vec3],
            Self::Displace => &[Mat4, Vec2, Vec2],
            Self::GrassShadow => &[Mat4, Vec3],
            Self::PassThrough => &[],
        }
    }

    /// Texture units sampled by the program. Mesh texture slot `j` is bound
    /// to `texture_units()[j]`. Units 0 to 2 of the lit pass carry the light
    /// accumulation inputs, so albedo starts at unit 3 there.
    pub fn texture_units(self) -> &'static [u32] {
        match self {
            Self::ObjectPass1 | Self::ObjectRefPass1 | Self::GrassPass1 => &[0],
            Self::NormalMap => &[0, 1],
            Self::ObjectPass2
            | Self::ObjectRefPass2
            | Self::SphereMap
            | Self::GrassPass2
            | Self::ObjectUnlit => &[3],
            Self::DetailledObjectPass2 => &[3, 4],
            Self::Splatting => &[8, 3, 4, 5, 6, 7],
            Self::Transparent | Self::TransparentFog => &[0],
            Self::DisplaceMask | Self::Shadow => &[],
            Self::Displace => &[
                displace_units::DISPLACEMENT,
                displace_units::MASK,
                displace_units::COLOR,
                displace_units::TEXTURE,
            ],
            Self::RefShadow | Self::GrassShadow | Self::Rsm | Self::PassThrough => &[0],
        }
    }

    /// Lit-pass programs read the light accumulation buffers on units 0 to 2.
    pub fn reads_light_inputs(self) -> bool {
        matches!(
            self,
            Self::ObjectPass2
                | Self::ObjectRefPass2
                | Self::SphereMap
                | Self::DetailledObjectPass2
                | Self::GrassPass2
                | Self::ObjectUnlit
                | Self::Splatting
        )
    }

    /// Every unit the program's texture bind group declares, ascending.
    pub fn sampled_units(self) -> Vec<u32> {
        let mut units: Vec<u32> = if self.reads_light_inputs() {
            (0..3).chain(self.texture_units().iter().copied()).collect()
        } else {
            self.texture_units().to_vec()
        };
        units.sort_unstable();
        units.dedup();
        units
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderProgram {
    id: ProgramId,
    kind: ShaderKind,
}

impl ShaderProgram {
    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn kind(&self) -> ShaderKind {
        self.kind
    }

    pub fn texture_units(&self) -> &'static [u32] {
        self.kind.texture_units()
    }

    pub fn uniforms(&self) -> &'static [UniformKind] {
        self.kind.uniforms()
    }
}

/// Every program, created exactly once.
#[derive(Debug)]
pub struct ShaderRegistry {
    programs: [ShaderProgram; ShaderKind::COUNT],
}

impl ShaderRegistry {
    pub fn new<B: GpuBackend>(backend: &mut B) -> Self {
        let programs = ShaderKind::ALL.map(|kind| ShaderProgram {
            id: backend.create_program(kind),
            kind,
        });
        log::info!("Created {} shader programs", programs.len());
        Self { programs }
    }

    pub fn get(&self, kind: ShaderKind) -> &ShaderProgram {
        &self.programs[kind.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::RecordingBackend;

    #[test]
    fn all_lists_every_kind_in_discriminant_order() {
        for (index, kind) in ShaderKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), index);
        }
    }

    #[test]
    fn registry_creates_each_program_once() {
        let mut backend = RecordingBackend::new();
        let registry = ShaderRegistry::new(&mut backend);

        assert_eq!(backend.programs_created(), ShaderKind::COUNT);
        for kind in ShaderKind::ALL {
            let program = registry.get(kind);
            assert_eq!(program.kind(), kind);
            assert_eq!(backend.program_kind(program.id()), Some(kind));
        }
    }

    #[test]
    fn splatting_samples_six_texture_units() {
        assert_eq!(ShaderKind::Splatting.texture_units().len(), 6);
        assert!(ShaderKind::Shadow.texture_units().is_empty());
    }

    #[test]
    fn lit_programs_also_sample_light_inputs() {
        assert_eq!(ShaderKind::ObjectPass2.sampled_units(), vec![0, 1, 2, 3]);
        assert_eq!(ShaderKind::DetailledObjectPass2.sampled_units(), vec![0, 1, 2, 3, 4]);
        assert_eq!(
            ShaderKind::Splatting.sampled_units(),
            vec![0, 1, 2, 3, 4, 5, 6, 7, 8]
        );
        assert_eq!(ShaderKind::ObjectPass1.sampled_units(), vec![0]);
        assert_eq!(ShaderKind::Displace.sampled_units(), vec![0, 1, 2, 3]);
        assert!(ShaderKind::Shadow.sampled_units().is_empty());
        assert!(!ShaderKind::Transparent.reads_light_inputs());
    }
}
