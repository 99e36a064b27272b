//! Byte layout of program uniforms as WGSL lays out a `var<uniform>` struct.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::renderer::args::{UniformKind, UniformValue};
use crate::renderer::targets::SHADOW_CASCADES;

fn align_to(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

fn align_and_size(kind: UniformKind) -> (usize, usize) {
    match kind {
        UniformKind::Mat4 => (16, 64),
        UniformKind::Vec3 => (16, 12),
        UniformKind::Vec2 => (8, 8),
        UniformKind::Float => (4, 4),
    }
}

/// Field offsets of one program's uniform struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    offsets: Vec<usize>,
    size: usize,
}

impl UniformBlock {
    pub fn new(kinds: &[UniformKind]) -> Self {
        let mut offsets = Vec::with_capacity(kinds.len());
        let mut cursor = 0;
        for &kind in kinds {
            let (align, size) = align_and_size(kind);
            cursor = align_to(cursor, align);
            offsets.push(cursor);
            cursor += size;
        }

        Self {
            offsets,
            size: align_to(cursor, 16),
        }
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Struct size rounded up to 16 bytes, zero for programs without
    /// uniforms.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Writes `values` into `out`, which must be [`size`](Self::size) bytes.
    /// Surplus values are ignored; padding is left untouched.
    pub fn write(&self, values: &[UniformValue], out: &mut [u8]) {
        for (&offset, value) in self.offsets.iter().zip(values) {
            match value {
                UniformValue::Mat4(m) => put(out, offset, &m.to_cols_array()),
                UniformValue::Vec3(v) => put(out, offset, &v.to_array()),
                UniformValue::Vec2(v) => put(out, offset, &v.to_array()),
                UniformValue::Float(f) => put(out, offset, &[*f]),
            }
        }
    }
}

fn put(out: &mut [u8], offset: usize, floats: &[f32]) {
    let bytes: &[u8] = bytemuck::cast_slice(floats);
    if let Some(slot) = out.get_mut(offset..offset + bytes.len()) {
        slot.copy_from_slice(bytes);
    }
}

/// Bind group 0 of every program.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    /// Light-space matrix of each shadow cascade.
    pub cascades: [[[f32; 4]; 4]; SHADOW_CASCADES as usize],
    pub screen_size: [f32; 2],
    pub time: f32,
    _pad: f32,
}

impl FrameUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        let identity = Mat4::IDENTITY.to_cols_array_2d();
        Self {
            view_proj: identity,
            view: identity,
            cascades: [identity; SHADOW_CASCADES as usize],
            screen_size: [width.max(1) as f32, height.max(1) as f32],
            time: 0.0,
            _pad: 0.0,
        }
    }

    pub fn with_camera(mut self, view: Mat4, projection: Mat4) -> Self {
        self.view = view.to_cols_array_2d();
        self.view_proj = (projection * view).to_cols_array_2d();
        self
    }

    pub fn with_cascades(mut self, cascades: [Mat4; SHADOW_CASCADES as usize]) -> Self {
        self.cascades = cascades.map(|cascade| cascade.to_cols_array_2d());
        self
    }

    pub fn with_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::shaders::ShaderKind;
    use glam::Vec3;

    #[test]
    fn fog_uniforms_follow_wgsl_alignment() {
        let block = UniformBlock::new(ShaderKind::TransparentFog.uniforms());
        assert_eq!(block.offsets(), &[0, 64, 128, 132, 136, 140, 144, 160]);
        assert_eq!(block.size(), 176);
    }

    #[test]
    fn vec3_members_start_on_16_bytes() {
        let grass = UniformBlock::new(ShaderKind::GrassPass2.uniforms());
        assert_eq!(grass.offsets(), &[0, 64, 80]);
        assert_eq!(grass.size(), 96);

        let displace = UniformBlock::new(ShaderKind::Displace.uniforms());
        assert_eq!(displace.offsets(), &[0, 64, 72]);
        assert_eq!(displace.size(), 80);

        assert!(UniformBlock::new(ShaderKind::PassThrough.uniforms()).is_empty());
    }

    #[test]
    fn written_values_land_at_their_offsets() {
        let block = UniformBlock::new(ShaderKind::GrassShadow.uniforms());
        let mut out = vec![0u8; block.size()];
        block.write(
            &[Mat4::from_scale(Vec3::splat(2.0)).into(), Vec3::new(1.0, 2.0, 3.0).into()],
            &mut out,
        );

        let floats: &[f32] = bytemuck::cast_slice(&out);
        assert_eq!(floats[0], 2.0);
        assert_eq!(floats[15], 1.0);
        assert_eq!(&floats[16..19], &[1.0, 2.0, 3.0]);
        assert_eq!(floats[19], 0.0);
    }

    #[test]
    fn frame_uniforms_match_the_wgsl_struct() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 400);
        assert_eq!(FrameUniforms::new(0, 720).screen_size, [1.0, 720.0]);
    }
}
