use bytemuck::{Pod, Zeroable};
use std::mem;

/// Vertex attribute format of a mesh batch. Each pass binds one layout per
/// material class and skips batches stored in any other layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    Standard,
    /// Second texture coordinate set (detail maps, splatting, displacement).
    TwoTCoords,
    /// Tangent space for normal mapping.
    Tangents,
}

impl VertexLayout {
    pub const ALL: [VertexLayout; 3] = [Self::Standard, Self::TwoTCoords, Self::Tangents];

    pub fn buffer_layout(self) -> wgpu::VertexBufferLayout<'static> {
        match self {
            Self::Standard => StandardVertex::layout(),
            Self::TwoTCoords => TwoTCoordsVertex::layout(),
            Self::Tangents => TangentVertex::layout(),
        }
    }

    pub fn stride(self) -> wgpu::BufferAddress {
        self.buffer_layout().array_stride
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct StandardVertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub color: [u8; 4],
    pub uv: [f32; 2],
}

impl StandardVertex {
    pub const ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Unorm8x4,
        3 => Float32x2
    ];

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<StandardVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct TwoTCoordsVertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub color: [u8; 4],
    pub uv: [f32; 2],
    pub uv2: [f32; 2],
}

impl TwoTCoordsVertex {
    pub const ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Unorm8x4,
        3 => Float32x2,
        4 => Float32x2
    ];

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<TwoTCoordsVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct TangentVertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub color: [u8; 4],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
    pub binormal: [f32; 3],
}

impl TangentVertex {
    pub const ATTRS: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Unorm8x4,
        3 => Float32x2,
        5 => Float32x3,
        6 => Float32x3
    ];

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<TangentVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_stride_matches_struct_size() {
        assert_eq!(
            VertexLayout::Standard.stride(),
            mem::size_of::<StandardVertex>() as wgpu::BufferAddress
        );
        assert_eq!(
            VertexLayout::TwoTCoords.stride(),
            mem::size_of::<TwoTCoordsVertex>() as wgpu::BufferAddress
        );
        assert_eq!(
            VertexLayout::Tangents.stride(),
            mem::size_of::<TangentVertex>() as wgpu::BufferAddress
        );
    }

    #[test]
    fn attributes_fit_inside_stride() {
        for layout in VertexLayout::ALL {
            let buffer = layout.buffer_layout();
            for attr in buffer.attributes {
                assert!(attr.offset + attr.format.size() <= buffer.array_stride);
            }
        }
    }
}
