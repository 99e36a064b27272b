//! Global GPU state applied at the start of each pass.
//!
//! A pass describes its fixed-function configuration as a [`PipelineState`]
//! value instead of toggling individual switches. The value maps one-to-one
//! onto the wgpu descriptors a pipeline cache would be keyed on.

use bitflags::bitflags;

pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

bitflags! {
    /// Buffers cleared by [`GpuBackend::clear`](super::backend::GpuBackend::clear).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Blend function used with the add equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// `SRC_ALPHA, ONE_MINUS_SRC_ALPHA`
    Alpha,
    /// `ONE, ONE`
    Additive,
}

impl BlendMode {
    pub fn to_wgpu(self) -> wgpu::BlendState {
        match self {
            Self::Alpha => wgpu::BlendState::ALPHA_BLENDING,
            Self::Additive => {
                let component = wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                };
                wgpu::BlendState {
                    color: component,
                    alpha: component,
                }
            }
        }
    }
}

/// Stencil usage of the displacement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilMode {
    Disabled,
    /// `ALWAYS reference`, `REPLACE` on pass: marks covered pixels.
    Write { reference: u32 },
    /// `EQUAL reference`, `KEEP`: restricts drawing to marked pixels.
    Equal { reference: u32 },
}

impl StencilMode {
    pub fn reference(self) -> Option<u32> {
        match self {
            Self::Disabled => None,
            Self::Write { reference } | Self::Equal { reference } => Some(reference),
        }
    }

    pub fn to_wgpu(self) -> wgpu::StencilState {
        let face = match self {
            Self::Disabled => return wgpu::StencilState::default(),
            Self::Write { .. } => wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Always,
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: wgpu::StencilOperation::Replace,
            },
            Self::Equal { .. } => wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Equal,
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: wgpu::StencilOperation::Keep,
            },
        };
        wgpu::StencilState {
            front: face,
            back: face,
            read_mask: 0xFF,
            write_mask: 0xFF,
        }
    }
}

/// Fixed-function state for one pass (or one phase of a pass).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub blend: Option<BlendMode>,
    pub cull: Option<wgpu::Face>,
    pub stencil: StencilMode,
    /// Slope-scaled polygon offset factor, `None` when disabled.
    pub polygon_offset: Option<f32>,
    pub color_writes: bool,
}

impl PipelineState {
    /// Depth tested and written with `LessEqual`, no blending, back faces
    /// culled.
    pub const fn opaque() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            blend: None,
            cull: Some(wgpu::Face::Back),
            stencil: StencilMode::Disabled,
            polygon_offset: None,
            color_writes: true,
        }
    }

    pub const fn with_depth_write(mut self, depth_write: bool) -> Self {
        self.depth_write = depth_write;
        self
    }

    pub const fn with_blend(mut self, blend: Option<BlendMode>) -> Self {
        self.blend = blend;
        self
    }

    pub const fn with_cull(mut self, cull: Option<wgpu::Face>) -> Self {
        self.cull = cull;
        self
    }

    pub const fn with_stencil(mut self, stencil: StencilMode) -> Self {
        self.stencil = stencil;
        self
    }

    pub const fn with_polygon_offset(mut self, factor: Option<f32>) -> Self {
        self.polygon_offset = factor;
        self
    }

    pub const fn with_color_writes(mut self, color_writes: bool) -> Self {
        self.color_writes = color_writes;
        self
    }

    pub fn depth_stencil_state(&self, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
        // A disabled depth test also disables depth writes.
        let (depth_compare, depth_write_enabled) = if self.depth_test {
            (self.depth_compare, self.depth_write)
        } else {
            (wgpu::CompareFunction::Always, false)
        };

        wgpu::DepthStencilState {
            format,
            depth_write_enabled,
            depth_compare,
            stencil: self.stencil.to_wgpu(),
            bias: wgpu::DepthBiasState {
                constant: 0,
                slope_scale: self.polygon_offset.unwrap_or(0.0),
                clamp: 0.0,
            },
        }
    }

    pub fn blend_state(&self) -> Option<wgpu::BlendState> {
        self.blend.map(BlendMode::to_wgpu)
    }

    pub fn color_write_mask(&self) -> wgpu::ColorWrites {
        if self.color_writes {
            wgpu::ColorWrites::ALL
        } else {
            wgpu::ColorWrites::empty()
        }
    }

    pub fn color_target_state(&self, format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
        wgpu::ColorTargetState {
            format,
            blend: self.blend_state(),
            write_mask: self.color_write_mask(),
        }
    }

    pub fn primitive_state(&self, topology: wgpu::PrimitiveTopology) -> wgpu::PrimitiveState {
        wgpu::PrimitiveState {
            topology,
            cull_mode: self.cull,
            front_face: wgpu::FrontFace::Ccw,
            ..Default::default()
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::opaque()
    }
}

/// Texture filtering requested when binding a texture unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filtering {
    Nearest,
    Linear,
    /// Linear magnification, linear-mipmap-linear minification.
    Trilinear,
}

impl Filtering {
    pub fn sampler_descriptor<'a>(self, label: Option<&'a str>) -> wgpu::SamplerDescriptor<'a> {
        let (filter, mipmap_filter) = match self {
            Self::Nearest => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest),
            Self::Linear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Nearest),
            Self::Trilinear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Linear),
        };
        let address_mode = match self {
            Self::Trilinear => wgpu::AddressMode::Repeat,
            Self::Nearest | Self::Linear => wgpu::AddressMode::ClampToEdge,
        };

        wgpu::SamplerDescriptor {
            label,
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter,
            ..Default::default()
        }
    }
}

/// Channel source of a texture swizzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwizzleSource {
    Red,
    Green,
    Blue,
    Alpha,
    One,
}

/// Swizzle applied to albedo textures in the lit pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Swizzle {
    Rgba,
    /// White albedo keeping the texture alpha, so only lighting is visible.
    LightViz,
}

impl Swizzle {
    pub fn for_light_viz(enabled: bool) -> Self {
        if enabled {
            Self::LightViz
        } else {
            Self::Rgba
        }
    }

    pub fn mask(self) -> [SwizzleSource; 4] {
        match self {
            Self::Rgba => [
                SwizzleSource::Red,
                SwizzleSource::Green,
                SwizzleSource::Blue,
                SwizzleSource::Alpha,
            ],
            Self::LightViz => [
                SwizzleSource::One,
                SwizzleSource::One,
                SwizzleSource::One,
                SwizzleSource::Alpha,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_state_maps_to_less_equal_depth_writes() {
        let state = PipelineState::opaque().depth_stencil_state(DEPTH_STENCIL_FORMAT);

        assert!(state.depth_write_enabled);
        assert_eq!(state.depth_compare, wgpu::CompareFunction::LessEqual);
        assert_eq!(state.stencil, wgpu::StencilState::default());
        assert_eq!(state.bias.slope_scale, 0.0);
    }

    #[test]
    fn disabled_depth_test_never_writes_depth() {
        let mut state = PipelineState::opaque();
        state.depth_test = false;

        let wgpu_state = state.depth_stencil_state(DEPTH_STENCIL_FORMAT);
        assert!(!wgpu_state.depth_write_enabled);
        assert_eq!(wgpu_state.depth_compare, wgpu::CompareFunction::Always);
    }

    #[test]
    fn blend_modes_use_add_equation() {
        let alpha = BlendMode::Alpha.to_wgpu();
        assert_eq!(alpha.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(alpha.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
        assert_eq!(alpha.color.operation, wgpu::BlendOperation::Add);

        let additive = BlendMode::Additive.to_wgpu();
        assert_eq!(additive.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(additive.color.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(additive.alpha.operation, wgpu::BlendOperation::Add);
    }

    #[test]
    fn polygon_offset_becomes_slope_bias() {
        let state = PipelineState::opaque()
            .with_polygon_offset(Some(1.5))
            .with_color_writes(false);

        let depth = state.depth_stencil_state(wgpu::TextureFormat::Depth32Float);
        assert_eq!(depth.bias.slope_scale, 1.5);
        assert_eq!(depth.bias.constant, 0);
        assert_eq!(state.color_write_mask(), wgpu::ColorWrites::empty());
    }

    #[test]
    fn stencil_modes_map_to_replace_and_equal() {
        let write = StencilMode::Write { reference: 1 }.to_wgpu();
        assert_eq!(write.front.compare, wgpu::CompareFunction::Always);
        assert_eq!(write.front.pass_op, wgpu::StencilOperation::Replace);
        assert_eq!(write.write_mask, 0xFF);

        let equal = StencilMode::Equal { reference: 1 }.to_wgpu();
        assert_eq!(equal.back.compare, wgpu::CompareFunction::Equal);
        assert_eq!(equal.back.pass_op, wgpu::StencilOperation::Keep);
        assert_eq!(StencilMode::Equal { reference: 1 }.reference(), Some(1));
        assert_eq!(StencilMode::Disabled.reference(), None);
    }

    #[test]
    fn culling_is_carried_into_primitive_state() {
        let culled = PipelineState::opaque().primitive_state(wgpu::PrimitiveTopology::TriangleList);
        assert_eq!(culled.cull_mode, Some(wgpu::Face::Back));

        let unculled = PipelineState::opaque()
            .with_cull(None)
            .primitive_state(wgpu::PrimitiveTopology::TriangleStrip);
        assert_eq!(unculled.cull_mode, None);
        assert_eq!(unculled.topology, wgpu::PrimitiveTopology::TriangleStrip);
    }

    #[test]
    fn trilinear_filtering_uses_linear_mipmaps() {
        let desc = Filtering::Trilinear.sampler_descriptor(Some("albedo"));
        assert_eq!(desc.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(desc.mipmap_filter, wgpu::FilterMode::Linear);

        let nearest = Filtering::Nearest.sampler_descriptor(None);
        assert_eq!(nearest.mag_filter, wgpu::FilterMode::Nearest);
    }

    #[test]
    fn light_viz_swizzle_keeps_alpha() {
        assert_eq!(Swizzle::for_light_viz(true).mask()[0], SwizzleSource::One);
        assert_eq!(Swizzle::for_light_viz(true).mask()[3], SwizzleSource::Alpha);
        assert_eq!(Swizzle::for_light_viz(false), Swizzle::Rgba);
    }
}
