//! Render targets and framebuffers, created once at startup.

use crate::renderer::backend::{
    FramebufferDesc, FramebufferId, GpuBackend, RenderTextureDesc, TextureId,
};
use crate::renderer::state::DEPTH_STENCIL_FORMAT;
use crate::settings::RenderSettings;

/// Number of shadow cascades rendered per shadow pass.
pub const SHADOW_CASCADES: u32 = 4;

const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Screen-sized render textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rtt {
    NormalAndDepth,
    Tmp1,
    Tmp2,
    /// Half resolution, single channel.
    Half1R,
    Color,
    Displace,
    DepthStencil,
}

impl Rtt {
    pub const ALL: [Rtt; 7] = [
        Self::NormalAndDepth,
        Self::Tmp1,
        Self::Tmp2,
        Self::Half1R,
        Self::Color,
        Self::Displace,
        Self::DepthStencil,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::NormalAndDepth => "Normal and depth",
            Self::Tmp1 => "Tmp1",
            Self::Tmp2 => "Tmp2",
            Self::Half1R => "Half1 R",
            Self::Color => "Color",
            Self::Displace => "Displace",
            Self::DepthStencil => "Depth stencil",
        }
    }

    fn format(self) -> wgpu::TextureFormat {
        match self {
            Self::NormalAndDepth => wgpu::TextureFormat::Rgba16Float,
            Self::Tmp1 | Self::Tmp2 | Self::Color => wgpu::TextureFormat::Rgba16Float,
            Self::Half1R => wgpu::TextureFormat::R16Float,
            Self::Displace => wgpu::TextureFormat::Rgba8Unorm,
            Self::DepthStencil => DEPTH_STENCIL_FORMAT,
        }
    }

    fn divisor(self) -> u32 {
        match self {
            Self::Half1R => 2,
            _ => 1,
        }
    }
}

/// Framebuffers; all share [`Rtt::DepthStencil`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fbo {
    NormalAndDepths,
    Colors,
    Tmp1WithDs,
    Displace,
}

impl Fbo {
    pub const ALL: [Fbo; 4] = [
        Self::NormalAndDepths,
        Self::Colors,
        Self::Tmp1WithDs,
        Self::Displace,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::NormalAndDepths => "Normal and depths",
            Self::Colors => "Colors",
            Self::Tmp1WithDs => "Tmp1 with depth stencil",
            Self::Displace => "Displace",
        }
    }

    fn color_target(self) -> Rtt {
        match self {
            Self::NormalAndDepths => Rtt::NormalAndDepth,
            Self::Colors => Rtt::Color,
            Self::Tmp1WithDs => Rtt::Tmp1,
            Self::Displace => Rtt::Displace,
        }
    }
}

#[derive(Debug)]
pub struct RenderTargetSet {
    textures: [TextureId; Rtt::ALL.len()],
    framebuffers: [FramebufferId; Fbo::ALL.len()],
    shadow_fbo: FramebufferId,
    shadow_depth: TextureId,
    rsm_fbo: FramebufferId,
    rsm_color: TextureId,
    rsm_normal: TextureId,
}

impl RenderTargetSet {
    pub fn new<B: GpuBackend>(backend: &mut B, settings: &RenderSettings) -> Self {
        let width = settings.resolution.width;
        let height = settings.resolution.height;

        let textures = Rtt::ALL.map(|rtt| {
            backend.create_render_texture(&RenderTextureDesc {
                label: rtt.label(),
                width: (width / rtt.divisor()).max(1),
                height: (height / rtt.divisor()).max(1),
                layers: 1,
                format: rtt.format(),
            })
        });
        let depth_stencil = textures[Rtt::DepthStencil as usize];

        let framebuffers = Fbo::ALL.map(|fbo| {
            backend.create_framebuffer(&FramebufferDesc {
                label: fbo.label(),
                color: vec![textures[fbo.color_target() as usize]],
                depth: Some(depth_stencil),
            })
        });

        let shadow_size = settings.shadow_map_size;
        let shadow_depth = backend.create_render_texture(&RenderTextureDesc {
            label: "Shadow cascades",
            width: shadow_size,
            height: shadow_size,
            layers: SHADOW_CASCADES,
            format: SHADOW_FORMAT,
        });
        let shadow_fbo = backend.create_framebuffer(&FramebufferDesc {
            label: "Shadow",
            color: Vec::new(),
            depth: Some(shadow_depth),
        });

        let rsm_size = settings.rsm_size;
        let rsm_desc = |label, format| RenderTextureDesc {
            label,
            width: rsm_size,
            height: rsm_size,
            layers: 1,
            format,
        };
        let rsm_color =
            backend.create_render_texture(&rsm_desc("RSM color", wgpu::TextureFormat::Rgba8Unorm));
        let rsm_normal = backend
            .create_render_texture(&rsm_desc("RSM normal", wgpu::TextureFormat::Rgba16Float));
        let rsm_depth = backend.create_render_texture(&rsm_desc("RSM depth", SHADOW_FORMAT));
        let rsm_fbo = backend.create_framebuffer(&FramebufferDesc {
            label: "RSM",
            color: vec![rsm_color, rsm_normal],
            depth: Some(rsm_depth),
        });

        log::info!(
            "Created render targets at {}x{} (shadow {}, RSM {})",
            width,
            height,
            shadow_size,
            rsm_size
        );

        Self {
            textures,
            framebuffers,
            shadow_fbo,
            shadow_depth,
            rsm_fbo,
            rsm_color,
            rsm_normal,
        }
    }

    pub fn render_target(&self, rtt: Rtt) -> TextureId {
        self.textures[rtt as usize]
    }

    pub fn fbo(&self, fbo: Fbo) -> FramebufferId {
        self.framebuffers[fbo as usize]
    }

    pub fn shadow_fbo(&self) -> FramebufferId {
        self.shadow_fbo
    }

    pub fn shadow_depth(&self) -> TextureId {
        self.shadow_depth
    }

    pub fn rsm_fbo(&self) -> FramebufferId {
        self.rsm_fbo
    }

    pub fn rsm_color(&self) -> TextureId {
        self.rsm_color
    }

    pub fn rsm_normal(&self) -> TextureId {
        self.rsm_normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::RecordingBackend;
    use crate::settings::Resolution;

    fn settings() -> RenderSettings {
        RenderSettings {
            resolution: Resolution {
                width: 640,
                height: 480,
            },
            shadow_map_size: 1024,
            rsm_size: 256,
            ..RenderSettings::default()
        }
    }

    #[test]
    fn screen_framebuffers_share_depth_stencil() {
        let mut backend = RecordingBackend::new();
        let targets = RenderTargetSet::new(&mut backend, &settings());
        let depth = targets.render_target(Rtt::DepthStencil);

        for fbo in Fbo::ALL {
            let desc = backend.framebuffer(targets.fbo(fbo)).unwrap();
            assert_eq!(desc.depth, Some(depth));
            assert_eq!(desc.color, vec![targets.render_target(fbo.color_target())]);
        }
    }

    #[test]
    fn half_resolution_target_is_halved() {
        let mut backend = RecordingBackend::new();
        let targets = RenderTargetSet::new(&mut backend, &settings());
        let half = backend
            .render_texture(targets.render_target(Rtt::Half1R))
            .unwrap();

        assert_eq!((half.width, half.height), (320, 240));
        assert_eq!(half.format, wgpu::TextureFormat::R16Float);
    }

    #[test]
    fn shadow_target_has_one_layer_per_cascade() {
        let mut backend = RecordingBackend::new();
        let targets = RenderTargetSet::new(&mut backend, &settings());
        let shadow = backend.render_texture(targets.shadow_depth()).unwrap();

        assert_eq!(shadow.layers, SHADOW_CASCADES);
        assert_eq!(shadow.extent().depth_or_array_layers, 4);
        assert_eq!(shadow.width, 1024);

        let rsm = backend.framebuffer(targets.rsm_fbo()).unwrap();
        assert_eq!(rsm.color, vec![targets.rsm_color(), targets.rsm_normal()]);
    }
}
