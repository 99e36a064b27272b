//! [`GpuBackend`] on a real wgpu device.
//!
//! The renderer speaks in immediate mode while wgpu records render passes,
//! so draws are queued against the framebuffer bound when they were issued
//! and replayed as one render pass when the framebuffer changes, when a clear
//! follows queued draws, or when the frame ends. Clears become the load
//! operations of that pass.
//!
//! Pipelines are built on first use and cached per program, swizzle variant,
//! vertex layout, topology, fixed-function state and framebuffer. Uniforms
//! are staged into one ring buffer per frame and addressed with dynamic
//! offsets.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::num::NonZeroU64;
use std::path::PathBuf;

use bytemuck::Pod;
use wgpu::util::DeviceExt;

use super::uniforms::{FrameUniforms, UniformBlock};
use super::wgsl;
use super::{
    DrawCall, FramebufferDesc, FramebufferId, GpuBackend, ProgramId, RenderTextureDesc, TextureId,
};
use crate::error::BackendError;
use crate::renderer::args::UniformValue;
use crate::renderer::shaders::ShaderKind;
use crate::renderer::state::{
    BlendMode, ClearFlags, Filtering, PipelineState, StencilMode, Swizzle,
};
use crate::renderer::VertexLayout;

/// Bytes of uniform data one frame may stage.
const UNIFORM_RING_SIZE: u64 = 4 << 20;

/// Sampler order of [`WgpuBackend::sampler`].
const FILTERINGS: [Filtering; 3] = [Filtering::Nearest, Filtering::Linear, Filtering::Trilinear];

const COLOR_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Index element types accepted by [`WgpuBackend::upload_geometry`].
pub trait IndexType: Pod {
    const FORMAT: wgpu::IndexFormat;
}

impl IndexType for u16 {
    const FORMAT: wgpu::IndexFormat = wgpu::IndexFormat::Uint16;
}

impl IndexType for u32 {
    const FORMAT: wgpu::IndexFormat = wgpu::IndexFormat::Uint32;
}

struct GpuTexture {
    texture: wgpu::Texture,
    format: wgpu::TextureFormat,
    /// One 2D view per array layer; layer 0 doubles as the sampling view.
    layer_views: Vec<wgpu::TextureView>,
    /// Texture state, as with GL texture swizzles.
    swizzle: Swizzle,
}

impl GpuTexture {
    fn new(device: &wgpu::Device, label: &str, desc: &wgpu::TextureDescriptor<'_>) -> Self {
        let texture = device.create_texture(desc);
        let layers = desc.size.depth_or_array_layers.max(1);
        let layer_views = (0..layers)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(label),
                    format: Some(desc.format),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    aspect: wgpu::TextureAspect::All,
                    base_mip_level: 0,
                    mip_level_count: None,
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        Self {
            texture,
            format: desc.format,
            layer_views,
            swizzle: Swizzle::Rgba,
        }
    }

    fn layers(&self) -> u32 {
        self.layer_views.len() as u32
    }

    fn view(&self, layer: u32) -> &wgpu::TextureView {
        let last = self.layer_views.len() - 1;
        &self.layer_views[(layer as usize).min(last)]
    }
}

struct GpuFramebuffer {
    label: &'static str,
    color: Vec<TextureId>,
    depth: Option<TextureId>,
    layers: u32,
}

impl GpuFramebuffer {
    fn attaches(&self, texture: TextureId) -> bool {
        self.depth == Some(texture) || self.color.contains(&texture)
    }
}

struct Geometry {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_format: wgpu::IndexFormat,
}

struct Program {
    kind: ShaderKind,
    block: UniformBlock,
    units: Vec<u32>,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

/// Hashable image of a [`PipelineState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StateKey {
    depth_test: bool,
    depth_write: bool,
    depth_compare: wgpu::CompareFunction,
    blend: Option<BlendMode>,
    cull: Option<wgpu::Face>,
    stencil: StencilMode,
    polygon_offset: Option<u32>,
    color_writes: bool,
}

impl From<&PipelineState> for StateKey {
    fn from(state: &PipelineState) -> Self {
        Self {
            depth_test: state.depth_test,
            depth_write: state.depth_write,
            depth_compare: state.depth_compare,
            blend: state.blend,
            cull: state.cull,
            stencil: state.stencil,
            polygon_offset: state.polygon_offset.map(f32::to_bits),
            color_writes: state.color_writes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    swizzle: Swizzle,
    /// `None` for the buffer-less full-screen triangle.
    layout: Option<VertexLayout>,
    topology: wgpu::PrimitiveTopology,
    strip_index_format: Option<wgpu::IndexFormat>,
    state: StateKey,
    framebuffer: FramebufferId,
}

enum DrawKind {
    Indexed { layout: VertexLayout, call: DrawCall },
    Fullscreen,
}

struct QueuedDraw {
    pipeline: usize,
    program: ProgramId,
    uniform_offset: Option<u32>,
    textures: usize,
    stencil_reference: u32,
    kind: DrawKind,
}

impl QueuedDraw {
    /// Instances drawn into `layer` of a layered framebuffer. Instanced
    /// draws put instance `n` into layer `n`; anything else only reaches
    /// layer 0.
    fn instances(&self, layer: u32) -> Option<std::ops::Range<u32>> {
        match &self.kind {
            DrawKind::Indexed { call, .. } if call.is_instanced() => {
                (layer < call.instance_count).then(|| layer..layer + 1)
            }
            _ => (layer == 0).then_some(0..1),
        }
    }
}

struct QueuedPass {
    framebuffer: FramebufferId,
    color_clear: Option<wgpu::Color>,
    depth_clear: bool,
    stencil_clear: bool,
    draws: Vec<QueuedDraw>,
}

impl QueuedPass {
    fn new(framebuffer: FramebufferId) -> Self {
        Self {
            framebuffer,
            color_clear: None,
            depth_clear: false,
            stencil_clear: false,
            draws: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.draws.is_empty()
            && self.color_clear.is_none()
            && !self.depth_clear
            && !self.stencil_clear
    }
}

fn load<V>(clear: Option<V>) -> wgpu::LoadOp<V> {
    match clear {
        Some(value) => wgpu::LoadOp::Clear(value),
        None => wgpu::LoadOp::Load,
    }
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    texture_root: PathBuf,

    frame_layout: wgpu::BindGroupLayout,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,

    uniform_ring: wgpu::Buffer,
    uniform_alignment: usize,
    uniform_staging: Vec<u8>,
    uniform_uploaded: usize,

    samplers: [wgpu::Sampler; 3],
    white: TextureId,

    programs: Vec<Program>,
    textures: Vec<GpuTexture>,
    framebuffers: Vec<GpuFramebuffer>,
    geometry: HashMap<VertexLayout, Geometry>,
    modules: HashMap<(ShaderKind, Swizzle), wgpu::ShaderModule>,
    pipelines: Vec<wgpu::RenderPipeline>,
    pipeline_index: HashMap<PipelineKey, usize>,
    bind_groups: Vec<wgpu::BindGroup>,
    bind_group_index: HashMap<(ProgramId, Vec<(TextureId, Filtering)>), usize>,
    missing_geometry: HashSet<VertexLayout>,

    framebuffer: Option<FramebufferId>,
    program: Option<ProgramId>,
    layout: Option<VertexLayout>,
    state: PipelineState,
    units: BTreeMap<u32, (TextureId, Filtering)>,
    uniform_offset: Option<u32>,
    pending: Option<QueuedPass>,
}

impl WgpuBackend {
    /// `width` and `height` are the screen size reported to shaders.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        let frame = FrameUniforms::new(width, height);
        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame uniforms"),
            contents: bytemuck::bytes_of(&frame),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<FrameUniforms>() as u64),
                },
                count: None,
            }],
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame bind group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let uniform_ring = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Program uniforms"),
            size: UNIFORM_RING_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment as usize;

        let samplers = FILTERINGS
            .map(|filtering| device.create_sampler(&filtering.sampler_descriptor(Some("Unit"))));

        let mut backend = Self {
            device,
            queue,
            texture_root: PathBuf::from("textures"),
            frame_layout,
            frame_buffer,
            frame_bind_group,
            uniform_ring,
            uniform_alignment,
            uniform_staging: Vec::new(),
            uniform_uploaded: 0,
            samplers,
            white: TextureId(0),
            programs: Vec::new(),
            textures: Vec::new(),
            framebuffers: Vec::new(),
            geometry: HashMap::new(),
            modules: HashMap::new(),
            pipelines: Vec::new(),
            pipeline_index: HashMap::new(),
            bind_groups: Vec::new(),
            bind_group_index: HashMap::new(),
            missing_geometry: HashSet::new(),
            framebuffer: None,
            program: None,
            layout: None,
            state: PipelineState::opaque(),
            units: BTreeMap::new(),
            uniform_offset: None,
            pending: None,
        };
        backend.white = backend.upload_rgba8("Unbound unit", 1, 1, &[255; 4]);
        log::info!("wgpu backend ready ({}x{})", width, height);
        backend
    }

    /// Directory `load_texture` resolves names against.
    pub fn with_texture_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.texture_root = root.into();
        self
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Shared vertex and index buffers of every mesh stored in `layout`.
    /// Replaces whatever was uploaded for that layout before.
    pub fn upload_geometry<V: Pod, I: IndexType>(
        &mut self,
        layout: VertexLayout,
        vertices: &[V],
        indices: &[I],
    ) {
        if std::mem::size_of::<V>() as wgpu::BufferAddress != layout.stride() {
            log::error!(
                "Vertex size {} does not match the {:?} stride {}",
                std::mem::size_of::<V>(),
                layout,
                layout.stride()
            );
            return;
        }

        self.flush();
        let vertices = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh vertices"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh indices"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.geometry.insert(
            layout,
            Geometry {
                vertices,
                indices,
                index_format: I::FORMAT,
            },
        );
        self.missing_geometry.remove(&layout);
    }

    /// Camera, cascades and time for the draws that follow.
    pub fn set_frame_uniforms(&mut self, frame: &FrameUniforms) {
        self.flush();
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(frame));
    }

    pub fn pipelines_built(&self) -> usize {
        self.pipelines.len()
    }

    fn sampler(&self, filtering: Filtering) -> &wgpu::Sampler {
        match filtering {
            Filtering::Nearest => &self.samplers[0],
            Filtering::Linear => &self.samplers[1],
            Filtering::Trilinear => &self.samplers[2],
        }
    }

    fn upload_rgba8(&mut self, label: &str, width: u32, height: u32, data: &[u8]) -> TextureId {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = GpuTexture::new(
            &self.device,
            label,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: COLOR_TEXTURE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
        );
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        self.push_texture(texture)
    }

    fn push_texture(&mut self, texture: GpuTexture) -> TextureId {
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(texture);
        id
    }

    /// Texture sampled on `unit`, or the white placeholder when the unit is
    /// empty or holds something that cannot be sampled while `framebuffer`
    /// is bound.
    fn sampled(&self, unit: u32, framebuffer: &GpuFramebuffer) -> (TextureId, Filtering) {
        let Some(&(texture, filtering)) = self.units.get(&unit) else {
            return (self.white, Filtering::Linear);
        };
        let Some(gpu) = self.textures.get(texture.0 as usize) else {
            log::warn!("Unit {} holds unknown texture {:?}", unit, texture);
            return (self.white, Filtering::Linear);
        };
        if gpu.format.is_depth_stencil_format() || framebuffer.attaches(texture) {
            log::warn!(
                "Texture {:?} on unit {} cannot be sampled into {}",
                texture,
                unit,
                framebuffer.label
            );
            return (self.white, Filtering::Linear);
        }
        (texture, filtering)
    }

    fn texture_bind_group(
        &mut self,
        program: ProgramId,
        framebuffer: FramebufferId,
    ) -> Option<usize> {
        let entry = self.programs.get(program.0 as usize)?;
        let target = self.framebuffers.get(framebuffer.0 as usize)?;
        let bound: Vec<(TextureId, Filtering)> = entry
            .units
            .iter()
            .map(|&unit| self.sampled(unit, target))
            .collect();

        let key = (program, bound);
        if let Some(&index) = self.bind_group_index.get(&key) {
            return Some(index);
        }

        let mut entries = Vec::with_capacity(key.1.len() * 2);
        for (&unit, &(texture, filtering)) in entry.units.iter().zip(&key.1) {
            let view = self.textures[texture.0 as usize].view(0);
            entries.push(wgpu::BindGroupEntry {
                binding: unit * 2,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: unit * 2 + 1,
                resource: wgpu::BindingResource::Sampler(self.sampler(filtering)),
            });
        }
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Texture units"),
            layout: &entry.texture_layout,
            entries: &entries,
        });

        let index = self.bind_groups.len();
        self.bind_groups.push(group);
        self.bind_group_index.insert(key, index);
        Some(index)
    }

    /// Lit programs switch to their light visualisation variant when any
    /// albedo unit holds a texture swizzled that way.
    fn swizzle_for(&self, kind: ShaderKind) -> Swizzle {
        let light_viz = kind
            .texture_units()
            .iter()
            .filter_map(|unit| self.units.get(unit))
            .filter_map(|(texture, _)| self.textures.get(texture.0 as usize))
            .any(|texture| texture.swizzle == Swizzle::LightViz);
        wgsl::variant(kind, Swizzle::for_light_viz(light_viz))
    }

    fn pipeline(&mut self, key: PipelineKey) -> Option<usize> {
        if let Some(&index) = self.pipeline_index.get(&key) {
            return Some(index);
        }

        let program = self.programs.get(key.program.0 as usize)?;
        let kind = program.kind;
        let framebuffer = self.framebuffers.get(key.framebuffer.0 as usize)?;
        let color_formats: Vec<wgpu::TextureFormat> = framebuffer
            .color
            .iter()
            .filter_map(|texture| self.textures.get(texture.0 as usize))
            .map(|texture| texture.format)
            .collect();
        let depth_format = framebuffer
            .depth
            .and_then(|texture| self.textures.get(texture.0 as usize))
            .map(|texture| texture.format);

        let device = &self.device;
        let module: &wgpu::ShaderModule =
            self.modules.entry((kind, key.swizzle)).or_insert_with(|| {
                log::debug!("Compiling {:?} ({:?})", kind, key.swizzle);
                let source = wgsl::program_source(kind, key.swizzle);
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("Program"),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                })
            });

        let state = &self.state;
        let targets: Vec<Option<wgpu::ColorTargetState>> = color_formats
            .iter()
            .map(|&format| Some(state.color_target_state(format)))
            .collect();
        let depth_stencil = depth_format.map(|format| {
            let mut depth = state.depth_stencil_state(format);
            if !format.has_stencil_aspect() {
                depth.stencil = wgpu::StencilState::default();
            }
            depth
        });
        let mut primitive = state.primitive_state(key.topology);
        primitive.strip_index_format = key.strip_index_format;
        let buffers: Vec<wgpu::VertexBufferLayout<'static>> =
            key.layout.map(VertexLayout::buffer_layout).into_iter().collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Program pipeline"),
            layout: Some(&program.pipeline_layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: wgsl::has_fragment_stage(kind).then(|| wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive,
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        log::debug!(
            "Built pipeline {} for {:?} into {}",
            self.pipelines.len(),
            kind,
            framebuffer.label
        );

        let index = self.pipelines.len();
        self.pipelines.push(pipeline);
        self.pipeline_index.insert(key, index);
        Some(index)
    }

    /// Resolves everything a draw needs from the current bindings.
    fn queue_draw(
        &mut self,
        program: ProgramId,
        layout: Option<VertexLayout>,
        topology: wgpu::PrimitiveTopology,
        index_format: Option<wgpu::IndexFormat>,
        kind: DrawKind,
    ) {
        let Some(framebuffer) = self.framebuffer else {
            log::warn!("Draw issued with no framebuffer bound");
            return;
        };
        let Some(entry) = self.programs.get(program.0 as usize) else {
            log::warn!("Draw issued with unknown program {:?}", program);
            return;
        };
        let shader = entry.kind;
        let uniform_offset = if entry.block.is_empty() {
            None
        } else if let Some(offset) = self.uniform_offset {
            Some(offset)
        } else {
            log::warn!("Skipping {:?} draw without uniforms", shader);
            return;
        };

        let key = PipelineKey {
            program,
            swizzle: self.swizzle_for(shader),
            layout,
            topology,
            strip_index_format: index_format.filter(|_| topology.is_strip()),
            state: StateKey::from(&self.state),
            framebuffer,
        };
        let Some(pipeline) = self.pipeline(key) else {
            return;
        };
        let Some(textures) = self.texture_bind_group(program, framebuffer) else {
            return;
        };

        let draw = QueuedDraw {
            pipeline,
            program,
            uniform_offset,
            textures,
            stencil_reference: self.state.stencil.reference().unwrap_or(0),
            kind,
        };
        self.pending
            .get_or_insert_with(|| QueuedPass::new(framebuffer))
            .draws
            .push(draw);
    }

    fn upload_uniforms(&mut self) {
        if self.uniform_staging.len() > self.uniform_uploaded {
            self.queue.write_buffer(
                &self.uniform_ring,
                self.uniform_uploaded as wgpu::BufferAddress,
                &self.uniform_staging[self.uniform_uploaded..],
            );
            self.uniform_uploaded = self.uniform_staging.len();
        }
    }

    /// Submits the queued pass, one render pass per framebuffer layer.
    fn flush(&mut self) {
        let Some(pass) = self.pending.take() else {
            return;
        };
        if pass.is_empty() {
            return;
        }
        self.upload_uniforms();

        let Some(framebuffer) = self.framebuffers.get(pass.framebuffer.0 as usize) else {
            return;
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(framebuffer.label),
            });

        for layer in 0..framebuffer.layers {
            let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = framebuffer
                .color
                .iter()
                .map(|texture| {
                    Some(wgpu::RenderPassColorAttachment {
                        view: self.textures[texture.0 as usize].view(layer),
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: load(pass.color_clear),
                            store: wgpu::StoreOp::Store,
                        },
                    })
                })
                .collect();
            let depth_stencil_attachment = framebuffer.depth.map(|texture| {
                let texture = &self.textures[texture.0 as usize];
                wgpu::RenderPassDepthStencilAttachment {
                    view: texture.view(layer),
                    depth_ops: Some(wgpu::Operations {
                        load: load(pass.depth_clear.then_some(1.0)),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: texture.format.has_stencil_aspect().then(|| wgpu::Operations {
                        load: load(pass.stencil_clear.then_some(0)),
                        store: wgpu::StoreOp::Store,
                    }),
                }
            });

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(framebuffer.label),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_bind_group(0, &self.frame_bind_group, &[]);

            for draw in &pass.draws {
                let Some(instances) = draw.instances(layer) else {
                    continue;
                };
                let program = &self.programs[draw.program.0 as usize];
                render_pass.set_pipeline(&self.pipelines[draw.pipeline]);
                let offsets: &[u32] = match &draw.uniform_offset {
                    Some(offset) => std::slice::from_ref(offset),
                    None => &[],
                };
                render_pass.set_bind_group(1, &program.uniform_bind_group, offsets);
                render_pass.set_bind_group(2, &self.bind_groups[draw.textures], &[]);
                render_pass.set_stencil_reference(draw.stencil_reference);

                match &draw.kind {
                    DrawKind::Indexed { layout, call } => {
                        let Some(geometry) = self.geometry.get(layout) else {
                            continue;
                        };
                        render_pass.set_vertex_buffer(0, geometry.vertices.slice(..));
                        render_pass
                            .set_index_buffer(geometry.indices.slice(..), geometry.index_format);
                        let first = call.first_index();
                        render_pass.draw_indexed(
                            first..first + call.index_count,
                            call.base_vertex,
                            instances,
                        );
                    }
                    DrawKind::Fullscreen => render_pass.draw(0..3, instances),
                }
            }
        }

        self.queue.submit(Some(encoder.finish()));
    }
}

impl GpuBackend for WgpuBackend {
    fn create_program(&mut self, kind: ShaderKind) -> ProgramId {
        let block = UniformBlock::new(kind.uniforms());
        let uniform_entries: Vec<wgpu::BindGroupLayoutEntry> = if block.is_empty() {
            Vec::new()
        } else {
            vec![wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(block.size() as u64),
                },
                count: None,
            }]
        };
        let uniform_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Program uniforms layout"),
                entries: &uniform_entries,
            });
        let uniform_binding: Vec<wgpu::BindGroupEntry> = if block.is_empty() {
            Vec::new()
        } else {
            vec![wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &self.uniform_ring,
                    offset: 0,
                    size: NonZeroU64::new(block.size() as u64),
                }),
            }]
        };
        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Program uniforms"),
            layout: &uniform_layout,
            entries: &uniform_binding,
        });

        let units = kind.sampled_units();
        let texture_entries: Vec<wgpu::BindGroupLayoutEntry> = units
            .iter()
            .flat_map(|&unit| {
                [
                    wgpu::BindGroupLayoutEntry {
                        binding: unit * 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: unit * 2 + 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ]
            })
            .collect();
        let texture_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Texture units layout"),
                entries: &texture_entries,
            });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Program layout"),
                bind_group_layouts: &[&self.frame_layout, &uniform_layout, &texture_layout],
                push_constant_ranges: &[],
            });

        let id = ProgramId(self.programs.len() as u32);
        self.programs.push(Program {
            kind,
            block,
            units,
            uniform_bind_group,
            texture_layout,
            pipeline_layout,
        });
        id
    }

    fn create_render_texture(&mut self, desc: &RenderTextureDesc) -> TextureId {
        let texture = GpuTexture::new(
            &self.device,
            desc.label,
            &wgpu::TextureDescriptor {
                label: Some(desc.label),
                size: desc.extent(),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: desc.format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
        );
        self.push_texture(texture)
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> FramebufferId {
        let layers = desc
            .color
            .iter()
            .chain(desc.depth.as_ref())
            .filter_map(|texture| self.textures.get(texture.0 as usize))
            .map(GpuTexture::layers)
            .max()
            .unwrap_or(1);

        let id = FramebufferId(self.framebuffers.len() as u32);
        self.framebuffers.push(GpuFramebuffer {
            label: desc.label,
            color: desc.color.clone(),
            depth: desc.depth,
            layers,
        });
        id
    }

    fn create_solid_texture(&mut self, color: [u8; 4]) -> TextureId {
        self.upload_rgba8("Solid color", 1, 1, &color)
    }

    fn load_texture(&mut self, name: &str) -> Result<TextureId, BackendError> {
        let path = self.texture_root.join(name);
        if !path.is_file() {
            return Err(BackendError::TextureNotFound(name.to_owned()));
        }

        let image = image::open(&path).map_err(|err| BackendError::TextureDecode {
            name: name.to_owned(),
            reason: err.to_string(),
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::info!("Loaded texture {:?} ({}x{})", path, width, height);
        Ok(self.upload_rgba8(name, width, height, &rgba))
    }

    fn compress_texture(&mut self, texture: TextureId) {
        // wgpu has no runtime block compression; the texture stays RGBA8.
        log::debug!("Texture {:?} left uncompressed", texture);
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.pending.as_ref().map(|pass| pass.framebuffer) != Some(framebuffer) {
            self.flush();
        }
        self.framebuffer = Some(framebuffer);
    }

    fn clear(&mut self, flags: ClearFlags, color: wgpu::Color) {
        let Some(framebuffer) = self.framebuffer else {
            log::warn!("Clear issued with no framebuffer bound");
            return;
        };
        if self.pending.as_ref().is_some_and(|pass| !pass.draws.is_empty()) {
            self.flush();
        }

        let pass = self
            .pending
            .get_or_insert_with(|| QueuedPass::new(framebuffer));
        if flags.contains(ClearFlags::COLOR) {
            pass.color_clear = Some(color);
        }
        pass.depth_clear |= flags.contains(ClearFlags::DEPTH);
        pass.stencil_clear |= flags.contains(ClearFlags::STENCIL);
    }

    fn set_pipeline_state(&mut self, state: &PipelineState) {
        self.state = *state;
    }

    fn use_program(&mut self, program: ProgramId) {
        self.program = Some(program);
    }

    fn bind_vertex_layout(&mut self, layout: VertexLayout) {
        self.layout = Some(layout);
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId, filtering: Filtering) {
        self.units.insert(unit, (texture, filtering));
    }

    fn set_swizzle(&mut self, unit: u32, swizzle: Swizzle) {
        if let Some(&(texture, _)) = self.units.get(&unit) {
            if let Some(texture) = self.textures.get_mut(texture.0 as usize) {
                texture.swizzle = swizzle;
            }
        }
    }

    fn set_uniforms(&mut self, program: ProgramId, values: &[UniformValue]) {
        self.uniform_offset = None;
        let Some(entry) = self.programs.get(program.0 as usize) else {
            return;
        };
        if entry.block.is_empty() {
            return;
        }

        let alignment = self.uniform_alignment;
        let offset = self.uniform_staging.len().div_ceil(alignment) * alignment;
        let end = offset + entry.block.size();
        if end as u64 > UNIFORM_RING_SIZE {
            log::warn!("Uniform ring full, dropping {:?} uniforms", entry.kind);
            return;
        }
        self.uniform_staging.resize(end, 0);
        entry
            .block
            .write(values, &mut self.uniform_staging[offset..end]);
        self.uniform_offset = Some(offset as u32);
    }

    fn draw_indexed(&mut self, call: &DrawCall) {
        let (Some(program), Some(layout)) = (self.program, self.layout) else {
            log::warn!("Draw issued with no program or vertex layout bound");
            return;
        };
        match self.geometry.get(&layout) {
            None => {
                if self.missing_geometry.insert(layout) {
                    log::warn!("No geometry uploaded for {:?}, skipping its draws", layout);
                }
                return;
            }
            Some(geometry) if geometry.index_format != call.index_format => {
                log::warn!(
                    "Draw uses {:?} indices but {:?} geometry is {:?}",
                    call.index_format,
                    layout,
                    geometry.index_format
                );
                return;
            }
            Some(_) => {}
        }

        self.queue_draw(
            program,
            Some(layout),
            call.topology,
            Some(call.index_format),
            DrawKind::Indexed {
                layout,
                call: *call,
            },
        );
    }

    fn draw_fullscreen(&mut self, program: ProgramId, source: TextureId) {
        self.units.insert(0, (source, Filtering::Linear));
        self.queue_draw(
            program,
            None,
            wgpu::PrimitiveTopology::TriangleList,
            None,
            DrawKind::Fullscreen,
        );
    }

    fn end_frame(&mut self) {
        self.flush();
        self.uniform_staging.clear();
        self.uniform_uploaded = 0;
        self.uniform_offset = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_key_distinguishes_polygon_offsets() {
        let plain = PipelineState::opaque();
        let biased = plain.with_polygon_offset(Some(1.5));

        assert_eq!(StateKey::from(&plain), StateKey::from(&PipelineState::opaque()));
        assert_ne!(StateKey::from(&plain), StateKey::from(&biased));
        assert_eq!(
            StateKey::from(&biased).polygon_offset,
            Some(1.5f32.to_bits())
        );
    }

    #[test]
    fn state_key_distinguishes_stencil_references() {
        let write = PipelineState::opaque().with_stencil(StencilMode::Write { reference: 1 });
        let equal = PipelineState::opaque().with_stencil(StencilMode::Equal { reference: 1 });
        assert_ne!(StateKey::from(&write), StateKey::from(&equal));
    }

    fn indexed(instance_count: u32) -> QueuedDraw {
        QueuedDraw {
            pipeline: 0,
            program: ProgramId(0),
            uniform_offset: None,
            textures: 0,
            stencil_reference: 0,
            kind: DrawKind::Indexed {
                layout: VertexLayout::Standard,
                call: DrawCall {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    index_format: wgpu::IndexFormat::Uint16,
                    index_count: 3,
                    offset: 0,
                    base_vertex: 0,
                    instance_count,
                },
            },
        }
    }

    #[test]
    fn instanced_draws_put_one_instance_in_each_layer() {
        let cascades = indexed(4);
        assert_eq!(cascades.instances(0), Some(0..1));
        assert_eq!(cascades.instances(3), Some(3..4));
        assert_eq!(cascades.instances(4), None);

        let single = indexed(1);
        assert_eq!(single.instances(0), Some(0..1));
        assert_eq!(single.instances(1), None);
    }

    #[test]
    fn clears_alone_still_make_a_pass() {
        let mut pass = QueuedPass::new(FramebufferId(0));
        assert!(pass.is_empty());
        pass.stencil_clear = true;
        assert!(!pass.is_empty());
    }

    #[test]
    fn index_types_report_their_format() {
        assert_eq!(<u16 as IndexType>::FORMAT, wgpu::IndexFormat::Uint16);
        assert_eq!(<u32 as IndexType>::FORMAT, wgpu::IndexFormat::Uint32);
    }
}
