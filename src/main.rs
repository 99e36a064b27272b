use glam::{Mat4, Vec3};
use render_geometry::asset::{MeshBatch, MeshStore};
use render_geometry::renderer::backend::GpuCommand;
use render_geometry::renderer::vertex::{StandardVertex, TangentVertex, TwoTCoordsVertex};
use render_geometry::renderer::{
    FrameParams, FrameUniforms, GpuBackend, RecordingBackend, Renderer, RendererStats,
    SolidClass, TransparentBlend, VertexLayout, WgpuBackend, SHADOW_CASCADES,
};
use render_geometry::scene::{EntityScene, Placement, SurfaceMaterial};
use render_geometry::{init_logging, FogParams, RenderSettings, WorldEnvironment};

const FRAMES: u32 = 3;
const FRAME_TIME: f32 = 1.0 / 60.0;

/// A small track: ground, props, some grass, a windscreen, rain and a
/// heat haze.
fn build_scene<B: GpuBackend>(backend: &mut B, meshes: &mut MeshStore) -> EntityScene {
    let mut scene = EntityScene::new();

    let asphalt = backend.create_solid_texture([60, 60, 60, 255]);
    let ground = meshes.insert(
        MeshBatch::new("track", VertexLayout::TwoTCoords, 6000).with_texture(0, asphalt),
    );
    let barrel =
        meshes.insert(MeshBatch::new("barrel", VertexLayout::Standard, 360).with_range(12_000, 0));
    let sign = meshes
        .insert(MeshBatch::new("sign", VertexLayout::Tangents, 36).with_range(12_720, 1200));
    let tuft = meshes.insert(MeshBatch::new("grass tuft", VertexLayout::Standard, 24));
    let glass = meshes.insert(MeshBatch::new("windscreen", VertexLayout::Standard, 12));
    let rain = meshes.insert(MeshBatch::new("rain", VertexLayout::Standard, 600));
    let haze = meshes.insert(MeshBatch::new("heat haze", VertexLayout::TwoTCoords, 6));

    scene.spawn(
        ground,
        SurfaceMaterial::Solid(SolidClass::Details),
        Placement::new(Mat4::IDENTITY),
    );
    for i in 0..4 {
        let offset = Vec3::new(i as f32 * 3.0, 0.0, 8.0);
        scene.spawn(
            barrel,
            SurfaceMaterial::Solid(SolidClass::Default),
            Placement::new(Mat4::from_translation(offset)),
        );
    }
    scene.spawn(
        sign,
        SurfaceMaterial::Solid(SolidClass::NormalMap),
        Placement::new(Mat4::from_translation(Vec3::new(-4.0, 2.0, 0.0))),
    );
    for i in 0..8 {
        let offset = Vec3::new(-10.0 + i as f32, 0.0, -3.0);
        scene.spawn(
            tuft,
            SurfaceMaterial::Grass,
            Placement::new(Mat4::from_translation(offset)),
        );
    }
    scene.spawn(
        glass,
        SurfaceMaterial::Transparent(TransparentBlend::Blend),
        Placement::new(Mat4::from_translation(Vec3::Y)),
    );
    scene.spawn_weather(
        rain,
        SurfaceMaterial::Transparent(TransparentBlend::Additive),
        Placement::new(Mat4::IDENTITY),
    );
    scene.spawn(
        haze,
        SurfaceMaterial::Displacement,
        Placement::new(Mat4::from_translation(Vec3::new(0.0, 0.5, 12.0))),
    );

    scene
}

/// Indices and vertices the demo meshes address, per layout.
const DEMO_INDICES: usize = 6400;
const DEMO_VERTICES: usize = 1280;

fn corner(i: usize) -> ([f32; 3], [f32; 2]) {
    match i % 3 {
        0 => ([-1.0, 0.0, 0.0], [0.0, 0.0]),
        1 => ([1.0, 0.0, 0.0], [1.0, 0.0]),
        _ => ([0.0, 1.0, 0.0], [0.5, 1.0]),
    }
}

/// One triangle repeated over the shared buffers of every layout.
fn upload_demo_geometry(backend: &mut WgpuBackend) {
    let indices: Vec<u16> = (0..DEMO_INDICES).map(|i| (i % 3) as u16).collect();
    let white = [255u8; 4];

    let standard: Vec<StandardVertex> = (0..DEMO_VERTICES)
        .map(|i| {
            let (pos, uv) = corner(i);
            StandardVertex {
                pos,
                normal: [0.0, 0.0, 1.0],
                color: white,
                uv,
            }
        })
        .collect();
    backend.upload_geometry(VertexLayout::Standard, &standard, &indices);

    let two_tcoords: Vec<TwoTCoordsVertex> = (0..DEMO_VERTICES)
        .map(|i| {
            let (pos, uv) = corner(i);
            TwoTCoordsVertex {
                pos,
                normal: [0.0, 0.0, 1.0],
                color: white,
                uv,
                uv2: uv,
            }
        })
        .collect();
    backend.upload_geometry(VertexLayout::TwoTCoords, &two_tcoords, &indices);

    let tangents: Vec<TangentVertex> = (0..DEMO_VERTICES)
        .map(|i| {
            let (pos, uv) = corner(i);
            TangentVertex {
                pos,
                normal: [0.0, 0.0, 1.0],
                color: white,
                uv,
                tangent: [1.0, 0.0, 0.0],
                binormal: [0.0, 1.0, 0.0],
            }
        })
        .collect();
    backend.upload_geometry(VertexLayout::Tangents, &tangents, &indices);
}

fn create_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .ok()?;
        log::info!("Using adapter {}", adapter.get_info().name);

        adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("frame-dump"),
                ..Default::default()
            })
            .await
            .ok()
    })
}

fn world() -> WorldEnvironment {
    WorldEnvironment::new([120, 160, 200, 0])
        .with_wind(Vec3::new(1.0, 0.0, 0.3))
        .with_fog(FogParams::default())
}

fn frame_params(frame: u32) -> FrameParams {
    FrameParams {
        world: Some(world()),
        rsm_matrix: Mat4::orthographic_rh(-50.0, 50.0, -50.0, 50.0, 0.1, 200.0),
        time: frame as f32 * FRAME_TIME,
    }
}

fn log_stats(frame: u32, detail: &str, stats: &RendererStats) {
    log::info!(
        "Frame {}: {}, {} draws \
         (first {}, second {}, transparent {}, displacement {}, shadow {}, rsm {}), {} skipped",
        frame,
        detail,
        stats.total_draw_calls(),
        stats.first_pass_draws,
        stats.second_pass_draws,
        stats.transparent_draws,
        stats.displacement_draws,
        stats.shadow_draws,
        stats.rsm_draws,
        stats.skipped_entries
    );
}

fn run_recording(settings: RenderSettings) {
    let mut backend = RecordingBackend::new();
    let mut meshes = MeshStore::new();
    let mut scene = build_scene(&mut backend, &mut meshes);
    let mut renderer = Renderer::new(backend, settings);

    for frame in 0..FRAMES {
        renderer.backend_mut().clear_log();
        let stats = renderer.render_frame(&mut scene, &mut meshes, &frame_params(frame));

        let commands = renderer.backend().commands();
        let binds = commands
            .iter()
            .filter(|command| matches!(command, GpuCommand::BindTexture { .. }))
            .count();
        let detail = format!("{} commands, {} texture binds", commands.len(), binds);
        log_stats(frame, &detail, &stats);
    }
}

fn run_gpu(device: wgpu::Device, queue: wgpu::Queue, settings: RenderSettings) {
    let width = settings.resolution.width;
    let height = settings.resolution.height;
    let mut backend = WgpuBackend::new(device, queue, width, height);
    upload_demo_geometry(&mut backend);

    let mut meshes = MeshStore::new();
    let mut scene = build_scene(&mut backend, &mut meshes);
    let mut renderer = Renderer::new(backend, settings);

    let aspect = width.max(1) as f32 / height.max(1) as f32;
    let view = Mat4::look_at_rh(Vec3::new(0.0, 6.0, -18.0), Vec3::ZERO, Vec3::Y);
    let projection = Mat4::perspective_rh(60f32.to_radians(), aspect, 0.1, 500.0);
    let sun = Mat4::look_at_rh(Vec3::new(20.0, 40.0, 10.0), Vec3::ZERO, Vec3::Y);
    let cascades: [Mat4; SHADOW_CASCADES as usize] = std::array::from_fn(|i| {
        let extent = 10.0 * (i + 1) as f32;
        Mat4::orthographic_rh(-extent, extent, -extent, extent, 0.1, 100.0) * sun
    });

    for frame in 0..FRAMES {
        let params = frame_params(frame);
        let uniforms = FrameUniforms::new(width, height)
            .with_camera(view, projection)
            .with_cascades(cascades)
            .with_time(params.time);
        renderer.backend_mut().set_frame_uniforms(&uniforms);

        let stats = renderer.render_frame(&mut scene, &mut meshes, &params);
        let detail = format!("{} pipelines", renderer.backend().pipelines_built());
        log_stats(frame, &detail, &stats);
    }
}

fn main() {
    init_logging();

    let settings = RenderSettings::load();
    if std::env::args().any(|arg| arg == "--gpu") {
        match create_device() {
            Some((device, queue)) => return run_gpu(device, queue, settings),
            None => log::warn!("No GPU adapter available; recording commands instead"),
        }
    }
    run_recording(settings);
}
