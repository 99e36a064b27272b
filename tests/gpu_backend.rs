use glam::{Mat4, Vec3};
use render_geometry::asset::{MeshBatch, MeshStore};
use render_geometry::renderer::backend::GpuBackend;
use render_geometry::renderer::vertex::StandardVertex;
use render_geometry::renderer::{
    FrameParams, FrameUniforms, Renderer, SolidClass, TransparentBlend, VertexLayout,
    WgpuBackend,
};
use render_geometry::scene::{EntityScene, Placement, SurfaceMaterial};
use render_geometry::settings::Resolution;
use render_geometry::{BackendError, FeatureFlags, RenderSettings};

fn device() -> (wgpu::Device, wgpu::Queue) {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .expect("Failed to find adapter");
        adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .expect("Failed to create device")
    })
}

fn small_settings(features: FeatureFlags) -> RenderSettings {
    RenderSettings {
        resolution: Resolution {
            width: 64,
            height: 64,
        },
        shadow_map_size: 64,
        rsm_size: 32,
        features,
    }
}

fn triangle() -> Vec<StandardVertex> {
    [
        ([-1.0, 0.0, 0.0], [0.0, 0.0]),
        ([1.0, 0.0, 0.0], [1.0, 0.0]),
        ([0.0, 1.0, 0.0], [0.5, 1.0]),
    ]
    .into_iter()
    .map(|(pos, uv)| StandardVertex {
        pos,
        normal: [0.0, 0.0, 1.0],
        color: [255; 4],
        uv,
    })
    .collect()
}

fn standard_scene(meshes: &mut MeshStore) -> EntityScene {
    let mut scene = EntityScene::new();
    let mesh = meshes.insert(MeshBatch::new("triangle", VertexLayout::Standard, 3));
    let placement = Placement::new(Mat4::from_translation(Vec3::Z));
    for class in [SolidClass::Default, SolidClass::AlphaRef, SolidClass::Unlit] {
        scene.spawn(mesh, SurfaceMaterial::Solid(class), placement);
    }
    scene.spawn(mesh, SurfaceMaterial::Grass, placement);
    scene.spawn(
        mesh,
        SurfaceMaterial::Transparent(TransparentBlend::Additive),
        placement,
    );
    scene
}

#[test]
#[ignore] // Requires a GPU
fn frames_render_through_cached_pipelines() {
    let (device, queue) = device();
    let mut backend = WgpuBackend::new(device, queue, 64, 64);
    backend.upload_geometry(VertexLayout::Standard, &triangle(), &[0u16, 1, 2]);

    let mut meshes = MeshStore::new();
    let mut scene = standard_scene(&mut meshes);
    let mut renderer = Renderer::new(
        backend,
        small_settings(FeatureFlags {
            global_illumination: true,
            light_viz: true,
            ..FeatureFlags::default()
        }),
    );
    renderer
        .backend_mut()
        .set_frame_uniforms(&FrameUniforms::new(64, 64).with_time(0.5));

    let first = renderer.render_frame(&mut scene, &mut meshes, &FrameParams::default());
    let built = renderer.backend().pipelines_built();
    assert!(first.total_draw_calls() > 0);
    assert_eq!(first.skipped_entries, 0);
    assert!(built > 0);

    let second = renderer.render_frame(&mut scene, &mut meshes, &FrameParams::default());
    assert_eq!(second, first);
    assert_eq!(renderer.backend().pipelines_built(), built);
}

#[test]
#[ignore] // Requires a GPU
fn texture_loading_reports_missing_and_undecodable_files() {
    let root = std::env::temp_dir().join("render-geometry-gpu-textures");
    std::fs::create_dir_all(&root).expect("Failed to create texture root");
    std::fs::write(root.join("broken.png"), b"not an image").expect("Failed to write texture");

    let (device, queue) = device();
    let mut backend = WgpuBackend::new(device, queue, 64, 64).with_texture_root(&root);

    assert!(matches!(
        backend.load_texture("absent.png"),
        Err(BackendError::TextureNotFound(name)) if name == "absent.png"
    ));
    assert!(matches!(
        backend.load_texture("broken.png"),
        Err(BackendError::TextureDecode { name, .. }) if name == "broken.png"
    ));
}
