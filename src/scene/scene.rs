use glam::Vec3;
use hecs::{Entity, World};

use super::components::*;
use super::manager::{RenderPhase, SceneManager, TraversalContext};
use crate::asset::{Handle, MeshBatch};
use crate::renderer::{
    DisplaceArgs, FogArgs, GrassArgs, MaterialLists, SolidArgs, TransparentArgs,
};

/// Scene manager backed by a hecs world.
#[derive(Default)]
pub struct EntityScene {
    pub world: World,
}

impl EntityScene {
    pub fn new() -> Self {
        Self {
            world: World::new(),
        }
    }

    pub fn spawn(
        &mut self,
        mesh: Handle<MeshBatch>,
        material: SurfaceMaterial,
        placement: Placement,
    ) -> Entity {
        self.world
            .spawn((Renderable { mesh, material }, placement, Visible(true)))
    }

    pub fn spawn_weather(
        &mut self,
        mesh: Handle<MeshBatch>,
        material: SurfaceMaterial,
        placement: Placement,
    ) -> Entity {
        self.world.spawn((
            Renderable { mesh, material },
            placement,
            Visible(true),
            WeatherEffect,
        ))
    }

    pub fn set_visible(&mut self, entity: Entity, visible: bool) {
        if let Ok(mut component) = self.world.get::<&mut Visible>(entity) {
            component.0 = visible;
        } else if cfg!(debug_assertions) {
            log::warn!("set_visible on entity {:?} without Visible", entity);
        }
    }

    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }
}

impl SceneManager for EntityScene {
    fn draw_all(&mut self, ctx: &TraversalContext<'_>, lists: &mut MaterialLists) {
        if ctx.phase == RenderPhase::SolidLit {
            return;
        }

        let (ambient, wind) = ctx
            .world
            .map_or((Vec3::ZERO, Vec3::ZERO), |world| (world.ambient(), world.wind()));
        let fog = ctx.fog().copied();

        let mut query = self.world.query::<(
            &Renderable,
            &Placement,
            Option<&Visible>,
            Option<&WeatherEffect>,
        )>();

        for (_entity, (renderable, placement, visible, weather)) in query.iter() {
            if !visible.map_or(true, |v| v.0) {
                continue;
            }
            if weather.is_some() && !ctx.features.weather_effects {
                continue;
            }

            let mesh = renderable.mesh;
            let model = placement.model;

            match (renderable.material, ctx.phase) {
                (SurfaceMaterial::Solid(class), phase) if phase.collects_solids() => {
                    lists.append_solid(
                        class,
                        SolidArgs::new(mesh, model)
                            .with_texture_matrix(placement.texture_matrix)
                            .with_ambient(ambient),
                    );
                }
                (SurfaceMaterial::Grass, phase) if phase.collects_solids() => {
                    lists.append_grass(GrassArgs::new(mesh, model, wind).with_ambient(ambient));
                }
                (SurfaceMaterial::Transparent(blend), RenderPhase::Transparent) => match fog {
                    Some(fog) => lists.append_transparent_fog(
                        blend,
                        FogArgs::new(mesh, model, fog)
                            .with_texture_matrix(placement.texture_matrix),
                    ),
                    None => lists.append_transparent(
                        blend,
                        TransparentArgs::new(mesh, model)
                            .with_texture_matrix(placement.texture_matrix),
                    ),
                },
                (SurfaceMaterial::Displacement, RenderPhase::Transparent) => {
                    lists.append_displacement(DisplaceArgs::new(mesh, model));
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{FogParams, WorldEnvironment};
    use crate::renderer::{MaterialClass, SolidClass, TransparentBlend};
    use crate::settings::FeatureFlags;
    use glam::Mat4;

    fn demo_scene() -> (EntityScene, Entity) {
        let mut scene = EntityScene::new();
        let placement = Placement::new(Mat4::IDENTITY);
        scene.spawn(Handle::new(0), SurfaceMaterial::Solid(SolidClass::Default), placement);
        scene.spawn(Handle::new(1), SurfaceMaterial::Grass, placement);
        scene.spawn(
            Handle::new(2),
            SurfaceMaterial::Transparent(TransparentBlend::Blend),
            placement,
        );
        scene.spawn(Handle::new(3), SurfaceMaterial::Displacement, placement);
        let rain = scene.spawn_weather(
            Handle::new(4),
            SurfaceMaterial::Transparent(TransparentBlend::Additive),
            placement,
        );
        (scene, rain)
    }

    fn traverse(
        scene: &mut EntityScene,
        phase: RenderPhase,
        world: Option<&WorldEnvironment>,
        features: FeatureFlags,
    ) -> MaterialLists {
        let mut lists = MaterialLists::new();
        let ctx = TraversalContext {
            phase,
            world,
            features,
        };
        scene.draw_all(&ctx, &mut lists);
        lists
    }

    #[test]
    fn solids_only_collected_for_depth_and_shadow_phases() {
        let (mut scene, _) = demo_scene();
        let features = FeatureFlags::default();

        for phase in [RenderPhase::SolidNormalAndDepth, RenderPhase::Shadow] {
            let lists = traverse(&mut scene, phase, None, features);
            assert_eq!(lists.len(MaterialClass::Default), 1);
            assert_eq!(lists.len(MaterialClass::Grass), 1);
            assert!(lists.is_empty(MaterialClass::BlendTransparent));
        }

        let lit = traverse(&mut scene, RenderPhase::SolidLit, None, features);
        assert_eq!(lit.total_len(), 0);
    }

    #[test]
    fn fog_routes_transparents_to_fog_lists() {
        let (mut scene, _) = demo_scene();
        let features = FeatureFlags::default();
        let foggy = WorldEnvironment::default().with_fog(FogParams::default());

        let clear = traverse(&mut scene, RenderPhase::Transparent, None, features);
        assert_eq!(clear.len(MaterialClass::BlendTransparent), 1);
        assert_eq!(clear.len(MaterialClass::AdditiveTransparent), 1);
        assert_eq!(clear.len(MaterialClass::Displacement), 1);

        let fogged = traverse(&mut scene, RenderPhase::Transparent, Some(&foggy), features);
        assert_eq!(fogged.len(MaterialClass::BlendTransparentFog), 1);
        assert_eq!(fogged.len(MaterialClass::AdditiveTransparentFog), 1);
        assert!(fogged.is_empty(MaterialClass::BlendTransparent));
    }

    #[test]
    fn hidden_and_disabled_weather_entities_are_skipped() {
        let (mut scene, rain) = demo_scene();
        let no_weather = FeatureFlags {
            weather_effects: false,
            ..FeatureFlags::default()
        };

        let lists = traverse(&mut scene, RenderPhase::Transparent, None, no_weather);
        assert!(lists.is_empty(MaterialClass::AdditiveTransparent));

        scene.set_visible(rain, false);
        let lists = traverse(&mut scene, RenderPhase::Transparent, None, FeatureFlags::default());
        assert!(lists.is_empty(MaterialClass::AdditiveTransparent));
    }

    #[test]
    fn world_supplies_ambient_and_wind() {
        let (mut scene, _) = demo_scene();
        let world = WorldEnvironment::default()
            .with_ambient(Vec3::splat(0.4))
            .with_wind(Vec3::new(0.0, 0.0, 2.0));

        let lists = traverse(
            &mut scene,
            RenderPhase::SolidNormalAndDepth,
            Some(&world),
            FeatureFlags::default(),
        );
        assert_eq!(lists.default[0].ambient, Vec3::splat(0.4));
        assert_eq!(lists.grass[0].wind, Vec3::new(0.0, 0.0, 2.0));
    }
}
