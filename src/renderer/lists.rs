//! Per-frame material argument lists.
//!
//! One list per material class, filled by the scene manager during traversal
//! and read by the passes afterwards. Clearing keeps the capacity, so after
//! the first few frames no list reallocates.

use crate::renderer::args::{DisplaceArgs, FogArgs, GrassArgs, SolidArgs, TransparentArgs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialClass {
    Default,
    AlphaRef,
    SphereMap,
    Details,
    Unlit,
    NormalMap,
    Grass,
    Splatting,
    BlendTransparent,
    AdditiveTransparent,
    BlendTransparentFog,
    AdditiveTransparentFog,
    Displacement,
}

impl MaterialClass {
    pub const SOLID: [MaterialClass; 8] = [
        Self::Default,
        Self::AlphaRef,
        Self::SphereMap,
        Self::Details,
        Self::Unlit,
        Self::NormalMap,
        Self::Grass,
        Self::Splatting,
    ];

    pub const TRANSPARENT: [MaterialClass; 5] = [
        Self::BlendTransparent,
        Self::AdditiveTransparent,
        Self::BlendTransparentFog,
        Self::AdditiveTransparentFog,
        Self::Displacement,
    ];

    pub fn is_solid(self) -> bool {
        Self::SOLID.contains(&self)
    }
}

/// Solid classes sharing the [`SolidArgs`] shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolidClass {
    Default,
    AlphaRef,
    SphereMap,
    Details,
    Unlit,
    NormalMap,
    Splatting,
}

impl From<SolidClass> for MaterialClass {
    fn from(class: SolidClass) -> Self {
        match class {
            SolidClass::Default => Self::Default,
            SolidClass::AlphaRef => Self::AlphaRef,
            SolidClass::SphereMap => Self::SphereMap,
            SolidClass::Details => Self::Details,
            SolidClass::Unlit => Self::Unlit,
            SolidClass::NormalMap => Self::NormalMap,
            SolidClass::Splatting => Self::Splatting,
        }
    }
}

/// Blend function of a transparent batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransparentBlend {
    Blend,
    Additive,
}

#[derive(Debug, Default)]
pub struct MaterialLists {
    pub default: Vec<SolidArgs>,
    pub alpha_ref: Vec<SolidArgs>,
    pub sphere_map: Vec<SolidArgs>,
    pub details: Vec<SolidArgs>,
    pub unlit: Vec<SolidArgs>,
    pub normal_map: Vec<SolidArgs>,
    pub grass: Vec<GrassArgs>,
    pub splatting: Vec<SolidArgs>,
    pub blend_transparent: Vec<TransparentArgs>,
    pub additive_transparent: Vec<TransparentArgs>,
    pub blend_transparent_fog: Vec<FogArgs>,
    pub additive_transparent_fog: Vec<FogArgs>,
    pub displacement: Vec<DisplaceArgs>,
}

impl MaterialLists {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self, class: MaterialClass) {
        match class {
            MaterialClass::Default => self.default.clear(),
            MaterialClass::AlphaRef => self.alpha_ref.clear(),
            MaterialClass::SphereMap => self.sphere_map.clear(),
            MaterialClass::Details => self.details.clear(),
            MaterialClass::Unlit => self.unlit.clear(),
            MaterialClass::NormalMap => self.normal_map.clear(),
            MaterialClass::Grass => self.grass.clear(),
            MaterialClass::Splatting => self.splatting.clear(),
            MaterialClass::BlendTransparent => self.blend_transparent.clear(),
            MaterialClass::AdditiveTransparent => self.additive_transparent.clear(),
            MaterialClass::BlendTransparentFog => self.blend_transparent_fog.clear(),
            MaterialClass::AdditiveTransparentFog => self.additive_transparent_fog.clear(),
            MaterialClass::Displacement => self.displacement.clear(),
        }
    }

    pub fn clear_solid(&mut self) {
        for class in MaterialClass::SOLID {
            self.clear(class);
        }
    }

    pub fn clear_transparent(&mut self) {
        for class in MaterialClass::TRANSPARENT {
            self.clear(class);
        }
    }

    pub fn solid_mut(&mut self, class: SolidClass) -> &mut Vec<SolidArgs> {
        match class {
            SolidClass::Default => &mut self.default,
            SolidClass::AlphaRef => &mut self.alpha_ref,
            SolidClass::SphereMap => &mut self.sphere_map,
            SolidClass::Details => &mut self.details,
            SolidClass::Unlit => &mut self.unlit,
            SolidClass::NormalMap => &mut self.normal_map,
            SolidClass::Splatting => &mut self.splatting,
        }
    }

    pub fn append_solid(&mut self, class: SolidClass, args: SolidArgs) {
        self.solid_mut(class).push(args);
    }

    pub fn append_grass(&mut self, args: GrassArgs) {
        self.grass.push(args);
    }

    pub fn append_transparent(&mut self, blend: TransparentBlend, args: TransparentArgs) {
        match blend {
            TransparentBlend::Blend => self.blend_transparent.push(args),
            TransparentBlend::Additive => self.additive_transparent.push(args),
        }
    }

    pub fn append_transparent_fog(&mut self, blend: TransparentBlend, args: FogArgs) {
        match blend {
            TransparentBlend::Blend => self.blend_transparent_fog.push(args),
            TransparentBlend::Additive => self.additive_transparent_fog.push(args),
        }
    }

    pub fn append_displacement(&mut self, args: DisplaceArgs) {
        self.displacement.push(args);
    }

    pub fn len(&self, class: MaterialClass) -> usize {
        match class {
            MaterialClass::Default => self.default.len(),
            MaterialClass::AlphaRef => self.alpha_ref.len(),
            MaterialClass::SphereMap => self.sphere_map.len(),
            MaterialClass::Details => self.details.len(),
            MaterialClass::Unlit => self.unlit.len(),
            MaterialClass::NormalMap => self.normal_map.len(),
            MaterialClass::Grass => self.grass.len(),
            MaterialClass::Splatting => self.splatting.len(),
            MaterialClass::BlendTransparent => self.blend_transparent.len(),
            MaterialClass::AdditiveTransparent => self.additive_transparent.len(),
            MaterialClass::BlendTransparentFog => self.blend_transparent_fog.len(),
            MaterialClass::AdditiveTransparentFog => self.additive_transparent_fog.len(),
            MaterialClass::Displacement => self.displacement.len(),
        }
    }

    pub fn is_empty(&self, class: MaterialClass) -> bool {
        self.len(class) == 0
    }

    pub fn total_len(&self) -> usize {
        MaterialClass::SOLID
            .iter()
            .chain(MaterialClass::TRANSPARENT.iter())
            .map(|class| self.len(*class))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Handle;
    use glam::{Mat4, Vec3};

    fn solid() -> SolidArgs {
        SolidArgs::new(Handle::new(0), Mat4::IDENTITY)
    }

    #[test]
    fn append_routes_to_the_class_list() {
        let mut lists = MaterialLists::new();
        lists.append_solid(SolidClass::Details, solid());
        lists.append_solid(SolidClass::Details, solid());
        lists.append_grass(GrassArgs::new(Handle::new(1), Mat4::IDENTITY, Vec3::X));
        lists.append_transparent(
            TransparentBlend::Additive,
            TransparentArgs::new(Handle::new(2), Mat4::IDENTITY),
        );

        assert_eq!(lists.len(MaterialClass::Details), 2);
        assert_eq!(lists.len(MaterialClass::Grass), 1);
        assert_eq!(lists.len(MaterialClass::AdditiveTransparent), 1);
        assert!(lists.is_empty(MaterialClass::BlendTransparent));
        assert_eq!(lists.total_len(), 4);
    }

    #[test]
    fn clearing_solid_keeps_transparent_and_capacity() {
        let mut lists = MaterialLists::new();
        for _ in 0..16 {
            lists.append_solid(SolidClass::Default, solid());
        }
        lists.append_displacement(DisplaceArgs::new(Handle::new(3), Mat4::IDENTITY));
        let capacity = lists.default.capacity();

        lists.clear_solid();

        assert!(lists.is_empty(MaterialClass::Default));
        assert_eq!(lists.default.capacity(), capacity);
        assert_eq!(lists.len(MaterialClass::Displacement), 1);

        lists.clear_transparent();
        assert_eq!(lists.total_len(), 0);
    }

    #[test]
    fn class_groups_partition_every_class() {
        assert!(MaterialClass::SOLID.iter().all(|class| class.is_solid()));
        assert!(MaterialClass::TRANSPARENT
            .iter()
            .all(|class| !class.is_solid()));
    }
}
