use crate::environment::{FogParams, WorldEnvironment};
use crate::renderer::MaterialLists;
use crate::settings::FeatureFlags;

/// Which pass the scene is being traversed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPhase {
    SolidNormalAndDepth,
    /// Lit solid pass. Lists still hold the normal/depth population, so
    /// scenes normally append nothing here.
    SolidLit,
    Transparent,
    Shadow,
}

impl RenderPhase {
    /// Phases that fill the solid lists.
    pub fn collects_solids(self) -> bool {
        matches!(self, Self::SolidNormalAndDepth | Self::Shadow)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TraversalContext<'a> {
    pub phase: RenderPhase,
    pub world: Option<&'a WorldEnvironment>,
    pub features: FeatureFlags,
}

impl<'a> TraversalContext<'a> {
    /// Fog of the current world, if it has any.
    pub fn fog(&self) -> Option<&'a FogParams> {
        self.world.and_then(WorldEnvironment::fog)
    }
}

/// Visits visible scene nodes and appends their draw arguments to the
/// material lists for the current phase.
pub trait SceneManager {
    fn draw_all(&mut self, ctx: &TraversalContext<'_>, lists: &mut MaterialLists);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fog_comes_from_the_current_world() {
        let foggy = WorldEnvironment::default().with_fog(FogParams {
            max_density: 0.25,
            ..FogParams::default()
        });
        let clear = WorldEnvironment::default();
        let ctx = |world| TraversalContext {
            phase: RenderPhase::Transparent,
            world,
            features: FeatureFlags::default(),
        };

        assert_eq!(ctx(Some(&foggy)).fog().map(|fog| fog.max_density), Some(0.25));
        assert!(ctx(Some(&clear)).fog().is_none());
        assert!(ctx(None).fog().is_none());
    }
}
