//! Services the vegetation simulation calls out to.

use cgmath::Point2;
use log::trace;

use crate::zone_state::terrain::Area;

/// Finds player structures near a point. Used by wall decay on top-tier zones.
pub trait StructureLocator: Send + Sync {
    fn structures_near(&self, center: Point2<i32>, radius: i32) -> Vec<Point2<i32>>;
}

/// A zone without player structures.
pub struct NoStructures;

impl StructureLocator for NoStructures {
    fn structures_near(&self, _center: Point2<i32>, _radius: i32) -> Vec<Point2<i32>> {
        Vec::new()
    }
}

/// A fixed list of structure positions.
#[derive(Clone, Debug, Default)]
pub struct StaticStructures(pub Vec<Point2<i32>>);

impl StructureLocator for StaticStructures {
    fn structures_near(&self, center: Point2<i32>, radius: i32) -> Vec<Point2<i32>> {
        let search = Area::around(center, radius);
        self.0
            .iter()
            .copied()
            .filter(|position| search.contains(position.x, position.y))
            .collect()
    }
}

/// Fire-and-forget visual feedback for committed vegetation changes.
pub trait EffectSink: Send + Sync {
    fn create_ambient_effect(&self, area: Area);
}

/// Drops effects, logging them at trace level.
pub struct LogEffects;

impl EffectSink for LogEffects {
    fn create_ambient_effect(&self, area: Area) {
        trace!("Ambient effect over {:?}", area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_structures_filter_by_square_radius() {
        let structures = StaticStructures(vec![Point2::new(0, 0), Point2::new(10, 3), Point2::new(4, -4)]);
        let near = structures.structures_near(Point2::new(2, 0), 4);
        assert_eq!(near, vec![Point2::new(0, 0), Point2::new(4, -4)]);
        assert!(NoStructures.structures_near(Point2::new(0, 0), 100).is_empty());
    }
}
