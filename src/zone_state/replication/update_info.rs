//! Pending replication units.

use crate::zone_state::terrain::{Area, LayerChange, LayerEvent, LayerType};

/// One change a viewer has not been told about yet, keyed by layer and location.
///
/// Equal descriptors are duplicates: pending sets and grid cells keep only one of them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TerrainUpdateInfo {
    Tile { layer: LayerType, x: i32, y: i32 },
    Area { layer: LayerType, area: Area },
}

impl TerrainUpdateInfo {
    pub fn layer(&self) -> LayerType {
        match *self {
            TerrainUpdateInfo::Tile { layer, .. } | TerrainUpdateInfo::Area { layer, .. } => layer,
        }
    }

    /// The cells covered; a single-cell area for tiles.
    pub fn area(&self) -> Area {
        match *self {
            TerrainUpdateInfo::Tile { x, y, .. } => Area::tile(x, y),
            TerrainUpdateInfo::Area { area, .. } => area,
        }
    }

    pub fn is_tile(&self) -> bool {
        matches!(self, TerrainUpdateInfo::Tile { .. })
    }
}

impl From<LayerEvent> for TerrainUpdateInfo {
    fn from(event: LayerEvent) -> Self {
        match event.change {
            LayerChange::Cell { x, y } => TerrainUpdateInfo::Tile {
                layer: event.layer,
                x,
                y,
            },
            LayerChange::Area(area) => TerrainUpdateInfo::Area {
                layer: event.layer,
                area,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_map_to_matching_variant() {
        let tile = TerrainUpdateInfo::from(LayerEvent {
            layer: LayerType::Plants,
            change: LayerChange::Cell { x: 3, y: 4 },
        });
        assert!(tile.is_tile());
        assert_eq!(tile.area(), Area::tile(3, 4));
        assert_eq!(tile.layer(), LayerType::Plants);

        let area = TerrainUpdateInfo::from(LayerEvent {
            layer: LayerType::Altitude,
            change: LayerChange::Area(Area::new(0, 0, 3, 3)),
        });
        assert!(!area.is_tile());
        assert_eq!(area.area(), Area::new(0, 0, 3, 3));
    }

    #[test]
    fn tile_and_area_over_same_cell_are_distinct() {
        let tile = TerrainUpdateInfo::Tile {
            layer: LayerType::Blocking,
            x: 1,
            y: 1,
        };
        let area = TerrainUpdateInfo::Area {
            layer: LayerType::Blocking,
            area: Area::tile(1, 1),
        };
        assert_ne!(tile, area);
    }
}
