//! # Terrain Module
//!
//! A zone's terrain is a stack of aligned rasters, one cell per world tile:
//!
//! | Layer      | Cell                    | Notes                                  |
//! |------------|-------------------------|----------------------------------------|
//! | Altitude   | `u16`                   | raw height, 1/32 units, terraformable  |
//! | Blocking   | [`BlockingInfo`]        | occupancy flags and blocking height    |
//! | Control    | [`TerrainControlInfo`]  | zoning flags                           |
//! | Plants     | [`PlantInfo`]           | vegetation state                       |
//! | Slope      | `u8`                    | derived from altitude                  |
//!
//! [`Terrain`] owns every layer of one zone exclusively. Code that only knows the layer
//! type at runtime (wire packets, subscriptions) goes through [`Terrain::layer`] and the
//! type-erased [`TerrainLayer`] view.

pub mod altitude;
pub mod area;
pub mod cells;
pub mod layer;
pub mod slope;

use num_derive::FromPrimitive;

pub use altitude::AltitudeLayer;
pub use area::Area;
pub use cells::{BlockingInfo, PlantInfo, TerrainControlInfo};
pub use layer::{Layer, LayerChange, LayerEvent, LayerObserver, SubscriptionId, TerrainLayer};
pub use slope::SlopeLayer;

use crate::error::TerrainError;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive)]
pub enum LayerType {
    Altitude = 0,
    Blocking = 1,
    Control = 2,
    Plants = 3,
    Slope = 4,
}

impl LayerType {
    pub const COUNT: usize = 5;

    pub const ALL: [LayerType; LayerType::COUNT] = [
        LayerType::Altitude,
        LayerType::Blocking,
        LayerType::Control,
        LayerType::Plants,
        LayerType::Slope,
    ];

    /// Layers whose edits are replicated to viewers. Slope is rebuilt locally by clients.
    pub const REPLICATED: [LayerType; 4] = [
        LayerType::Altitude,
        LayerType::Blocking,
        LayerType::Control,
        LayerType::Plants,
    ];

    pub fn from_byte(byte: u8) -> Result<Self, TerrainError> {
        num::FromPrimitive::from_u8(byte).ok_or(TerrainError::UnknownLayer(byte))
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

pub struct Terrain {
    width: usize,
    height: usize,
    altitude: AltitudeLayer,
    slope: SlopeLayer,
    blocking: Layer<BlockingInfo>,
    control: Layer<TerrainControlInfo>,
    plants: Layer<PlantInfo>,
}

impl Terrain {
    /// Creates a flat, empty zone.
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "zone must not be empty");
        Terrain {
            width,
            height,
            altitude: AltitudeLayer::new(width, height),
            slope: SlopeLayer::new(width, height),
            blocking: Layer::new(LayerType::Blocking, width, height),
            control: Layer::new(LayerType::Control, width, height),
            plants: Layer::new(LayerType::Plants, width, height),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bounds(&self) -> Area {
        Area::whole(self.width, self.height)
    }

    pub fn altitude(&self) -> &AltitudeLayer {
        &self.altitude
    }

    pub fn altitude_mut(&mut self) -> &mut AltitudeLayer {
        &mut self.altitude
    }

    pub fn slope(&self) -> &SlopeLayer {
        &self.slope
    }

    pub fn blocking(&self) -> &Layer<BlockingInfo> {
        &self.blocking
    }

    pub fn blocking_mut(&mut self) -> &mut Layer<BlockingInfo> {
        &mut self.blocking
    }

    pub fn control(&self) -> &Layer<TerrainControlInfo> {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut Layer<TerrainControlInfo> {
        &mut self.control
    }

    pub fn plants(&self) -> &Layer<PlantInfo> {
        &self.plants
    }

    pub fn plants_mut(&mut self) -> &mut Layer<PlantInfo> {
        &mut self.plants
    }

    pub fn layer(&self, layer_type: LayerType) -> &dyn TerrainLayer {
        match layer_type {
            LayerType::Altitude => &*self.altitude,
            LayerType::Blocking => &self.blocking,
            LayerType::Control => &self.control,
            LayerType::Plants => &self.plants,
            LayerType::Slope => &*self.slope,
        }
    }

    /// Mutable access by type. Slope is derived and has no mutable view.
    pub fn layer_mut(&mut self, layer_type: LayerType) -> Option<&mut dyn TerrainLayer> {
        match layer_type {
            LayerType::Altitude => Some(&mut *self.altitude),
            LayerType::Blocking => Some(&mut self.blocking),
            LayerType::Control => Some(&mut self.control),
            LayerType::Plants => Some(&mut self.plants),
            LayerType::Slope => None,
        }
    }

    /// Rebuilds slope over `area` from the current altitude.
    pub fn recompute_slope(&mut self, area: Area) -> Option<Area> {
        self.slope.recompute(&self.altitude, area)
    }

    /// Recomputes the whole slope layer. Used after bulk altitude loads.
    pub fn rebuild_slope(&mut self) {
        let bounds = self.bounds();
        self.slope.recompute(&self.altitude, bounds);
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.bounds().contains(x, y)
    }
}
