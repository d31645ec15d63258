//! Plant cell: vegetation state of one tile.

/// Vegetation type id. Zero means "no plant".
pub type PlantType = u8;

/// Growth state written by a plant that died this tick, shown for one tick before the
/// cleanup pass wipes the cell.
pub const DIED_STATE: u8 = 1;

/// Per-tile vegetation record.
///
/// `spawn` is the tile's spawn probability (0 = infertile) and `ground_type` the soil
/// kind; both belong to the tile, not to the plant, and survive clears.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PlantInfo {
    pub plant_type: PlantType,
    pub state: u8,
    pub spawn: u8,
    pub health: u8,
    pub material: u8,
    pub age: u8,
    pub ground_type: u8,
    pub reserved: u8,
}

impl PlantInfo {
    pub fn has_plant(&self) -> bool {
        self.plant_type != 0
    }

    /// No plant and no death marker.
    pub fn is_empty(&self) -> bool {
        self.plant_type == 0 && self.state == 0
    }

    pub fn is_died_marker(&self) -> bool {
        self.plant_type == 0 && self.state == DIED_STATE
    }

    pub fn is_fertile(&self) -> bool {
        self.spawn > 0
    }

    /// Wipes the plant, keeping the tile's spawn probability and ground type.
    pub fn clear(&mut self) {
        self.plant_type = 0;
        self.state = 0;
        self.age = 0;
        self.health = 0;
        self.material = 0;
    }

    /// Clears the plant but leaves the one-tick death marker.
    pub fn mark_died(&mut self) {
        self.clear();
        self.state = DIED_STATE;
    }
}
