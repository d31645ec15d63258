//! Blocking cell: what occupies a tile and how tall it is.

use bitvec::prelude::*;

/// Packed blocking state of one tile.
///
/// # Memory Layout
/// Two bytes, `#[repr(C)]`, so a blocking layer can be byte-copied to the wire.
/// `flags` bit 0 = obstacle, 1 = plant, 2 = decor, 3 = island.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlockingInfo {
    pub flags: u8,
    /// Blocking height in world units; zero means walkable.
    pub height: u8,
}

impl BlockingInfo {
    const OBSTACLE: usize = 0;
    const PLANT: usize = 1;
    const DECOR: usize = 2;
    const ISLAND: usize = 3;

    fn flag(&self, bit: usize) -> bool {
        self.flags.view_bits::<Lsb0>()[bit]
    }

    fn set_flag(&mut self, bit: usize, value: bool) {
        self.flags.view_bits_mut::<Lsb0>().set(bit, value);
    }

    pub fn obstacle(&self) -> bool {
        self.flag(Self::OBSTACLE)
    }

    pub fn set_obstacle(&mut self, value: bool) {
        self.set_flag(Self::OBSTACLE, value);
    }

    pub fn plant(&self) -> bool {
        self.flag(Self::PLANT)
    }

    pub fn set_plant(&mut self, value: bool) {
        self.set_flag(Self::PLANT, value);
    }

    pub fn decor(&self) -> bool {
        self.flag(Self::DECOR)
    }

    pub fn set_decor(&mut self, value: bool) {
        self.set_flag(Self::DECOR, value);
    }

    pub fn island(&self) -> bool {
        self.flag(Self::ISLAND)
    }

    pub fn set_island(&mut self, value: bool) {
        self.set_flag(Self::ISLAND, value);
    }

    /// Obstacles and decor are placed by world authoring, not grown.
    pub fn non_natural(&self) -> bool {
        self.obstacle() || self.decor()
    }

    pub fn has_any_flag(&self) -> bool {
        self.flags != 0
    }

    /// True when something on the tile blocks movement.
    pub fn blocked(&self) -> bool {
        self.obstacle() || self.plant() || self.decor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_independent_bits() {
        let mut info = BlockingInfo::default();
        info.set_plant(true);
        info.set_island(true);
        assert_eq!(info.flags, 0b1010);
        assert!(info.plant() && info.island());
        assert!(!info.obstacle() && !info.decor());
        info.set_plant(false);
        assert_eq!(info.flags, 0b1000);
        assert!(!info.blocked());
    }

    #[test]
    fn non_natural_means_obstacle_or_decor() {
        let mut info = BlockingInfo::default();
        info.set_plant(true);
        assert!(!info.non_natural());
        info.set_decor(true);
        assert!(info.non_natural());
    }

    #[test]
    fn cell_is_two_bytes() {
        assert_eq!(std::mem::size_of::<BlockingInfo>(), 2);
    }
}
