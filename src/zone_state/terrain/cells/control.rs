//! Control cell: zoning flags that gate construction, vegetation and NPC movement.

use bitvec::prelude::*;

/// Packed zoning flags of one tile.
///
/// Bit layout of `flags` (LSB first): highway, concrete A, concrete B, PBS highway,
/// terraform protected, roaming, anti-plant, NPC restricted, syndicate area.
/// The composite predicates (`plant_allowed`, `devrinol_allowed`, `is_any_highway`,
/// `any_concrete`) are computed from these bits and never stored.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TerrainControlInfo {
    pub flags: u16,
}

macro_rules! control_flag {
    ($get:ident, $set:ident, $bit:expr) => {
        pub fn $get(&self) -> bool {
            self.flags.view_bits::<Lsb0>()[$bit]
        }

        pub fn $set(&mut self, value: bool) {
            self.flags.view_bits_mut::<Lsb0>().set($bit, value);
        }
    };
}

impl TerrainControlInfo {
    control_flag!(highway, set_highway, 0);
    control_flag!(concrete_a, set_concrete_a, 1);
    control_flag!(concrete_b, set_concrete_b, 2);
    control_flag!(pbs_highway, set_pbs_highway, 3);
    control_flag!(terraform_protected, set_terraform_protected, 4);
    control_flag!(roaming, set_roaming, 5);
    control_flag!(anti_plant, set_anti_plant, 6);
    control_flag!(npc_restricted, set_npc_restricted, 7);
    control_flag!(syndicate_area, set_syndicate_area, 8);

    pub fn is_any_highway(&self) -> bool {
        self.highway() || self.pbs_highway()
    }

    pub fn any_concrete(&self) -> bool {
        self.concrete_a() || self.concrete_b()
    }

    /// Natural vegetation may grow here.
    pub fn plant_allowed(&self) -> bool {
        !(self.anti_plant() || self.roaming() || self.is_any_highway() || self.any_concrete())
    }

    /// Player-seeded vegetation may grow here; unlike natural growth it tolerates concrete.
    pub fn devrinol_allowed(&self) -> bool {
        !(self.anti_plant() || self.roaming() || self.is_any_highway())
    }

    pub fn clear_concrete(&mut self) {
        self.set_concrete_a(false);
        self.set_concrete_b(false);
    }
}
