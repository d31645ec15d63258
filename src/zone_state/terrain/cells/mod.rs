//! # Terrain Cell Module
//!
//! Fixed-size cell records stored in the blocking, control and plant layers. All of them
//! are `#[repr(C)]` plain-old-data so a layer of them can be byte-copied to the wire, and
//! every boolean is one bit of an integer field.

pub mod blocking;
pub mod control;
pub mod plant;

pub use blocking::BlockingInfo;
pub use control::TerrainControlInfo;
pub use plant::{PlantInfo, PlantType, DIED_STATE};
