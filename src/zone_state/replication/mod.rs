//! # Replication Module
//!
//! Keeps connected viewers in sync with a zone's terrain.
//!
//! ## Key Components
//! - `TerrainUpdateMonitor`: scoped collector of layer change events, handed to every
//!   viewer when the scope ends; also drives slope maintenance
//! - `TerrainUpdateNotifier`: per-viewer grid of dirty regions and queued tiles, flushed
//!   against the viewer's visibility window
//! - `LayerUpdatePacket` / `AreaEditPacket`: wire formats
//! - `PacketCache`: shared LRU of encoded full-region packets
//! - `ViewerRegistry`: the viewers attached to a zone

pub mod grid;
pub mod monitor;
pub mod notifier;
pub mod packet;
pub mod packet_cache;
pub mod update_info;
pub mod viewer;

pub use monitor::{MonitorReport, TerrainUpdateMonitor};
pub use notifier::{FlushReservation, FlushStats, PreparedFlush, TerrainUpdateNotifier};
pub use packet::{AreaEditPacket, LayerUpdatePacket};
pub use packet_cache::PacketCache;
pub use update_info::TerrainUpdateInfo;
pub use viewer::{ViewerRegistry, ViewerSession};
