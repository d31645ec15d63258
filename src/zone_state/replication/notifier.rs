//! # Notifier Module
//!
//! `TerrainUpdateNotifier` turns the stream of terrain changes into packets for one viewer.
//!
//! ## Flow
//! 1. The monitor hands every change to every viewer through [`TerrainUpdateNotifier::enqueue`].
//!    This only pushes onto a channel and never waits on the grid.
//! 2. A flush pass (on a worker thread) drains the channel into the viewer's grid and walks
//!    every grid cell against a window centered on the viewer's current position:
//!    - cells outside the window keep only dirty markers; queued tiles are demoted
//!    - visible dirty cells get one full region packet per dirty layer, then are cleared
//!    - visible cells without dirty markers send the queued tiles that fall in the window
//!
//! Packets are encoded under the terrain read lock and sent only after it is released.
//! At most one flush runs per viewer. The pass is claimed through
//! [`TerrainUpdateNotifier::try_reserve_flush`], and the claim is released when the
//! returned [`FlushReservation`] drops.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Receiver, Sender},
    Arc, Mutex, PoisonError,
};

use log::{debug, trace};

use super::{
    grid::Grid,
    packet::LayerUpdatePacket,
    packet_cache::PacketCache,
    update_info::TerrainUpdateInfo,
    viewer::ViewerSession,
};
use crate::zone_state::terrain::{Area, Terrain};

/// What one flush pass did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub regions: usize,
    pub tiles: usize,
    pub demoted: usize,
    pub bytes: usize,
    /// The session refused a packet; the pass stopped and kept the rest queued.
    pub interrupted: bool,
}

impl FlushStats {
    pub fn packets(&self) -> usize {
        self.regions + self.tiles
    }
}

pub struct TerrainUpdateNotifier {
    viewer: Arc<dyn ViewerSession>,
    sender: Sender<TerrainUpdateInfo>,
    receiver: Mutex<Receiver<TerrainUpdateInfo>>,
    grid: Mutex<Grid>,
    flushing: AtomicBool,
    visibility_radius: i32,
}

impl TerrainUpdateNotifier {
    pub fn new(
        viewer: Arc<dyn ViewerSession>,
        zone_width: usize,
        zone_height: usize,
        grid_cell_size: usize,
        visibility_radius: i32,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        TerrainUpdateNotifier {
            viewer,
            sender,
            receiver: Mutex::new(receiver),
            grid: Mutex::new(Grid::new(zone_width, zone_height, grid_cell_size)),
            flushing: AtomicBool::new(false),
            visibility_radius,
        }
    }

    pub fn viewer_id(&self) -> u64 {
        self.viewer.id()
    }

    /// Queues changes for the next flush.
    pub fn enqueue<I: IntoIterator<Item = TerrainUpdateInfo>>(&self, updates: I) {
        for update in updates {
            // The receiver lives in `self`, so the channel cannot be disconnected here.
            let _ = self.sender.send(update);
        }
    }

    /// The region currently visible to the viewer.
    pub fn window(&self) -> Area {
        Area::around(self.viewer.position(), self.visibility_radius)
    }

    /// Claims the flush pass for this viewer.
    ///
    /// # Returns
    /// `None` while another pass holds the claim.
    pub fn try_reserve_flush(self: &Arc<Self>) -> Option<FlushReservation> {
        self.flushing
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| FlushReservation {
                notifier: self.clone(),
            })
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// True if anything is still waiting to be sent.
    pub fn has_pending(&self) -> bool {
        let mut grid = self.grid.lock().unwrap_or_else(PoisonError::into_inner);
        self.drain_into(&mut grid);
        !grid.is_empty()
    }

    fn drain_into(&self, grid: &mut Grid) -> usize {
        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        let mut drained = 0;
        while let Ok(update) = receiver.try_recv() {
            grid.ingest(update);
            drained += 1;
        }
        drained
    }

    /// Walks the grid against the current window and encodes everything due for sending.
    ///
    /// Runs under the terrain read lock. Sending happens later, in [`Self::deliver`].
    fn prepare(&self, terrain: &Terrain, cache: &PacketCache) -> PreparedFlush {
        let window = self.window();
        let mut grid = self.grid.lock().unwrap_or_else(PoisonError::into_inner);
        let drained = self.drain_into(&mut grid);
        let mut prepared = PreparedFlush {
            drained,
            ..PreparedFlush::default()
        };

        for cell in grid.cells_mut() {
            if cell.is_empty() {
                continue;
            }
            if !cell.area().intersects(&window) {
                prepared.demoted += cell.demote_pending();
                continue;
            }
            if cell.has_dirty() {
                for layer in cell.dirty_layers() {
                    prepared.outgoing.push(Outgoing {
                        packet: cache.region_packet(terrain, layer, cell.area()),
                        update: TerrainUpdateInfo::Area {
                            layer,
                            area: cell.area(),
                        },
                    });
                }
                cell.clear();
                continue;
            }
            for update in cell.take_visible(&window) {
                let packet = LayerUpdatePacket::from_layer(terrain, update.layer(), update.area()).encode();
                prepared.outgoing.push(Outgoing {
                    packet: Arc::new(packet),
                    update,
                });
            }
        }
        prepared
    }

    /// Sends prepared packets in order. The terrain is not touched here.
    ///
    /// On the first refused packet the pass stops, and that packet's update and every
    /// later one go back into the grid.
    fn deliver(&self, prepared: PreparedFlush) -> FlushStats {
        let mut stats = FlushStats {
            demoted: prepared.demoted,
            ..FlushStats::default()
        };
        let mut outgoing = prepared.outgoing.into_iter();
        while let Some(next) = outgoing.next() {
            if let Err(error) = self.viewer.send_packet(&next.packet) {
                debug!("Stopping flush for viewer {}: {}", self.viewer.id(), error);
                stats.interrupted = true;
                let mut grid = self.grid.lock().unwrap_or_else(PoisonError::into_inner);
                grid.ingest(next.update);
                outgoing.for_each(|unsent| grid.ingest(unsent.update));
                break;
            }
            stats.bytes += next.packet.len();
            if next.update.is_tile() {
                stats.tiles += 1;
            } else {
                stats.regions += 1;
            }
        }

        if prepared.drained > 0 || stats.packets() > 0 {
            trace!(
                "Viewer {}: drained {}, sent {} regions and {} tiles ({} bytes), demoted {}",
                self.viewer.id(),
                prepared.drained,
                stats.regions,
                stats.tiles,
                stats.bytes,
                stats.demoted
            );
        }
        stats
    }
}

struct Outgoing {
    packet: Arc<Vec<u8>>,
    /// What to requeue if the packet is refused.
    update: TerrainUpdateInfo,
}

/// Packets encoded for one flush pass, not yet sent.
#[derive(Default)]
pub struct PreparedFlush {
    outgoing: Vec<Outgoing>,
    drained: usize,
    demoted: usize,
}

impl PreparedFlush {
    pub fn len(&self) -> usize {
        self.outgoing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }
}

/// Exclusive right to run one flush pass for a viewer.
///
/// A pass has two halves: [`FlushReservation::prepare`] encodes packets while the caller
/// holds the terrain, and [`FlushReservation::deliver`] sends them after the caller has let
/// go of it, so a slow session never holds up terrain writes.
pub struct FlushReservation {
    notifier: Arc<TerrainUpdateNotifier>,
}

impl FlushReservation {
    pub fn viewer_id(&self) -> u64 {
        self.notifier.viewer_id()
    }

    pub fn prepare(&self, terrain: &Terrain, cache: &PacketCache) -> PreparedFlush {
        self.notifier.prepare(terrain, cache)
    }

    pub fn deliver(&self, prepared: PreparedFlush) -> FlushStats {
        self.notifier.deliver(prepared)
    }

    /// Prepares and delivers in one go.
    pub fn flush(&self, terrain: &Terrain, cache: &PacketCache) -> FlushStats {
        self.deliver(self.prepare(terrain, cache))
    }
}

impl Drop for FlushReservation {
    fn drop(&mut self) {
        self.notifier.flushing.store(false, Ordering::Release);
    }
}
