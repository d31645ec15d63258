//! # Monitor Module
//!
//! `TerrainUpdateMonitor` collects every change made to the replicated layers during one
//! batch of work and forwards the batch when the scope ends.
//!
//! ## Usage
//!
//! ```ignore
//! let monitor = TerrainUpdateMonitor::begin(&terrain, &viewers);
//! // mutate the terrain through `terrain.get_mut()`
//! let report = monitor.end();
//! ```
//!
//! `end` runs three steps in this order:
//! 1. Unsubscribe from every layer. Observers run under the layer's subscription lock, so
//!    after this no event can still be on its way into the pending set.
//! 2. Broadcast the full pending set to every connected viewer.
//! 3. Recompute slope under every altitude change: the changed region for area updates,
//!    the tile and its eight neighbors for tile updates.
//!
//! A monitor dropped without `end` (early return, panic) runs the same steps from `Drop`.
//! The caller must not hold a terrain guard at that point.

use std::sync::Arc;

use log::{trace, warn};

use super::{update_info::TerrainUpdateInfo, viewer::ViewerRegistry};
use crate::{
    core::{AtomicSet, MtResource},
    zone_state::terrain::{Area, LayerEvent, LayerType, SubscriptionId, Terrain},
};

/// Outcome of one monitor scope.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MonitorReport {
    /// Distinct updates broadcast to viewers.
    pub updates: usize,
    /// Slope regions recomputed.
    pub slope_regions: usize,
}

pub struct TerrainUpdateMonitor<'r> {
    terrain: &'r MtResource<Terrain>,
    viewers: &'r ViewerRegistry,
    pending: Arc<AtomicSet<TerrainUpdateInfo>>,
    subscriptions: Vec<(LayerType, SubscriptionId)>,
    ended: bool,
}

impl<'r> TerrainUpdateMonitor<'r> {
    /// Subscribes to every replicated layer of `terrain`.
    pub fn begin(terrain: &'r MtResource<Terrain>, viewers: &'r ViewerRegistry) -> Self {
        let pending = Arc::new(AtomicSet::new());
        let subscriptions = {
            let terrain = terrain.get();
            LayerType::REPLICATED
                .into_iter()
                .map(|layer_type| {
                    let sink = pending.clone();
                    let id = terrain.layer(layer_type).subscribe(Arc::new(move |event: &LayerEvent| {
                        sink.union([TerrainUpdateInfo::from(*event)])
                    }));
                    (layer_type, id)
                })
                .collect()
        };
        TerrainUpdateMonitor {
            terrain,
            viewers,
            pending,
            subscriptions,
            ended: false,
        }
    }

    /// Number of distinct updates collected so far.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn end(mut self) -> MonitorReport {
        self.finish()
    }

    /// Runs `work` inside a monitor scope.
    pub fn run<R>(terrain: &'r MtResource<Terrain>, viewers: &'r ViewerRegistry, work: impl FnOnce() -> R) -> (R, MonitorReport) {
        let monitor = Self::begin(terrain, viewers);
        let result = work();
        (result, monitor.end())
    }

    fn finish(&mut self) -> MonitorReport {
        self.ended = true;
        {
            let terrain = self.terrain.get();
            for (layer_type, id) in self.subscriptions.drain(..) {
                terrain.layer(layer_type).unsubscribe(id);
            }
        }

        let updates: Vec<TerrainUpdateInfo> = self.pending.take().iter().copied().collect();
        self.viewers.broadcast(&updates);

        let slope_regions: Vec<Area> = updates
            .iter()
            .filter(|update| update.layer() == LayerType::Altitude)
            .map(|update| match update {
                TerrainUpdateInfo::Tile { x, y, .. } => Area::tile(*x, *y).expand(1),
                TerrainUpdateInfo::Area { area, .. } => *area,
            })
            .collect();
        if !slope_regions.is_empty() {
            let mut terrain = self.terrain.get_mut();
            for area in &slope_regions {
                terrain.recompute_slope(*area);
            }
        }

        let report = MonitorReport {
            updates: updates.len(),
            slope_regions: slope_regions.len(),
        };
        trace!("Monitor closed: {:?}", report);
        report
    }
}

impl Drop for TerrainUpdateMonitor<'_> {
    fn drop(&mut self) {
        if !self.ended {
            warn!("Terrain update monitor dropped without end, flushing {} updates", self.pending.len());
            self.finish();
        }
    }
}
