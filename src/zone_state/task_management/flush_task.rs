use std::sync::Arc;

use log::trace;
use web_time::Duration;

use super::{
    task::{Task, TaskResult},
    ReplicationStats,
};
use crate::{
    core::WeakResource,
    zone_state::{
        replication::{FlushReservation, FlushStats, PacketCache},
        terrain::Terrain,
    },
};

/// How a flush pass ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    Flushed(FlushStats),
    /// The terrain stayed write-locked for the whole wait budget; nothing was drained.
    Skipped,
    /// The zone shut down before the task ran.
    ZoneClosed,
}

/// Runs one notifier flush pass on a worker thread.
///
/// Packets are encoded under the terrain read lock; the lock is released before any
/// packet reaches the session.
///
/// The task owns the viewer's flush reservation, so no second pass for the same viewer
/// can start until this task has been processed and dropped.
pub struct NotifierFlushTask {
    reservation: FlushReservation,
    terrain: WeakResource<Terrain>,
    cache: Arc<PacketCache>,
    lock_wait: Duration,
}

impl NotifierFlushTask {
    pub fn new(
        reservation: FlushReservation,
        terrain: WeakResource<Terrain>,
        cache: Arc<PacketCache>,
        lock_wait: Duration,
    ) -> Self {
        NotifierFlushTask {
            reservation,
            terrain,
            cache,
            lock_wait,
        }
    }

    fn run(&self) -> FlushOutcome {
        let Some(terrain) = self.terrain.upgrade() else {
            return FlushOutcome::ZoneClosed;
        };
        let prepared = {
            let Some(terrain) = terrain.try_get_for(self.lock_wait) else {
                return FlushOutcome::Skipped;
            };
            self.reservation.prepare(&terrain, &self.cache)
        };
        FlushOutcome::Flushed(self.reservation.deliver(prepared))
    }
}

impl Task for NotifierFlushTask {
    fn process(&self) -> Box<dyn TaskResult + Send> {
        Box::new(FlushTaskResult {
            viewer_id: self.reservation.viewer_id(),
            outcome: self.run(),
        })
    }
}

pub struct FlushTaskResult {
    pub viewer_id: u64,
    pub outcome: FlushOutcome,
}

impl TaskResult for FlushTaskResult {
    fn handle_result(self: Box<Self>, stats: &mut ReplicationStats) -> Vec<Box<dyn Task + Send>> {
        match self.outcome {
            FlushOutcome::Flushed(flush) => stats.record(&flush),
            FlushOutcome::Skipped => {
                trace!("Flush for viewer {} skipped, terrain busy", self.viewer_id);
                stats.skipped += 1;
            }
            FlushOutcome::ZoneClosed => {
                trace!("Flush for viewer {} dropped, zone closed", self.viewer_id);
            }
        }
        Vec::new()
    }
}
