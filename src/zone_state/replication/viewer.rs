//! Connected viewers and the registry the monitor broadcasts to.

use std::sync::Arc;

use cgmath::Point2;
use log::{debug, info};

use super::notifier::TerrainUpdateNotifier;
use super::update_info::TerrainUpdateInfo;
use crate::{core::MtResource, error::SessionError};

/// The network side of one connected viewer.
///
/// Implementations must be cheap to query: `position` is read once per flush pass.
pub trait ViewerSession: Send + Sync {
    fn id(&self) -> u64;

    /// Latest known world position, used to center the visibility window.
    fn position(&self) -> Point2<i32>;

    fn send_packet(&self, packet: &[u8]) -> Result<(), SessionError>;
}

/// Every viewer currently attached to a zone, each with its own notifier.
pub struct ViewerRegistry {
    notifiers: MtResource<Vec<Arc<TerrainUpdateNotifier>>>,
    zone_width: usize,
    zone_height: usize,
    grid_cell_size: usize,
    visibility_radius: i32,
}

impl ViewerRegistry {
    pub fn new(zone_width: usize, zone_height: usize, grid_cell_size: usize, visibility_radius: i32) -> Self {
        ViewerRegistry {
            notifiers: MtResource::new(Vec::new()),
            zone_width,
            zone_height,
            grid_cell_size,
            visibility_radius,
        }
    }

    /// Attaches a viewer. Reconnecting an id replaces its previous notifier.
    pub fn connect(&self, session: Arc<dyn ViewerSession>) -> Arc<TerrainUpdateNotifier> {
        let id = session.id();
        let notifier = Arc::new(TerrainUpdateNotifier::new(
            session,
            self.zone_width,
            self.zone_height,
            self.grid_cell_size,
            self.visibility_radius,
        ));
        let mut notifiers = self.notifiers.get_mut();
        notifiers.retain(|existing| existing.viewer_id() != id);
        notifiers.push(notifier.clone());
        info!("Viewer {} connected ({} total)", id, notifiers.len());
        notifier
    }

    pub fn disconnect(&self, id: u64) -> bool {
        let mut notifiers = self.notifiers.get_mut();
        let before = notifiers.len();
        notifiers.retain(|existing| existing.viewer_id() != id);
        let removed = notifiers.len() != before;
        if removed {
            info!("Viewer {} disconnected", id);
        }
        removed
    }

    /// Snapshot of the attached notifiers.
    pub fn notifiers(&self) -> Vec<Arc<TerrainUpdateNotifier>> {
        self.notifiers.get().clone()
    }

    /// Hands `updates` to every attached viewer.
    pub fn broadcast(&self, updates: &[TerrainUpdateInfo]) {
        if updates.is_empty() {
            return;
        }
        let notifiers = self.notifiers.get();
        debug!("Broadcasting {} updates to {} viewers", updates.len(), notifiers.len());
        for notifier in notifiers.iter() {
            notifier.enqueue(updates.iter().copied());
        }
    }

    pub fn len(&self) -> usize {
        self.notifiers.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Session fake that records every packet it is asked to send.
    pub struct RecordingSession {
        pub id: u64,
        pub position: Mutex<Point2<i32>>,
        pub packets: Mutex<Vec<Vec<u8>>>,
        pub closed: bool,
    }

    impl RecordingSession {
        pub fn at(id: u64, x: i32, y: i32) -> Arc<Self> {
            Arc::new(RecordingSession {
                id,
                position: Mutex::new(Point2::new(x, y)),
                packets: Mutex::new(Vec::new()),
                closed: false,
            })
        }

        pub fn closed(id: u64, x: i32, y: i32) -> Arc<Self> {
            Arc::new(RecordingSession {
                id,
                position: Mutex::new(Point2::new(x, y)),
                packets: Mutex::new(Vec::new()),
                closed: true,
            })
        }

        pub fn move_to(&self, x: i32, y: i32) {
            *self.position.lock().unwrap() = Point2::new(x, y);
        }

        pub fn sent(&self) -> Vec<Vec<u8>> {
            self.packets.lock().unwrap().clone()
        }
    }

    impl ViewerSession for RecordingSession {
        fn id(&self) -> u64 {
            self.id
        }

        fn position(&self) -> Point2<i32> {
            *self.position.lock().unwrap()
        }

        fn send_packet(&self, packet: &[u8]) -> Result<(), SessionError> {
            if self.closed {
                return Err(SessionError::Closed(self.id));
            }
            self.packets.lock().unwrap().push(packet.to_vec());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSession;
    use super::*;

    #[test]
    fn reconnect_replaces_notifier() {
        let registry = ViewerRegistry::new(16, 16, 8, 8);
        let first = registry.connect(RecordingSession::at(1, 0, 0));
        let second = registry.connect(RecordingSession::at(1, 4, 4));
        registry.connect(RecordingSession::at(2, 0, 0));
        assert_eq!(registry.len(), 2);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(registry.disconnect(1));
        assert!(!registry.disconnect(1));
        assert_eq!(registry.len(), 1);
    }
}
