use std::{
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use lru::LruCache;

use super::packet::LayerUpdatePacket;
use crate::zone_state::terrain::{Area, LayerType, Terrain};

type PacketKey = (LayerType, Area, u64);

/// Encoded full-region packets shared by every viewer of a zone.
///
/// Entries are keyed by layer revision, so an edit makes older entries unreachable and the
/// LRU ages them out.
pub struct PacketCache {
    packets: Mutex<LruCache<PacketKey, Arc<Vec<u8>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PacketCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        PacketCache {
            packets: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Encoded update for `area` of `layer`, built on a miss.
    pub fn region_packet(&self, terrain: &Terrain, layer: LayerType, area: Area) -> Arc<Vec<u8>> {
        let key = (layer, area, terrain.layer(layer).revision());
        if let Some(packet) = self
            .packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return packet.clone();
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let packet = Arc::new(LayerUpdatePacket::from_layer(terrain, layer, area).encode());
        self.packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, packet.clone());
        packet
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.packets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
