use std::{
    collections::HashSet,
    hash::Hash,
    sync::{Arc, Mutex, PoisonError},
};

/// A set that is only ever replaced, never mutated in place.
///
/// Readers get an `Arc` snapshot. A writer clones the snapshot and extends the clone with
/// no lock held, then takes a short mutex to publish it: if the stored `Arc` is still the
/// one it cloned, the new set replaces it; otherwise the writer starts over from the newer
/// snapshot. The mutex is held only for that pointer check and swap.
pub struct AtomicSet<T> {
    current: Mutex<Arc<HashSet<T>>>,
}

impl<T: Eq + Hash + Clone> AtomicSet<T> {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Arc::new(HashSet::new())),
        }
    }

    /// Returns the current snapshot.
    pub fn load(&self) -> Arc<HashSet<T>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish_if_current(&self, expected: &Arc<HashSet<T>>, next: Arc<HashSet<T>>) -> bool {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::ptr_eq(&current, expected) {
            *current = next;
            true
        } else {
            false
        }
    }

    /// Unions `items` into the set.
    pub fn union<I: IntoIterator<Item = T>>(&self, items: I) {
        let items: Vec<T> = items.into_iter().collect();
        if items.is_empty() {
            return;
        }
        loop {
            let snapshot = self.load();
            if items.iter().all(|item| snapshot.contains(item)) {
                return;
            }
            let mut next = (*snapshot).clone();
            next.extend(items.iter().cloned());
            if self.publish_if_current(&snapshot, Arc::new(next)) {
                return;
            }
        }
    }

    /// Swaps in an empty set and returns everything accumulated so far.
    pub fn take(&self) -> Arc<HashSet<T>> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, Arc::new(HashSet::new()))
    }

    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.load().is_empty()
    }
}

impl<T: Eq + Hash + Clone> Default for AtomicSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
