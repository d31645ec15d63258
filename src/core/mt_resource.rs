use std::sync::{
    Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError, Weak,
};

use web_time::{Duration, Instant};

/// A thread-safe, reference-counted resource container with read-write locking.
///
/// `MtResource` provides synchronized access to a value of type `T` that can be shared
/// across threads. It uses an `Arc<RwLock<T>>` internally to manage concurrent access.
/// The zone terrain lives in one of these: the simulation tick takes the write side to
/// commit nature passes and slope recomputes, while viewer flush tasks only read.
///
/// # Type Parameters
/// - `T`: The type of the contained resource, must be `Send + Sync`
///
/// # Examples
///
/// ```
/// use zone_terrain::core::MtResource;
///
/// let counter = MtResource::new(0);
/// *counter.get_mut() += 1;
/// assert_eq!(*counter.get(), 1);
/// ```
///
/// # Poisoning
/// A panic while a guard is held poisons the lock. Terrain data stays structurally valid
/// across a panic (every write is a plain cell store), so the guards recover the inner
/// value instead of propagating the poison.
pub struct MtResource<T: Send + Sync> {
    pub resource: Arc<RwLock<T>>,
}

impl<T: Send + Sync + 'static> MtResource<T> {
    /// Creates a new `MtResource` containing the given value.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(RwLock::new(resource)),
        }
    }

    /// Returns a read-only guard that allows reading the contained value.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.resource.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a mutable guard that allows modifying the contained value.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.resource.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tries to take a read guard, waiting at most `budget`.
    ///
    /// This is an advisory, bounded wait: callers that get `None` back are expected to
    /// skip their work for this pass rather than block a writer (the simulation tick).
    ///
    /// # Returns
    /// - `Some(guard)` if the lock was acquired within the budget
    /// - `None` if a writer held the lock for the whole budget
    pub fn try_get_for(&self, budget: Duration) -> Option<RwLockReadGuard<'_, T>> {
        let deadline = Instant::now() + budget;
        loop {
            match self.resource.try_read() {
                Ok(guard) => return Some(guard),
                Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return None;
                    }
                    std::thread::yield_now();
                }
            }
        }
    }

    /// Creates a weak handle that does not keep the resource alive.
    pub fn downgrade(&self) -> WeakResource<T> {
        WeakResource {
            resource: Arc::downgrade(&self.resource),
        }
    }
}

impl<T: Send + Sync> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}

/// Non-owning counterpart of [`MtResource`].
///
/// Background tasks hold one of these so that a zone shutting down (dropping the last
/// `MtResource`) is observed as a failed upgrade instead of keeping the terrain alive.
pub struct WeakResource<T: Send + Sync> {
    resource: Weak<RwLock<T>>,
}

impl<T: Send + Sync + 'static> WeakResource<T> {
    /// Upgrades back to a strong handle if the resource still exists.
    pub fn upgrade(&self) -> Option<MtResource<T>> {
        self.resource
            .upgrade()
            .map(|resource| MtResource { resource })
    }
}

impl<T: Send + Sync> Clone for WeakResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}
