//! # Core Module
//!
//! Concurrency primitives shared by the terrain, simulation and replication code.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking and a
//!   bounded-wait read for background tasks
//! - `WeakResource`: Non-owning handle used by tasks that must not outlive their zone
//! - `AtomicSet`: Immutable set replaced by a snapshot swap under a short mutex, used to accumulate terrain
//!   change notifications from several threads without blocking the tick

pub mod atomic_set;
pub mod mt_resource;

pub use atomic_set::AtomicSet;
pub use mt_resource::{MtResource, WeakResource};
