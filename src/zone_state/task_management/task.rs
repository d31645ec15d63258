//! # Task System Core Traits
//!
//! ## Core Components
//! - `Task`: A unit of work executed on a worker thread
//! - `TaskResult`: What a task hands back to the zone thread
//!
//! ## Task Lifecycle
//! 1. A `Task` is scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method runs on a worker thread
//! 3. The task returns a boxed `TaskResult` and is dropped on the worker
//! 4. The result's `handle_result()` runs on the zone thread during
//!    `TaskManager::process_completed_tasks()`
//! 5. The result can fold itself into the zone's replication statistics and spawn
//!    follow-up tasks

use super::ReplicationStats;

/// A unit of work that runs on a worker thread.
///
/// Tasks own everything they touch. Shared zone state is reached through weak handles
/// so that a task outliving its zone finds nothing to work on instead of keeping the zone
/// alive.
pub trait Task: Send {
    /// Performs the work.
    ///
    /// # Returns
    /// A boxed `TaskResult` that will be handled on the zone thread.
    fn process(&self) -> Box<dyn TaskResult + Send>;
}

/// The result of processing a `Task`, handled on the zone thread.
pub trait TaskResult: Send {
    /// Folds the result into `stats`.
    ///
    /// # Returns
    /// Follow-up tasks to schedule (usually none).
    fn handle_result(self: Box<Self>, stats: &mut ReplicationStats) -> Vec<Box<dyn Task + Send>>;
}
