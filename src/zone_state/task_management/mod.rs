//! # Task Management System
//!
//! A small worker pool for zone background work. The zone thread publishes tasks, worker
//! threads run them, and results come back to the zone thread to be handled in order.
//! Replication flush passes are the main customer: every viewer's notifier is flushed on
//! a worker so the simulation tick never waits on packet encoding or session I/O.
//!
//! ## Architecture Overview
//! - `TaskManager`: Central coordinator for task distribution and worker management
//! - `Task`: A unit of work that runs on a worker thread
//! - `TaskResult`: The result of a completed task, which can spawn additional tasks
//! - `TaskChannel`: Communication channel between the zone thread and one worker
//!
//! ## Task Lifecycle
//! 1. Tasks are created and published via `TaskManager::publish_task()`
//! 2. The manager distributes tasks to available worker channels using round-robin
//! 3. Workers process tasks and send back results
//! 4. Results are handled on the zone thread in `process_completed_tasks()`
//! 5. Results can spawn new tasks
//!
//! ## Example Usage
//! ```ignore
//! let mut task_manager = TaskManager::new(config.worker_count);
//! task_manager.publish_task(Box::new(NotifierFlushTask::new(...)));
//!
//! // Once per tick:
//! task_manager.process_completed_tasks(&mut stats);
//! task_manager.process_queued_tasks();
//! ```

pub mod flush_task;
pub mod task;

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, info};
use web_time::{Duration, Instant};

use super::replication::FlushStats;
use task::{Task, TaskResult};

pub use flush_task::{FlushOutcome, NotifierFlushTask};

/// Running totals of every flush result handled by a zone.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplicationStats {
    pub passes: u64,
    pub skipped: u64,
    pub interrupted: u64,
    pub regions: u64,
    pub tiles: u64,
    pub demoted: u64,
    pub bytes: u64,
}

impl ReplicationStats {
    pub fn record(&mut self, flush: &FlushStats) {
        self.passes += 1;
        self.interrupted += flush.interrupted as u64;
        self.regions += flush.regions as u64;
        self.tiles += flush.tiles as u64;
        self.demoted += flush.demoted as u64;
        self.bytes += flush.bytes as u64;
    }
}

/// A communication channel between the zone thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from the zone thread to the worker
/// - `result_receiver`: Receives task results from the worker
/// - `num_tasks_in_flight`: Tracks number of tasks currently being processed
/// - `_worker`: Handle to the worker thread (kept alive by this struct)
#[derive(Debug)]
pub struct TaskChannel {
    task_sender: Sender<Box<dyn Task + Send>>,
    result_receiver: Receiver<Box<dyn TaskResult + Send>>,
    num_tasks_in_flight: usize,
    _worker: JoinHandle<()>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// # Fields
/// - `channels`: Set of active worker channels
/// - `queued_tasks`: Tasks waiting for an available worker
/// - `current_channel`: Index for round-robin scheduling
pub struct TaskManager {
    channels: Vec<TaskChannel>,
    queued_tasks: VecDeque<Box<dyn Task + Send>>,
    current_channel: usize,
}

/// Maximum number of tasks that can be in flight per worker channel.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

impl TaskManager {
    /// Creates a new `TaskManager` with `num_workers` worker threads.
    ///
    /// With zero workers every published task stays queued.
    ///
    /// # Panics
    /// Panics if the underlying thread creation fails.
    pub fn new(num_workers: usize) -> Self {
        let mut channels = Vec::with_capacity(num_workers);
        info!(
            "Starting {} zone workers (available parallelism: {:?})",
            num_workers,
            thread::available_parallelism()
        );

        for index in 0..num_workers {
            let (task_tx, task_rx) = channel::<Box<dyn Task + Send>>();
            let (result_tx, result_rx) = channel::<Box<dyn TaskResult + Send>>();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    let result = task.process();
                    // Release whatever the task holds before the zone thread sees the result.
                    drop(task);
                    let _ = result_tx.send(result);
                }
            };

            let worker = thread::Builder::new()
                .name(format!("zone-worker-{index}"))
                .spawn(task_closure)
                .unwrap_or_else(|error| panic!("cannot spawn zone worker {index}: {error}"));

            channels.push(TaskChannel {
                task_sender: task_tx,
                result_receiver: result_rx,
                num_tasks_in_flight: 0,
                _worker: worker,
            });
        }

        TaskManager {
            channels,
            queued_tasks: VecDeque::new(),
            current_channel: 0,
        }
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was sent to the worker
    /// - `Err(task)` if the worker is gone, handing the task back for requeueing
    fn try_send_task(&mut self, task: Box<dyn Task + Send>, channel_idx: usize) -> Result<(), Box<dyn Task + Send>> {
        match self.channels[channel_idx].task_sender.send(task) {
            Ok(_) => {
                self.channels[channel_idx].num_tasks_in_flight += 1;
                Ok(())
            }
            Err(task) => Err(task.0),
        }
    }

    /// Finds an available worker channel, round-robin from the last used one.
    ///
    /// # Returns
    /// - `Some(usize)` index of a channel below `MAX_TASKS_IN_FLIGHT`
    /// - `None` if all channels are busy or there are no channels
    fn find_available_channel(&self) -> Option<usize> {
        if self.channels.is_empty() {
            return None;
        }

        let start_channel = self.current_channel;
        let mut current = start_channel;
        loop {
            if self.channels[current].num_tasks_in_flight < MAX_TASKS_IN_FLIGHT {
                return Some(current);
            }
            current = (current + 1) % self.channels.len();
            if current == start_channel {
                return None;
            }
        }
    }

    /// Publishes a task for execution.
    ///
    /// # Returns
    /// - `true` if the task was immediately handed to a worker
    /// - `false` if the task was queued because all workers are busy
    pub fn publish_task(&mut self, task: Box<dyn Task + Send>) -> bool {
        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Hands queued tasks to workers, oldest first, until the queue is empty or every
    /// worker is busy.
    pub fn process_queued_tasks(&mut self) {
        while !self.queued_tasks.is_empty() {
            let Some(channel_idx) = self.find_available_channel() else {
                return;
            };
            let Some(task) = self.queued_tasks.pop_front() else {
                return;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(_) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    // Worker disconnected, keep the task and stop for this round.
                    self.queued_tasks.push_front(task);
                    return;
                }
            }
        }
    }

    /// Handles every result the workers have sent back so far.
    ///
    /// Must be called from the zone thread.
    pub fn process_completed_tasks(&mut self, stats: &mut ReplicationStats) {
        let mut tasks_to_queue = Vec::new();
        for channel in &mut self.channels {
            while let Ok(result) = channel.result_receiver.try_recv() {
                channel.num_tasks_in_flight -= 1;
                tasks_to_queue.extend(result.handle_result(stats));
            }
        }

        for task in tasks_to_queue {
            self.publish_task(task);
        }
    }

    pub fn in_flight(&self) -> usize {
        self.channels.iter().map(|channel| channel.num_tasks_in_flight).sum()
    }

    pub fn queued(&self) -> usize {
        self.queued_tasks.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0 && self.queued_tasks.is_empty()
    }

    /// Keeps handling results and scheduling queued tasks until nothing is left or
    /// `budget` runs out.
    ///
    /// # Returns
    /// `true` if the manager went idle within the budget.
    pub fn wait_for_idle(&mut self, stats: &mut ReplicationStats, budget: Duration) -> bool {
        let deadline = Instant::now() + budget;
        loop {
            self.process_completed_tasks(stats);
            self.process_queued_tasks();
            if self.is_idle() {
                return true;
            }
            if Instant::now() >= deadline {
                debug!(
                    "Task manager still busy after {:?}: {} in flight, {} queued",
                    budget,
                    self.in_flight(),
                    self.queued()
                );
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}
