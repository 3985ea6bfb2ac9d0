use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, instrument, trace};

use crate::config::{SchedulerConfig, MAX_WORKERS, MIN_WORKERS};
use crate::error::{SchedulerError, SchedulerResult};
use crate::task::{AsyncTask, Status, Task};

struct Core {
    queue: Mutex<Vec<Arc<dyn AsyncTask>>>,
    looping: AtomicBool,
    busy_workers: AtomicUsize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    config: SchedulerConfig,
}

static INSTANCE: Mutex<Option<Scheduler>> = Mutex::new(None);

/// The process-wide, dependency-aware task scheduler.
///
/// A `Scheduler` is a cheap handle (an `Arc` around its shared state); clone
/// it freely to pass into code that needs to submit tasks. The process-wide
/// singleton (`create`/`instance`/`destroy`) is a thin convenience layered
/// on top for callers that want the source's `static TaskSystem` ergonomics
/// without threading a value through every call site.
#[derive(Clone)]
pub struct Scheduler {
    core: Arc<Core>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.core.config.workers)
            .field("looping", &self.core.looping.load(Ordering::Relaxed))
            .finish()
    }
}

impl Scheduler {
    /// Starts the process-wide scheduler with `n_threads` workers, clamped
    /// to `[1, 32]`.
    ///
    /// # Errors
    /// Returns [`SchedulerError::AlreadyCreated`] if a scheduler instance is
    /// already live.
    pub fn create(n_threads: usize) -> SchedulerResult<Scheduler> {
        Self::with_config(SchedulerConfig::default().with_workers(n_threads))
    }

    /// Starts the process-wide scheduler with a fully custom [`SchedulerConfig`].
    ///
    /// # Errors
    /// Returns [`SchedulerError::AlreadyCreated`] if a scheduler instance is
    /// already live.
    #[instrument(skip(config), fields(workers = config.workers))]
    pub fn with_config(mut config: SchedulerConfig) -> SchedulerResult<Scheduler> {
        let mut slot = INSTANCE.lock().unwrap();
        if slot.is_some() {
            return Err(SchedulerError::AlreadyCreated);
        }

        config.workers = config.workers.clamp(MIN_WORKERS, MAX_WORKERS);
        config.scan_window = config.scan_window.max(1);

        let core = Arc::new(Core {
            queue: Mutex::new(Vec::new()),
            looping: AtomicBool::new(true),
            busy_workers: AtomicUsize::new(0),
            workers: Mutex::new(Vec::new()),
            config,
        });

        let scheduler = Scheduler { core };
        {
            let mut workers = scheduler.core.workers.lock().unwrap();
            for seed in 0..scheduler.core.config.workers {
                let worker_core = scheduler.core.clone();
                let handle = thread::Builder::new()
                    .name(format!("task-scheduler-worker-{seed}"))
                    .spawn(move || worker_loop(&worker_core, seed))
                    .expect("failed to spawn scheduler worker thread");
                workers.push(handle);
            }
        }

        info!(workers = scheduler.core.config.workers, "scheduler started");
        *slot = Some(scheduler.clone());
        Ok(scheduler)
    }

    /// Returns a handle to the process-wide scheduler instance.
    ///
    /// # Errors
    /// Returns [`SchedulerError::NotCreated`] if no scheduler has been created.
    pub fn instance() -> SchedulerResult<Scheduler> {
        INSTANCE
            .lock()
            .unwrap()
            .clone()
            .ok_or(SchedulerError::NotCreated)
    }

    /// Tears down the process-wide scheduler instance.
    ///
    /// # Errors
    /// Returns [`SchedulerError::NotCreated`] if no scheduler has been created.
    #[instrument]
    pub fn destroy() -> SchedulerResult<()> {
        let scheduler = INSTANCE
            .lock()
            .unwrap()
            .take()
            .ok_or(SchedulerError::NotCreated)?;

        scheduler.core.looping.store(false, Ordering::Release);

        let mut workers = scheduler.core.workers.lock().unwrap();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }

        info!("scheduler destroyed");
        Ok(())
    }

    /// Enqueues `task`. Legal from state `Initial` (first submission) or
    /// `InProgress` (a task re-submitting itself after suspending on a new
    /// dependency).
    ///
    /// # Errors
    /// Returns [`SchedulerError::Decommissioned`] if the scheduler has
    /// already started shutting down.
    pub fn submit<T: Send + 'static>(&self, task: &Task<T>) -> SchedulerResult<()> {
        if !self.core.looping.load(Ordering::Acquire) {
            return Err(SchedulerError::Decommissioned);
        }
        submit_handle(&self.core, task.as_dyn());
        Ok(())
    }

    /// Blocks until the queue drains and no worker is mid-`run()`, then
    /// joins every worker thread.
    ///
    /// Replaces the source's fixed 3-second sleep with explicit quiescence
    /// polling: a task graph may legitimately take longer or shorter than
    /// any fixed constant, so this polls the actual queue-empty /
    /// no-worker-busy condition instead of guessing a timeout.
    ///
    /// After this returns, every task submitted before the call is
    /// `Completed`.
    #[instrument(skip(self))]
    pub fn wait(&self) -> SchedulerResult<()> {
        loop {
            let quiescent = {
                let queue = self.core.queue.lock().unwrap();
                queue.is_empty() && self.core.busy_workers.load(Ordering::Acquire) == 0
            };
            if quiescent {
                break;
            }
            thread::sleep(self.core.config.quiescence_poll);
        }

        self.core.looping.store(false, Ordering::Release);

        let mut workers = self.core.workers.lock().unwrap();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
        drop(workers);

        // Workers may have exited between the quiescence check and the
        // `looping` flip; sweep the whole queue on this thread rather than
        // a single fixed window, so a straggler outside the first
        // `scan_window` entries still gets drained.
        let mut seed = 0usize;
        while !self.core.queue.lock().unwrap().is_empty() {
            if !run_one(&self.core, seed) {
                seed = seed.wrapping_add(1);
            }
        }

        Ok(())
    }
}

fn submit_handle(core: &Core, handle: Arc<dyn AsyncTask>) {
    let prev = handle.force_status(Status::InQueue);
    debug_assert!(
        matches!(prev, Status::Initial | Status::InProgress),
        "submit() called on a task in status {prev:?}"
    );
    trace!(task = %handle.id(), "submitting task");
    core.queue.lock().unwrap().push(handle);
}

/// Scans up to `config.scan_window` queue entries starting at an offset
/// seeded by the caller, looking for the first whose dependencies are all
/// `Completed`. On a hit, promotes it to `InProgress`, clears its
/// dependencies and swap-removes it from the queue.
fn promote(core: &Core, seed: usize) -> Option<Arc<dyn AsyncTask>> {
    let mut queue = core.queue.lock().unwrap();
    let len = queue.len();
    if len == 0 {
        return None;
    }

    let window = core.config.scan_window.min(len);
    for i in 0..window {
        let idx = (seed + i) % len;
        if queue[idx].dependencies_completed() {
            let prev = queue[idx].force_status(Status::InProgress);
            debug_assert!(
                matches!(prev, Status::InQueue),
                "promoted task was not InQueue (was {prev:?})"
            );
            let task = queue.swap_remove(idx);
            task.clear_dependencies();
            return Some(task);
        }
    }
    None
}

fn run_one(core: &Core, seed: usize) -> bool {
    let Some(task) = promote(core, seed) else {
        return false;
    };

    core.busy_workers.fetch_add(1, Ordering::AcqRel);
    let id = task.id();
    trace!(task = %id, "running task");
    let completed = task.clone().run();
    core.busy_workers.fetch_sub(1, Ordering::AcqRel);

    if completed {
        debug!(task = %id, "task completed");
    } else {
        debug_assert!(
            task.has_dependencies(),
            "task suspended without registering any new dependency"
        );
        trace!(task = %id, "task suspended, re-queuing");
        submit_handle(core, task);
    }
    true
}

fn worker_loop(core: &Arc<Core>, seed: usize) {
    let mut backoff = core.config.idle_backoff;
    while core.looping.load(Ordering::Acquire) {
        if run_one(core, seed) {
            backoff = core.config.idle_backoff;
            continue;
        }
        thread::sleep(backoff);
        backoff = (backoff * 2).min(core.config.max_idle_backoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Task;
    use serial_test::serial;

    #[test]
    #[serial]
    fn single_task_completes() {
        let scheduler = Scheduler::create(2).unwrap();
        let task = Task::new(async { 111 });
        scheduler.submit(&task).unwrap();
        scheduler.wait().unwrap();
        assert!(task.is_complete());
        assert_eq!(task.get_result(), 111);
        Scheduler::destroy().unwrap();
    }

    #[test]
    #[serial]
    fn linear_chain_resolves_in_dependency_order() {
        let scheduler = Scheduler::create(2).unwrap();
        let a = Task::new(async { 111 });
        let b = {
            let a = a.clone();
            Task::new(async move {
                let v = a.await;
                f64::from(v) + 0.5
            })
        };

        // Submitted out of dependency order, as in the source demo.
        scheduler.submit(&b).unwrap();
        scheduler.submit(&a).unwrap();
        scheduler.wait().unwrap();

        assert_eq!(a.get_result(), 111);
        assert_eq!(b.get_result(), 111.5);
        Scheduler::destroy().unwrap();
    }

    #[test]
    #[serial]
    fn create_clamps_worker_count() {
        let scheduler = Scheduler::create(0).unwrap();
        assert_eq!(scheduler.core.config.workers, 1);
        Scheduler::destroy().unwrap();

        let scheduler = Scheduler::create(1000).unwrap();
        assert_eq!(scheduler.core.config.workers, 32);
        Scheduler::destroy().unwrap();
    }

    #[test]
    #[serial]
    fn double_create_is_rejected() {
        let _scheduler = Scheduler::create(1).unwrap();
        assert!(matches!(Scheduler::create(1), Err(SchedulerError::AlreadyCreated)));
        Scheduler::destroy().unwrap();
    }

    #[test]
    #[serial]
    fn destroy_without_create_is_rejected() {
        assert!(matches!(Scheduler::destroy(), Err(SchedulerError::NotCreated)));
    }

    #[test]
    #[serial]
    fn submit_after_wait_is_decommissioned() {
        let scheduler = Scheduler::create(1).unwrap();
        scheduler.wait().unwrap();
        let task = Task::new(async { 1 });
        assert!(matches!(
            scheduler.submit(&task),
            Err(SchedulerError::Decommissioned)
        ));
        Scheduler::destroy().unwrap();
    }

    #[test]
    #[serial]
    fn wait_on_empty_queue_returns_immediately() {
        let scheduler = Scheduler::create(4).unwrap();
        scheduler.wait().unwrap();
        Scheduler::destroy().unwrap();
    }

    #[test]
    #[serial]
    fn fan_out_over_many_independent_tasks() {
        let scheduler = Scheduler::create(4).unwrap();
        let tasks: Vec<_> = (0..100).map(|i| Task::new(async move { i })).collect();
        for t in &tasks {
            scheduler.submit(t).unwrap();
        }
        scheduler.wait().unwrap();
        for (i, t) in tasks.iter().enumerate() {
            assert!(t.is_complete());
            assert_eq!(t.get_result(), i);
        }
        Scheduler::destroy().unwrap();
    }
}
