use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tracing::trace;

use crate::current;
use crate::id::TaskId;

/// A task's position in its lifecycle.
///
/// Transitions: `Initial -> InQueue` (submit), `InQueue -> InProgress`
/// (promotion, only once all dependencies are `Completed`), `InProgress ->
/// Completed` (body finished) or `InProgress -> InQueue` (body suspended
/// having registered new dependencies).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Status {
    Initial = 0,
    InQueue = 1,
    InProgress = 2,
    Completed = 3,
}

impl Status {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Status::Initial,
            1 => Status::InQueue,
            2 => Status::InProgress,
            3 => Status::Completed,
            other => unreachable!("invalid task status byte {other}"),
        }
    }
}

/// The type-erased interface the scheduler drives every task through.
///
/// Mirrors the source's non-generic `AsyncTask` base class: the scheduler
/// never needs to know a task's result type, only its status and
/// dependency list.
pub(crate) trait AsyncTask: Send + Sync {
    fn id(&self) -> TaskId;
    fn status(&self) -> Status;
    fn force_status(&self, to: Status) -> Status;
    fn has_dependencies(&self) -> bool;
    fn dependencies_completed(&self) -> bool;
    fn clear_dependencies(&self);
    fn add_dependency(&self, dep: Arc<dyn AsyncTask>);
    fn add_dependencies(&self, deps: Vec<Arc<dyn AsyncTask>>);
    /// Resumes the body once. Returns `true` if the task is now `Completed`.
    fn run(self: Arc<Self>) -> bool;

    fn is_complete(&self) -> bool {
        self.status() == Status::Completed
    }
}

impl fmt::Debug for dyn AsyncTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncTask")
            .field("id", &self.id())
            .field("status", &self.status())
            .finish()
    }
}

/// Per-task state: status, dependency list, result slot and body, all
/// reachable through a single `Arc`.
///
/// The `Arc`'s strong count *is* the refcount described in the data model;
/// there is no separate hand-rolled counter. The embedded `Future` is the
/// coroutine frame, and `TaskState`'s own `Drop` is the release hook.
pub(crate) struct TaskState<T> {
    id: TaskId,
    status: AtomicU8,
    deps: Mutex<Vec<Arc<dyn AsyncTask>>>,
    body: Mutex<Option<Pin<Box<dyn Future<Output = T> + Send>>>>,
    result: Mutex<Option<T>>,
}

impl<T> TaskState<T> {
    fn new(body: impl Future<Output = T> + Send + 'static) -> Self {
        Self {
            id: TaskId::next(),
            status: AtomicU8::new(Status::Initial as u8),
            deps: Mutex::new(Vec::new()),
            body: Mutex::new(Some(Box::pin(body))),
            result: Mutex::new(None),
        }
    }
}

impl<T> Drop for TaskState<T> {
    fn drop(&mut self) {
        let status = Status::from_u8(self.status.load(Ordering::Acquire));
        debug_assert!(
            !matches!(status, Status::InProgress),
            "task state for {} dropped while still InProgress",
            self.id
        );
    }
}

impl<T: Send + 'static> AsyncTask for TaskState<T> {
    fn id(&self) -> TaskId {
        self.id
    }

    fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    fn force_status(&self, to: Status) -> Status {
        Status::from_u8(self.status.swap(to as u8, Ordering::AcqRel))
    }

    fn has_dependencies(&self) -> bool {
        !self.deps.lock().unwrap().is_empty()
    }

    fn dependencies_completed(&self) -> bool {
        self.deps.lock().unwrap().iter().all(|d| d.is_complete())
    }

    fn clear_dependencies(&self) {
        self.deps.lock().unwrap().clear();
    }

    fn add_dependency(&self, dep: Arc<dyn AsyncTask>) {
        debug_assert!(
            matches!(self.status(), Status::InProgress),
            "add_dependency() called on a task that is not InProgress"
        );
        self.deps.lock().unwrap().push(dep);
    }

    fn add_dependencies(&self, deps: Vec<Arc<dyn AsyncTask>>) {
        debug_assert!(
            matches!(self.status(), Status::InProgress),
            "add_dependencies() called on a task that is not InProgress"
        );
        self.deps.lock().unwrap().extend(deps);
    }

    fn run(self: Arc<Self>) -> bool {
        debug_assert!(
            matches!(self.status(), Status::InProgress),
            "run() called on a task that is not InProgress"
        );

        let current_handle: Arc<dyn AsyncTask> = self.clone();
        let _entered = current::enter(current_handle);

        let mut body = self.body.lock().unwrap();
        let fut = body
            .as_mut()
            .expect("run() called on a task whose body already completed");

        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        let polled = catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(&mut cx)));
        drop(_entered);

        match polled {
            Ok(Poll::Ready(value)) => {
                *self.result.lock().unwrap() = Some(value);
                body.take();
                drop(body);
                self.force_status(Status::Completed);
                trace!(task = %self.id, "task body returned");
                true
            }
            Ok(Poll::Pending) => false,
            Err(_panic) => {
                body.take();
                drop(body);
                self.force_status(Status::Completed);
                tracing::warn!(task = %self.id, "task body panicked; marking completed with no result");
                true
            }
        }
    }
}

impl<T: Clone + Send + 'static> TaskState<T> {
    fn get_result(&self) -> T {
        assert!(
            self.is_complete(),
            "get_result() called before the task completed"
        );
        self.result
            .lock()
            .unwrap()
            .clone()
            .expect("task completed without producing a result (its body panicked)")
    }
}

/// A shared handle to a unit of work with a typed result.
///
/// Cloning a `Task` shares ownership of the same underlying state (the
/// `Arc`'s strong count tracks how many handles, dependents and scheduler
/// queue entries are outstanding); the state itself is only torn down once
/// the last clone drops.
pub struct Task<T> {
    state: Arc<TaskState<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.state.id)
            .field("status", &self.state.status())
            .finish()
    }
}

impl<T: Send + 'static> Task<T> {
    /// Wraps `body` as a new task in state `Initial`. The body never runs
    /// until the task is submitted to a [`crate::Scheduler`].
    pub fn new(body: impl Future<Output = T> + Send + 'static) -> Self {
        Self {
            state: Arc::new(TaskState::new(body)),
        }
    }

    /// The task's process-unique identifier.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.state.id
    }

    /// Whether the task's body has finished running.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    /// Whether the task currently has at least one registered dependency.
    ///
    /// Meaningful mainly between a self-suspension and the next promotion
    /// attempt; the scheduler clears dependencies on promotion.
    #[must_use]
    pub fn has_dependencies(&self) -> bool {
        self.state.has_dependencies()
    }

    pub(crate) fn as_dyn(&self) -> Arc<dyn AsyncTask> {
        self.state.clone()
    }
}

impl<T: Clone + Send + 'static> Task<T> {
    /// Returns a copy of the task's result.
    ///
    /// # Panics
    /// Panics if the task has not yet completed, or if its body panicked
    /// without producing a value.
    #[must_use]
    pub fn get_result(&self) -> T {
        self.state.get_result()
    }
}

impl<T: Clone + Send + 'static> Future for Task<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<T> {
        if self.state.is_complete() {
            return Poll::Ready(self.state.get_result());
        }

        let current = current::current()
            .expect("a Task may only be awaited from inside a task body running on a Scheduler");
        current.add_dependency(self.state.clone());
        Poll::Pending
    }
}
