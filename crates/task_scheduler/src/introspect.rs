use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::current;
use crate::id::TaskId;

/// An awaitable yielding the [`TaskId`] of the task currently running on
/// this thread.
///
/// Carried forward from the source's `current_task()` debug helper, which
/// backed a `name()` method and thread-id-hashed log prefixes; here the
/// same thread-local capability is exposed directly so task bodies can tag
/// their own diagnostics, while per-span task/thread fields are attached
/// automatically by the scheduler's `tracing` instrumentation (see
/// [`crate::Scheduler`]).
pub struct CurrentTask {
    _private: (),
}

impl Future for CurrentTask {
    type Output = TaskId;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<TaskId> {
        let task = current::current()
            .expect("current_task() may only be awaited from inside a task body running on a Scheduler");
        Poll::Ready(task.id())
    }
}

/// Resolves to the [`TaskId`] of the task awaiting it.
///
/// # Panics
/// Panics (on poll) if awaited from outside a task body driven by a
/// [`crate::Scheduler`].
#[must_use]
pub fn current_task() -> CurrentTask {
    CurrentTask { _private: () }
}
