//! The thread-local slot naming "the task currently being polled on this
//! thread". Stands in for the implicit access a hand-written coroutine
//! promise gives its own awaiters: at most one worker ever has a given task
//! `InProgress`, so the slot unambiguously names "self" for the duration of
//! a single `run()` call.

use std::cell::RefCell;
use std::sync::Arc;

use crate::task::AsyncTask;

thread_local! {
    static CURRENT: RefCell<Option<Arc<dyn AsyncTask>>> = const { RefCell::new(None) };
}

/// Installs `task` as the current task for this thread until the returned
/// guard drops.
pub(crate) fn enter(task: Arc<dyn AsyncTask>) -> EnterGuard {
    CURRENT.with(|slot| *slot.borrow_mut() = Some(task));
    EnterGuard { _private: () }
}

pub(crate) struct EnterGuard {
    _private: (),
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        CURRENT.with(|slot| *slot.borrow_mut() = None);
    }
}

/// Returns the task currently executing on this thread, if any.
pub(crate) fn current() -> Option<Arc<dyn AsyncTask>> {
    CURRENT.with(|slot| slot.borrow().clone())
}
