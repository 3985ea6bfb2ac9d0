use thiserror::Error;

/// Result alias for the recoverable scheduler-lifecycle errors in this crate.
pub type SchedulerResult<T> = core::result::Result<T, SchedulerError>;

/// Recoverable misuse of the scheduler's lifecycle.
///
/// Everything else this crate can detect wrong (a null/self-cyclic
/// dependency graph, awaiting outside a running task, reading a result
/// before completion) is a programmer contract violation and panics via
/// `assert!`/`debug_assert!` instead of surfacing here.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// `Scheduler::create`/`with_config` called while an instance is already live.
    #[error("a scheduler is already running; call Scheduler::destroy() first")]
    AlreadyCreated,

    /// `Scheduler::instance`/`destroy` called with no scheduler created yet.
    #[error("no scheduler has been created; call Scheduler::create() first")]
    NotCreated,

    /// `submit` called after the scheduler has started shutting down.
    #[error("scheduler has been shut down and no longer accepts tasks")]
    Decommissioned,
}
