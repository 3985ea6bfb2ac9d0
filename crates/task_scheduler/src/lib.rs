//! A dependency-aware, multi-threaded scheduler for cooperative, stackless
//! tasks.
//!
//! A task is a unit of work — any `async fn`/`async` block wrapped in
//! [`Task`] — that may suspend itself to await the completion of zero or
//! more other tasks. When every dependency has finished, the scheduler
//! resumes the task on an available worker thread. Tasks may return a
//! typed result, which downstream tasks consume on resumption via
//! `.await`.
//!
//! ```no_run
//! use ewe_task_scheduler::{Scheduler, Task};
//!
//! fn coro1() -> Task<i32> {
//!     Task::new(async { 111 })
//! }
//!
//! fn coro2(a: Task<i32>) -> Task<f64> {
//!     Task::new(async move {
//!         let v = a.await;
//!         f64::from(v) + 0.5
//!     })
//! }
//!
//! let scheduler = Scheduler::create(4).unwrap();
//! let a = coro1();
//! let b = coro2(a.clone());
//! scheduler.submit(&b).unwrap();
//! scheduler.submit(&a).unwrap();
//! scheduler.wait().unwrap();
//!
//! assert_eq!(a.get_result(), 111);
//! assert_eq!(b.get_result(), 111.5);
//! Scheduler::destroy().unwrap();
//! ```

mod config;
mod current;
mod error;
mod id;
mod introspect;
mod join;
mod scheduler;
mod task;

pub use config::SchedulerConfig;
pub use error::{SchedulerError, SchedulerResult};
pub use id::TaskId;
pub use introspect::{current_task, CurrentTask};
pub use join::{join2, join3, join4, join5, join6, join7, join8, join_all};
pub use join::{Join2, Join3, Join4, Join5, Join6, Join7, Join8, JoinAll};
pub use scheduler::Scheduler;
pub use task::Task;
