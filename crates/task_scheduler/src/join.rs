//! Multi-dependency awaiters.
//!
//! A task that needs several results at once can `.await` a single
//! combinator here instead of chaining several `.await`s on individual
//! [`Task`]s. The win over k chained awaits: one suspension instead of k,
//! and the scheduler re-queues the task once instead of k times. On first
//! poll, every element — including ones already `Completed` — is registered
//! as a dependency under a single lock acquisition per element batch,
//! matching the "atomic extension of `deps`" contract; already-complete
//! elements simply satisfy the dependency check on the very next promotion
//! attempt.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::current;
use crate::task::Task;

macro_rules! impl_join {
    ($name:ident, $fn_name:ident, ($($t:ident => $field:ident),+)) => {
        #[doc = concat!(
            "Awaits ", stringify!($($t)+), " together, suspending the current task ",
            "on all of them at once rather than one at a time."
        )]
        pub struct $name<$($t),+> {
            $($field: Task<$t>,)+
        }

        /// Builds a combinator that resolves once every argument task has completed.
        pub fn $fn_name<$($t: Clone + Send + 'static),+>($($field: Task<$t>),+) -> $name<$($t),+> {
            $name { $($field,)+ }
        }

        impl<$($t: Clone + Send + 'static),+> Future for $name<$($t),+> {
            type Output = ($($t,)+);

            fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
                let this = self.get_mut();
                if $(this.$field.is_complete())&&+ {
                    return Poll::Ready(($(this.$field.get_result(),)+));
                }

                let current = current::current().expect(
                    "a dependency group may only be awaited from inside a task body running on a Scheduler"
                );
                current.add_dependencies(vec![$(this.$field.as_dyn()),+]);
                Poll::Pending
            }
        }
    };
}

impl_join!(Join2, join2, (T0 => t0, T1 => t1));
impl_join!(Join3, join3, (T0 => t0, T1 => t1, T2 => t2));
impl_join!(Join4, join4, (T0 => t0, T1 => t1, T2 => t2, T3 => t3));
impl_join!(Join5, join5, (T0 => t0, T1 => t1, T2 => t2, T3 => t3, T4 => t4));
impl_join!(Join6, join6, (T0 => t0, T1 => t1, T2 => t2, T3 => t3, T4 => t4, T5 => t5));
impl_join!(Join7, join7, (T0 => t0, T1 => t1, T2 => t2, T3 => t3, T4 => t4, T5 => t5, T6 => t6));
impl_join!(Join8, join8, (T0 => t0, T1 => t1, T2 => t2, T3 => t3, T4 => t4, T5 => t5, T6 => t6, T7 => t7));

/// Awaits an unbounded, homogeneous set of tasks at once (the `join_all`
/// analogue for when the arity isn't known at compile time).
pub struct JoinAll<T> {
    tasks: Vec<Task<T>>,
}

/// Builds a combinator that resolves once every task in `tasks` has completed.
pub fn join_all<T: Clone + Send + 'static>(tasks: Vec<Task<T>>) -> JoinAll<T> {
    JoinAll { tasks }
}

impl<T: Clone + Send + 'static> Future for JoinAll<T> {
    type Output = Vec<T>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.tasks.iter().all(Task::is_complete) {
            return Poll::Ready(this.tasks.iter().map(Task::get_result).collect());
        }

        let current = current::current()
            .expect("join_all may only be awaited from inside a task body running on a Scheduler");
        current.add_dependencies(this.tasks.iter().map(Task::as_dyn).collect());
        Poll::Pending
    }
}
