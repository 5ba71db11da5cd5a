#![forbid(unsafe_code)]

//! Named asynchronous operations.
//!
//! Two types cover the pipeline:
//!
//! - a [`Transition<A, R, E>`] is a named, lazy async function from an
//!   explicit argument type `A` to `Result<R, E>`. Store binding and tracking
//!   compose transitions without running them.
//! - an [`Action<A, R, E>`] is a transition paired with the executor that
//!   drives it. [`Action::call`] runs the synchronous prologue, spawns the
//!   body and returns an [`ActionHandle`]. A store-bound action has type
//!   `Action<A, (), E>`; a tracked action has the type of the one it wraps.
//!
//! # Invariants
//!
//! 1. Once called, an action runs to completion on its executor. Dropping the
//!    handle detaches the caller; it never cancels the body.
//! 2. The body's result reaches the handle unchanged.
//! 3. A handle reports [`ActionError::Abandoned`] only when the executor
//!    refused the body or discarded it before it settled.
//!
//! Futures are `!Send` and run on a single-threaded executor that implements
//! [`LocalSpawn`] (a `futures` `LocalPool`, or a tokio `LocalSet` adapter).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, ready};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use futures::task::{LocalFutureObj, LocalSpawn};

use crate::name::ActionName;

/// Future produced by a [`Transition`] body.
pub type ActionFuture<R, E> = LocalBoxFuture<'static, Result<R, E>>;

/// Shared handle to the executor invoked actions are spawned on.
pub type Spawner = Rc<dyn LocalSpawn>;

type Run<A, R, E> = Rc<dyn Fn(A) -> ActionFuture<R, E>>;

/// Why an [`ActionHandle`] produced no result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError<E> {
    /// The action's body returned an error.
    #[error("{0}")]
    Failed(E),
    /// The executor dropped the body before it settled.
    #[error("action `{name}` was dropped by its executor before settling")]
    Abandoned { name: ActionName },
}

impl<E> ActionError<E> {
    /// The body's error, if the action failed rather than being abandoned.
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed(err) => Some(err),
            Self::Abandoned { .. } => None,
        }
    }
}

/// A named, lazy asynchronous function.
///
/// Cloning a `Transition` is cheap and yields the same function.
pub struct Transition<A, R, E> {
    name: ActionName,
    run: Run<A, R, E>,
}

impl<A, R, E> Clone for Transition<A, R, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            run: Rc::clone(&self.run),
        }
    }
}

impl<A, R, E> fmt::Debug for Transition<A, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition").field("name", &self.name).finish()
    }
}

impl<A: 'static, R: 'static, E: 'static> Transition<A, R, E> {
    /// Create a transition from an async function.
    pub fn new<F, Fut>(name: impl Into<ActionName>, f: F) -> Self
    where
        F: Fn(A) -> Fut + 'static,
        Fut: Future<Output = Result<R, E>> + 'static,
    {
        Self::from_boxed(name, move |args| f(args).boxed_local())
    }

    /// Create a transition from a function that already returns a boxed
    /// future.
    pub fn from_boxed(
        name: impl Into<ActionName>,
        run: impl Fn(A) -> ActionFuture<R, E> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            run: Rc::new(run),
        }
    }

    /// The transition's name.
    #[must_use]
    pub fn name(&self) -> &ActionName {
        &self.name
    }

    /// Run the synchronous part of the function and return the body.
    ///
    /// Nothing drives the body until it is polled.
    pub fn run(&self, args: A) -> ActionFuture<R, E> {
        (self.run)(args)
    }
}

/// A named asynchronous operation bound to an executor.
///
/// Cloning an `Action` is cheap and yields the same operation.
pub struct Action<A, R, E> {
    transition: Transition<A, R, E>,
    spawner: Spawner,
}

impl<A, R, E> Clone for Action<A, R, E> {
    fn clone(&self) -> Self {
        Self {
            transition: self.transition.clone(),
            spawner: Rc::clone(&self.spawner),
        }
    }
}

impl<A, R, E> fmt::Debug for Action<A, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.transition.name)
            .finish_non_exhaustive()
    }
}

impl<A: 'static, R: 'static, E: 'static> Action<A, R, E> {
    /// Create an action from an async function, spawned on `spawner` when
    /// called.
    ///
    /// ```
    /// use futures::executor::LocalPool;
    /// use rstore_actions::Action;
    ///
    /// let mut pool = LocalPool::new();
    /// let double = Action::new("double", pool.spawner(), |n: i64| async move {
    ///     Ok::<_, String>(n * 2)
    /// });
    /// assert_eq!(pool.run_until(double.call(21)), Ok(42));
    /// ```
    pub fn new<F, Fut>(name: impl Into<ActionName>, spawner: impl LocalSpawn + 'static, f: F) -> Self
    where
        F: Fn(A) -> Fut + 'static,
        Fut: Future<Output = Result<R, E>> + 'static,
    {
        Self::from_transition(Transition::new(name, f), Rc::new(spawner))
    }

    /// Pair a transition with the executor its invocations run on.
    #[must_use]
    pub fn from_transition(transition: Transition<A, R, E>, spawner: Spawner) -> Self {
        Self {
            transition,
            spawner,
        }
    }

    /// The action's name.
    #[must_use]
    pub fn name(&self) -> &ActionName {
        self.transition.name()
    }

    /// The lazy function behind this action.
    #[must_use]
    pub fn transition(&self) -> &Transition<A, R, E> {
        &self.transition
    }

    /// The executor invocations are spawned on.
    #[must_use]
    pub fn spawner(&self) -> &Spawner {
        &self.spawner
    }

    /// Invoke the action.
    ///
    /// Any synchronous prologue (such as tracking) runs now and the body is
    /// spawned immediately. The handle may be awaited for the result or
    /// dropped; either way the body runs to completion.
    pub fn call(&self, args: A) -> ActionHandle<R, E> {
        let body = self.transition.run(args);
        let (tx, rx) = oneshot::channel();
        let task = async move {
            let _ = tx.send(body.await);
        };
        if let Err(err) = self.spawner.spawn_local_obj(LocalFutureObj::new(Box::new(task))) {
            tracing::warn!(action = %self.name(), error = %err, "action.spawn_failed");
        }
        ActionHandle {
            name: self.name().clone(),
            result: rx,
        }
    }
}

/// The result of one [`Action::call`].
///
/// Awaiting yields the body's result; dropping detaches without cancelling.
#[derive(Debug)]
pub struct ActionHandle<R, E> {
    name: ActionName,
    result: oneshot::Receiver<Result<R, E>>,
}

impl<R, E> ActionHandle<R, E> {
    /// Name of the invoked action.
    #[must_use]
    pub fn name(&self) -> &ActionName {
        &self.name
    }
}

impl<R, E> Future for ActionHandle<R, E> {
    type Output = Result<R, ActionError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Poll::Ready(match ready!(this.result.poll_unpin(cx)) {
            Ok(out) => out.map_err(ActionError::Failed),
            Err(oneshot::Canceled) => Err(ActionError::Abandoned {
                name: this.name.clone(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::{LocalPool, block_on};
    use std::cell::Cell;

    #[test]
    fn call_runs_body() {
        let mut pool = LocalPool::new();
        let add = Action::new("add", pool.spawner(), |(a, b): (i32, i32)| async move {
            Ok::<_, ()>(a + b)
        });
        assert_eq!(pool.run_until(add.call((2, 3))), Ok(5));
        assert_eq!(add.name().as_str(), "add");
    }

    #[test]
    fn failure_is_returned() {
        let mut pool = LocalPool::new();
        let fail = Action::new("fail", pool.spawner(), |reason: &'static str| async move {
            Err::<(), _>(reason.to_string())
        });
        let err = pool.run_until(fail.call("nope")).unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert_eq!(err.into_failure(), Some("nope".to_string()));
    }

    #[test]
    fn transition_body_is_lazy() {
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        let transition = Transition::new("lazy", move |()| {
            let r = Rc::clone(&r);
            async move {
                r.set(true);
                Ok::<_, ()>(())
            }
        });

        let fut = transition.run(());
        assert!(!ran.get());
        block_on(fut).unwrap();
        assert!(ran.get());
    }

    #[test]
    fn dropped_handle_does_not_cancel() {
        let mut pool = LocalPool::new();
        let ran = Rc::new(Cell::new(0u32));
        let r = Rc::clone(&ran);
        let bump = Action::new("bump", pool.spawner(), move |()| {
            let r = Rc::clone(&r);
            async move {
                r.set(r.get() + 1);
                Ok::<_, ()>(())
            }
        });

        drop(bump.call(()));
        drop(bump.call(()));
        assert_eq!(ran.get(), 0);
        pool.run_until_stalled();
        assert_eq!(ran.get(), 2);
    }

    #[test]
    fn executor_shutdown_abandons_the_call() {
        let pool = LocalPool::new();
        let (_tx, gate) = oneshot::channel::<()>();
        let wait = Action::new("wait", pool.spawner(), |gate: oneshot::Receiver<()>| async move {
            gate.await.map_err(|_| ())
        });

        let handle = wait.call(gate);
        drop(pool);
        assert_eq!(
            block_on(handle),
            Err(ActionError::Abandoned {
                name: ActionName::from("wait")
            })
        );

        let refused = wait.call(oneshot::channel().1);
        assert!(matches!(block_on(refused), Err(ActionError::Abandoned { .. })));
    }

    #[test]
    fn clones_share_body() {
        let mut pool = LocalPool::new();
        let a = Action::new("id", pool.spawner(), |n: u8| async move { Ok::<_, ()>(n) });
        let b = a.clone();
        assert_eq!(pool.run_until(b.call(7)), Ok(7));
        assert_eq!(format!("{:?}", a.transition()), "Transition { name: ActionName(\"id\") }");
    }
}
