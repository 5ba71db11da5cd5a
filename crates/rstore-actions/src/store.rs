#![forbid(unsafe_code)]

//! Binding asynchronous transitions to a repository.
//!
//! A raw [`Transition<A, T, E>`] computes a new state. [`Store::bind`]
//! turns it into `Action<A, (), E>` spawned on the store's executor: on
//! success the result is applied with exactly one `set_state`; on failure the
//! error is returned unchanged and the repository is left alone. The commit
//! happens whether or not the caller keeps the handle.
//!
//! Overlapping invocations are not serialized. Under the default
//! [`Sequencing::LastResolved`] whichever invocation resolves last wins.
//! [`Sequencing::LatestInvoked`] instead discards results that were
//! overtaken by a later-invoked commit.

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::task::LocalSpawn;
use rstore_core::Repository;

use crate::action::{Action, Spawner, Transition};
use crate::config::{Sequencing, StoreConfig};
use crate::name::ActionName;
use crate::tracker::ActionGroup;

/// Ticket bookkeeping shared by every action bound to one store.
#[derive(Debug, Default)]
struct Ledger {
    issued: Cell<u64>,
    /// Ticket of the most recent applied result.
    committed: Cell<u64>,
    commits: Cell<u64>,
    stale: Cell<u64>,
}

impl Ledger {
    fn issue(&self) -> u64 {
        let ticket = self.issued.get() + 1;
        self.issued.set(ticket);
        ticket
    }

    /// Record an applied result. Returns false if a later ticket was
    /// already applied.
    fn admit(&self, ticket: u64) -> bool {
        if ticket < self.committed.get() {
            return false;
        }
        self.committed.set(ticket);
        true
    }
}

/// A repository paired with the policy for applying action results.
///
/// Cloning a `Store` creates a new handle to the **same** repository and
/// ledger.
pub struct Store<T> {
    repository: Repository<T>,
    config: StoreConfig,
    ledger: Rc<Ledger>,
    spawner: Spawner,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            config: self.config.clone(),
            ledger: Rc::clone(&self.ledger),
            spawner: Rc::clone(&self.spawner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("repository", &self.repository)
            .field("config", &self.config)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Store<T> {
    /// Create a store with the default configuration. Bound actions are
    /// spawned on `spawner`.
    #[must_use]
    pub fn new(repository: Repository<T>, spawner: impl LocalSpawn + 'static) -> Self {
        Self::with_config(repository, spawner, StoreConfig::default())
    }

    /// Create a store with an explicit configuration.
    #[must_use]
    pub fn with_config(
        repository: Repository<T>,
        spawner: impl LocalSpawn + 'static,
        config: StoreConfig,
    ) -> Self {
        Self {
            repository,
            config,
            ledger: Rc::new(Ledger::default()),
            spawner: Rc::new(spawner),
        }
    }

    /// The underlying repository.
    #[must_use]
    pub fn repository(&self) -> &Repository<T> {
        &self.repository
    }

    /// The store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Clone of the current state.
    #[must_use]
    pub fn state(&self) -> T {
        self.repository.get()
    }

    /// Number of results applied to the repository.
    #[must_use]
    pub fn commits(&self) -> u64 {
        self.ledger.commits.get()
    }

    /// Number of results discarded as stale under
    /// [`Sequencing::LatestInvoked`].
    #[must_use]
    pub fn stale_discards(&self) -> u64 {
        self.ledger.stale.get()
    }

    /// Bind a transition so its result is applied to the repository.
    pub fn bind<A: 'static, E: 'static>(
        &self,
        transition: &Transition<A, T, E>,
    ) -> Action<A, (), E> {
        let repository = self.repository.clone();
        let ledger = Rc::clone(&self.ledger);
        let sequencing = self.config.sequencing;
        let label = self.config.label.clone();
        let transition = transition.clone();

        let bound = Transition::from_boxed(transition.name().clone(), move |args: A| {
            let ticket = ledger.issue();
            let work = transition.run(args);
            let repository = repository.clone();
            let ledger = Rc::clone(&ledger);
            let label = label.clone();
            let name = transition.name().clone();
            async move {
                let next = work.await?;
                let admitted = ledger.admit(ticket);
                if admitted || sequencing == Sequencing::LastResolved {
                    ledger.commits.set(ledger.commits.get() + 1);
                    tracing::trace!(store = %label, action = %name, ticket, "store.commit");
                    repository.set_state(next);
                } else {
                    ledger.stale.set(ledger.stale.get() + 1);
                    tracing::debug!(
                        store = %label,
                        action = %name,
                        ticket,
                        committed = ledger.committed.get(),
                        "discarding stale action result"
                    );
                }
                Ok::<(), E>(())
            }
            .boxed_local()
        });
        Action::from_transition(bound, Rc::clone(&self.spawner))
    }

    /// Define and bind a transition that receives the state current at
    /// invocation time.
    ///
    /// ```
    /// use futures::executor::LocalPool;
    /// use rstore_actions::Store;
    /// use rstore_core::Repository;
    ///
    /// let mut pool = LocalPool::new();
    /// let store = Store::new(Repository::new(1_i64), pool.spawner());
    /// let add = store.define("add", |current: i64, n: i64| async move { Ok::<_, ()>(current + n) });
    /// add.call(4);
    /// pool.run_until_stalled();
    /// assert_eq!(store.state(), 5);
    /// ```
    pub fn define<A, E, F, Fut>(&self, name: impl Into<ActionName>, f: F) -> Action<A, (), E>
    where
        A: 'static,
        E: 'static,
        F: Fn(T, A) -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        let repository = self.repository.clone();
        let transition = Transition::new(name, move |args: A| f(repository.get(), args));
        self.bind(&transition)
    }

    /// Bind every transition in `definitions`.
    pub fn bind_all<G: Transitions<T>>(&self, definitions: &G) -> G::Bound {
        definitions.bind_to(self)
    }
}

/// A group of raw transitions that a [`Store`] can bind.
///
/// Implemented for single transitions and small tuples. Application code usually
/// implements it for a struct of transitions, producing a struct of bound
/// actions.
pub trait Transitions<T> {
    /// The group with every transition bound.
    type Bound: ActionGroup;

    /// Bind every transition to `store`.
    fn bind_to(&self, store: &Store<T>) -> Self::Bound;
}

impl<T: Clone + 'static, A: 'static, E: 'static> Transitions<T> for Transition<A, T, E> {
    type Bound = Action<A, (), E>;

    fn bind_to(&self, store: &Store<T>) -> Self::Bound {
        store.bind(self)
    }
}

macro_rules! impl_transitions_for_tuple {
    ($($group:ident $value:ident),+) => {
        impl<T, $($group: Transitions<T>),+> Transitions<T> for ($($group,)+) {
            type Bound = ($($group::Bound,)+);

            fn bind_to(&self, store: &Store<T>) -> Self::Bound {
                let ($($value,)+) = self;
                ($($value.bind_to(store),)+)
            }
        }
    };
}

impl_transitions_for_tuple!(G1 a);
impl_transitions_for_tuple!(G1 a, G2 b);
impl_transitions_for_tuple!(G1 a, G2 b, G3 c);

/// A store together with its bound actions.
#[derive(Debug, Clone)]
pub struct BoundStore<T, B> {
    /// The store.
    pub store: Store<T>,
    /// The bound actions.
    pub actions: B,
}

impl<T: Clone + 'static, B> BoundStore<T, B> {
    /// The underlying repository.
    #[must_use]
    pub fn repository(&self) -> &Repository<T> {
        self.store.repository()
    }

    /// The bound actions.
    #[must_use]
    pub fn actions(&self) -> &B {
        &self.actions
    }
}

/// Build a store over `repository` and bind `definitions` to it.
pub fn create_store<T, G>(
    repository: Repository<T>,
    spawner: impl LocalSpawn + 'static,
    definitions: &G,
) -> BoundStore<T, G::Bound>
where
    T: Clone + 'static,
    G: Transitions<T>,
{
    create_store_with(repository, spawner, StoreConfig::default(), definitions)
}

/// Like [`create_store`] with an explicit configuration.
pub fn create_store_with<T, G>(
    repository: Repository<T>,
    spawner: impl LocalSpawn + 'static,
    config: StoreConfig,
    definitions: &G,
) -> BoundStore<T, G::Bound>
where
    T: Clone + 'static,
    G: Transitions<T>,
{
    let store = Store::with_config(repository, spawner, config);
    let actions = store.bind_all(definitions);
    tracing::debug!(store = %store.config().label, "store.created");
    BoundStore { store, actions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionError;
    use futures::channel::oneshot;
    use futures::executor::LocalPool;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        value: i64,
        version: u64,
    }

    type Gate = oneshot::Receiver<Result<Counter, String>>;

    fn gated(name: &'static str) -> Transition<Gate, Counter, String> {
        Transition::new(name, |gate: Gate| async move {
            gate.await.unwrap_or_else(|_| Err("gate dropped".into()))
        })
    }

    fn counter(value: i64, version: u64) -> Counter {
        Counter { value, version }
    }

    #[test]
    fn success_applies_result_once() {
        let mut pool = LocalPool::new();
        let repo = Repository::new(counter(0, 0));
        let store = Store::new(repo.clone(), pool.spawner());
        let notifications = Rc::new(Cell::new(0u32));
        let n = Rc::clone(&notifications);
        let _sub = repo.on_change(move |_, _| n.set(n.get() + 1));

        let set = store.bind(&gated("set"));
        let (tx, rx) = oneshot::channel();
        let handle = set.call(rx);
        tx.send(Ok(counter(5, 1))).unwrap();

        assert_eq!(pool.run_until(handle), Ok(()));
        assert_eq!(repo.get(), counter(5, 1));
        assert_eq!(notifications.get(), 1);
        assert_eq!(store.commits(), 1);
    }

    #[test]
    fn failure_leaves_state_untouched() {
        let mut pool = LocalPool::new();
        let repo = Repository::new(counter(2, 2));
        let store = Store::new(repo.clone(), pool.spawner());
        let set = store.bind(&gated("set"));

        let (tx, rx) = oneshot::channel();
        let handle = set.call(rx);
        tx.send(Err("offline".into())).unwrap();

        assert_eq!(
            pool.run_until(handle),
            Err(ActionError::Failed("offline".to_string()))
        );
        assert_eq!(repo.get(), counter(2, 2));
        assert_eq!(repo.version(), 0);
        assert_eq!(store.commits(), 0);
    }

    #[test]
    fn result_is_applied_after_handle_is_dropped() {
        let mut pool = LocalPool::new();
        let repo = Repository::new(counter(0, 0));
        let store = Store::new(repo.clone(), pool.spawner());
        let set = store.bind(&gated("set"));

        let (tx, rx) = oneshot::channel();
        drop(set.call(rx));
        pool.run_until_stalled();
        assert_eq!(store.commits(), 0);

        tx.send(Ok(counter(4, 1))).unwrap();
        pool.run_until_stalled();
        assert_eq!(repo.get(), counter(4, 1));
        assert_eq!(store.commits(), 1);
    }

    #[test]
    fn last_resolved_wins_by_default() {
        let mut pool = LocalPool::new();
        let repo = Repository::new(counter(0, 0));
        let store = Store::new(repo.clone(), pool.spawner());
        let set = store.bind(&gated("set"));

        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        let first = set.call(rx1);
        let second = set.call(rx2);

        tx2.send(Ok(counter(2, 2))).unwrap();
        pool.run_until(second).unwrap();
        tx1.send(Ok(counter(1, 1))).unwrap();
        pool.run_until(first).unwrap();

        assert_eq!(repo.get(), counter(1, 1));
        assert_eq!(store.stale_discards(), 0);
    }

    #[test]
    fn latest_invoked_discards_stale_results() {
        let mut pool = LocalPool::new();
        let repo = Repository::new(counter(0, 0));
        let store = Store::with_config(
            repo.clone(),
            pool.spawner(),
            StoreConfig::default().with_sequencing(Sequencing::LatestInvoked),
        );
        let set = store.bind(&gated("set"));

        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        let first = set.call(rx1);
        let second = set.call(rx2);

        tx2.send(Ok(counter(2, 2))).unwrap();
        pool.run_until(second).unwrap();
        tx1.send(Ok(counter(1, 1))).unwrap();
        assert_eq!(pool.run_until(first), Ok(()));

        assert_eq!(repo.get(), counter(2, 2));
        assert_eq!(store.stale_discards(), 1);
        assert_eq!(store.commits(), 1);
    }

    #[test]
    fn latest_invoked_applies_in_order_results() {
        let mut pool = LocalPool::new();
        let repo = Repository::new(counter(0, 0));
        let store = Store::with_config(
            repo.clone(),
            pool.spawner(),
            StoreConfig::default().with_sequencing(Sequencing::LatestInvoked),
        );
        let set = store.bind(&gated("set"));

        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        let first = set.call(rx1);
        let second = set.call(rx2);

        tx1.send(Ok(counter(1, 1))).unwrap();
        pool.run_until(first).unwrap();
        tx2.send(Ok(counter(2, 2))).unwrap();
        pool.run_until(second).unwrap();

        assert_eq!(repo.get(), counter(2, 2));
        assert_eq!(store.commits(), 2);
        assert_eq!(store.stale_discards(), 0);
    }

    #[test]
    fn define_sees_current_state() {
        let mut pool = LocalPool::new();
        let store = Store::new(Repository::new(counter(0, 0)), pool.spawner());
        let increment = store.define("increment", |current: Counter, by: i64| async move {
            Ok::<_, String>(Counter {
                value: current.value + by,
                version: current.version + 1,
            })
        });

        pool.run_until(increment.call(1)).unwrap();
        pool.run_until(increment.call(2)).unwrap();
        assert_eq!(store.state(), counter(3, 2));
    }

    #[test]
    fn create_store_binds_tuples() {
        let mut pool = LocalPool::new();
        let repo = Repository::new(counter(0, 0));
        let reset = Transition::new("reset", |()| async { Ok::<_, String>(counter(0, 0)) });
        let bound = create_store(repo.clone(), pool.spawner(), &(gated("set"), reset));
        let (set, reset) = bound.actions().clone();
        assert_eq!(set.name().as_str(), "set");

        let (tx, rx) = oneshot::channel();
        let handle = set.call(rx);
        tx.send(Ok(counter(7, 3))).unwrap();
        pool.run_until(handle).unwrap();
        assert_eq!(bound.repository().get(), counter(7, 3));

        pool.run_until(reset.call(())).unwrap();
        assert_eq!(repo.get(), counter(0, 0));
    }

    #[test]
    fn bound_action_runs_even_without_observer() {
        let mut pool = LocalPool::new();
        let repo = Repository::new(counter(0, 0));
        let store = Store::new(repo.clone(), pool.spawner());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = repo.on_change(move |next: &Counter, _| s.borrow_mut().push(next.value));
        let bump = store.define("bump", |current: Counter, ()| async move {
            Ok::<_, String>(Counter {
                value: current.value + 1,
                ..current
            })
        });

        for _ in 0..3 {
            pool.run_until(bump.call(())).unwrap();
        }
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }
}
