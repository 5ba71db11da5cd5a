#![forbid(unsafe_code)]

//! Memoized slices of repository state.
//!
//! # Design
//!
//! [`Selector<T, S>`] pairs a pure `select: &T -> S` with an equality test.
//! The derived value is computed once on first use and cached. While the
//! selector is attached, every repository change recomputes the slice; the
//! consumer signal fires only when the equality test reports a difference.
//!
//! # Invariants
//!
//! 1. `select` runs exactly once on first use, then once per change
//!    notification while attached (plus once per attach to refresh).
//! 2. The signal fires at most once per repository notification, and only
//!    when `!equal(&new, &cached)`.
//! 3. An attached selector holds exactly one repository subscription;
//!    detaching (or dropping the last handle) releases it.
//!
//! # Failure Modes
//!
//! - **Re-entrant write**: calling `set_state` on the source repository from
//!   inside [`Selector::with`] panics (the cache is mutably borrowed).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::equality::{self, EqualityFn};
use crate::error::AttachError;
use crate::listeners::Subscription;
use crate::repository::Repository;

#[cfg(feature = "tracing")]
use crate::logging::trace;
#[cfg(not(feature = "tracing"))]
use crate::trace;

type Signal<S> = Rc<dyn Fn(&S)>;

struct SelectorInner<T, S> {
    repository: Repository<T>,
    select: Box<dyn Fn(&T) -> S>,
    equal: EqualityFn<S>,
    /// Cached slice (None only before first use).
    cached: Option<S>,
    /// Bumped each time the cached slice is replaced.
    version: u64,
    recomputes: u64,
    signal: Option<Signal<S>>,
    subscription: Option<Subscription>,
}

impl<T, S> SelectorInner<T, S> {
    /// Compute from `state` and store the result if it differs from the
    /// cache. Returns whether the cache changed.
    fn refresh(&mut self, state: &T) -> bool {
        let fresh = (self.select)(state);
        self.recomputes += 1;
        let unchanged = self
            .cached
            .as_ref()
            .is_some_and(|cached| (self.equal)(&fresh, cached));
        if unchanged {
            return false;
        }
        self.cached = Some(fresh);
        self.version += 1;
        true
    }
}

/// A derived, memoized view of a [`Repository`].
///
/// Cloning a `Selector` creates a new handle to the **same** cache and
/// subscription.
pub struct Selector<T, S> {
    inner: Rc<RefCell<SelectorInner<T, S>>>,
}

impl<T, S> Clone for Selector<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, S: fmt::Debug> fmt::Debug for Selector<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Selector")
            .field("cached", &inner.cached)
            .field("version", &inner.version)
            .field("attached", &inner.subscription.is_some())
            .finish()
    }
}

impl<T: Clone + 'static, S: Clone + 'static> Selector<T, S> {
    /// Create a selector that compares slices with `PartialEq`.
    ///
    /// This is the default, in place of reference identity. For identity
    /// comparison of shared slices (`Rc`/`Arc`), pass
    /// [`equality::by_ptr`](crate::equality::by_ptr) to
    /// [`Selector::with_equality`].
    pub fn new(repository: &Repository<T>, select: impl Fn(&T) -> S + 'static) -> Self
    where
        S: PartialEq,
    {
        Self::with_equality(repository, select, equality::structural::<S>)
    }

    /// Create a selector with a custom equality test.
    pub fn with_equality(
        repository: &Repository<T>,
        select: impl Fn(&T) -> S + 'static,
        equal: impl Fn(&S, &S) -> bool + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SelectorInner {
                repository: repository.clone(),
                select: Box::new(select),
                equal: Rc::new(equal),
                cached: None,
                version: 0,
                recomputes: 0,
                signal: None,
                subscription: None,
            })),
        }
    }

    /// Current slice, computing it on first use.
    #[must_use]
    pub fn get(&self) -> S {
        self.with(S::clone)
    }

    /// Access the current slice by reference, computing it on first use.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let select = &inner.select;
        let recomputes = &mut inner.recomputes;
        let version = &mut inner.version;
        let value = inner.cached.get_or_insert_with(|| {
            *recomputes += 1;
            *version += 1;
            inner.repository.with(|state| select(state))
        });
        f(value)
    }

    /// Subscribe to the repository; `signal` is called with the new slice
    /// whenever it changes.
    ///
    /// The cache is refreshed against the current state first, without
    /// signalling.
    pub fn attach(&self, signal: impl Fn(&S) + 'static) -> Result<(), AttachError> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if inner.subscription.is_some() {
            return Err(AttachError::AlreadyAttached);
        }

        let state = inner.repository.get();
        inner.refresh(&state);

        let weak = Rc::downgrade(&self.inner);
        let subscription = inner.repository.on_change(move |next: &T, _previous: &T| {
            if let Some(strong) = weak.upgrade() {
                Self::on_state(&strong, next);
            }
        });
        inner.signal = Some(Rc::new(signal));
        inner.subscription = Some(subscription);
        trace!(version = inner.version, "selector.attach");
        Ok(())
    }

    /// Release the repository subscription. Returns whether the selector was
    /// attached.
    pub fn detach(&self) -> bool {
        let subscription = {
            let mut inner = self.inner.borrow_mut();
            inner.signal = None;
            inner.subscription.take()
        };
        match subscription {
            Some(subscription) => {
                subscription.unsubscribe();
                trace!("selector.detach");
                true
            }
            None => false,
        }
    }

    fn on_state(inner: &RefCell<SelectorInner<T, S>>, next: &T) {
        let notify = {
            let mut inner = inner.borrow_mut();
            if inner.refresh(next) {
                match (inner.signal.clone(), inner.cached.clone()) {
                    (Some(signal), Some(value)) => Some((signal, value)),
                    _ => None,
                }
            } else {
                None
            }
        };
        if let Some((signal, value)) = notify {
            signal(&value);
        }
    }

    /// Whether the selector holds a repository subscription.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.borrow().subscription.is_some()
    }

    /// Number of times the cached slice has been replaced.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of times `select` has run.
    #[must_use]
    pub fn recompute_count(&self) -> u64 {
        self.inner.borrow().recomputes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equality::by_ptr;
    use std::cell::Cell;

    #[derive(Debug, Clone, PartialEq)]
    struct App {
        user: Rc<String>,
        clicks: u32,
    }

    fn app() -> Repository<App> {
        Repository::new(App {
            user: Rc::new("ada".into()),
            clicks: 0,
        })
    }

    fn counter() -> (Rc<Cell<u32>>, impl Fn(&Rc<String>) + 'static) {
        let hits = Rc::new(Cell::new(0u32));
        let h = Rc::clone(&hits);
        (hits, move |_: &Rc<String>| h.set(h.get() + 1))
    }

    #[test]
    fn computes_once_on_first_use() {
        let repo = app();
        let selector = Selector::new(&repo, |s: &App| s.clicks);
        assert_eq!(selector.recompute_count(), 0);

        assert_eq!(selector.get(), 0);
        assert_eq!(selector.get(), 0);
        assert_eq!(selector.recompute_count(), 1);
        assert_eq!(selector.version(), 1);
    }

    #[test]
    fn unchanged_reference_does_not_signal() {
        let repo = app();
        let selector = Selector::with_equality(&repo, |s: &App| Rc::clone(&s.user), by_ptr);
        let (hits, signal) = counter();
        selector.attach(signal).unwrap();

        repo.update(|s| App {
            clicks: s.clicks + 1,
            ..s.clone()
        });
        assert_eq!(hits.get(), 0);
        assert_eq!(selector.recompute_count(), 2);
    }

    #[test]
    fn new_reference_signals_once_per_change() {
        let repo = app();
        let selector = Selector::with_equality(&repo, |s: &App| Rc::clone(&s.user), by_ptr);
        let (hits, signal) = counter();
        selector.attach(signal).unwrap();

        // Equal contents, fresh allocation: identity equality still signals.
        repo.update(|s| App {
            user: Rc::new("ada".into()),
            ..s.clone()
        });
        assert_eq!(hits.get(), 1);

        repo.update(|s| App {
            user: Rc::new("grace".into()),
            ..s.clone()
        });
        assert_eq!(hits.get(), 2);
        assert_eq!(*selector.get(), "grace");
    }

    #[test]
    fn structural_equality_suppresses_equal_values() {
        let repo = app();
        let selector = Selector::new(&repo, |s: &App| s.clicks / 10);
        let hits = Rc::new(Cell::new(0u32));
        let h = Rc::clone(&hits);
        selector.attach(move |_| h.set(h.get() + 1)).unwrap();

        for clicks in 1..=9 {
            repo.update(|s| App { clicks, ..s.clone() });
        }
        assert_eq!(hits.get(), 0);

        repo.update(|s| App {
            clicks: 10,
            ..s.clone()
        });
        assert_eq!(hits.get(), 1);
        assert_eq!(selector.get(), 1);
    }

    #[test]
    fn attach_twice_is_rejected() {
        let repo = app();
        let selector = Selector::new(&repo, |s: &App| s.clicks);
        selector.attach(|_| {}).unwrap();
        assert_eq!(selector.attach(|_| {}), Err(AttachError::AlreadyAttached));
        assert_eq!(repo.listener_count(), 1);
    }

    #[test]
    fn attach_detach_cycles_do_not_leak() {
        let repo = app();
        let selector = Selector::new(&repo, |s: &App| s.clicks);
        for _ in 0..5 {
            selector.attach(|_| {}).unwrap();
            assert_eq!(repo.listener_count(), 1);
            assert!(selector.detach());
            assert_eq!(repo.listener_count(), 0);
        }
        assert!(!selector.detach());
    }

    #[test]
    fn drop_releases_subscription() {
        let repo = app();
        {
            let selector = Selector::new(&repo, |s: &App| s.clicks);
            selector.attach(|_| {}).unwrap();
            assert_eq!(repo.listener_count(), 1);
        }
        assert_eq!(repo.listener_count(), 0);
    }

    #[test]
    fn attach_refreshes_without_signal() {
        let repo = app();
        let selector = Selector::new(&repo, |s: &App| s.clicks);
        assert_eq!(selector.get(), 0);

        repo.update(|s| App {
            clicks: 3,
            ..s.clone()
        });
        let hits = Rc::new(Cell::new(0u32));
        let h = Rc::clone(&hits);
        selector.attach(move |_| h.set(h.get() + 1)).unwrap();

        assert_eq!(selector.get(), 3);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn detached_selector_ignores_changes() {
        let repo = app();
        let selector = Selector::new(&repo, |s: &App| s.clicks);
        selector.attach(|_| {}).unwrap();
        selector.detach();

        repo.update(|s| App {
            clicks: 8,
            ..s.clone()
        });
        assert_eq!(selector.get(), 0);
    }

    #[test]
    fn signal_may_read_selector() {
        let repo = app();
        let selector = Selector::new(&repo, |s: &App| s.clicks);
        let seen = Rc::new(Cell::new(0u32));
        let s = Rc::clone(&seen);
        let reader = selector.clone();
        selector
            .attach(move |v: &u32| {
                assert_eq!(reader.get(), *v);
                s.set(*v);
            })
            .unwrap();

        repo.update(|s| App {
            clicks: 4,
            ..s.clone()
        });
        assert_eq!(seen.get(), 4);
    }

    #[test]
    fn debug_format() {
        let repo = app();
        let selector = Selector::new(&repo, |s: &App| s.clicks);
        let _ = selector.get();
        let dbg = format!("{selector:?}");
        assert!(dbg.contains("Selector"));
        assert!(dbg.contains("attached: false"));
    }
}
