#![forbid(unsafe_code)]

//! A single state value plus change notification.
//!
//! # Design
//!
//! [`Repository<T>`] wraps its value in shared, reference-counted storage.
//! The value is never mutated in place: [`set_state`](Repository::set_state)
//! replaces it wholesale and then notifies listeners with `(next, previous)`.
//! There is no diffing at this layer; equal values still notify.
//!
//! # Invariants
//!
//! 1. Each `set_state` call produces exactly one notification per listener.
//! 2. Listeners are notified synchronously, in registration order.
//! 3. `version()` increments by exactly 1 per `set_state` call.
//! 4. A `set_state` issued from inside a listener is delivered as its own
//!    notification after the current one completes. Reads made from inside a
//!    listener already see the newest value.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::listeners::{ListenerSet, Subscription};

#[cfg(feature = "tracing")]
use crate::logging::trace;
#[cfg(not(feature = "tracing"))]
use crate::trace;

/// Payload delivered to change listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    /// The value after the change.
    pub current: T,
    /// The value before the change.
    pub previous: T,
}

struct RepositoryInner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    listeners: ListenerSet<Change<T>>,
}

/// Single source of truth for a piece of application state.
///
/// Cloning a `Repository` creates a new handle to the **same** state.
pub struct Repository<T> {
    inner: Rc<RepositoryInner<T>>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .field("listeners", &self.inner.listeners)
            .finish()
    }
}

/// Create a repository holding `initial`.
#[must_use]
pub fn create_repository<T: Clone + 'static>(initial: T) -> Repository<T> {
    Repository::new(initial)
}

impl<T: Clone + 'static> Repository<T> {
    /// Create a repository holding `initial` at version 0.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(RepositoryInner {
                value: RefCell::new(initial),
                version: Cell::new(0),
                listeners: ListenerSet::new(),
            }),
        }
    }

    /// Replace the current value and notify every listener with
    /// `(next, previous)`.
    pub fn set_state(&self, next: T) {
        let previous = self.inner.value.replace(next.clone());
        let version = self.inner.version.get() + 1;
        self.inner.version.set(version);
        trace!(version, listeners = self.inner.listeners.len(), "repository.set_state");
        self.inner.listeners.emit(Change {
            current: next,
            previous,
        });
    }

    /// Replace the current value with `f(&current)`.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.inner.value.borrow());
        self.set_state(next);
    }

    /// Register a change listener called with `(next, previous)`.
    pub fn on_change(&self, listener: impl Fn(&T, &T) + 'static) -> Subscription {
        self.inner
            .listeners
            .subscribe(move |change: &Change<T>| listener(&change.current, &change.previous))
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Access the current value by reference.
    ///
    /// # Panics
    ///
    /// Panics if the closure calls [`set_state`](Self::set_state) on the same
    /// repository.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Number of `set_state` calls so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of registered change listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Whether two handles refer to the same repository.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
