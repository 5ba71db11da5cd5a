#![forbid(unsafe_code)]

//! Ordered observer lists with RAII subscriptions.
//!
//! [`ListenerSet<E>`] is the notification backbone shared by every reactive
//! type in the crate. It holds an ordered list of `Fn(&E)` callbacks and
//! delivers events to them synchronously.
//!
//! # Invariants
//!
//! 1. Listeners are called in registration order.
//! 2. Every listener observes events in emission order, including events
//!    emitted re-entrantly from inside a listener. A nested `emit` is queued
//!    and dispatched once the current event has reached every listener.
//! 3. A listener removed while an event is being dispatched receives nothing
//!    further, not even the rest of the current event.
//! 4. [`Subscription::unsubscribe`] is idempotent.
//!
//! # Failure Modes
//!
//! - **Listener panics**: the panic propagates to the caller of `emit`.
//!   Queued events are discarded and the set leaves its emitting state, so
//!   later emissions dispatch normally.
//! - **Set dropped first**: outstanding [`Subscription`]s become inert.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<E> = Rc<dyn Fn(&E)>;

struct Entry<E> {
    id: u64,
    callback: Callback<E>,
    active: Rc<Cell<bool>>,
}

struct ListenerState<E> {
    entries: Vec<Entry<E>>,
    next_id: u64,
    queue: VecDeque<E>,
    emitting: bool,
}

impl<E> ListenerState<E> {
    /// Split out inactive entries. The caller drops them after releasing the
    /// borrow, since a callback may own a `Subscription` into this same set.
    fn take_inactive(&mut self) -> Vec<Entry<E>> {
        if self.entries.iter().all(|e| e.active.get()) {
            return Vec::new();
        }
        let entries = std::mem::take(&mut self.entries);
        let (keep, gone): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| e.active.get());
        self.entries = keep;
        gone
    }
}

/// Removal hook used by [`Subscription`] without knowing the event type.
trait Detach {
    fn detach(&self, id: u64);
}

impl<E> Detach for RefCell<ListenerState<E>> {
    fn detach(&self, id: u64) {
        // If the set is borrowed we are inside its own bookkeeping; the entry
        // is already inactive and gets pruned on the next subscribe/emit.
        let gone = match self.try_borrow_mut() {
            Ok(mut state) => match state.entries.iter().position(|e| e.id == id) {
                Some(index) => Some(state.entries.remove(index)),
                None => None,
            },
            Err(_) => None,
        };
        drop(gone);
    }
}

/// An ordered list of listeners for events of type `E`.
///
/// Cloning a `ListenerSet` creates a new handle to the **same** list.
pub struct ListenerSet<E> {
    state: Rc<RefCell<ListenerState<E>>>,
}

impl<E> Clone for ListenerSet<E> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<E: 'static> Default for ListenerSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ListenerSet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ListenerSet")
            .field("listeners", &state.entries.len())
            .field("queued", &state.queue.len())
            .field("emitting", &state.emitting)
            .finish()
    }
}

impl<E: 'static> ListenerSet<E> {
    /// Create an empty listener set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ListenerState {
                entries: Vec::new(),
                next_id: 1,
                queue: VecDeque::new(),
                emitting: false,
            })),
        }
    }

    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe(&self, callback: impl Fn(&E) + 'static) -> Subscription {
        let active = Rc::new(Cell::new(true));
        let (id, gone) = {
            let mut state = self.state.borrow_mut();
            let gone = state.take_inactive();
            let id = state.next_id;
            state.next_id += 1;
            state.entries.push(Entry {
                id,
                callback: Rc::new(callback),
                active: Rc::clone(&active),
            });
            (id, gone)
        };
        drop(gone);

        let owner: Weak<dyn Detach> = Rc::downgrade(&self.state) as Weak<dyn Detach>;
        Subscription {
            id,
            active,
            owner,
            detach_on_drop: true,
        }
    }

    /// Deliver `event` to every registered listener, in registration order.
    ///
    /// Called from inside a listener, the event is queued behind the one
    /// currently dispatching and delivered before the outermost `emit`
    /// returns.
    pub fn emit(&self, event: E) {
        {
            let mut state = self.state.borrow_mut();
            state.queue.push_back(event);
            if state.emitting {
                return;
            }
            state.emitting = true;
        }
        let _guard = EmitGuard { state: &self.state };

        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                match state.queue.pop_front() {
                    Some(event) => {
                        let snapshot: Vec<(Callback<E>, Rc<Cell<bool>>)> = state
                            .entries
                            .iter()
                            .filter(|e| e.active.get())
                            .map(|e| (Rc::clone(&e.callback), Rc::clone(&e.active)))
                            .collect();
                        Some((event, snapshot))
                    }
                    None => None,
                }
            };
            let Some((event, snapshot)) = next else {
                break;
            };
            for (callback, active) in &snapshot {
                if active.get() {
                    callback(&event);
                }
            }
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .borrow()
            .entries
            .iter()
            .filter(|e| e.active.get())
            .count()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resets the emitting flag even if a listener unwinds.
struct EmitGuard<'a, E> {
    state: &'a RefCell<ListenerState<E>>,
}

impl<E> Drop for EmitGuard<'_, E> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.emitting = false;
            if std::thread::panicking() {
                state.queue.clear();
            }
        }
    }
}

/// Handle to a registered listener.
///
/// Dropping the handle unsubscribes. Use [`forget`](Self::forget) to keep the
/// listener for as long as its set lives.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    id: u64,
    active: Rc<Cell<bool>>,
    owner: Weak<dyn Detach>,
    detach_on_drop: bool,
}

impl Subscription {
    /// Remove the listener. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(owner) = self.owner.upgrade() {
            owner.detach(self.id);
        }
    }

    /// Whether the listener is still registered with a live set.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get() && self.owner.strong_count() > 0
    }

    /// Release the handle without unsubscribing.
    pub fn forget(mut self) {
        self.detach_on_drop = false;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detach_on_drop {
            self.unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
