#![forbid(unsafe_code)]

//! Per-action lifecycle tracking.
//!
//! # Design
//!
//! A [`Tracker`] wraps actions so each call emits `Pending` synchronously,
//! then `Resolved` or `Rejected` when the underlying future settles. Every
//! transition replaces the tracker's [`ActionsState`] snapshot. The
//! [`PhaseEvent`] and the snapshot it produced travel together through one
//! ordered listener set, so a transition triggered from inside a listener is
//! delivered after the current one, with its own snapshot.
//!
//! # Invariants
//!
//! 1. Each call of a wrapped action emits exactly one `Pending` and exactly
//!    one settling phase, both tagged with the same invocation number.
//! 2. Results and errors pass through unchanged.
//! 3. After [`Tracker::unsubscribe`] (or once every tracker handle is
//!    dropped) no further transitions are delivered, but wrapped actions keep
//!    running and keep returning their results.
//! 4. Transitions are delivered one at a time, never batched.
//!
//! # Failure Modes
//!
//! - **Executor discards the body**: a body refused at spawn time or dropped
//!   by a shutting-down executor never settles on its own. The invocation is
//!   reported as `Rejected`, matching the handle's
//!   [`ActionError::Abandoned`](crate::action::ActionError::Abandoned).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use rstore_core::{ListenerSet, Subscription};
use web_time::Instant;

use crate::action::{Action, Transition};
use crate::name::ActionName;
use crate::phase::{ActionPhase, PhaseEvent};
use crate::state::ActionsState;

static NEXT_TRACKER_ID: AtomicU64 = AtomicU64::new(1);

fn next_tracker_id() -> u64 {
    NEXT_TRACKER_ID.fetch_add(1, Ordering::Relaxed)
}

/// A phase event together with the snapshot it produced.
struct PhaseChange {
    event: PhaseEvent,
    snapshot: ActionsState,
}

struct TrackerInner {
    id: u64,
    state: RefCell<ActionsState>,
    transitions: ListenerSet<PhaseChange>,
    live: Cell<bool>,
    next_invocation: Cell<u64>,
}

impl TrackerInner {
    /// Emit `Pending` for a new invocation. Returns its number, or `None`
    /// when the tracker no longer delivers events.
    fn begin(&self, name: &ActionName) -> Option<u64> {
        if !self.live.get() {
            return None;
        }
        let invocation = self.next_invocation.get();
        self.next_invocation.set(invocation + 1);
        self.transition(name, ActionPhase::Pending, invocation, None);
        Some(invocation)
    }

    fn transition(
        &self,
        name: &ActionName,
        phase: ActionPhase,
        invocation: u64,
        elapsed_us: Option<u64>,
    ) {
        if !self.live.get() {
            return;
        }
        let snapshot = {
            let mut state = self.state.borrow_mut();
            let next = state.with_phase(name, phase);
            *state = next.clone();
            next
        };
        tracing::debug!(
            tracker = self.id,
            action = %name,
            phase = phase.as_str(),
            invocation,
            in_flight = snapshot.get(name.as_str()),
            elapsed_us,
            "action.phase"
        );
        self.transitions.emit(PhaseChange {
            event: PhaseEvent {
                name: name.clone(),
                phase,
                invocation,
            },
            snapshot,
        });
    }
}

/// Settles one invocation exactly once, when the body completes or when the
/// executor discards it.
struct Settle {
    tracker: Weak<TrackerInner>,
    name: ActionName,
    invocation: u64,
    started: Instant,
    open: bool,
}

impl Settle {
    fn begin(tracker: Weak<TrackerInner>, name: ActionName) -> Self {
        let invocation = tracker.upgrade().and_then(|inner| inner.begin(&name));
        Self {
            tracker,
            name,
            invocation: invocation.unwrap_or(0),
            started: Instant::now(),
            open: invocation.is_some(),
        }
    }

    fn settle(mut self, phase: ActionPhase) {
        self.finish(phase);
    }

    fn finish(&mut self, phase: ActionPhase) {
        if !std::mem::replace(&mut self.open, false) {
            return;
        }
        let elapsed_us = u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        if let Some(inner) = self.tracker.upgrade() {
            inner.transition(&self.name, phase, self.invocation, Some(elapsed_us));
        }
    }
}

impl Drop for Settle {
    fn drop(&mut self) {
        self.finish(ActionPhase::Rejected);
    }
}

/// Wraps actions so their lifecycle is observable, and aggregates the
/// per-name in-flight counters.
///
/// Cloning a `Tracker` creates a new handle to the **same** tracker.
#[derive(Clone)]
pub struct Tracker {
    inner: Rc<TrackerInner>,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("id", &self.inner.id)
            .field("state", &*self.inner.state.borrow())
            .field("live", &self.inner.live.get())
            .finish()
    }
}

impl Tracker {
    /// Create a tracker with an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TrackerInner {
                id: next_tracker_id(),
                state: RefCell::new(ActionsState::new()),
                transitions: ListenerSet::new(),
                live: Cell::new(true),
                next_invocation: Cell::new(1),
            }),
        }
    }

    /// Process-unique tracker id (for logs).
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Wrap `action` so each call reports its phases to this tracker.
    ///
    /// The action's name is listed in the snapshot at 0 immediately, without
    /// notifying listeners. The wrapped action runs on the same executor.
    pub fn track<A: 'static, R: 'static, E: 'static>(
        &self,
        action: &Action<A, R, E>,
    ) -> Action<A, R, E> {
        self.register(action.name());
        let tracker = Rc::downgrade(&self.inner);
        let underlying = action.transition().clone();
        let transition = Transition::from_boxed(action.name().clone(), move |args: A| {
            let settle = Settle::begin(Weak::clone(&tracker), underlying.name().clone());
            let work = underlying.run(args);
            async move {
                let out = work.await;
                settle.settle(if out.is_ok() {
                    ActionPhase::Resolved
                } else {
                    ActionPhase::Rejected
                });
                out
            }
            .boxed_local()
        });
        Action::from_transition(transition, Rc::clone(action.spawner()))
    }

    /// Wrap every action in `group`.
    pub fn track_all<G: ActionGroup>(&self, group: &G) -> G {
        group.track_with(self)
    }

    fn register(&self, name: &ActionName) {
        let mut state = self.inner.state.borrow_mut();
        let next = state.with_name(name);
        *state = next;
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ActionsState {
        self.inner.state.borrow().clone()
    }

    /// Listen for the full snapshot after every phase transition.
    pub fn on_change(&self, listener: impl Fn(&ActionsState) + 'static) -> Subscription {
        self.inner
            .transitions
            .subscribe(move |change: &PhaseChange| listener(&change.snapshot))
    }

    /// Listen for individual phase transitions.
    pub fn on_phase(&self, listener: impl Fn(&PhaseEvent) + 'static) -> Subscription {
        self.inner
            .transitions
            .subscribe(move |change: &PhaseChange| listener(&change.event))
    }

    /// Stop delivering phase transitions from actions wrapped by this
    /// tracker. In-flight work is not affected. Idempotent.
    pub fn unsubscribe(&self) {
        if self.inner.live.replace(false) {
            tracing::debug!(tracker = self.inner.id, "tracker.unsubscribe");
        }
    }

    /// Whether phase transitions are still delivered.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner.live.get()
    }
}

/// A set of actions a [`Tracker`] can wrap while preserving its shape.
///
/// Implemented for single actions, tuples, and `Vec`s. Application code
/// usually implements it for its own action structs:
///
/// ```
/// use rstore_actions::{Action, ActionGroup, Tracker};
///
/// #[derive(Clone)]
/// struct CounterActions {
///     increment: Action<i64, (), String>,
///     reset: Action<(), (), String>,
/// }
///
/// impl ActionGroup for CounterActions {
///     fn track_with(&self, tracker: &Tracker) -> Self {
///         Self {
///             increment: tracker.track(&self.increment),
///             reset: tracker.track(&self.reset),
///         }
///     }
/// }
/// ```
pub trait ActionGroup: Clone + 'static {
    /// Return a copy of the group with every action wrapped by `tracker`.
    fn track_with(&self, tracker: &Tracker) -> Self;
}

impl<A: 'static, R: 'static, E: 'static> ActionGroup for Action<A, R, E> {
    fn track_with(&self, tracker: &Tracker) -> Self {
        tracker.track(self)
    }
}

impl<G: ActionGroup> ActionGroup for Vec<G> {
    fn track_with(&self, tracker: &Tracker) -> Self {
        self.iter().map(|group| group.track_with(tracker)).collect()
    }
}

macro_rules! impl_group_for_tuple {
    ($($group:ident $value:ident),+) => {
        impl<$($group: ActionGroup),+> ActionGroup for ($($group,)+) {
            fn track_with(&self, tracker: &Tracker) -> Self {
                let ($($value,)+) = self;
                ($($value.track_with(tracker),)+)
            }
        }
    };
}

impl_group_for_tuple!(G1 a);
impl_group_for_tuple!(G1 a, G2 b);
impl_group_for_tuple!(G1 a, G2 b, G3 c);
