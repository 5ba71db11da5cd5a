#![forbid(unsafe_code)]

//! Consumer-side binding for action lifecycle state.
//!
//! A [`Dispatcher`] owns a private [`Tracker`] and the group of actions it
//! wrapped. [`use_dispatcher`] keeps one per component slot and re-renders
//! the component on every phase transition.

use std::fmt;

use rstore_core::{Hook, Invalidator, RenderCx, Subscription};

use crate::state::ActionsState;
use crate::tracker::{ActionGroup, Tracker};

/// A tracked group of actions and the tracker observing them.
pub struct Dispatcher<G> {
    tracker: Tracker,
    actions: G,
}

impl<G> fmt::Debug for Dispatcher<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl<G: ActionGroup> Dispatcher<G> {
    /// Track every action in `actions` with a fresh tracker.
    #[must_use]
    pub fn new(actions: &G) -> Self {
        let tracker = Tracker::new();
        let actions = tracker.track_all(actions);
        Self { tracker, actions }
    }

    /// Current lifecycle snapshot.
    #[must_use]
    pub fn state(&self) -> ActionsState {
        self.tracker.snapshot()
    }

    /// The tracked actions.
    #[must_use]
    pub fn actions(&self) -> &G {
        &self.actions
    }

    /// The tracker.
    #[must_use]
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Listen for snapshot changes.
    pub fn on_change(&self, listener: impl Fn(&ActionsState) + 'static) -> Subscription {
        self.tracker.on_change(listener)
    }

    /// Stop reporting phase transitions. In-flight actions still complete.
    pub fn unsubscribe(&self) {
        self.tracker.unsubscribe();
    }
}

struct DispatcherHook<G> {
    dispatcher: Dispatcher<G>,
    subscription: Option<Subscription>,
}

impl<G: ActionGroup> Hook for DispatcherHook<G> {
    fn mount(&mut self, invalidator: &Invalidator) {
        let invalidator = invalidator.clone();
        self.subscription = Some(self.dispatcher.on_change(move |_| invalidator.invalidate()));
    }

    fn unmount(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.dispatcher.unsubscribe();
    }
}

/// Track `actions` for the lifetime of the component slot.
///
/// Returns the current snapshot and the tracked actions. The group passed on
/// the first render of a slot is the one tracked; later renders return the
/// same tracked group.
pub fn use_dispatcher<G: ActionGroup>(cx: &mut RenderCx<'_>, actions: &G) -> (ActionsState, G) {
    cx.use_hook(
        || DispatcherHook {
            dispatcher: Dispatcher::new(actions),
            subscription: None,
        },
        |hook| (hook.dispatcher.state(), hook.dispatcher.actions().clone()),
    )
}
