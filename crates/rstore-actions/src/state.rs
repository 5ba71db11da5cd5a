#![forbid(unsafe_code)]

//! Immutable snapshots of per-action in-flight counters.
//!
//! # Invariants
//!
//! 1. A snapshot is never mutated; every phase transition produces a new one,
//!    so consumers can detect change with [`ActionsState::ptr_eq`].
//! 2. The counter for a name equals the number of invocations of that name
//!    that emitted `Pending` and have not yet settled.
//! 3. Counters are not clamped. A negative value can only come from phase
//!    events arriving without a matching `Pending`, which the tracker never
//!    produces.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::name::ActionName;
use crate::phase::ActionPhase;

/// Mapping from action name to in-flight invocation count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionsState {
    counters: Rc<BTreeMap<ActionName, i64>>,
}

impl ActionsState {
    /// Empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter for `name` (0 if the name is unknown).
    #[must_use]
    pub fn get(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Whether `name` has at least one invocation in flight.
    #[must_use]
    pub fn is_busy(&self, name: &str) -> bool {
        self.get(name) > 0
    }

    /// Whether any action has an invocation in flight.
    #[must_use]
    pub fn any_busy(&self) -> bool {
        self.counters.values().any(|&count| count > 0)
    }

    /// Sum of all counters.
    #[must_use]
    pub fn in_flight(&self) -> i64 {
        self.counters.values().sum()
    }

    /// Number of known action names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether no action name is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Iterate `(name, counter)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&ActionName, i64)> + '_ {
        self.counters.iter().map(|(name, &count)| (name, count))
    }

    /// Whether both snapshots are the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.counters, &other.counters)
    }

    /// New snapshot with `phase` applied to `name`.
    #[must_use]
    pub fn with_phase(&self, name: &ActionName, phase: ActionPhase) -> Self {
        let mut counters = (*self.counters).clone();
        *counters.entry(name.clone()).or_insert(0) += phase.delta();
        Self {
            counters: Rc::new(counters),
        }
    }

    /// Snapshot that lists `name` (at 0 if it was unknown).
    #[must_use]
    pub fn with_name(&self, name: &ActionName) -> Self {
        if self.counters.contains_key(name) {
            return self.clone();
        }
        let mut counters = (*self.counters).clone();
        counters.insert(name.clone(), 0);
        Self {
            counters: Rc::new(counters),
        }
    }
}
