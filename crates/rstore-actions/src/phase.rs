#![forbid(unsafe_code)]

//! Lifecycle phases of a single action invocation.

use std::fmt;

use crate::name::ActionName;

/// Stage of one action invocation.
///
/// Every tracked invocation emits exactly one `Pending` followed by exactly
/// one of `Resolved` or `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionPhase {
    /// Invoked and not yet settled.
    Pending,
    /// Completed successfully.
    Resolved,
    /// Failed, or was dropped before completing.
    Rejected,
}

impl ActionPhase {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }

    /// Change this phase applies to the in-flight counter.
    #[must_use]
    pub const fn delta(self) -> i64 {
        match self {
            Self::Pending => 1,
            Self::Resolved | Self::Rejected => -1,
        }
    }

    /// Whether this phase ends an invocation.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ActionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One phase transition, as delivered to phase listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseEvent {
    /// Action that transitioned.
    pub name: ActionName,
    /// New phase.
    pub phase: ActionPhase,
    /// Per-tracker invocation number, shared by the `Pending` and settling
    /// events of one call.
    pub invocation: u64,
}
