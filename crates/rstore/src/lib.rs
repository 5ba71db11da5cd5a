#![forbid(unsafe_code)]

//! rstore public facade crate.
//!
//! Re-exports the core state primitives and the action layer under one
//! name. Most applications only need the [`prelude`].

pub use rstore_actions as actions;
pub use rstore_core as core;

pub mod prelude {
    pub use rstore_actions::{
        Action, ActionError, ActionGroup, ActionHandle, ActionName, ActionPhase, ActionsState,
        BoundStore, Dispatcher, PhaseEvent, Sequencing, Store, StoreConfig, Tracker, Transition,
        Transitions, create_store, create_store_with, use_dispatcher,
    };
    pub use rstore_core::equality;
    pub use rstore_core::{
        Component, Repository, Selector, Subscription, create_repository, use_selector,
        use_selector_with,
    };
}
