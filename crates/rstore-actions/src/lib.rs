#![forbid(unsafe_code)]

//! Asynchronous actions for rstore.
//!
//! - [`Transition`]: a named, lazy async function with an explicit argument
//!   type. [`Action`]: a transition paired with its executor; calling it
//!   spawns the body, which runs to completion.
//! - [`Store`] / [`create_store`]: bind transitions to a
//!   [`Repository`](rstore_core::Repository) so each successful result
//!   replaces the state.
//! - [`Tracker`]: wrap actions to observe `Pending`, `Resolved` and
//!   `Rejected` phases and keep per-name in-flight counters.
//! - [`Dispatcher`] / [`use_dispatcher`]: hook-style access to tracked
//!   actions and their [`ActionsState`].
//!
//! All futures are `!Send`; invocations are spawned on a single-threaded
//! executor implementing `futures::task::LocalSpawn`.

pub mod action;
pub mod config;
pub mod dispatcher;
pub mod name;
pub mod phase;
pub mod state;
pub mod store;
pub mod tracker;

pub use action::{Action, ActionError, ActionFuture, ActionHandle, Spawner, Transition};
pub use config::{ConfigError, Sequencing, StoreConfig};
pub use dispatcher::{Dispatcher, use_dispatcher};
pub use name::ActionName;
pub use phase::{ActionPhase, PhaseEvent};
pub use state::ActionsState;
pub use store::{BoundStore, Store, Transitions, create_store, create_store_with};
pub use tracker::{ActionGroup, Tracker};
