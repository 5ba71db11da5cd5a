#![forbid(unsafe_code)]

//! Core: repositories, change subscriptions, memoized selectors, and hook
//! bindings for rendering consumers.
//!
//! - [`Repository`]: a single state value replaced wholesale by
//!   [`set_state`](Repository::set_state), with synchronous change
//!   notification.
//! - [`ListenerSet`] / [`Subscription`]: the ordered observer list behind
//!   every notification in the crate, with RAII unsubscription.
//! - [`Selector`]: a derived slice of repository state that only signals when
//!   the slice changes under an equality test.
//! - [`Component`] / [`use_selector`]: hook-style binding of selectors into a
//!   render cycle, subscribing on mount and unsubscribing on unmount.
//!
//! Everything here is single-threaded (`Rc`-based) and synchronous.

pub mod equality;
pub mod error;
pub mod hooks;
pub mod listeners;
pub mod logging;
pub mod repository;
pub mod selector;

pub use error::AttachError;
pub use hooks::{Component, Hook, Invalidator, RenderCx, use_selector, use_selector_with};
pub use listeners::{ListenerSet, Subscription};
pub use repository::{Change, Repository, create_repository};
pub use selector::Selector;
