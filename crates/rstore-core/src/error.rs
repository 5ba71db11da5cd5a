#![forbid(unsafe_code)]

//! Error types for the core bindings.

use thiserror::Error;

/// Failure to attach a [`Selector`](crate::Selector) to its repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttachError {
    /// The selector already holds a live subscription.
    #[error("selector is already attached to its repository")]
    AlreadyAttached,
}
