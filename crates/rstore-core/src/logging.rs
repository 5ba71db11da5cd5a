#![forbid(unsafe_code)]

//! Logging shims.
//!
//! With the `tracing` feature enabled this module re-exports the `tracing`
//! macros used by the crate. Without it, the crate-root macros of the same
//! names expand to nothing, so call sites stay identical in both builds:
//!
//! ```ignore
//! #[cfg(feature = "tracing")]
//! use crate::logging::debug;
//! #[cfg(not(feature = "tracing"))]
//! use crate::debug;
//! ```

#[cfg(feature = "tracing")]
pub use tracing::{debug, trace, warn};

/// No-op `debug!` used when the `tracing` feature is disabled.
#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {{}};
}

/// No-op `trace!` used when the `tracing` feature is disabled.
#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {{}};
}

/// No-op `warn!` used when the `tracing` feature is disabled.
#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{}};
}
