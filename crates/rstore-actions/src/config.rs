#![forbid(unsafe_code)]

//! Store configuration.
//!
//! [`StoreConfig`] is plain data with builder-style setters. It can also be
//! read from the environment:
//!
//! | Variable | Values | Default |
//! |----------|--------|---------|
//! | `RSTORE_STORE_LABEL` | any string | `store` |
//! | `RSTORE_SEQUENCING` | `last-resolved`, `latest-invoked` | `last-resolved` |

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Environment variable naming the store in logs.
pub const ENV_LABEL: &str = "RSTORE_STORE_LABEL";

/// Environment variable selecting the [`Sequencing`] mode.
pub const ENV_SEQUENCING: &str = "RSTORE_SEQUENCING";

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Unrecognized sequencing mode.
    #[error("invalid sequencing mode {value:?} (expected \"last-resolved\" or \"latest-invoked\")")]
    InvalidSequencing {
        /// The rejected value.
        value: String,
    },
}

/// How a store resolves overlapping invocations of its bound actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sequencing {
    /// Every successful result is applied when it resolves, so the
    /// last-to-resolve invocation wins. No ordering is imposed.
    #[default]
    LastResolved,
    /// Each invocation takes a ticket when called. A result whose ticket is
    /// older than the last applied one is discarded, so the most recently
    /// invoked successful action wins.
    LatestInvoked,
}

impl Sequencing {
    /// Stable kebab-case name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastResolved => "last-resolved",
            Self::LatestInvoked => "latest-invoked",
        }
    }
}

impl fmt::Display for Sequencing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sequencing {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-resolved" | "last_resolved" => Ok(Self::LastResolved),
            "latest-invoked" | "latest_invoked" => Ok(Self::LatestInvoked),
            _ => Err(ConfigError::InvalidSequencing {
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration for a [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Name used in log events.
    pub label: Cow<'static, str>,
    /// Policy for overlapping invocations.
    pub sequencing: Sequencing,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            label: Cow::Borrowed("store"),
            sequencing: Sequencing::default(),
        }
    }
}

impl StoreConfig {
    /// Set the log label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the sequencing policy.
    #[must_use]
    pub fn with_sequencing(mut self, sequencing: Sequencing) -> Self {
        self.sequencing = sequencing;
        self
    }

    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, starting from defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(label) = lookup(ENV_LABEL)
            && !label.is_empty()
        {
            config.label = Cow::Owned(label);
        }
        if let Some(value) = lookup(ENV_SEQUENCING) {
            config.sequencing = value.parse()?;
        }
        Ok(config)
    }
}
