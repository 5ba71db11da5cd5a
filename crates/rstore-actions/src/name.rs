#![forbid(unsafe_code)]

//! Action names.

use std::borrow::{Borrow, Cow};
use std::fmt;

/// Name of an action, used as the key of per-action tracking state.
///
/// Cheap to clone for `'static` names; comparisons and hashing match the
/// underlying string, so maps keyed by `ActionName` can be queried by `&str`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionName(Cow<'static, str>);

impl ActionName {
    /// Create a name from a static string.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for ActionName {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for ActionName {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl Borrow<str> for ActionName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ActionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn owned_and_static_compare_equal() {
        assert_eq!(ActionName::from("reset"), ActionName::from(String::from("reset")));
    }

    #[test]
    fn map_lookup_by_str() {
        let mut map = BTreeMap::new();
        map.insert(ActionName::from("increment"), 2);
        assert_eq!(map.get("increment"), Some(&2));
        assert_eq!(map.get("reset"), None);
    }
}
