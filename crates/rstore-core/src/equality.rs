#![forbid(unsafe_code)]

//! Equality tests for selector memoization.
//!
//! A selector only signals its consumer when the equality test reports that
//! the derived value changed. [`structural`] compares with `PartialEq`;
//! [`by_ptr`] compares shared pointers by identity, so a selector that hands
//! back the same `Rc` never signals even if a fresh but equal value would.

use std::rc::Rc;
use std::sync::Arc;

/// Shared equality function.
pub type EqualityFn<S> = Rc<dyn Fn(&S, &S) -> bool>;

/// Values that can be compared by identity.
pub trait SharedPtr {
    /// Whether both handles point at the same allocation.
    fn same_ptr(&self, other: &Self) -> bool;
}

impl<T: ?Sized> SharedPtr for Rc<T> {
    fn same_ptr(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> SharedPtr for Arc<T> {
    fn same_ptr(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: SharedPtr> SharedPtr for Option<T> {
    fn same_ptr(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_ptr(b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// `PartialEq` comparison.
#[must_use]
pub fn structural<S: PartialEq>(a: &S, b: &S) -> bool {
    a == b
}

/// Identity comparison for shared pointers.
#[must_use]
pub fn by_ptr<S: SharedPtr>(a: &S, b: &S) -> bool {
    a.same_ptr(b)
}
