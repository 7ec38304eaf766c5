//! Operation identifier type.
//!
//! `OperationId` is a newtype wrapper around `SmolStr` naming one in-flight
//! operation (usually the request id of the tool call that started it), so an
//! external caller can cancel it later.

use smol_str::SmolStr;
use std::borrow::Borrow;
use std::fmt;

/// Opaque identifier of a cancellable operation.
///
/// # Example
/// ```
/// use backstop_core::OperationId;
///
/// let id = OperationId::new("req-42");
/// assert_eq!(id.as_str(), "req-42");
/// assert_eq!(id, OperationId::from("req-42"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(SmolStr);

impl OperationId {
    /// Creates a new operation id.
    #[inline]
    pub fn new(s: impl Into<SmolStr>) -> Self {
        Self(s.into())
    }

    /// Creates an operation id from a static string (no allocation).
    #[inline]
    pub const fn new_static(s: &'static str) -> Self {
        Self(SmolStr::new_static(s))
    }

    /// Returns the id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for OperationId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for OperationId {
    #[inline]
    fn from(s: String) -> Self {
        Self(SmolStr::from(s))
    }
}

impl From<&String> for OperationId {
    #[inline]
    fn from(s: &String) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<SmolStr> for OperationId {
    #[inline]
    fn from(s: SmolStr) -> Self {
        Self(s)
    }
}

impl AsRef<str> for OperationId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for OperationId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}
