//! Cache key types and construction.
//!
//! This module provides types for building and representing cache keys:
//!
//! - [`CacheKey`] - The complete cache key with prefix, version, and parts
//! - [`KeyPart`] - A single key-value component of a cache key
//!
//! ## Format
//!
//! When rendered as a string, keys follow this format:
//! `{prefix}:v{version}:key1=value1&key2=value2`
//!
//! - Prefix is omitted if empty
//! - Version is omitted if zero
//!
//! ```
//! use backstop_core::{CacheKey, KeyPart};
//!
//! let key = CacheKey::new("models", 1, vec![KeyPart::new("id", Some("42"))]);
//! assert_eq!(key.to_string(), "models:v1:id=42");
//!
//! let key = CacheKey::new("", 0, vec![KeyPart::new("flag", None::<&str>)]);
//! assert_eq!(key.to_string(), "flag");
//! ```
//!
//! ## Determinism
//!
//! [`CacheKey::from_serializable`] builds a key from any [`Serialize`] value.
//! Field order never matters: top-level fields are sorted by name and nested
//! objects are rendered as canonical JSON with recursively sorted keys.
//!
//! ```
//! use backstop_core::CacheKey;
//! use serde_json::json;
//!
//! let a = CacheKey::from_serializable("lookup", &json!({"b": 2, "a": 1})).unwrap();
//! let b = CacheKey::from_serializable("lookup", &json!({"a": 1, "b": 2})).unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.to_string(), "lookup:a=1&b=2");
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use smol_str::SmolStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Part name used when the serialized value is not a JSON object.
const SCALAR_PART: &str = "value";

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
struct CacheKeyInner {
    parts: Vec<KeyPart>,
    version: u32,
    prefix: SmolStr,
}

/// A cache key identifying a memoized entry.
///
/// Cache keys are composed of:
/// - A **prefix** for namespacing (e.g., "models", "voices")
/// - A **version** number for invalidation
/// - A list of **parts** (key-value pairs)
///
/// `CacheKey` wraps its data in [`Arc`], so `clone()` only increments a
/// reference count.
#[derive(Clone, Debug, Serialize)]
#[serde(into = "CacheKeyInner")]
pub struct CacheKey {
    inner: Arc<CacheKeyInner>,
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl From<CacheKey> for CacheKeyInner {
    fn from(key: CacheKey) -> Self {
        Arc::try_unwrap(key.inner).unwrap_or_else(|arc| (*arc).clone())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.inner.prefix.is_empty() {
            write!(f, "{}:", self.inner.prefix)?;
        }
        if self.inner.version > 0 {
            write!(f, "v{}:", self.inner.version)?;
        }
        for (i, part) in self.inner.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "&")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl CacheKey {
    /// Creates a new cache key from its components.
    pub fn new(prefix: &str, version: u32, parts: Vec<KeyPart>) -> Self {
        CacheKey {
            inner: Arc::new(CacheKeyInner {
                parts,
                version,
                prefix: SmolStr::new(prefix),
            }),
        }
    }

    /// Creates a cache key with a single part and no prefix or version.
    pub fn from_str(key: &str, value: &str) -> Self {
        Self::new("", 0, vec![KeyPart::new(key, Some(value))])
    }

    /// Builds a deterministic key from any serializable value.
    ///
    /// Objects contribute one part per top-level field, sorted by field name.
    /// `null` fields become key-only parts and every other value is rendered
    /// with [`canonical_json`], so `1` and `"1"` stay distinct. Values that
    /// are not objects become a single `value` part.
    pub fn from_serializable<T>(prefix: &str, value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        let parts = match serde_json::to_value(value)? {
            Value::Object(map) => {
                let mut fields: Vec<(String, Value)> = map.into_iter().collect();
                fields.sort_by(|a, b| a.0.cmp(&b.0));
                fields
                    .into_iter()
                    .map(|(name, value)| KeyPart::from_json(&name, value))
                    .collect()
            }
            other => vec![KeyPart::from_json(SCALAR_PART, other)],
        };
        Ok(Self::new(prefix, 0, parts))
    }

    /// Returns a new key with the same parts and the given version.
    pub fn with_version(&self, version: u32) -> Self {
        CacheKey {
            inner: Arc::new(CacheKeyInner {
                parts: self.inner.parts.clone(),
                version,
                prefix: self.inner.prefix.clone(),
            }),
        }
    }

    /// Returns the key parts.
    pub fn parts(&self) -> impl Iterator<Item = &KeyPart> {
        self.inner.parts.iter()
    }

    /// Returns the key version.
    pub fn version(&self) -> u32 {
        self.inner.version
    }

    /// Returns the key prefix.
    pub fn prefix(&self) -> &str {
        self.inner.prefix.as_ref()
    }
}

/// A single component of a cache key.
///
/// The value is optional - some parts may be key-only (flags).
///
/// ```
/// use backstop_core::KeyPart;
///
/// let model = KeyPart::new("model", Some("v2"));
/// assert_eq!(model.key(), "model");
/// assert_eq!(model.value(), Some("v2"));
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, serde::Deserialize)]
pub struct KeyPart {
    key: SmolStr,
    value: Option<SmolStr>,
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(ref value) = self.value {
            write!(f, "={}", value)?;
        }
        Ok(())
    }
}

impl KeyPart {
    /// Creates a new key part.
    pub fn new<K: AsRef<str>, V: AsRef<str>>(key: K, value: Option<V>) -> Self {
        KeyPart {
            key: SmolStr::new(key),
            value: value.map(SmolStr::new),
        }
    }

    fn from_json(key: &str, value: Value) -> Self {
        let value = match value {
            Value::Null => None,
            other => Some(SmolStr::new(canonical_json(other))),
        };
        KeyPart {
            key: SmolStr::new(key),
            value,
        }
    }

    /// Returns the key name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the optional value.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// Renders a JSON value with every object's keys sorted, recursively.
///
/// Two values that differ only in field order render identically.
pub fn canonical_json(value: Value) -> String {
    sort_keys(value).to_string()
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
