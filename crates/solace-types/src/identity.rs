//! Client identity keys used to scope admission state.
//!
//! A `ClientIdentity` is an opaque string derived from the network origin or
//! an authenticated principal. It lives in process memory only and is never
//! written to the transcript store.

use std::fmt;

/// Identity shared by every caller whose origin cannot be resolved.
pub const FALLBACK_IDENTITY: &str = "unknown";

/// Opaque per-client key for rate and concurrency accounting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Build an identity from a resolved key.
    ///
    /// Blank keys collapse into the fallback identity so anonymous callers
    /// share one budget instead of bypassing limits.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Self::fallback();
        }
        if trimmed.len() == key.len() {
            Self(key)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// The shared identity for unresolved callers.
    pub fn fallback() -> Self {
        Self(FALLBACK_IDENTITY.to_string())
    }

    /// Resolve an optional key, degrading to the fallback identity.
    pub fn from_resolved(key: Option<String>) -> Self {
        key.map(Self::new).unwrap_or_else(Self::fallback)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_fallback(&self) -> bool {
        self.0 == FALLBACK_IDENTITY
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
