//! Boundary token generation for multipart framing.

use std::fmt;

use uuid::Uuid;

/// An opaque multipart boundary token.
///
/// Tokens are practically unique, not cryptographically strong. Like the
/// rest of the framing layer, they do not defend against a token colliding
/// with bytes inside an operation body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary(String);

impl Boundary {
    /// A fresh token for a whole batch envelope.
    pub fn for_batch() -> Self {
        Self(format!("batch_{}", Uuid::new_v4()))
    }

    /// A fresh token for one change-set.
    pub fn for_changeset() -> Self {
        Self(format!("changeset_{}", Uuid::new_v4()))
    }

    /// A token with caller-chosen text; used by tests for stable output.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, as it appears after `boundary=` in a Content-Type.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
