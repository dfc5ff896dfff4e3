//! Content-ID registration and `$id` reference rewriting.
//!
//! Cross-referencing is scoped to one change-set: ids registered while a
//! change-set is open are visible only to operations created later in that
//! same change-set, and the whole cache is discarded when it completes.

use crate::error::{Error, Result};

/// Records Content-ID declarations and rewrites `$id` references.
#[derive(Debug, Clone, Default)]
pub struct ContentIdResolver {
    /// id → absolute request URI of the declaring operation, in declaration order.
    ids: Vec<(String, String)>,
}

impl ContentIdResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a Content-ID declared by an operation, together with that
    /// operation's absolute request URI.
    pub fn register(&mut self, id: impl Into<String>, request_uri: impl Into<String>) -> Result<()> {
        let id = id.into();
        if self.ids.iter().any(|(known, _)| *known == id) {
            return Err(Error::DuplicateContentId(id));
        }
        self.ids.push((id, request_uri.into()));
        Ok(())
    }

    /// Rewrite a `$<id>` reference to the declaring operation's request URI.
    ///
    /// Any other URI shape — including `$` references to ids that were never
    /// declared — returns `None`, and the caller falls back to ordinary
    /// relative/absolute resolution.
    pub fn resolve(&self, uri: &str) -> Option<&str> {
        let id = uri.strip_prefix('$')?;
        self.ids
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, target)| target.as_str())
    }

    /// Forget every registered id; called when a change-set completes.
    pub fn reset(&mut self) {
        self.ids.clear();
    }
}
