//! Writer settings shared by negotiation and batch framing.

use url::Url;

use crate::catalog::Format;

/// How the payload format is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatSelection {
    /// No preference: the first catalog entry of the payload kind wins.
    #[default]
    Unspecified,
    /// A specific format was requested directly, bypassing Accept matching.
    Explicit(Format),
}

/// Settings a caller supplies before driving the writer.
///
/// Requesting a format directly and supplying an Accept header are mutually
/// exclusive; whichever of [`WriterSettings::with_format`] and
/// [`WriterSettings::with_accept_headers`] is called last wins.
#[derive(Debug, Clone)]
pub struct WriterSettings {
    format: FormatSelection,
    accept: Option<String>,
    accept_charset: Option<String>,
    max_batch_parts: u32,
    max_changeset_operations: u32,
    base_uri: Option<Url>,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            format: FormatSelection::Unspecified,
            accept: None,
            accept_charset: None,
            max_batch_parts: u32::MAX,
            max_changeset_operations: u32::MAX,
            base_uri: None,
        }
    }
}

impl WriterSettings {
    /// Create settings with no format preference and no limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a format directly; clears any previously set Accept headers.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = FormatSelection::Explicit(format);
        self.accept = None;
        self.accept_charset = None;
        self
    }

    /// Negotiate against an Accept header (and optional Accept-Charset);
    /// clears any previously requested format.
    pub fn with_accept_headers(
        mut self,
        accept: impl Into<String>,
        accept_charset: Option<String>,
    ) -> Self {
        self.format = FormatSelection::Unspecified;
        self.accept = Some(accept.into());
        self.accept_charset = accept_charset;
        self
    }

    /// Cap the number of top-level parts in one batch.
    pub fn with_max_batch_parts(mut self, limit: u32) -> Self {
        self.max_batch_parts = limit;
        self
    }

    /// Cap the number of operations in one change-set.
    pub fn with_max_changeset_operations(mut self, limit: u32) -> Self {
        self.max_changeset_operations = limit;
        self
    }

    /// Base URI used to resolve relative operation URIs.
    pub fn with_base_uri(mut self, base: Url) -> Self {
        self.base_uri = Some(base);
        self
    }

    /// The configured format selection.
    pub fn format(&self) -> FormatSelection {
        self.format
    }

    /// The Accept header text, if negotiation by header was requested.
    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    /// The Accept-Charset header text, if any.
    pub fn accept_charset(&self) -> Option<&str> {
        self.accept_charset.as_deref()
    }

    /// Maximum number of top-level parts in one batch.
    pub fn max_batch_parts(&self) -> u32 {
        self.max_batch_parts
    }

    /// Maximum number of operations in one change-set.
    pub fn max_changeset_operations(&self) -> u32 {
        self.max_changeset_operations
    }

    /// The base URI for relative-URI resolution, if configured.
    pub fn base_uri(&self) -> Option<&Url> {
        self.base_uri.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_and_accept_are_mutually_exclusive() {
        let settings = WriterSettings::new()
            .with_accept_headers("application/json", None)
            .with_format(Format::Atom);
        assert_eq!(settings.format(), FormatSelection::Explicit(Format::Atom));
        assert_eq!(settings.accept(), None);

        let settings = WriterSettings::new()
            .with_format(Format::Atom)
            .with_accept_headers("application/json", None);
        assert_eq!(settings.format(), FormatSelection::Unspecified);
        assert_eq!(settings.accept(), Some("application/json"));
    }

    #[test]
    fn limits_default_to_effectively_unbounded() {
        let settings = WriterSettings::new();
        assert_eq!(settings.max_batch_parts(), u32::MAX);
        assert_eq!(settings.max_changeset_operations(), u32::MAX);
    }
}
