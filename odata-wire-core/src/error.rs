use crate::catalog::PayloadKind;

/// Error type for media-type parsing and content negotiation.
///
/// Negotiation failures carry the raw header text and a rendering of the
/// candidate catalog so callers can produce a useful diagnostic without
/// re-running the negotiation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// No candidate media type satisfied the Accept header for the payload kind.
    #[error("content-type negotiation failed: none of the supported media types [{supported}] matches the Accept header '{header}'")]
    ContentTypeNegotiationFailed {
        /// The raw Accept (or Content-Type) header text that was matched.
        header: String,
        /// Comma-separated rendering of the candidate catalog entries.
        supported: String,
    },
    /// An explicitly requested format has no media type registered for the payload kind.
    #[error("no default media type is registered for payload kind {kind:?}")]
    NoDefaultMediaType {
        /// The payload kind whose catalog had no suitable entry.
        kind: PayloadKind,
    },
    /// Media-type text that does not follow the RFC 2616 grammar, or a
    /// Content-Type header carrying more than one media type.
    #[error("malformed content type: {detail}")]
    MalformedContentType {
        /// What was wrong with the text.
        detail: String,
    },
    /// A wildcard type or subtype appeared where a concrete media type is required.
    #[error("wildcard media type '{media_type}' is not allowed in a Content-Type header")]
    WildcardNotAllowed {
        /// The offending media type, rendered back to text.
        media_type: String,
    },
    /// Accept-Charset text that does not follow the RFC 2616 grammar.
    #[error("malformed Accept-Charset: {detail}")]
    MalformedCharset {
        /// What was wrong with the text.
        detail: String,
    },
}
