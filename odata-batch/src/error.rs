use crate::state::BatchState;
use crate::writer::Mode;

/// Error type for the batch protocol engine.
///
/// Every failure is terminal for the instance that raised it: the engine
/// latches into its error state and only accepts a flush of already-buffered
/// bytes afterwards. Retrying means constructing a new writer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A lifecycle call that is not legal in the current protocol state.
    #[error("invalid batch protocol state: cannot move from {current:?} to {attempted:?}")]
    InvalidBatchProtocolState {
        /// The state the engine was in when the call arrived.
        current: BatchState,
        /// The state the call attempted to enter.
        attempted: BatchState,
    },
    /// The configured maximum number of top-level batch parts was reached.
    #[error("batch size limit of {limit} part(s) exceeded")]
    BatchSizeLimitExceeded {
        /// The configured limit.
        limit: u32,
    },
    /// The configured maximum number of change-set operations was reached.
    #[error("change-set size limit of {limit} operation(s) exceeded")]
    ChangesetSizeLimitExceeded {
        /// The configured limit.
        limit: u32,
    },
    /// A Content-ID value was declared twice within one change-set.
    #[error("duplicate Content-ID '{0}' within one change-set")]
    DuplicateContentId(String),
    /// A relative operation URI was used without configuring a base URI.
    #[error("relative URI '{uri}' cannot be resolved: no base URI configured")]
    RelativeUriWithoutBase {
        /// The URI as supplied by the caller.
        uri: String,
    },
    /// An operation URI that neither parses as absolute nor resolves against the base.
    #[error("operation URI '{uri}' is malformed")]
    MalformedOperationUri {
        /// The URI as supplied by the caller.
        uri: String,
    },
    /// A call belonging to the other calling convention than the one the
    /// writer was constructed for.
    #[error("writer is fixed to the {constructed} convention; use the matching calls")]
    ModeMismatch {
        /// The convention chosen at construction time.
        constructed: Mode,
    },
    /// A request method that is not allowed in the current scope: only reads
    /// outside change-sets, only writes inside them.
    #[error("method {method} is not allowed here (inside change-set: {in_changeset})")]
    MethodNotAllowedForScope {
        /// The offending request method.
        method: http::Method,
        /// Whether the operation was created inside a change-set.
        in_changeset: bool,
    },
    /// A batch payload that does not follow the multipart framing rules.
    #[error("malformed multipart payload: {0}")]
    MalformedMultipart(String),
    /// Content negotiation failed while preparing the batch envelope.
    #[error(transparent)]
    Negotiation(#[from] odata_wire_core::Error),
    /// The injected byte sink failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
