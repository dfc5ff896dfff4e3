//! The sink-free framing core of the batch writer.
//!
//! Everything here appends to an internal buffer; the owning writer decides
//! when buffered bytes reach the injected sink. This keeps the state machine
//! and the framing rules independent of the calling convention.
//!
//! Framing follows RFC 2046 §5.1.1: a CRLF precedes every boundary line
//! except the very first one in the message, opening boundary lines are
//! deferred until their scope has real content, and the closing boundary of
//! a scope owns no trailing CRLF.

use http::{Method, StatusCode};
use url::Url;

use odata_wire_core::{Headers, WriterSettings};

use crate::boundary::Boundary;
use crate::content_id::ContentIdResolver;
use crate::error::{Error, Result};
use crate::state::BatchState;

const CRLF: &[u8] = b"\r\n";

/// What must be restored when a scope completes: its token and whether the
/// opening boundary line has been written yet.
#[derive(Debug)]
struct Scope {
    boundary: Boundary,
    opened: bool,
}

impl Scope {
    fn new(boundary: Boundary) -> Self {
        Self { boundary, opened: false }
    }
}

/// The current operation between its creation and the start of the next call.
#[derive(Debug)]
struct Envelope {
    headers: Headers,
    /// Absolute request URI; `None` for response operations.
    resolved_uri: Option<String>,
    in_changeset: bool,
    /// Whether the header block and its terminating blank line were written.
    payload_flushed: bool,
}

#[derive(Debug)]
pub(crate) struct Engine {
    state: BatchState,
    batch_scope: Scope,
    changeset_scope: Option<Scope>,
    /// CRLF placement: true once any boundary line exists in the message.
    any_boundary_written: bool,
    batch_parts: u32,
    changeset_operations: u32,
    max_batch_parts: u32,
    max_changeset_operations: u32,
    base_uri: Option<Url>,
    resolver: ContentIdResolver,
    /// A Content-ID captured from the previous operation, registered when
    /// the next operation begins.
    pending_registration: Option<(String, String)>,
    envelope: Option<Envelope>,
    pending: Vec<u8>,
}

impl Engine {
    pub(crate) fn new(settings: &WriterSettings) -> Self {
        Self {
            state: BatchState::Start,
            batch_scope: Scope::new(Boundary::for_batch()),
            changeset_scope: None,
            any_boundary_written: false,
            batch_parts: 0,
            changeset_operations: 0,
            max_batch_parts: settings.max_batch_parts(),
            max_changeset_operations: settings.max_changeset_operations(),
            base_uri: settings.base_uri().cloned(),
            resolver: ContentIdResolver::new(),
            pending_registration: None,
            envelope: None,
            pending: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> BatchState {
        self.state
    }

    pub(crate) fn batch_boundary(&self) -> &Boundary {
        &self.batch_scope.boundary
    }

    /// Drain everything buffered so far.
    pub(crate) fn take_pending(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }

    /// Move into the absorbing error state.
    pub(crate) fn latch_error(&mut self) {
        if self.state != BatchState::Error {
            tracing::debug!(from = ?self.state, "batch engine latched into error state");
            self.state = BatchState::Error;
        }
    }

    fn commit(&mut self, next: BatchState) {
        tracing::trace!(from = ?self.state, to = ?next, "batch state transition");
        self.state = next;
    }

    pub(crate) fn start_batch(&mut self) -> Result<()> {
        self.state.check(BatchState::BatchStarted)?;
        self.commit(BatchState::BatchStarted);
        Ok(())
    }

    pub(crate) fn end_batch(&mut self) -> Result<()> {
        if self.changeset_scope.is_some() {
            return Err(Error::InvalidBatchProtocolState {
                current: self.state,
                attempted: BatchState::BatchCompleted,
            });
        }
        self.state.check(BatchState::BatchCompleted)?;
        self.retire_envelope();
        self.commit(BatchState::BatchCompleted);
        let token = self.batch_scope.boundary.as_str().to_owned();
        if !self.batch_scope.opened {
            self.emit_boundary(&token, false);
            self.batch_scope.opened = true;
        }
        self.emit_boundary(&token, true);
        Ok(())
    }

    pub(crate) fn start_changeset(&mut self) -> Result<()> {
        if self.changeset_scope.is_some() {
            return Err(Error::InvalidBatchProtocolState {
                current: self.state,
                attempted: BatchState::ChangesetStarted,
            });
        }
        self.state.check(BatchState::ChangesetStarted)?;
        self.retire_envelope();
        self.check_batch_limit()?;
        self.commit(BatchState::ChangesetStarted);

        let changeset = Boundary::for_changeset();
        let batch_token = self.batch_scope.boundary.as_str().to_owned();
        self.emit_boundary(&batch_token, false);
        self.batch_scope.opened = true;
        self.push_line(&format!("Content-Type: multipart/mixed; boundary={changeset}"));
        self.changeset_scope = Some(Scope::new(changeset));
        self.changeset_operations = 0;
        Ok(())
    }

    pub(crate) fn end_changeset(&mut self) -> Result<()> {
        let (token, opened) = match &self.changeset_scope {
            Some(scope) => (scope.boundary.as_str().to_owned(), scope.opened),
            None => {
                return Err(Error::InvalidBatchProtocolState {
                    current: self.state,
                    attempted: BatchState::ChangesetCompleted,
                })
            }
        };
        self.state.check(BatchState::ChangesetCompleted)?;
        self.retire_envelope();
        // An id declared by the change-set's last operation was never
        // captured; it must not leak into the next change-set.
        self.pending_registration = None;
        self.commit(BatchState::ChangesetCompleted);
        if !opened {
            self.emit_boundary(&token, false);
        }
        self.emit_boundary(&token, true);
        self.resolver.reset();
        self.changeset_scope = None;
        Ok(())
    }

    pub(crate) fn create_request_operation(&mut self, method: Method, uri: &str) -> Result<()> {
        self.state.check(BatchState::OperationCreated)?;
        let in_changeset = self.changeset_scope.is_some();
        let is_read = method == Method::GET;
        if in_changeset == is_read {
            return Err(Error::MethodNotAllowedForScope { method, in_changeset });
        }
        self.retire_envelope();
        self.register_pending()?;
        self.check_operation_limit(in_changeset)?;
        let resolved = self.resolve_uri(uri)?;
        self.commit(BatchState::OperationCreated);

        self.begin_part();
        self.push_line(&format!("{method} {resolved} HTTP/1.1"));
        self.envelope = Some(Envelope {
            headers: Headers::new(),
            resolved_uri: Some(resolved),
            in_changeset,
            payload_flushed: false,
        });
        Ok(())
    }

    pub(crate) fn create_response_operation(&mut self, status: StatusCode) -> Result<()> {
        self.state.check(BatchState::OperationCreated)?;
        self.retire_envelope();
        self.register_pending()?;
        let in_changeset = self.changeset_scope.is_some();
        self.check_operation_limit(in_changeset)?;
        self.commit(BatchState::OperationCreated);

        self.begin_part();
        let reason = status.canonical_reason().unwrap_or("");
        self.push_line(&format!("HTTP/1.1 {} {reason}", status.as_str()));
        self.envelope = Some(Envelope {
            headers: Headers::new(),
            resolved_uri: None,
            in_changeset,
            payload_flushed: false,
        });
        Ok(())
    }

    /// Detach the text framing ahead of raw body bytes: write the operation's
    /// header block and hand control to the caller.
    pub(crate) fn open_body(&mut self) -> Result<()> {
        self.state.check(BatchState::OperationStreamOpen)?;
        self.flush_envelope_payload();
        self.commit(BatchState::OperationStreamOpen);
        Ok(())
    }

    pub(crate) fn close_body(&mut self) -> Result<()> {
        self.state.check(BatchState::OperationStreamClosed)?;
        self.commit(BatchState::OperationStreamClosed);
        Ok(())
    }

    /// Drop-path variant of [`Engine::close_body`]: never fails, never latches.
    pub(crate) fn close_body_silently(&mut self) {
        if self.state == BatchState::OperationStreamOpen {
            self.commit(BatchState::OperationStreamClosed);
        }
    }

    /// The current operation's header collection.
    ///
    /// Only called through an operation handle, whose existence guarantees
    /// the envelope is present.
    pub(crate) fn envelope_headers_mut(&mut self) -> &mut Headers {
        let envelope = self
            .envelope
            .as_mut()
            .expect("an operation envelope exists while its handle is alive");
        &mut envelope.headers
    }

    pub(crate) fn envelope_resolved_uri(&self) -> Option<&str> {
        self.envelope.as_ref().and_then(|e| e.resolved_uri.as_deref())
    }

    /// Write the operation's own headers and the terminating blank line, once.
    fn flush_envelope_payload(&mut self) {
        let Some(mut envelope) = self.envelope.take() else {
            return;
        };
        if !envelope.payload_flushed {
            for (name, value) in envelope.headers.iter() {
                self.pending.extend_from_slice(name.as_bytes());
                self.pending.extend_from_slice(b": ");
                self.pending.extend_from_slice(value.as_bytes());
                self.pending.extend_from_slice(CRLF);
            }
            self.pending.extend_from_slice(CRLF);
            envelope.payload_flushed = true;
        }
        self.envelope = Some(envelope);
    }

    /// Finish the previous operation: flush its payload and, for a request
    /// inside a change-set, hold its Content-ID until the next operation
    /// begins — an id is never visible to the operation that declared it.
    fn retire_envelope(&mut self) {
        self.flush_envelope_payload();
        if let Some(envelope) = self.envelope.take() {
            if envelope.in_changeset {
                if let (Some(id), Some(uri)) =
                    (envelope.headers.get("Content-ID"), envelope.resolved_uri.as_deref())
                {
                    self.pending_registration = Some((id.to_owned(), uri.to_owned()));
                }
            }
        }
    }

    fn register_pending(&mut self) -> Result<()> {
        if let Some((id, uri)) = self.pending_registration.take() {
            self.resolver.register(id, uri)?;
        }
        Ok(())
    }

    fn check_batch_limit(&mut self) -> Result<()> {
        if self.batch_parts >= self.max_batch_parts {
            return Err(Error::BatchSizeLimitExceeded {
                limit: self.max_batch_parts,
            });
        }
        self.batch_parts += 1;
        Ok(())
    }

    fn check_operation_limit(&mut self, in_changeset: bool) -> Result<()> {
        if in_changeset {
            if self.changeset_operations >= self.max_changeset_operations {
                return Err(Error::ChangesetSizeLimitExceeded {
                    limit: self.max_changeset_operations,
                });
            }
            self.changeset_operations += 1;
            Ok(())
        } else {
            self.check_batch_limit()
        }
    }

    fn resolve_uri(&self, raw: &str) -> Result<String> {
        if let Some(rewritten) = self.resolver.resolve(raw) {
            return Ok(rewritten.to_owned());
        }
        if let Ok(absolute) = Url::parse(raw) {
            return Ok(absolute.into());
        }
        match &self.base_uri {
            Some(base) => base
                .join(raw)
                .map(Into::into)
                .map_err(|_| Error::MalformedOperationUri { uri: raw.to_owned() }),
            None => Err(Error::RelativeUriWithoutBase { uri: raw.to_owned() }),
        }
    }

    /// Start an operation part in the innermost open scope.
    fn begin_part(&mut self) {
        let token = match &self.changeset_scope {
            Some(scope) => scope.boundary.as_str().to_owned(),
            None => self.batch_scope.boundary.as_str().to_owned(),
        };
        self.emit_boundary(&token, false);
        match &mut self.changeset_scope {
            Some(scope) => scope.opened = true,
            None => self.batch_scope.opened = true,
        }
        self.push_line("Content-Type: application/http");
        self.push_line("Content-Transfer-Encoding: binary");
        self.pending.extend_from_slice(CRLF);
    }

    fn emit_boundary(&mut self, token: &str, closing: bool) {
        if self.any_boundary_written {
            self.pending.extend_from_slice(CRLF);
        }
        self.any_boundary_written = true;
        self.pending.extend_from_slice(b"--");
        self.pending.extend_from_slice(token.as_bytes());
        if closing {
            self.pending.extend_from_slice(b"--");
        } else {
            self.pending.extend_from_slice(CRLF);
        }
    }

    fn push_line(&mut self, line: &str) {
        self.pending.extend_from_slice(line.as_bytes());
        self.pending.extend_from_slice(CRLF);
    }
}
