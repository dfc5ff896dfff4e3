//! The batch writer: lifecycle calls, sink ownership and calling conventions.
//!
//! A writer instance is fixed to one calling convention when it is built:
//! [`BatchWriter::blocking`] or [`BatchWriter::asynchronous`]. Lifecycle
//! calls that only buffer framing text are shared between the conventions;
//! the calls that touch the injected sink — flushing and operation body
//! streaming — exist per convention and fail with
//! [`Error::ModeMismatch`](crate::Error::ModeMismatch) when invoked against
//! an instance of the other kind.

use std::fmt;
#[cfg(feature = "blocking-io")]
use std::io;

use http::{Method, StatusCode};

use odata_wire_core::{Headers, WriterSettings};
#[cfg(feature = "async-io")]
use odata_wire_core::sink::AsyncByteSink;
#[cfg(feature = "blocking-io")]
use odata_wire_core::sink::ByteSink;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::state::BatchState;

/// The calling convention a writer instance is fixed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Synchronous calls against a blocking sink.
    Blocking,
    /// Suspendable calls against an async sink.
    Async,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Blocking => "blocking",
            Mode::Async => "asynchronous",
        })
    }
}

enum SinkHandle {
    #[cfg(feature = "blocking-io")]
    Blocking(Box<dyn ByteSink + Send>),
    #[cfg(feature = "async-io")]
    Async(Box<dyn AsyncByteSink>),
}

impl SinkHandle {
    fn mode(&self) -> Mode {
        match self {
            #[cfg(feature = "blocking-io")]
            SinkHandle::Blocking(_) => Mode::Blocking,
            #[cfg(feature = "async-io")]
            SinkHandle::Async(_) => Mode::Async,
        }
    }
}

/// Writes a batch of request or response operations as one multipart message.
///
/// The multipart envelope's media type is
/// `multipart/mixed; boundary=<token>`; [`BatchWriter::content_type`] renders
/// it for the caller to place on the surrounding message. Bytes only reach
/// the sink on an explicit flush or when an operation body stream is open.
pub struct BatchWriter {
    engine: Engine,
    sink: SinkHandle,
}

impl BatchWriter {
    /// Build a writer fixed to the blocking convention.
    #[cfg(feature = "blocking-io")]
    pub fn blocking(sink: impl ByteSink + Send + 'static, settings: &WriterSettings) -> Self {
        Self {
            engine: Engine::new(settings),
            sink: SinkHandle::Blocking(Box::new(sink)),
        }
    }

    /// Build a writer fixed to the asynchronous convention.
    #[cfg(feature = "async-io")]
    pub fn asynchronous(sink: impl AsyncByteSink + 'static, settings: &WriterSettings) -> Self {
        Self {
            engine: Engine::new(settings),
            sink: SinkHandle::Async(Box::new(sink)),
        }
    }

    /// The convention this instance was constructed for.
    pub fn mode(&self) -> Mode {
        self.sink.mode()
    }

    /// The current protocol state.
    pub fn state(&self) -> BatchState {
        self.engine.state()
    }

    /// The batch boundary token.
    pub fn boundary(&self) -> &str {
        self.engine.batch_boundary().as_str()
    }

    /// The Content-Type value of the whole batch message.
    pub fn content_type(&self) -> String {
        format!("multipart/mixed; boundary={}", self.boundary())
    }

    /// Open the batch envelope.
    pub fn start_batch(&mut self) -> Result<()> {
        let result = self.engine.start_batch();
        self.latch(result)
    }

    /// Close the batch envelope; terminal for the instance.
    pub fn end_batch(&mut self) -> Result<()> {
        let result = self.engine.end_batch();
        self.latch(result)
    }

    /// Open a change-set; counts once against the batch size limit.
    pub fn start_changeset(&mut self) -> Result<()> {
        let result = self.engine.start_changeset();
        self.latch(result)
    }

    /// Close the current change-set and discard its Content-ID cache.
    pub fn end_changeset(&mut self) -> Result<()> {
        let result = self.engine.end_changeset();
        self.latch(result)
    }

    /// Create a request operation.
    ///
    /// `uri` may be absolute, relative to the configured base URI, or a
    /// `$<id>` reference to a Content-ID declared earlier in the same
    /// change-set. Outside a change-set only `GET` is permitted; inside one,
    /// anything but `GET`.
    pub fn create_request_operation(&mut self, method: Method, uri: &str) -> Result<Operation<'_>> {
        let result = self.engine.create_request_operation(method, uri);
        self.latch(result)?;
        Ok(Operation { writer: self })
    }

    /// Create a response operation with a known status.
    pub fn create_response_operation(&mut self, status: StatusCode) -> Result<Operation<'_>> {
        let result = self.engine.create_response_operation(status);
        self.latch(result)?;
        Ok(Operation { writer: self })
    }

    /// Deliver all buffered framing bytes through the blocking sink.
    ///
    /// This remains callable after a failure, to salvage what was already
    /// buffered.
    #[cfg(feature = "blocking-io")]
    pub fn flush(&mut self) -> Result<()> {
        let result = self.flush_inner();
        self.latch(result)
    }

    #[cfg(feature = "blocking-io")]
    fn flush_inner(&mut self) -> Result<()> {
        self.require_mode(Mode::Blocking)?;
        let pending = self.engine.take_pending();
        match &mut self.sink {
            SinkHandle::Blocking(sink) => {
                sink.write_all(&pending)?;
                sink.flush()?;
                Ok(())
            }
            #[cfg(feature = "async-io")]
            SinkHandle::Async(_) => Err(Error::ModeMismatch {
                constructed: Mode::Async,
            }),
        }
    }

    /// Deliver all buffered framing bytes through the async sink.
    #[cfg(feature = "async-io")]
    pub async fn flush_async(&mut self) -> Result<()> {
        let result = self.flush_async_inner().await;
        self.latch(result)
    }

    #[cfg(feature = "async-io")]
    async fn flush_async_inner(&mut self) -> Result<()> {
        self.require_mode(Mode::Async)?;
        let pending = self.engine.take_pending();
        match &mut self.sink {
            SinkHandle::Async(sink) => {
                sink.write_all(&pending).await?;
                sink.flush().await?;
                Ok(())
            }
            #[cfg(feature = "blocking-io")]
            SinkHandle::Blocking(_) => Err(Error::ModeMismatch {
                constructed: Mode::Blocking,
            }),
        }
    }

    fn require_mode(&self, wanted: Mode) -> Result<()> {
        let constructed = self.mode();
        if constructed == wanted {
            Ok(())
        } else {
            Err(Error::ModeMismatch { constructed })
        }
    }

    /// Latch the engine into its error state on any failure.
    ///
    /// Flushing buffered bytes stays possible afterwards: the flush calls
    /// never consult the protocol state.
    fn latch<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.engine.latch_error();
        }
        result
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        // Blocking disposal is a best-effort synchronous flush; async
        // disposal silently discards unflushed bytes, as there is nowhere
        // to suspend inside drop. The asymmetry is inherited deliberately.
        #[cfg(feature = "blocking-io")]
        if let SinkHandle::Blocking(sink) = &mut self.sink {
            let pending = self.engine.take_pending();
            if !pending.is_empty() {
                let _ = sink.write_all(&pending);
            }
            let _ = sink.flush();
        }
    }
}

impl fmt::Debug for BatchWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchWriter")
            .field("mode", &self.mode())
            .field("state", &self.state())
            .field("boundary", &self.boundary())
            .finish_non_exhaustive()
    }
}

/// Handle to the operation created last, alive until the next lifecycle call.
///
/// Headers appended here are framed when the operation's body stream opens,
/// or when the next lifecycle call begins, whichever comes first.
pub struct Operation<'w> {
    writer: &'w mut BatchWriter,
}

impl<'w> Operation<'w> {
    /// The operation's ordered header collection.
    pub fn headers_mut(&mut self) -> &mut Headers {
        self.writer.engine.envelope_headers_mut()
    }

    /// The absolute request URI after `$id` and base-URI resolution;
    /// `None` for response operations.
    pub fn resolved_uri(&self) -> Option<&str> {
        self.writer.engine.envelope_resolved_uri()
    }

    /// Detach the framing layer and expose the raw blocking byte sink for
    /// this operation's body. Pending headers are flushed first.
    #[cfg(feature = "blocking-io")]
    pub fn body(self) -> Result<OperationBody<'w>> {
        let writer = self.writer;
        writer.require_mode(Mode::Blocking).map_err(|e| {
            writer.engine.latch_error();
            e
        })?;
        let opened = writer.engine.open_body();
        writer.latch(opened)?;
        let pending = writer.engine.take_pending();
        let delivered = match &mut writer.sink {
            SinkHandle::Blocking(sink) => sink.write_all(&pending).map_err(Error::from),
            #[cfg(feature = "async-io")]
            SinkHandle::Async(_) => Err(Error::ModeMismatch {
                constructed: Mode::Async,
            }),
        };
        writer.latch(delivered)?;
        Ok(OperationBody { writer })
    }

    /// Detach the framing layer and expose the raw async byte sink for this
    /// operation's body. Pending headers are flushed first.
    #[cfg(feature = "async-io")]
    pub async fn body_async(self) -> Result<AsyncOperationBody<'w>> {
        let writer = self.writer;
        writer.require_mode(Mode::Async).map_err(|e| {
            writer.engine.latch_error();
            e
        })?;
        let opened = writer.engine.open_body();
        writer.latch(opened)?;
        let pending = writer.engine.take_pending();
        let delivered = match &mut writer.sink {
            SinkHandle::Async(sink) => sink.write_all(&pending).await.map_err(Error::from),
            #[cfg(feature = "blocking-io")]
            SinkHandle::Blocking(_) => Err(Error::ModeMismatch {
                constructed: Mode::Blocking,
            }),
        };
        writer.latch(delivered)?;
        Ok(AsyncOperationBody { writer })
    }
}

impl fmt::Debug for Operation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("resolved_uri", &self.resolved_uri())
            .finish_non_exhaustive()
    }
}

/// The detached blocking body stream of one operation.
///
/// While this exists the engine refuses every other call; closing (or
/// dropping) it re-attaches the framing layer.
#[cfg(feature = "blocking-io")]
pub struct OperationBody<'w> {
    writer: &'w mut BatchWriter,
}

#[cfg(feature = "blocking-io")]
impl OperationBody<'_> {
    /// Close the body stream and return the engine to a usable state.
    pub fn close(self) -> Result<()> {
        let result = self.writer.engine.close_body();
        if result.is_err() {
            self.writer.engine.latch_error();
        }
        result
    }
}

#[cfg(feature = "blocking-io")]
impl io::Write for OperationBody<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.writer.sink {
            SinkHandle::Blocking(sink) => match sink.write_all(buf) {
                Ok(()) => Ok(buf.len()),
                Err(e) => {
                    self.writer.engine.latch_error();
                    Err(e)
                }
            },
            #[cfg(feature = "async-io")]
            SinkHandle::Async(_) => Err(io::Error::other("body stream detached from an async writer")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.writer.sink {
            SinkHandle::Blocking(sink) => sink.flush(),
            #[cfg(feature = "async-io")]
            SinkHandle::Async(_) => Ok(()),
        }
    }
}

#[cfg(feature = "blocking-io")]
impl Drop for OperationBody<'_> {
    fn drop(&mut self) {
        self.writer.engine.close_body_silently();
    }
}

/// The detached async body stream of one operation.
#[cfg(feature = "async-io")]
pub struct AsyncOperationBody<'w> {
    writer: &'w mut BatchWriter,
}

#[cfg(feature = "async-io")]
impl AsyncOperationBody<'_> {
    /// Write raw body bytes through the async sink.
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let result = match &mut self.writer.sink {
            SinkHandle::Async(sink) => sink.write_all(buf).await.map_err(Error::from),
            #[cfg(feature = "blocking-io")]
            SinkHandle::Blocking(_) => Err(Error::ModeMismatch {
                constructed: Mode::Blocking,
            }),
        };
        if result.is_err() {
            self.writer.engine.latch_error();
        }
        result
    }

    /// Close the body stream and return the engine to a usable state.
    pub fn close(self) -> Result<()> {
        let result = self.writer.engine.close_body();
        if result.is_err() {
            self.writer.engine.latch_error();
        }
        result
    }
}

#[cfg(feature = "async-io")]
impl Drop for AsyncOperationBody<'_> {
    fn drop(&mut self) {
        self.writer.engine.close_body_silently();
    }
}
