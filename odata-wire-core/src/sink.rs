//! Byte sinks the framing layer writes through.
//!
//! The sink is injected at construction time and is the only place the wire
//! layer touches I/O. Blocking sinks are any [`std::io::Write`]; async sinks
//! (behind the `async-io` feature) are any tokio [`AsyncWrite`].
//!
//! [`AsyncWrite`]: tokio::io::AsyncWrite

#[cfg(feature = "blocking-io")]
use std::io;

/// A blocking byte sink.
#[cfg(feature = "blocking-io")]
pub trait ByteSink {
    /// Write the whole buffer.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;
    /// Deliver everything written so far to the underlying transport.
    fn flush(&mut self) -> io::Result<()>;
}

#[cfg(feature = "blocking-io")]
impl<W: io::Write> ByteSink for W {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        io::Write::write_all(self, data)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(self)
    }
}

/// An async byte sink.
#[cfg(feature = "async-io")]
#[async_trait::async_trait]
pub trait AsyncByteSink: Send {
    /// Write the whole buffer.
    async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()>;
    /// Deliver everything written so far to the underlying transport.
    async fn flush(&mut self) -> std::io::Result<()>;
}

#[cfg(feature = "async-io")]
#[async_trait::async_trait]
impl<W: tokio::io::AsyncWrite + Unpin + Send> AsyncByteSink for W {
    async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        tokio::io::AsyncWriteExt::write_all(self, data).await
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        tokio::io::AsyncWriteExt::flush(self).await
    }
}
