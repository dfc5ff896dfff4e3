//! End-to-end tests of the batch writer lifecycle: Content-ID flows, size
//! limits, error latching, and the per-instance calling convention.

use std::sync::{Arc, Mutex};

use http::Method;
use odata_batch::{BatchState, BatchWriter, Error};
use odata_wire_core::WriterSettings;
use url::Url;

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn contents(&self) -> Vec<u8> {
        self.0.lock().expect("not poisoned").clone()
    }
}

impl std::io::Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("not poisoned").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn settings() -> WriterSettings {
    WriterSettings::new().with_base_uri(Url::parse("https://host/svc/").unwrap())
}

#[test]
fn content_id_references_resolve_to_the_declaring_operation() {
    let mut writer = BatchWriter::blocking(Vec::<u8>::new(), &settings());
    writer.start_batch().unwrap();
    writer.start_changeset().unwrap();

    let mut first = writer
        .create_request_operation(Method::POST, "Customers")
        .unwrap();
    first.headers_mut().append("Content-ID", "1");
    let declared = first.resolved_uri().unwrap().to_owned();
    drop(first);

    let second = writer.create_request_operation(Method::PATCH, "$1").unwrap();
    assert_eq!(second.resolved_uri(), Some(declared.as_str()));
    drop(second);

    writer.end_changeset().unwrap();
    writer.end_batch().unwrap();
}

#[test]
fn content_ids_may_be_reused_across_changesets() {
    let mut writer = BatchWriter::blocking(Vec::<u8>::new(), &settings());
    writer.start_batch().unwrap();
    for _ in 0..2 {
        writer.start_changeset().unwrap();
        let mut op = writer
            .create_request_operation(Method::POST, "Customers")
            .unwrap();
        op.headers_mut().append("Content-ID", "1");
        drop(op);
        writer.create_request_operation(Method::PATCH, "$1").unwrap();
        writer.end_changeset().unwrap();
    }
    writer.end_batch().unwrap();
}

#[test]
fn a_duplicate_content_id_poisons_the_writer() {
    let mut writer = BatchWriter::blocking(Vec::<u8>::new(), &settings());
    writer.start_batch().unwrap();
    writer.start_changeset().unwrap();
    let mut op = writer
        .create_request_operation(Method::POST, "Customers")
        .unwrap();
    op.headers_mut().append("Content-ID", "7");
    drop(op);
    let mut op = writer
        .create_request_operation(Method::POST, "Orders")
        .unwrap();
    op.headers_mut().append("Content-ID", "7");
    drop(op);

    let err = writer
        .create_request_operation(Method::POST, "Products")
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateContentId(id) if id == "7"));
    assert_eq!(writer.state(), BatchState::Error);
}

#[test]
fn starting_a_changeset_twice_is_an_invalid_transition() {
    let mut writer = BatchWriter::blocking(Vec::<u8>::new(), &settings());
    writer.start_batch().unwrap();
    writer.start_changeset().unwrap();
    let err = writer.start_changeset().unwrap_err();
    assert!(matches!(err, Error::InvalidBatchProtocolState { .. }));
}

#[test]
fn exceeding_the_batch_limit_latches_the_error_state() {
    let settings = settings().with_max_batch_parts(2);
    let mut writer = BatchWriter::blocking(Vec::<u8>::new(), &settings);
    writer.start_batch().unwrap();
    writer.create_request_operation(Method::GET, "A").unwrap();
    writer.create_request_operation(Method::GET, "B").unwrap();

    let err = writer.create_request_operation(Method::GET, "C").unwrap_err();
    assert!(matches!(err, Error::BatchSizeLimitExceeded { limit: 2 }));

    // Error is absorbing: every further lifecycle call keeps failing.
    let err = writer.create_request_operation(Method::GET, "D").unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidBatchProtocolState { current: BatchState::Error, .. }
    ));
    let err = writer.end_batch().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidBatchProtocolState { current: BatchState::Error, .. }
    ));
}

#[test]
fn buffered_bytes_survive_into_a_flush_after_an_error() {
    let sink = SharedSink::default();
    let settings = settings().with_max_batch_parts(1);
    let mut writer = BatchWriter::blocking(sink.clone(), &settings);
    writer.start_batch().unwrap();
    writer.create_request_operation(Method::GET, "A").unwrap();
    writer.create_request_operation(Method::GET, "B").unwrap_err();

    assert!(sink.contents().is_empty());
    writer.flush().unwrap();
    let text = String::from_utf8(sink.contents()).unwrap();
    assert!(text.contains("GET https://host/svc/A HTTP/1.1"));
}

#[test]
fn methods_are_scoped_to_their_side_of_the_changeset_fence() {
    let mut writer = BatchWriter::blocking(Vec::<u8>::new(), &settings());
    writer.start_batch().unwrap();

    let err = writer
        .create_request_operation(Method::POST, "Customers")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MethodNotAllowedForScope { in_changeset: false, .. }
    ));

    let mut writer = BatchWriter::blocking(Vec::<u8>::new(), &settings());
    writer.start_batch().unwrap();
    writer.start_changeset().unwrap();
    let err = writer
        .create_request_operation(Method::GET, "Customers")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MethodNotAllowedForScope { in_changeset: true, .. }
    ));
}

#[test]
fn relative_uris_without_a_base_fail() {
    let mut writer = BatchWriter::blocking(Vec::<u8>::new(), &WriterSettings::new());
    writer.start_batch().unwrap();
    let err = writer
        .create_request_operation(Method::GET, "Customers")
        .unwrap_err();
    assert!(matches!(err, Error::RelativeUriWithoutBase { .. }));
}

#[test]
fn dropping_an_unflushed_blocking_writer_flushes_best_effort() {
    let sink = SharedSink::default();
    {
        let mut writer = BatchWriter::blocking(sink.clone(), &settings());
        writer.start_batch().unwrap();
        writer.create_request_operation(Method::GET, "A").unwrap();
        writer.end_batch().unwrap();
        // No explicit flush before the writer goes away.
    }
    let text = String::from_utf8(sink.contents()).unwrap();
    assert!(text.contains("GET https://host/svc/A HTTP/1.1"));
}

#[cfg(feature = "async-io")]
mod async_convention {
    use super::*;
    use odata_batch::Mode;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// An async sink whose bytes stay inspectable, mirroring `SharedSink`.
    #[derive(Clone, Default)]
    struct SharedAsyncSink(Arc<Mutex<Vec<u8>>>);

    impl SharedAsyncSink {
        fn contents(&self) -> Vec<u8> {
            self.0.lock().expect("not poisoned").clone()
        }
    }

    impl tokio::io::AsyncWrite for SharedAsyncSink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.0.lock().expect("not poisoned").extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn the_async_convention_frames_the_same_bytes() {
        let sink = SharedAsyncSink::default();
        let mut writer = BatchWriter::asynchronous(sink.clone(), &settings());
        writer.start_batch().unwrap();

        let mut op = writer.create_request_operation(Method::GET, "Customers").unwrap();
        op.headers_mut().append("Accept", "application/json");
        drop(op);

        writer.end_batch().unwrap();
        writer.flush_async().await.unwrap();

        let text = String::from_utf8(sink.contents()).unwrap();
        assert!(text.contains("GET https://host/svc/Customers HTTP/1.1"));
        assert!(text.contains("Accept: application/json"));
    }

    #[tokio::test]
    async fn async_body_streams_write_through_directly() {
        let sink = SharedAsyncSink::default();
        let mut writer = BatchWriter::asynchronous(sink.clone(), &settings());
        writer.start_batch().unwrap();
        writer.start_changeset().unwrap();

        let op = writer.create_request_operation(Method::POST, "Customers").unwrap();
        let mut body = op.body_async().await.unwrap();
        body.write_all(b"{}").await.unwrap();
        body.close().unwrap();

        writer.end_changeset().unwrap();
        writer.end_batch().unwrap();
        writer.flush_async().await.unwrap();

        let text = String::from_utf8(sink.contents()).unwrap();
        assert!(text.contains("POST https://host/svc/Customers HTTP/1.1\r\n\r\n{}"));
    }

    #[cfg(feature = "blocking-io")]
    #[tokio::test]
    async fn the_conventions_do_not_mix() {
        let mut writer = BatchWriter::asynchronous(SharedAsyncSink::default(), &settings());
        assert_eq!(writer.mode(), Mode::Async);
        writer.start_batch().unwrap();
        let err = writer.flush().unwrap_err();
        assert!(matches!(err, Error::ModeMismatch { constructed: Mode::Async }));

        let mut writer = BatchWriter::blocking(Vec::<u8>::new(), &settings());
        assert_eq!(writer.mode(), Mode::Blocking);
        writer.start_batch().unwrap();
        let err = writer.flush_async().await.unwrap_err();
        assert!(matches!(err, Error::ModeMismatch { constructed: Mode::Blocking }));
    }

    #[tokio::test]
    async fn dropping_an_async_writer_discards_unflushed_bytes() {
        let sink = SharedAsyncSink::default();
        {
            let mut writer = BatchWriter::asynchronous(sink.clone(), &settings());
            writer.start_batch().unwrap();
            writer.create_request_operation(Method::GET, "A").unwrap();
            writer.end_batch().unwrap();
        }
        assert!(sink.contents().is_empty());
    }
}
