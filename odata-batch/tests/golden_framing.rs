//! Golden tests pinning the exact bytes the batch writer frames.

use std::io::Write as _;
use std::sync::{Arc, Mutex};

use http::{Method, StatusCode};
use odata_batch::BatchWriter;
use odata_wire_core::WriterSettings;
use pretty_assertions::assert_eq;

/// A sink whose bytes stay inspectable after the writer consumed it.
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().expect("not poisoned").clone()).expect("framing is ASCII")
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

#[test]
fn a_single_get_batch_matches_the_wire_format_exactly() {
    let sink = SharedSink::default();
    let mut writer = BatchWriter::blocking(sink.clone(), &WriterSettings::new());
    writer.start_batch().unwrap();
    writer
        .create_request_operation(Method::GET, "https://host/svc/Customers")
        .unwrap();
    writer.end_batch().unwrap();
    writer.flush().unwrap();

    let boundary = writer.boundary().to_owned();
    let expected = format!(
        "--{boundary}\r\n\
         Content-Type: application/http\r\n\
         Content-Transfer-Encoding: binary\r\n\
         \r\n\
         GET https://host/svc/Customers HTTP/1.1\r\n\
         \r\n\
         \r\n\
         --{boundary}--"
    );
    assert_eq!(sink.text(), expected);
}

#[test]
fn an_empty_batch_is_a_valid_wrapper() {
    let sink = SharedSink::default();
    let mut writer = BatchWriter::blocking(sink.clone(), &WriterSettings::new());
    writer.start_batch().unwrap();
    writer.end_batch().unwrap();
    writer.flush().unwrap();

    let boundary = writer.boundary().to_owned();
    assert_eq!(sink.text(), format!("--{boundary}\r\n\r\n--{boundary}--"));
}

#[test]
fn an_empty_changeset_still_frames_its_nested_wrapper() {
    let sink = SharedSink::default();
    let mut writer = BatchWriter::blocking(sink.clone(), &WriterSettings::new());
    writer.start_batch().unwrap();
    writer.start_changeset().unwrap();
    writer.end_changeset().unwrap();
    writer.end_batch().unwrap();
    writer.flush().unwrap();

    let text = sink.text();
    let boundary = writer.boundary().to_owned();
    assert!(text.starts_with(&format!(
        "--{boundary}\r\nContent-Type: multipart/mixed; boundary=changeset_"
    )));
    assert!(text.ends_with(&format!("--{boundary}--")));
    assert_eq!(text.matches("--changeset_").count(), 2);
}

#[test]
fn operation_headers_and_body_bytes_frame_in_order() {
    let sink = SharedSink::default();
    let mut writer = BatchWriter::blocking(sink.clone(), &WriterSettings::new());
    writer.start_batch().unwrap();
    writer.start_changeset().unwrap();

    let mut op = writer
        .create_request_operation(Method::POST, "https://host/svc/Customers")
        .unwrap();
    op.headers_mut().append("Content-Type", "application/json");
    op.headers_mut().append("Content-Length", "16");
    let mut body = op.body().unwrap();
    body.write_all(b"{\"name\":\"new\"}\r\n").unwrap();
    body.close().unwrap();

    writer.end_changeset().unwrap();
    writer.end_batch().unwrap();
    writer.flush().unwrap();

    let text = sink.text();
    assert!(text.contains(
        "POST https://host/svc/Customers HTTP/1.1\r\n\
         Content-Type: application/json\r\n\
         Content-Length: 16\r\n\
         \r\n\
         {\"name\":\"new\"}"
    ));
}

#[test]
fn a_response_operation_frames_a_status_line() {
    let sink = SharedSink::default();
    let mut writer = BatchWriter::blocking(sink.clone(), &WriterSettings::new());
    writer.start_batch().unwrap();
    writer.create_response_operation(StatusCode::CREATED).unwrap();
    writer.end_batch().unwrap();
    writer.flush().unwrap();

    assert!(sink.text().contains("HTTP/1.1 201 Created\r\n"));
}

#[test]
fn the_content_type_names_the_batch_boundary() {
    let writer = BatchWriter::blocking(Vec::<u8>::new(), &WriterSettings::new());
    let content_type = writer.content_type();
    assert_eq!(
        content_type,
        format!("multipart/mixed; boundary={}", writer.boundary())
    );
    assert!(writer.boundary().starts_with("batch_"));
}
