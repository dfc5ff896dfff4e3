//! Reading a framed batch payload back into its operations.
//!
//! This is the inverse of the writer: one `multipart/mixed` byte stream is
//! split into individual operation parts and nested change-sets. Bodies are
//! returned as raw slices of the input; nothing is decoded. Header lines
//! tolerate both CRLF and bare-LF endings, but like the writer there is no
//! defense against a boundary token occurring inside a body.

use bstr::ByteSlice;
use http::{Method, StatusCode};

use odata_wire_core::{media_type, Headers};

use crate::error::{Error, Result};

/// The first line of an operation part's HTTP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    /// A request line: method and URI.
    Request {
        /// The request method.
        method: Method,
        /// The request URI exactly as framed.
        uri: String,
    },
    /// A status line.
    Status {
        /// The response status code.
        status: StatusCode,
    },
}

/// One operation read back out of a batch payload.
#[derive(Debug)]
pub struct OperationPart<'a> {
    /// The multipart part headers (`Content-Type: application/http`, ...).
    pub part_headers: Headers,
    /// The request or status line.
    pub start_line: StartLine,
    /// The operation's own headers.
    pub headers: Headers,
    /// The raw body bytes, verbatim.
    pub body: &'a [u8],
}

/// A top-level item of a batch payload.
#[derive(Debug)]
pub enum BatchItem<'a> {
    /// An individual query/read operation part.
    Operation(OperationPart<'a>),
    /// A nested change-set and the operations inside it.
    Changeset {
        /// The change-set's own boundary token.
        boundary: String,
        /// The operations in framing order.
        operations: Vec<OperationPart<'a>>,
    },
}

/// Splits one framed batch payload into its parts.
#[derive(Debug)]
pub struct BatchReader<'a> {
    payload: &'a [u8],
    boundary: String,
}

impl<'a> BatchReader<'a> {
    /// Read `payload` delimited by the given batch boundary token.
    pub fn new(payload: &'a [u8], boundary: impl Into<String>) -> Self {
        Self {
            payload,
            boundary: boundary.into(),
        }
    }

    /// Read `payload` using the boundary named by a `multipart/mixed`
    /// Content-Type header.
    pub fn from_content_type(payload: &'a [u8], content_type: &str) -> Result<Self> {
        let media_type = media_type::parse_exactly_one(content_type)?;
        if !media_type.type_name().eq_ignore_ascii_case("multipart")
            || !media_type.subtype().eq_ignore_ascii_case("mixed")
        {
            return Err(Error::MalformedMultipart(format!(
                "batch payloads are multipart/mixed, not '{media_type}'"
            )));
        }
        let boundary = media_type.parameter("boundary").ok_or_else(|| {
            Error::MalformedMultipart("multipart/mixed without a boundary parameter".into())
        })?;
        Ok(Self::new(payload, boundary))
    }

    /// Parse the payload into its top-level items.
    pub fn items(&self) -> Result<Vec<BatchItem<'a>>> {
        let mut items = Vec::new();
        for part in split_parts(self.payload, &self.boundary)? {
            let (part_headers, rest) = parse_headers_block(part)?;
            let content_type = part_headers.get("Content-Type").ok_or_else(|| {
                Error::MalformedMultipart("part without a Content-Type header".into())
            })?;
            let media_type = media_type::parse_exactly_one(content_type)?;

            if media_type.type_name().eq_ignore_ascii_case("multipart")
                && media_type.subtype().eq_ignore_ascii_case("mixed")
            {
                let boundary = media_type
                    .parameter("boundary")
                    .ok_or_else(|| {
                        Error::MalformedMultipart(
                            "change-set part without a boundary parameter".into(),
                        )
                    })?
                    .to_owned();
                let mut operations = Vec::new();
                for nested in split_parts(rest, &boundary)? {
                    let (nested_headers, nested_rest) = parse_headers_block(nested)?;
                    operations.push(parse_operation(nested_headers, nested_rest)?);
                }
                items.push(BatchItem::Changeset { boundary, operations });
            } else if media_type.type_name().eq_ignore_ascii_case("application")
                && media_type.subtype().eq_ignore_ascii_case("http")
            {
                items.push(BatchItem::Operation(parse_operation(part_headers, rest)?));
            } else {
                return Err(Error::MalformedMultipart(format!(
                    "unexpected part content type '{media_type}'"
                )));
            }
        }
        Ok(items)
    }
}

/// Slice the content between boundary delimiter lines.
fn split_parts<'a>(payload: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let delimiter = format!("--{boundary}");
    let closing = format!("--{boundary}--");

    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut closed = false;
    let mut pos = 0;

    while pos <= payload.len() {
        let (line_end, next) = match payload[pos..].find_byte(b'\n') {
            Some(offset) => (pos + offset, pos + offset + 1),
            None => (payload.len(), payload.len() + 1),
        };
        let line = trim_line_ending(&payload[pos..line_end]);

        if line == closing.as_bytes() {
            if let Some(start) = part_start {
                push_part(&mut parts, &payload[start..pos]);
            }
            closed = true;
            break;
        }
        if line == delimiter.as_bytes() {
            if let Some(start) = part_start {
                push_part(&mut parts, &payload[start..pos]);
            }
            part_start = Some(next.min(payload.len()));
        }
        pos = next;
    }

    if !closed {
        return Err(Error::MalformedMultipart(format!(
            "missing closing boundary '--{boundary}--'"
        )));
    }
    Ok(parts)
}

/// An empty wrapper (`--tok` directly followed by `--tok--`) frames a part
/// with no content at all; it carries nothing and is skipped.
fn push_part<'a>(parts: &mut Vec<&'a [u8]>, raw: &'a [u8]) {
    let part = trim_part(raw);
    if !part.is_empty() {
        parts.push(part);
    }
}

/// The CRLF (or LF) before a boundary line belongs to the boundary, not to
/// the part content it terminates.
fn trim_part(part: &[u8]) -> &[u8] {
    if let Some(stripped) = part.strip_suffix(b"\r\n") {
        stripped
    } else if let Some(stripped) = part.strip_suffix(b"\n") {
        stripped
    } else {
        part
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Parse a header block terminated by an empty line; returns the headers and
/// whatever follows the blank line.
fn parse_headers_block(bytes: &[u8]) -> Result<(Headers, &[u8])> {
    let mut headers = Headers::new();
    let mut pos = 0;
    while pos <= bytes.len() {
        let (line_end, next) = match bytes[pos..].find_byte(b'\n') {
            Some(offset) => (pos + offset, pos + offset + 1),
            None => (bytes.len(), bytes.len() + 1),
        };
        let line = trim_line_ending(&bytes[pos..line_end]);
        if line.is_empty() {
            return Ok((headers, &bytes[next.min(bytes.len())..]));
        }
        let colon = line.find_byte(b':').ok_or_else(|| {
            Error::MalformedMultipart(format!("header line without a colon: '{}'", line.as_bstr()))
        })?;
        let name = line[..colon].trim();
        let value = line[colon + 1..].trim();
        headers.append(
            String::from_utf8_lossy(name).into_owned(),
            String::from_utf8_lossy(value).into_owned(),
        );
        pos = next;
    }
    // A headers-only fragment (no blank line, no body) is still well-formed.
    Ok((headers, &[]))
}

fn parse_operation<'a>(part_headers: Headers, rest: &'a [u8]) -> Result<OperationPart<'a>> {
    let content_type = part_headers.get("Content-Type").unwrap_or("");
    if !content_type.to_ascii_lowercase().starts_with("application/http") {
        return Err(Error::MalformedMultipart(format!(
            "operation part must be application/http, got '{content_type}'"
        )));
    }

    let (line_end, after) = match rest.find_byte(b'\n') {
        Some(offset) => (offset, &rest[offset + 1..]),
        None => (rest.len(), &rest[rest.len()..]),
    };
    let start_line = parse_start_line(trim_line_ending(&rest[..line_end]))?;
    let (headers, body) = parse_headers_block(after)?;
    Ok(OperationPart {
        part_headers,
        start_line,
        headers,
        body,
    })
}

fn parse_start_line(line: &[u8]) -> Result<StartLine> {
    let text = std::str::from_utf8(line).map_err(|_| {
        Error::MalformedMultipart(format!("start line is not valid UTF-8: '{}'", line.as_bstr()))
    })?;
    let malformed = || Error::MalformedMultipart(format!("malformed start line '{text}'"));

    if let Some(rest) = text.strip_prefix("HTTP/1.1 ").or_else(|| text.strip_prefix("HTTP/1.0 ")) {
        let code = rest.split_whitespace().next().ok_or_else(malformed)?;
        let code: u16 = code.parse().map_err(|_| malformed())?;
        let status = StatusCode::from_u16(code).map_err(|_| malformed())?;
        return Ok(StartLine::Status { status });
    }

    let mut tokens = text.split_whitespace();
    let method = tokens.next().ok_or_else(malformed)?;
    let uri = tokens.next().ok_or_else(malformed)?;
    let version = tokens.next().ok_or_else(malformed)?;
    if tokens.next().is_some() || !version.starts_with("HTTP/") {
        return Err(malformed());
    }
    let method = Method::from_bytes(method.as_bytes()).map_err(|_| malformed())?;
    Ok(StartLine::Request {
        method,
        uri: uri.to_owned(),
    })
}
