//! odata-wire-core: Shared wire-level primitives for OData services.
//!
//! This crate provides the building blocks both sides of the wire need before
//! any payload body is serialized: media-type parsing, the ranked catalog of
//! supported media types per payload kind, RFC 2616 content negotiation,
//! charset resolution, an ordered header collection, and the byte-sink traits
//! a framing layer writes through.
//!
//! Format-specific body serializers (JSON, Atom/XML) and the metadata layer
//! are deliberately out of scope; they consume the negotiated
//! `(Format, MediaType, Encoding)` triple this crate produces.
#![deny(missing_docs, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod catalog;
pub mod charset;
pub mod headers;
pub mod media_type;
pub mod negotiate;
pub mod settings;
pub mod sink;

mod error;
mod matcher;

pub use catalog::{CatalogEntry, Format, MediaTypeCatalog, PayloadKind};
pub use charset::Encoding;
pub use error::Error;
pub use headers::Headers;
pub use media_type::MediaType;
pub use negotiate::{negotiate_for_reading, negotiate_for_writing, Negotiated, ReadNegotiated};
pub use settings::{FormatSelection, WriterSettings};
