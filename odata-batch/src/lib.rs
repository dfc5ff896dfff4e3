//! odata-batch: the OData batch/change-set protocol engine.
//!
//! A batch frames many independent request/response operations — optionally
//! grouped into atomic change-sets — inside one `multipart/mixed` byte
//! stream. This crate provides:
//!
//! - [`BatchWriter`], the lifecycle state machine that frames operations
//!   into an injected byte sink, enforcing call ordering, size limits and
//!   the request-method rules of each scope;
//! - [`ContentIdResolver`], which lets later operations of a change-set
//!   reference earlier ones by `$<Content-ID>`;
//! - [`BatchReader`], which splits a framed payload back into its parts.
//!
//! Blocking I/O is the default; the `async-io` feature adds the suspendable
//! calling convention. One writer instance is fixed to a single convention
//! at construction time.
//!
//! ```
//! use http::Method;
//! use odata_wire_core::WriterSettings;
//! use odata_batch::BatchWriter;
//!
//! # fn main() -> odata_batch::Result<()> {
//! let mut writer = BatchWriter::blocking(Vec::<u8>::new(), &WriterSettings::new());
//! writer.start_batch()?;
//! writer.create_request_operation(Method::GET, "https://host/svc/Customers")?;
//! writer.end_batch()?;
//! writer.flush()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

#[cfg(not(any(feature = "blocking-io", feature = "async-io")))]
compile_error!("Enable at least one of the 'blocking-io' and 'async-io' features for odata-batch");

pub mod boundary;
pub mod content_id;
pub mod read;
pub mod state;
pub mod writer;

mod engine;
mod error;

pub use boundary::Boundary;
pub use content_id::ContentIdResolver;
pub use error::{Error, Result};
pub use read::{BatchItem, BatchReader, OperationPart, StartLine};
pub use state::BatchState;
pub use writer::{BatchWriter, Mode, Operation};

#[cfg(feature = "blocking-io")]
pub use writer::OperationBody;

#[cfg(feature = "async-io")]
pub use writer::AsyncOperationBody;
