//! Content negotiation over the media-type catalog.
//!
//! Two directions share one matching algorithm. Writing asks "which format,
//! media type and encoding should this payload use", driven by the writer
//! settings. Reading asks "which payload kind and format does this
//! Content-Type header select", driven by a caller-supplied priority list of
//! acceptable kinds.

use crate::catalog::{Format, MediaTypeCatalog, PayloadKind};
use crate::charset::{self, Encoding};
use crate::matcher::MatchScore;
use crate::media_type::{self, MediaType};
use crate::settings::{FormatSelection, WriterSettings};
use crate::Error;

/// The outcome of write-side negotiation.
#[derive(Debug, Clone)]
pub struct Negotiated {
    /// The format the payload will be serialized with.
    pub format: Format,
    /// The media type to advertise in the Content-Type header.
    pub media_type: MediaType,
    /// The text encoding of the payload.
    pub encoding: Encoding,
}

/// The outcome of read-side negotiation.
#[derive(Debug, Clone)]
pub struct ReadNegotiated {
    /// The payload kind the Content-Type header selected.
    pub kind: PayloadKind,
    /// The format the payload is serialized with.
    pub format: Format,
    /// The media type exactly as sent, parameters included.
    pub media_type: MediaType,
}

/// Resolve `(format, media type, encoding)` for writing a payload kind,
/// using the built-in catalog.
pub fn negotiate_for_writing(settings: &WriterSettings, kind: PayloadKind) -> Result<Negotiated, Error> {
    negotiate_for_writing_with(MediaTypeCatalog::default_catalog(), settings, kind)
}

/// Resolve `(format, media type, encoding)` for writing against a custom catalog.
pub fn negotiate_for_writing_with(
    catalog: &MediaTypeCatalog,
    settings: &WriterSettings,
    kind: PayloadKind,
) -> Result<Negotiated, Error> {
    let (format, media_type) = match (settings.format(), settings.accept()) {
        (FormatSelection::Explicit(format), _) => select_by_format(catalog, kind, Some(format))?,
        (FormatSelection::Unspecified, None) => select_by_format(catalog, kind, None)?,
        (FormatSelection::Unspecified, Some(accept)) => select_by_accept(catalog, kind, accept)?,
    };
    let encoding = charset::resolve(settings.accept_charset(), &media_type)?;
    tracing::debug!(?kind, %format, %media_type, "negotiated write payload");
    Ok(Negotiated {
        format,
        media_type,
        encoding,
    })
}

/// Resolve the payload kind and format a Content-Type header selects,
/// using the built-in catalog.
///
/// `kinds` is walked in the caller's priority order; the first kind whose
/// catalog accepts the header wins. When nothing matches and more than one
/// kind was allowed, the payload is treated as a raw binary value carrying
/// the header's media type verbatim.
pub fn negotiate_for_reading(content_type: &str, kinds: &[PayloadKind]) -> Result<ReadNegotiated, Error> {
    negotiate_for_reading_with(MediaTypeCatalog::default_catalog(), content_type, kinds)
}

/// Read-side negotiation against a custom catalog.
pub fn negotiate_for_reading_with(
    catalog: &MediaTypeCatalog,
    content_type: &str,
    kinds: &[PayloadKind],
) -> Result<ReadNegotiated, Error> {
    let media_type = media_type::parse_exactly_one(content_type)?;
    if media_type.has_wildcard() {
        return Err(Error::WildcardNotAllowed {
            media_type: media_type.to_string(),
        });
    }

    for &kind in kinds {
        for entry in catalog.entries(kind) {
            // The candidate plays the source role here: a header may carry
            // parameters (charset and friends) the candidate does not name,
            // but a candidate's own parameters must all be present.
            let score = MatchScore::evaluate(&entry.media_type, &media_type)?;
            if score.is_match() {
                tracing::debug!(?kind, format = %entry.format, %media_type, "resolved read payload");
                return Ok(ReadNegotiated {
                    kind,
                    format: entry.format,
                    media_type,
                });
            }
        }
    }

    if kinds.len() > 1 {
        return Ok(ReadNegotiated {
            kind: PayloadKind::BinaryValue,
            format: Format::RawValue,
            media_type,
        });
    }

    Err(Error::ContentTypeNegotiationFailed {
        header: content_type.to_string(),
        supported: kinds
            .iter()
            .map(|&k| catalog.describe(k))
            .collect::<Vec<_>>()
            .join(", "),
    })
}

fn select_by_format(
    catalog: &MediaTypeCatalog,
    kind: PayloadKind,
    format: Option<Format>,
) -> Result<(Format, MediaType), Error> {
    catalog
        .entries(kind)
        .iter()
        .find(|entry| format.map_or(true, |f| entry.format == f))
        .map(|entry| (entry.format, entry.media_type.clone()))
        .ok_or(Error::NoDefaultMediaType { kind })
}

fn select_by_accept(
    catalog: &MediaTypeCatalog,
    kind: PayloadKind,
    accept: &str,
) -> Result<(Format, MediaType), Error> {
    let ranges = media_type::parse_media_types(accept)?;
    let entries = catalog.entries(kind);

    let mut best: Option<(usize, MatchScore)> = None;
    for (index, entry) in entries.iter().enumerate() {
        for range in &ranges {
            let score = MatchScore::evaluate(range, &entry.media_type)?;
            if !score.is_match() {
                continue;
            }
            // Strictly-better replacement keeps the first-listed catalog
            // entry on ties.
            if best.as_ref().map_or(true, |(_, current)| score.beats(current)) {
                best = Some((index, score));
            }
        }
    }

    match best {
        Some((index, _)) => {
            let entry = &entries[index];
            Ok((entry.format, entry.media_type.clone()))
        }
        None => Err(Error::ContentTypeNegotiationFailed {
            header: accept.to_string(),
            supported: catalog.describe(kind),
        }),
    }
}
