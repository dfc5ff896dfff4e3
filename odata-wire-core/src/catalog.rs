//! The ranked catalog of supported media types per payload kind.
//!
//! Catalog order is load-bearing twice over: the first entry of a kind is the
//! default selected when no Accept header is in play, and declaration order
//! is the tie-break of last resort when two candidates score identically
//! during negotiation (first registered wins).

use std::fmt;
use std::sync::OnceLock;

use crate::media_type::MediaType;

/// The logical kind of content being read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PayloadKind {
    /// A collection of entries.
    Feed,
    /// A single entry.
    Entry,
    /// A single property value.
    Property,
    /// One link to a related entity.
    EntityReferenceLink,
    /// A collection of links to related entities.
    EntityReferenceLinks,
    /// A raw primitive value.
    Value,
    /// A raw binary value.
    BinaryValue,
    /// A collection of primitive or complex values.
    Collection,
    /// The service document listing entity sets.
    ServiceDocument,
    /// The metadata document.
    MetadataDocument,
    /// A top-level error payload.
    Error,
    /// A batch request or response.
    Batch,
    /// An operation parameter payload.
    Parameter,
}

/// The serialization format chosen by negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Format {
    /// Atom/XML serialization.
    Atom,
    /// JSON serialization.
    Json,
    /// Raw value serialization without any envelope.
    RawValue,
    /// Multipart batch framing.
    Batch,
    /// The XML metadata document.
    Metadata,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Atom => "atom",
            Format::Json => "json",
            Format::RawValue => "raw-value",
            Format::Batch => "batch",
            Format::Metadata => "metadata",
        };
        f.write_str(name)
    }
}

/// One ranked candidate: a format and the media type it is addressed by.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// The format this media type selects.
    pub format: Format,
    /// The media type clients use to address the format.
    pub media_type: MediaType,
}

/// An immutable mapping from payload kind to its ordered candidate list.
#[derive(Debug, Clone, Default)]
pub struct MediaTypeCatalog {
    per_kind: Vec<(PayloadKind, Vec<CatalogEntry>)>,
}

impl MediaTypeCatalog {
    /// Create an empty catalog; mostly useful in tests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candidate for a payload kind.
    ///
    /// Candidates registered earlier outrank later ones on otherwise equal
    /// negotiation scores.
    pub fn register(&mut self, kind: PayloadKind, format: Format, media_type: MediaType) {
        let entry = CatalogEntry { format, media_type };
        if let Some((_, entries)) = self.per_kind.iter_mut().find(|(k, _)| *k == kind) {
            entries.push(entry);
        } else {
            self.per_kind.push((kind, vec![entry]));
        }
    }

    /// The ordered candidates for a payload kind; empty if none are registered.
    pub fn entries(&self, kind: PayloadKind) -> &[CatalogEntry] {
        self.per_kind
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(&[], |(_, entries)| entries.as_slice())
    }

    /// Comma-separated rendering of a kind's candidates, for diagnostics.
    pub fn describe(&self, kind: PayloadKind) -> String {
        self.entries(kind)
            .iter()
            .map(|e| e.media_type.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The built-in catalog shared by all negotiations that do not inject their own.
    pub fn default_catalog() -> &'static MediaTypeCatalog {
        static CATALOG: OnceLock<MediaTypeCatalog> = OnceLock::new();
        CATALOG.get_or_init(build_default_catalog)
    }
}

fn build_default_catalog() -> MediaTypeCatalog {
    use PayloadKind as K;

    let atom_xml = || MediaType::new("application", "atom+xml");
    let app_xml = || MediaType::new("application", "xml");
    let text_xml = || MediaType::new("text", "xml");
    let json = || MediaType::new("application", "json");

    let mut catalog = MediaTypeCatalog::new();

    catalog.register(K::Feed, Format::Atom, atom_xml().with_parameter("type", "feed"));
    catalog.register(K::Feed, Format::Atom, atom_xml());
    catalog.register(K::Feed, Format::Json, json());

    catalog.register(K::Entry, Format::Atom, atom_xml().with_parameter("type", "entry"));
    catalog.register(K::Entry, Format::Atom, atom_xml());
    catalog.register(K::Entry, Format::Json, json());

    for kind in [
        K::Property,
        K::EntityReferenceLink,
        K::EntityReferenceLinks,
        K::Collection,
    ] {
        catalog.register(kind, Format::Atom, app_xml());
        catalog.register(kind, Format::Atom, text_xml());
        catalog.register(kind, Format::Json, json());
    }

    catalog.register(K::Value, Format::RawValue, MediaType::new("text", "plain"));
    catalog.register(
        K::BinaryValue,
        Format::RawValue,
        MediaType::new("application", "octet-stream"),
    );

    catalog.register(
        K::ServiceDocument,
        Format::Atom,
        MediaType::new("application", "atomsvc+xml"),
    );
    catalog.register(K::ServiceDocument, Format::Atom, app_xml());
    catalog.register(K::ServiceDocument, Format::Json, json());

    catalog.register(K::MetadataDocument, Format::Metadata, app_xml());

    catalog.register(K::Error, Format::Atom, app_xml());
    catalog.register(K::Error, Format::Json, json());

    catalog.register(K::Batch, Format::Batch, MediaType::new("multipart", "mixed"));

    catalog.register(K::Parameter, Format::Json, json());

    catalog
}
