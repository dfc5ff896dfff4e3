//! Accept-Charset resolution for negotiated payloads.

use std::fmt;

use crate::media_type::{parse_quality, Lexer, MediaType};
use crate::Error;

/// A text encoding the wire layer can commit to.
///
/// The writer only ever resolves to one of these; anything else in an
/// Accept-Charset header is skipped over rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// UTF-8, with or without a byte-order mark.
    Utf8 {
        /// Whether a byte-order mark is written ahead of the payload.
        bom: bool,
    },
    /// UTF-16, little-endian with byte-order mark.
    Utf16,
    /// US-ASCII.
    Ascii,
    /// ISO-8859-1.
    Latin1,
}

impl Encoding {
    /// The fallback of last resort: UTF-8 without a byte-order mark.
    pub const fn fallback() -> Self {
        Encoding::Utf8 { bom: false }
    }

    /// The IANA charset label, as written into a Content-Type charset parameter.
    pub fn charset_label(&self) -> &'static str {
        match self {
            Encoding::Utf8 { .. } => "utf-8",
            Encoding::Utf16 => "utf-16",
            Encoding::Ascii => "us-ascii",
            Encoding::Latin1 => "iso-8859-1",
        }
    }

    /// Resolve a charset label, accepting the common aliases.
    pub fn from_charset_label(label: &str) -> Option<Self> {
        if label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8") {
            Some(Encoding::Utf8 { bom: false })
        } else if label.eq_ignore_ascii_case("utf-16") {
            Some(Encoding::Utf16)
        } else if label.eq_ignore_ascii_case("us-ascii") || label.eq_ignore_ascii_case("ascii") {
            Some(Encoding::Ascii)
        } else if label.eq_ignore_ascii_case("iso-8859-1") || label.eq_ignore_ascii_case("latin1") {
            Some(Encoding::Latin1)
        } else {
            None
        }
    }

    /// Whether this encoding writes a byte-order mark.
    pub fn has_byte_order_mark(&self) -> bool {
        matches!(self, Encoding::Utf8 { bom: true } | Encoding::Utf16)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.charset_label())
    }
}

/// The encoding a media type implies when no Accept-Charset narrows it down.
fn implied_encoding(media_type: &MediaType) -> Option<Encoding> {
    if let Some(charset) = media_type.parameter("charset") {
        if let Some(encoding) = Encoding::from_charset_label(charset) {
            return Some(encoding);
        }
    }
    if media_type.type_name().eq_ignore_ascii_case("text") {
        return Some(Encoding::Ascii);
    }
    if media_type.type_name().eq_ignore_ascii_case("application")
        && media_type.subtype().eq_ignore_ascii_case("json")
    {
        return Some(Encoding::Utf8 { bom: false });
    }
    None
}

/// Resolve the payload encoding from an Accept-Charset header.
///
/// Charset ranges are matched case-insensitively with their quality values;
/// `*` stands for the media type's implied default. When nothing acceptable
/// remains, the implied default applies, and failing that UTF-8 without a
/// byte-order mark.
pub(crate) fn resolve(accept_charset: Option<&str>, media_type: &MediaType) -> Result<Encoding, Error> {
    let implied = || implied_encoding(media_type).unwrap_or(Encoding::fallback());
    let Some(text) = accept_charset else {
        return Ok(implied());
    };

    let mut best: Option<(Encoding, u16)> = None;
    for range in parse_charset_ranges(text)? {
        if range.quality == 0 {
            continue;
        }
        let encoding = if range.charset == "*" {
            Some(implied())
        } else {
            Encoding::from_charset_label(&range.charset)
        };
        let Some(encoding) = encoding else { continue };
        if best.map_or(true, |(_, q)| range.quality > q) {
            best = Some((encoding, range.quality));
        }
    }

    let resolved = best.map_or_else(implied, |(encoding, _)| encoding);
    tracing::trace!(charset = resolved.charset_label(), "resolved payload encoding");
    Ok(resolved)
}

struct CharsetRange {
    charset: String,
    quality: u16,
}

fn parse_charset_ranges(text: &str) -> Result<Vec<CharsetRange>, Error> {
    let mut lexer = Lexer::new(text);
    let mut ranges = Vec::new();
    lexer.skip_whitespace();
    if lexer.at_end() {
        return Ok(ranges);
    }
    loop {
        let charset = if lexer.eat(b'*') {
            "*".to_string()
        } else {
            lexer
                .read_token("charset name")
                .map_err(|e| Error::MalformedCharset { detail: e.to_string() })?
        };
        lexer.skip_whitespace();
        let mut quality = 1000;
        if lexer.eat(b';') {
            lexer.skip_whitespace();
            let name = lexer
                .read_token("charset parameter name")
                .map_err(|e| Error::MalformedCharset { detail: e.to_string() })?;
            if !name.eq_ignore_ascii_case("q") {
                return Err(Error::MalformedCharset {
                    detail: format!("unexpected charset parameter '{name}'"),
                });
            }
            lexer
                .expect(b'=')
                .map_err(|e| Error::MalformedCharset { detail: e.to_string() })?;
            let value = lexer
                .read_token("quality value")
                .map_err(|e| Error::MalformedCharset { detail: e.to_string() })?;
            quality = parse_quality(&value).map_err(|_| Error::MalformedCharset {
                detail: format!("'{value}' is not a valid quality value"),
            })?;
        }
        ranges.push(CharsetRange { charset, quality });
        lexer.skip_whitespace();
        if lexer.at_end() {
            return Ok(ranges);
        }
        lexer
            .expect(b',')
            .map_err(|e| Error::MalformedCharset { detail: e.to_string() })?;
        lexer.skip_whitespace();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_type::parse_exactly_one;

    fn json() -> MediaType {
        parse_exactly_one("application/json").unwrap()
    }

    #[test]
    fn no_header_uses_implied_default() {
        assert_eq!(resolve(None, &json()).unwrap(), Encoding::Utf8 { bom: false });
        let plain = parse_exactly_one("text/plain").unwrap();
        assert_eq!(resolve(None, &plain).unwrap(), Encoding::Ascii);
    }

    #[test]
    fn charset_parameter_on_the_media_type_wins_without_a_header() {
        let typed = parse_exactly_one("text/plain;charset=utf-8").unwrap();
        assert_eq!(resolve(None, &typed).unwrap(), Encoding::Utf8 { bom: false });
    }

    #[test]
    fn highest_quality_supported_charset_wins() {
        let encoding = resolve(Some("utf-16;q=0.8, utf-8"), &json()).unwrap();
        assert_eq!(encoding, Encoding::Utf8 { bom: false });
        let encoding = resolve(Some("utf-16;q=0.8, us-ascii;q=0.5"), &json()).unwrap();
        assert_eq!(encoding, Encoding::Utf16);
    }

    #[test]
    fn first_listed_breaks_quality_ties() {
        let encoding = resolve(Some("iso-8859-1, utf-16"), &json()).unwrap();
        assert_eq!(encoding, Encoding::Latin1);
    }

    #[test]
    fn star_resolves_to_the_implied_default() {
        let encoding = resolve(Some("*"), &json()).unwrap();
        assert_eq!(encoding, Encoding::Utf8 { bom: false });
    }

    #[test]
    fn zero_quality_excludes_a_charset() {
        let encoding = resolve(Some("utf-16;q=0"), &json()).unwrap();
        assert_eq!(encoding, Encoding::Utf8 { bom: false });
    }

    #[test]
    fn unknown_charsets_fall_through_to_the_default() {
        let encoding = resolve(Some("shift_jis"), &json()).unwrap();
        assert_eq!(encoding, Encoding::Utf8 { bom: false });
    }

    #[test]
    fn malformed_quality_is_rejected() {
        let err = resolve(Some("utf-8;q=2"), &json()).unwrap_err();
        assert!(matches!(err, Error::MalformedCharset { .. }));
    }
}
