//! Media types and the RFC 2616 header grammar they are parsed with.
//!
//! A media type is a type/subtype pair plus an *ordered* parameter list.
//! Parameter order matters during matching: a `q` parameter marks the end of
//! the parameters that participate in matching; everything after it is an
//! accept-extension and is ignored.

use std::fmt;

use smallvec::SmallVec;

use crate::Error;

/// The parameter name carrying an RFC 2616 quality value.
pub const QUALITY_PARAMETER: &str = "q";

/// A parsed media type such as `application/json;odata=verbose`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    type_name: String,
    subtype: String,
    parameters: SmallVec<[(String, String); 2]>,
}

impl MediaType {
    /// Create a media type without parameters.
    pub fn new(type_name: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            subtype: subtype.into(),
            parameters: SmallVec::new(),
        }
    }

    /// Append a parameter, preserving declaration order.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    /// The primary type name, e.g. `application`.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The subtype name, e.g. `json`.
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// The parameters in declaration order, including any `q` parameter.
    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    /// `type/subtype` without parameters.
    pub fn full_type_name(&self) -> String {
        format!("{}/{}", self.type_name, self.subtype)
    }

    /// `true` if either the type or the subtype is the `*` wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.type_name == "*" || self.subtype == "*"
    }

    /// Look up a parameter value by case-insensitive name.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_name, self.subtype)?;
        for (name, value) in &self.parameters {
            write!(f, ";{name}={value}")?;
        }
        Ok(())
    }
}

/// Parse a comma-separated list of media types, as found in an Accept header.
///
/// An empty or all-whitespace input yields an empty list; the caller decides
/// whether that is an error for its header.
pub fn parse_media_types(text: &str) -> Result<Vec<MediaType>, Error> {
    let mut lexer = Lexer::new(text);
    let mut types = Vec::new();
    lexer.skip_whitespace();
    if lexer.at_end() {
        return Ok(types);
    }
    loop {
        types.push(parse_one(&mut lexer)?);
        lexer.skip_whitespace();
        if lexer.at_end() {
            return Ok(types);
        }
        lexer.expect(b',')?;
        lexer.skip_whitespace();
    }
}

/// Parse a Content-Type header, which must carry exactly one media type.
pub fn parse_exactly_one(text: &str) -> Result<MediaType, Error> {
    let mut types = parse_media_types(text)?;
    match types.len() {
        1 => Ok(types.remove(0)),
        0 => Err(Error::MalformedContentType {
            detail: "expected a media type, found none".into(),
        }),
        n => Err(Error::MalformedContentType {
            detail: format!("expected exactly one media type, found {n} in '{text}'"),
        }),
    }
}

fn parse_one(lexer: &mut Lexer<'_>) -> Result<MediaType, Error> {
    let type_name = lexer.read_token("media type name")?;
    lexer.expect(b'/')?;
    let subtype = lexer.read_token("media subtype name")?;
    let mut media_type = MediaType::new(type_name, subtype);
    loop {
        lexer.skip_whitespace();
        if !lexer.eat(b';') {
            return Ok(media_type);
        }
        lexer.skip_whitespace();
        let name = lexer.read_token("parameter name")?;
        lexer.expect(b'=')?;
        let value = lexer.read_token_or_quoted_string()?;
        media_type = media_type.with_parameter(name, value);
    }
}

/// Parse an RFC 2616 `qvalue` into the internal 0–1000 scale.
///
/// The grammar allows `0` or `1` followed by at most three decimal digits,
/// and a value of `1` admits only zero digits after the point.
pub(crate) fn parse_quality(value: &str) -> Result<u16, Error> {
    let malformed = || Error::MalformedContentType {
        detail: format!("'{value}' is not a valid quality value"),
    };
    let mut chars = value.chars();
    let lead = match chars.next() {
        Some('0') => 0u16,
        Some('1') => 1000,
        _ => return Err(malformed()),
    };
    match chars.next() {
        None => return Ok(lead),
        Some('.') => {}
        Some(_) => return Err(malformed()),
    }
    let mut quality = lead;
    let mut scale = 100u16;
    let mut digits = 0;
    for c in chars {
        let digit = c.to_digit(10).ok_or_else(malformed)?;
        digits += 1;
        if digits > 3 || (lead == 1000 && digit != 0) {
            return Err(malformed());
        }
        quality += digit as u16 * scale;
        scale /= 10;
    }
    Ok(quality)
}

/// A cursor over HTTP header text with the RFC 2616 token and quoted-string rules.
pub(crate) struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub(crate) fn skip_whitespace(&mut self) {
        while matches!(self.bytes.get(self.pos), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub(crate) fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, byte: u8) -> Result<(), Error> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(Error::MalformedContentType {
                detail: format!(
                    "expected '{}' at offset {} in header text",
                    byte as char, self.pos
                ),
            })
        }
    }

    /// Read one RFC 2616 token; `what` names the construct for diagnostics.
    pub(crate) fn read_token(&mut self, what: &str) -> Result<String, Error> {
        let start = self.pos;
        while self.peek().is_some_and(is_token_byte) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(Error::MalformedContentType {
                detail: format!("expected a {what} at offset {start}"),
            });
        }
        // Token bytes are a subset of ASCII, so this cannot fail.
        Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
    }

    /// Read a parameter value: either a token or an RFC 2616 quoted-string.
    ///
    /// Quoted-string values are returned with the quotes stripped and
    /// quoted-pair escapes resolved.
    pub(crate) fn read_token_or_quoted_string(&mut self) -> Result<String, Error> {
        if !self.eat(b'"') {
            return self.read_token("parameter value");
        }
        let mut value = String::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| Error::MalformedContentType {
                        detail: "unterminated quoted-pair in quoted-string".into(),
                    })?;
                    value.push(escaped as char);
                    self.pos += 1;
                }
                Some(byte) => {
                    value.push(byte as char);
                    self.pos += 1;
                }
                None => {
                    return Err(Error::MalformedContentType {
                        detail: "unterminated quoted-string".into(),
                    })
                }
            }
        }
    }
}

/// RFC 2616 token characters: CHARs that are neither CTLs nor separators.
fn is_token_byte(byte: u8) -> bool {
    matches!(byte,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~')
        || byte.is_ascii_alphanumeric()
}
