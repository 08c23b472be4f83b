//! Single packet encode/decode.

use std::fmt;

use crate::{
    errors::{ProtocolError, Result},
    escape::{escape, unescape},
};

/// Field separator.
pub const SEPARATOR: char = '#';

/// End-of-packet marker.
pub const TERMINATOR: char = '%';

/// One protocol packet.
///
/// Fields are held in wire form: already escaped, verbatim between
/// separators. Structured fields (evidence `name&desc&image`, nested
/// testimony markers) are built by callers, so the codec never guesses which
/// glyphs are content and which are structure. Use [`Packet::text`] and
/// [`Packet::push_text`] for free-form user text.
///
/// # Invariants
///
/// - `header` is non-empty for every decoded packet.
/// - `encoded_len()` equals `encode().len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    header: String,
    fields: Vec<String>,
}

impl Packet {
    /// Packet with no fields.
    pub fn new(header: impl Into<String>) -> Self {
        Self { header: header.into(), fields: Vec::new() }
    }

    /// Packet with the given wire-form fields.
    pub fn with_fields<I, S>(header: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { header: header.into(), fields: fields.into_iter().map(Into::into).collect() }
    }

    /// Append a wire-form field.
    #[must_use]
    pub fn field(mut self, value: impl Into<String>) -> Self {
        self.fields.push(value.into());
        self
    }

    /// Append several wire-form fields.
    #[must_use]
    pub fn extend_fields<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(values.into_iter().map(Into::into));
        self
    }

    /// Append free-form text, escaping reserved glyphs.
    #[must_use]
    pub fn push_text(mut self, text: &str) -> Self {
        self.fields.push(escape(text));
        self
    }

    /// Header token.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// All fields in wire form.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Consume the packet, returning its wire-form fields.
    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }

    /// Wire-form field at `index`.
    pub fn raw(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Unescaped field at `index`.
    pub fn text(&self, index: usize) -> Option<String> {
        self.raw(index).map(unescape)
    }

    /// Field at `index` parsed as an integer.
    pub fn int(&self, index: usize) -> Option<i64> {
        self.raw(index).and_then(|f| f.trim().parse().ok())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the packet carries no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Size of [`Packet::encode`]'s output in bytes.
    pub fn encoded_len(&self) -> usize {
        self.header.len() + self.fields.iter().map(|f| f.len() + 1).sum::<usize>() + 2
    }

    /// Encode as `HEADER#f1#...#fn#%`.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.encoded_len());
        out.push_str(&self.header);
        for field in &self.fields {
            out.push(SEPARATOR);
            out.push_str(field);
        }
        out.push(SEPARATOR);
        out.push(TERMINATOR);
        out
    }

    /// Decode one complete packet.
    ///
    /// Accepts the trailing separator before the terminator as optional, so
    /// both `HI#abc#%` and `HI#abc%` decode to the same packet.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MissingTerminator` if `raw` does not end with `%`
    /// - `ProtocolError::EmptyHeader` if the header token is empty
    pub fn decode(raw: &str) -> Result<Self> {
        let raw = raw.trim_start();
        let body = raw.strip_suffix(TERMINATOR).ok_or(ProtocolError::MissingTerminator)?;
        let body = body.strip_suffix(SEPARATOR).unwrap_or(body);

        let mut parts = body.split(SEPARATOR);
        let header = parts.next().unwrap_or_default();
        if header.is_empty() {
            return Err(ProtocolError::EmptyHeader);
        }

        Ok(Self { header: header.to_string(), fields: parts.map(str::to_string).collect() })
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_layout() {
        let packet = Packet::new("CT").field("Athena").push_text("50% off #1").field("1");
        assert_eq!(packet.encode(), "CT#Athena#50<percent> off <num>1#1#%");
        assert_eq!(packet.encoded_len(), packet.encode().len());
    }

    #[test]
    fn encode_without_fields() {
        let packet = Packet::new("DONE");
        assert_eq!(packet.encode(), "DONE#%");
        assert_eq!(packet.encoded_len(), 6);
    }

    #[test]
    fn decode_fields() {
        let packet = Packet::decode("MS#a##b#%").unwrap();
        assert_eq!(packet.header(), "MS");
        assert_eq!(packet.fields(), ["a", "", "b"]);
    }

    #[test]
    fn decode_tolerates_missing_trailing_separator() {
        assert_eq!(Packet::decode("HI#hdid%").unwrap(), Packet::decode("HI#hdid#%").unwrap());
    }

    #[test]
    fn decode_keeps_trailing_empty_field() {
        let packet = Packet::decode("CT#name##%").unwrap();
        assert_eq!(packet.fields(), ["name", ""]);
    }

    #[test]
    fn decode_rejects_malformed() {
        assert_eq!(Packet::decode("HI#abc#"), Err(ProtocolError::MissingTerminator));
        assert_eq!(Packet::decode("#abc#%"), Err(ProtocolError::EmptyHeader));
        assert_eq!(Packet::decode("%"), Err(ProtocolError::EmptyHeader));
    }

    #[test]
    fn text_accessor_unescapes() {
        let packet = Packet::decode("CT#me#I<and>you<num>1#%").unwrap();
        assert_eq!(packet.text(1).as_deref(), Some("I&you#1"));
        assert_eq!(packet.raw(1), Some("I<and>you<num>1"));
        assert_eq!(packet.text(5), None);
    }

    #[test]
    fn int_accessor() {
        let packet = Packet::decode("CC#0#12#hdid#%").unwrap();
        assert_eq!(packet.int(1), Some(12));
        assert_eq!(packet.int(2), None);
    }
}
