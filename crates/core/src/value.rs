//! Stored values and item handles
//!
//! A store keeps each value either as raw bytes or as UTF-8 text
//! ([`Payload`]). Reads hand back an item handle implementing [`Blob`];
//! interpreting the content (bytes, text, JSON) is left to the caller.

use std::borrow::Cow;

/// Raw content of one stored value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Payload {
    /// Arbitrary bytes, stored verbatim
    Bytes(Vec<u8>),
    /// UTF-8 text
    Text(String),
}

impl Payload {
    /// Content as bytes (text is returned as its UTF-8 encoding)
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Bytes(b) => b,
            Payload::Text(s) => s.as_bytes(),
        }
    }

    /// Content as text; invalid UTF-8 sequences are replaced
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Payload::Bytes(b) => String::from_utf8_lossy(b),
            Payload::Text(s) => Cow::Borrowed(s),
        }
    }

    /// Content length in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// True when there is no content
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume into raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Bytes(b) => b,
            Payload::Text(s) => s.into_bytes(),
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Payload::Bytes(b)
    }
}

impl From<&[u8]> for Payload {
    fn from(b: &[u8]) -> Self {
        Payload::Bytes(b.to_vec())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

/// Handle over one stored value, as returned by `Store::read` and `Store::list`
pub trait Blob {
    /// Key of the value inside its bucket
    fn key(&self) -> &str;

    /// Raw content
    fn bytes(&self) -> &[u8];

    /// Content decoded as UTF-8 (lossy)
    fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.bytes())
    }
}

/// Key plus content; the item handle of every bundled backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    key: String,
    payload: Payload,
}

impl Entry {
    /// Create a new entry
    pub fn new(key: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }

    /// Key of the entry
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stored content
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Split into key and payload
    pub fn into_parts(self) -> (String, Payload) {
        (self.key, self.payload)
    }
}

impl Blob for Entry {
    fn key(&self) -> &str {
        &self.key
    }

    fn bytes(&self) -> &[u8] {
        self.payload.as_bytes()
    }

    fn text(&self) -> Cow<'_, str> {
        self.payload.to_text()
    }
}

/// Parse `text` as JSON, falling back to the text itself as a JSON string
pub fn json_or_text(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}
