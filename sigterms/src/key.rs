//! Bucket key types.
//!
//! Buckets are generic over their key so byte-string terms and numeric terms
//! share merge, scoring and codec logic; only ordering, the key encoding and
//! display differ.

use crate::error::{DecodeError, EncodeError};
use crate::format::DocValueFormat;
use crate::stream::{WireReader, WireWriter};
use serde_json::Value;
use std::fmt;
use std::hash::Hash;

/// Longest term accepted from the wire, matching the index's own term limit.
pub const MAX_TERM_LENGTH: usize = 32_766;

pub trait TermKey: Ord + Hash + Clone + fmt::Debug + Send + Sync + 'static {
    /// Stream identifier written ahead of a named partial result
    const STREAM_TYPE: &'static str;

    /// Smallest possible encoding of a key, used to bound bucket counts on decode
    const MIN_ENCODED_LEN: usize;

    /// Fails for keys the decoder would reject.
    fn write(&self, out: &mut WireWriter) -> Result<(), EncodeError>;

    fn read(input: &mut WireReader<'_>) -> Result<Self, DecodeError>;

    fn key_as_string(&self, format: DocValueFormat) -> String;

    /// Value for the rendered `key` field plus an optional `key_as_string`
    fn render_key(&self, format: DocValueFormat) -> (Value, Option<String>);
}

/// Raw byte-string term. Orders by unsigned byte comparison.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Term(Vec<u8>);

impl Term {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Term(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Term({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Term(value.as_bytes().to_vec())
    }
}

impl From<String> for Term {
    fn from(value: String) -> Self {
        Term(value.into_bytes())
    }
}

impl From<&[u8]> for Term {
    fn from(value: &[u8]) -> Self {
        Term(value.to_vec())
    }
}

impl From<Vec<u8>> for Term {
    fn from(value: Vec<u8>) -> Self {
        Term(value)
    }
}

impl TermKey for Term {
    const STREAM_TYPE: &'static str = "sigsterms";
    const MIN_ENCODED_LEN: usize = 1;

    fn write(&self, out: &mut WireWriter) -> Result<(), EncodeError> {
        out.write_bounded_bytes("bucket.term", &self.0, MAX_TERM_LENGTH)
    }

    fn read(input: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        let bytes = input.read_bytes("bucket.term", MAX_TERM_LENGTH)?;
        Ok(Term(bytes.to_vec()))
    }

    fn key_as_string(&self, format: DocValueFormat) -> String {
        format.format_bytes(&self.0)
    }

    fn render_key(&self, format: DocValueFormat) -> (Value, Option<String>) {
        (Value::String(self.key_as_string(format)), None)
    }
}

impl TermKey for i64 {
    const STREAM_TYPE: &'static str = "siglterms";
    const MIN_ENCODED_LEN: usize = 8;

    fn write(&self, out: &mut WireWriter) -> Result<(), EncodeError> {
        out.write_i64(*self);
        Ok(())
    }

    fn read(input: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        input.read_i64("bucket.term")
    }

    fn key_as_string(&self, format: DocValueFormat) -> String {
        format.format_long(*self)
    }

    fn render_key(&self, format: DocValueFormat) -> (Value, Option<String>) {
        let key_as_string = (!format.is_default()).then(|| self.key_as_string(format));
        (Value::from(*self), key_as_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_ordering_is_unsigned_bytewise() {
        let mut terms = vec![
            Term::from(&[0xFFu8][..]),
            Term::from("b"),
            Term::from("ab"),
            Term::from("a"),
            Term::from(""),
        ];
        terms.sort();
        assert_eq!(
            terms,
            vec![
                Term::from(""),
                Term::from("a"),
                Term::from("ab"),
                Term::from("b"),
                Term::from(&[0xFFu8][..]),
            ]
        );
    }

    #[test]
    fn test_term_wire_limit() {
        let mut out = WireWriter::new();
        out.write_vlong(MAX_TERM_LENGTH as u64 + 1);
        let bytes = out.freeze();
        let err = Term::read(&mut WireReader::new(&bytes)).unwrap_err();
        assert_eq!(err.field, "bucket.term");
        assert!(err.reason.contains("exceeds limit"));
    }

    #[test]
    fn test_oversized_term_is_not_written() {
        let mut out = WireWriter::new();
        Term::new(vec![b'x'; MAX_TERM_LENGTH]).write(&mut out).unwrap();
        let written = out.len();

        let err = Term::new(vec![b'x'; MAX_TERM_LENGTH + 1])
            .write(&mut out)
            .unwrap_err();
        assert_eq!(err.field, "bucket.term");
        assert_eq!(out.len(), written);
    }

    #[test]
    fn test_render_keys() {
        let (key, as_string) = Term::from("rust").render_key(DocValueFormat::Raw);
        assert_eq!(key, Value::String("rust".into()));
        assert!(as_string.is_none());

        let (key, as_string) = 7i64.render_key(DocValueFormat::Raw);
        assert_eq!(key, Value::from(7));
        assert!(as_string.is_none());

        let (_, as_string) = 1i64.render_key(DocValueFormat::Bool);
        assert_eq!(as_string.as_deref(), Some("true"));
    }

    #[test]
    fn test_debug_is_readable() {
        assert_eq!(format!("{:?}", Term::from("foo")), "Term(\"foo\")");
    }
}
