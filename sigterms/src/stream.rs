//! Wire primitives shared by every encoded partial result.
//!
//! Integers are unsigned LEB128 varints, strings and raw terms are
//! length-prefixed, doubles are fixed 8-byte big-endian IEEE-754. Every read
//! checks the remaining length first, so a truncated or hostile buffer turns
//! into a [`DecodeError`] naming the field instead of a panic.

use crate::error::{DecodeError, EncodeError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Longest encoding of a `u64` varint.
pub const MAX_VLONG_BYTES: usize = 10;

/// Upper bound on identifier strings (names of formats, heuristics, stream types).
pub const MAX_IDENTIFIER_LEN: usize = 256;

/// Upper bound on user-chosen aggregation names.
pub const MAX_NAME_LEN: usize = 32_766;

/// Append-only encoder for the partial result wire layout.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_vlong(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    pub fn write_vint(&mut self, value: u32) {
        self.write_vlong(u64::from(value));
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_f64(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    /// Length-prefixed raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_vlong(bytes.len() as u64);
        self.buf.put_slice(bytes);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Length-prefixed bytes, refusing anything the reader would reject as
    /// longer than `max`.
    pub fn write_bounded_bytes(
        &mut self,
        field: &'static str,
        bytes: &[u8],
        max: usize,
    ) -> Result<(), EncodeError> {
        if bytes.len() > max {
            return Err(EncodeError::new(
                field,
                format!("length {} exceeds limit {}", bytes.len(), max),
            ));
        }
        self.write_bytes(bytes);
        Ok(())
    }

    pub fn write_bounded_str(
        &mut self,
        field: &'static str,
        value: &str,
        max: usize,
    ) -> Result<(), EncodeError> {
        self.write_bounded_bytes(field, value.as_bytes(), max)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over an encoded buffer.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, field: &'static str, needed: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < needed {
            return Err(DecodeError::truncated(field, needed, self.buf.remaining()));
        }
        Ok(())
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        self.ensure(field, 1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_vlong(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        let mut value = 0u64;
        for i in 0..MAX_VLONG_BYTES {
            let byte = self.read_u8(field)?;
            let chunk = u64::from(byte & 0x7F);
            // the tenth byte only carries the top bit of a u64
            if i == MAX_VLONG_BYTES - 1 && chunk > 1 {
                return Err(DecodeError::new(field, "varint overflows 64 bits"));
            }
            value |= chunk << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(DecodeError::new(
            field,
            format!("varint is longer than {} bytes", MAX_VLONG_BYTES),
        ))
    }

    pub fn read_vint(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        let value = self.read_vlong(field)?;
        u32::try_from(value)
            .map_err(|_| DecodeError::new(field, format!("{} does not fit in 32 bits", value)))
    }

    pub fn read_bool(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        match self.read_u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::new(
                field,
                format!("invalid boolean byte {:#04x}", other),
            )),
        }
    }

    pub fn read_f64(&mut self, field: &'static str) -> Result<f64, DecodeError> {
        self.ensure(field, 8)?;
        Ok(self.buf.get_f64())
    }

    pub fn read_i64(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        self.ensure(field, 8)?;
        Ok(self.buf.get_i64())
    }

    /// Reads a length prefix, rejecting values above `max` or past the end of the buffer.
    pub fn read_len(&mut self, field: &'static str, max: usize) -> Result<usize, DecodeError> {
        let len = self.read_vlong(field)?;
        if len > max as u64 {
            return Err(DecodeError::new(
                field,
                format!("length prefix {} exceeds limit {}", len, max),
            ));
        }
        let len = len as usize;
        self.ensure(field, len)?;
        Ok(len)
    }

    /// Length-prefixed raw bytes, borrowed from the underlying buffer.
    pub fn read_bytes(&mut self, field: &'static str, max: usize) -> Result<&'a [u8], DecodeError> {
        let len = self.read_len(field, max)?;
        let buf: &'a [u8] = self.buf;
        let (head, tail) = buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Identifier string of at most [`MAX_IDENTIFIER_LEN`] bytes.
    pub fn read_str(&mut self, field: &'static str) -> Result<&'a str, DecodeError> {
        self.read_bounded_str(field, MAX_IDENTIFIER_LEN)
    }

    pub fn read_bounded_str(
        &mut self,
        field: &'static str,
        max: usize,
    ) -> Result<&'a str, DecodeError> {
        let bytes = self.read_bytes(field, max)?;
        std::str::from_utf8(bytes)
            .map_err(|e| DecodeError::new(field, format!("invalid UTF-8: {}", e)))
    }

    /// Reads an element count and checks that `count` records of at least
    /// `min_record_len` bytes can still fit in the buffer.
    pub fn read_count(
        &mut self,
        field: &'static str,
        min_record_len: usize,
    ) -> Result<usize, DecodeError> {
        let count = self.read_vint(field)? as usize;
        let needed = count.checked_mul(min_record_len).ok_or_else(|| {
            DecodeError::new(field, format!("count {} overflows buffer size", count))
        })?;
        if needed > self.remaining() {
            return Err(DecodeError::new(
                field,
                format!(
                    "count {} cannot fit in {} remaining bytes",
                    count,
                    self.remaining()
                ),
            ));
        }
        Ok(count)
    }

    /// Fails if anything is left after a complete record.
    pub fn finish(self, field: &'static str) -> Result<(), DecodeError> {
        if self.buf.has_remaining() {
            return Err(DecodeError::new(
                field,
                format!("{} trailing bytes after record", self.buf.remaining()),
            ));
        }
        Ok(())
    }
}
