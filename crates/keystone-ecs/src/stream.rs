//! Sequential binary stream used for entity and scene persistence.
//!
//! [`SceneWriter`] appends little-endian primitives to a growable buffer and
//! [`SceneReader`] consumes them in the same order. There is no random access
//! and no framing beyond what callers write explicitly; the only structured
//! unit is the *block* (`[len: i32][bytes]`), which makes a payload
//! self-delimiting so a reader can skip it without understanding it.
//!
//! Every read error carries the absolute byte offset at which it occurred.
//! Readers created over a sub-slice with [`SceneReader::with_base_offset`]
//! keep reporting offsets relative to the enclosing stream.

use glam::{Quat, Vec3, Vec4};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors produced while writing to or reading from a scene stream.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StreamError {
    /// The stream ended before a value could be read completely.
    #[error("unexpected end of stream at byte {offset}: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// A length prefix was negative.
    #[error("negative length {length} at byte {offset}")]
    NegativeLength { offset: usize, length: i32 },

    /// A string payload was not valid UTF-8.
    #[error("invalid UTF-8 string at byte {offset}")]
    InvalidUtf8 { offset: usize },

    /// A boolean byte was neither 0 nor 1.
    #[error("invalid bool byte {value:#04x} at byte {offset}")]
    InvalidBool { offset: usize, value: u8 },

    /// An enum discriminant was out of range.
    #[error("invalid {what} discriminant {value} at byte {offset}")]
    InvalidDiscriminant {
        offset: usize,
        what: &'static str,
        value: i32,
    },

    /// A value could not be encoded (length overflow or serde failure).
    #[error("failed to encode value: {details}")]
    Encode { details: String },

    /// A serde value block could not be decoded.
    #[error("failed to decode value at byte {offset}: {details}")]
    Decode { offset: usize, details: String },
}

fn bincode_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

// ---------------------------------------------------------------------------
// SceneWriter
// ---------------------------------------------------------------------------

/// Append-only writer producing a scene byte stream.
#[derive(Debug, Default, Clone)]
pub struct SceneWriter {
    buf: Vec<u8>,
}

impl SceneWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Create an empty writer with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer and return its buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    /// Write raw bytes with no length prefix (magic numbers, digests).
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a length as an `i32` prefix.
    fn write_len(&mut self, len: usize) -> Result<(), StreamError> {
        let len = i32::try_from(len).map_err(|_| StreamError::Encode {
            details: format!("length {len} does not fit in an i32 prefix"),
        })?;
        self.write_i32(len);
        Ok(())
    }

    /// Write a UTF-8 string as `[len: i32][bytes]`.
    pub fn write_str(&mut self, value: &str) -> Result<(), StreamError> {
        self.write_len(value.len())?;
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    /// Write an opaque block as `[len: i32][bytes]`.
    pub fn write_block(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        self.write_len(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_vec3(&mut self, value: Vec3) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
    }

    pub fn write_vec4(&mut self, value: Vec4) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
        self.write_f32(value.w);
    }

    pub fn write_quat(&mut self, value: Quat) {
        self.write_vec4(Vec4::from(value));
    }

    /// Encode a serde value with bincode and write it as a block.
    pub fn write_value<T: Serialize>(&mut self, value: &T) -> Result<(), StreamError> {
        let bytes = bincode::serde::encode_to_vec(value, bincode_config()).map_err(|e| {
            StreamError::Encode {
                details: e.to_string(),
            }
        })?;
        self.write_block(&bytes)
    }
}

// ---------------------------------------------------------------------------
// SceneReader
// ---------------------------------------------------------------------------

/// Sequential reader over a scene byte stream.
#[derive(Debug, Clone)]
pub struct SceneReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> SceneReader<'a> {
    /// Create a reader positioned at the start of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_base_offset(bytes, 0)
    }

    /// Create a reader over a sub-slice whose first byte sits at `base` in
    /// the enclosing stream. Only affects reported offsets.
    pub fn with_base_offset(bytes: &'a [u8], base: usize) -> Self {
        Self {
            bytes,
            pos: 0,
            base,
        }
    }

    /// Absolute offset of the next byte to be read.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Whether every byte has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Read exactly `len` raw bytes.
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8], StreamError> {
        if self.remaining() < len {
            return Err(StreamError::UnexpectedEnd {
                offset: self.offset(),
                needed: len,
                remaining: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.bytes[start..self.pos])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], StreamError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_raw(N)?);
        Ok(out)
    }

    pub fn read_i32(&mut self) -> Result<i32, StreamError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, StreamError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_bool(&mut self) -> Result<bool, StreamError> {
        let offset = self.offset();
        match self.read_array::<1>()?[0] {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(StreamError::InvalidBool { offset, value }),
        }
    }

    fn read_len(&mut self) -> Result<usize, StreamError> {
        let offset = self.offset();
        let length = self.read_i32()?;
        usize::try_from(length).map_err(|_| StreamError::NegativeLength { offset, length })
    }

    pub fn read_string(&mut self) -> Result<String, StreamError> {
        let len = self.read_len()?;
        let offset = self.offset();
        let bytes = self.read_raw(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| StreamError::InvalidUtf8 { offset })
    }

    /// Read a `[len: i32][bytes]` block, returning the bytes and the absolute
    /// offset of their first byte.
    pub fn read_block(&mut self) -> Result<(usize, &'a [u8]), StreamError> {
        let len = self.read_len()?;
        let offset = self.offset();
        Ok((offset, self.read_raw(len)?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3, StreamError> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec4(&mut self) -> Result<Vec4, StreamError> {
        Ok(Vec4::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    pub fn read_quat(&mut self) -> Result<Quat, StreamError> {
        Ok(Quat::from_vec4(self.read_vec4()?))
    }

    /// Read a block written by [`SceneWriter::write_value`] and decode it.
    pub fn read_value<T: DeserializeOwned>(&mut self) -> Result<T, StreamError> {
        let (offset, bytes) = self.read_block()?;
        let (value, used) = bincode::serde::decode_from_slice::<T, _>(bytes, bincode_config())
            .map_err(|e| StreamError::Decode {
                offset,
                details: e.to_string(),
            })?;
        if used != bytes.len() {
            return Err(StreamError::Decode {
                offset,
                details: format!("{} trailing bytes after value", bytes.len() - used),
            });
        }
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_read_back_in_order() {
        let mut w = SceneWriter::new();
        w.write_i32(-7);
        w.write_str("crate").unwrap();
        w.write_bool(true);
        w.write_f32(2.5);
        w.write_vec3(Vec3::new(1.0, 2.0, 3.0));

        let mut r = SceneReader::new(w.as_bytes());
        assert_eq!(r.read_i32().unwrap(), -7);
        assert_eq!(r.read_string().unwrap(), "crate");
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_f32().unwrap(), 2.5);
        assert_eq!(r.read_vec3().unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert!(r.is_exhausted());
    }

    #[test]
    fn string_layout_is_length_prefixed_le() {
        let mut w = SceneWriter::new();
        w.write_str("ab").unwrap();
        assert_eq!(w.as_bytes(), &[2, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn truncated_read_reports_offset() {
        let mut w = SceneWriter::new();
        w.write_i32(10);
        w.write_raw(b"abc");
        let mut r = SceneReader::new(w.as_bytes());
        let err = r.read_string().unwrap_err();
        assert_eq!(
            err,
            StreamError::UnexpectedEnd {
                offset: 4,
                needed: 10,
                remaining: 3
            }
        );
    }

    #[test]
    fn negative_length_rejected() {
        let mut w = SceneWriter::new();
        w.write_i32(-1);
        let err = SceneReader::new(w.as_bytes()).read_block().unwrap_err();
        assert_eq!(
            err,
            StreamError::NegativeLength {
                offset: 0,
                length: -1
            }
        );
    }

    #[test]
    fn invalid_bool_rejected() {
        let err = SceneReader::new(&[2]).read_bool().unwrap_err();
        assert_eq!(err, StreamError::InvalidBool { offset: 0, value: 2 });
    }

    #[test]
    fn invalid_utf8_rejected() {
        let mut w = SceneWriter::new();
        w.write_block(&[0xff, 0xfe]).unwrap();
        let err = SceneReader::new(w.as_bytes()).read_string().unwrap_err();
        assert_eq!(err, StreamError::InvalidUtf8 { offset: 4 });
    }

    #[test]
    fn base_offset_shifts_reported_positions() {
        let mut r = SceneReader::with_base_offset(&[1, 5], 100);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.offset(), 101);
        let err = r.read_bool().unwrap_err();
        assert_eq!(err, StreamError::InvalidBool { offset: 101, value: 5 });
    }

    #[test]
    fn serde_value_block() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Settings {
            mass: f32,
            tags: Vec<String>,
        }

        let settings = Settings {
            mass: 3.0,
            tags: vec!["a".to_owned()],
        };
        let mut w = SceneWriter::new();
        w.write_value(&settings).unwrap();
        w.write_bool(false);

        let mut r = SceneReader::new(w.as_bytes());
        assert_eq!(r.read_value::<Settings>().unwrap(), settings);
        assert!(!r.read_bool().unwrap());
    }

    #[test]
    fn garbage_value_block_is_decode_error() {
        let mut w = SceneWriter::new();
        w.write_block(&[0xff]).unwrap();
        let err = SceneReader::new(w.as_bytes())
            .read_value::<String>()
            .unwrap_err();
        assert!(matches!(err, StreamError::Decode { offset: 4, .. }));
    }
}
