//! Map entries: an owned key, its precomputed hash, and a tagged value.

use crate::byte_buffer::ByteBuffer;
use crate::error::{BufferError, MapError};
use crate::text_buffer::TextBuffer;
use core::fmt;

/// Discriminator of the value an entry holds. The numbering matches the tag
/// values exposed to host bindings (0 is reserved for "invalid").
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum EntryType {
    Integer = 1,
    Array = 2,
    Text = 3,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryType::Integer => "integer",
            EntryType::Array => "array",
            EntryType::Text => "text",
        })
    }
}

/// Owned entry payload.
#[derive(Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    /// Byte array stored in a width-1 `ByteBuffer`.
    Array(ByteBuffer),
    Text(TextBuffer),
}

impl Value {
    pub fn integer(v: i64) -> Self {
        Value::Integer(v)
    }

    pub fn array(bytes: &[u8]) -> Result<Self, BufferError> {
        Ok(Value::Array(ByteBuffer::from_slice(1, bytes)?))
    }

    pub fn text(s: &str) -> Result<Self, BufferError> {
        Ok(Value::Text(TextBuffer::from_text(s)?))
    }

    pub fn entry_type(&self) -> EntryType {
        match self {
            Value::Integer(_) => EntryType::Integer,
            Value::Array(_) => EntryType::Array,
            Value::Text(_) => EntryType::Text,
        }
    }

    /// Frees any owned storage, leaving an empty payload of the same tag.
    fn release(&mut self) {
        match self {
            Value::Integer(_) => {}
            Value::Array(buf) => buf.clear(),
            Value::Text(buf) => buf.clear(),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => fmt::Debug::fmt(v, f),
            Value::Array(buf) => f.debug_list().entries(buf.as_bytes()).finish(),
            Value::Text(buf) => fmt::Debug::fmt(buf, f),
        }
    }
}

fn copy_into(src: &[u8], dst: &mut [u8]) -> Result<usize, MapError> {
    if dst.len() < src.len() {
        return Err(MapError::DestinationTooSmall {
            needed: src.len(),
            available: dst.len(),
        });
    }
    dst[..src.len()].copy_from_slice(src);
    Ok(src.len())
}

/// One key/value association. Owned by the map; reachable by key and by
/// insertion position.
#[derive(Debug)]
pub struct Entry {
    key: TextBuffer,
    hash: u64,
    value: Value,
}

impl Entry {
    pub(crate) fn new(key: &str, hash: u64, value: Value) -> Result<Self, BufferError> {
        Ok(Self {
            key: TextBuffer::from_text(key)?,
            hash,
            value,
        })
    }

    #[inline]
    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub fn entry_type(&self) -> EntryType {
        self.value.entry_type()
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Installs `value`, releasing the previous payload's storage first.
    /// Key and hash are untouched.
    pub(crate) fn replace_value(&mut self, value: Value) {
        self.value.release();
        self.value = value;
    }

    fn mismatch(&self, expected: EntryType) -> MapError {
        MapError::TypeMismatch {
            expected,
            found: self.entry_type(),
        }
    }

    pub fn integer(&self) -> Result<i64, MapError> {
        match &self.value {
            Value::Integer(v) => Ok(*v),
            _ => Err(self.mismatch(EntryType::Integer)),
        }
    }

    pub fn array(&self) -> Result<&[u8], MapError> {
        match &self.value {
            Value::Array(buf) => Ok(buf.as_bytes()),
            _ => Err(self.mismatch(EntryType::Array)),
        }
    }

    pub fn text(&self) -> Result<&str, MapError> {
        match &self.value {
            Value::Text(buf) => Ok(buf.as_str()),
            _ => Err(self.mismatch(EntryType::Text)),
        }
    }

    pub fn array_len(&self) -> Result<usize, MapError> {
        self.array().map(<[u8]>::len)
    }

    /// Length of the text value, not counting any terminator.
    pub fn text_len(&self) -> Result<usize, MapError> {
        self.text().map(str::len)
    }

    /// Copies the array value into `dst` and returns its length. Fails
    /// without writing when `dst` is shorter than the value.
    pub fn read_array(&self, dst: &mut [u8]) -> Result<usize, MapError> {
        copy_into(self.array()?, dst)
    }

    /// Copies the text value (no terminator) into `dst`; same contract as
    /// [`Entry::read_array`].
    pub fn read_text(&self, dst: &mut [u8]) -> Result<usize, MapError> {
        copy_into(self.text()?.as_bytes(), dst)
    }
}
