//! Error types for the buffers and the map.

use crate::entry::EntryType;
use thiserror::Error;

/// Failures reported by `ByteBuffer` and `TextBuffer`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// The allocator refused to provide storage for `requested` elements.
    #[error("allocation failed for {requested} elements")]
    Alloc { requested: usize },

    /// Insertion into a buffer whose length already equals its capacity.
    #[error("buffer is full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("index {index} out of range for length {len}")]
    OutOfBounds { index: usize, len: usize },

    /// A value slice did not match the buffer's element width.
    #[error("element width mismatch: expected {expected} bytes, got {found}")]
    WidthMismatch { expected: usize, found: usize },

    /// A buffer was requested with zero-byte elements.
    #[error("element width must be non-zero")]
    ZeroWidth,

    /// A `Display` implementation reported an error during formatted append.
    #[error("formatting failed")]
    Format,
}

/// Failures reported by `OrderedMap` and `Entry` accessors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MapError {
    /// Out of memory while growing the bucket table, a chain, the order
    /// vector or an entry's owned storage.
    #[error("out of memory while growing map storage")]
    Alloc,

    #[error("no entry for key {0:?}")]
    KeyNotFound(String),

    #[error("index {index} out of range for map of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("key {0:?} is already present")]
    DuplicateKey(String),

    /// The entry holds a different value variant than the operation expects.
    #[error("entry holds {found} value, expected {expected}")]
    TypeMismatch {
        expected: EntryType,
        found: EntryType,
    },

    /// A caller buffer is shorter than the stored value; nothing was copied.
    #[error("destination holds {available} elements but value needs {needed}")]
    DestinationTooSmall { needed: usize, available: usize },

    #[error(transparent)]
    Buffer(BufferError),
}

impl From<BufferError> for MapError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::Alloc { .. } => MapError::Alloc,
            other => MapError::Buffer(other),
        }
    }
}
