//! ordmap: a single-threaded, insertion-ordered hash map keyed by text,
//! holding integer, byte-array or text values.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a map addressable both by key and by insertion position, built
//!   from two small containers whose growth is always explicit.
//! - Layers:
//!   - ByteBuffer: type-erased buffer of fixed-width elements with separate
//!     capacity and length. Never grows on its own; a full buffer rejects
//!     inserts.
//!   - TextBuffer: NUL-terminated text with the same exact-size discipline
//!     plus string helpers.
//!   - OrderedMap: owns every `Entry` in a generational arena. Bucket chains
//!     and the order vector are ByteBuffers of entry ids, so the arena is the
//!     only owner and ids can never dangle.
//!
//! Constraints
//! - Single-threaded; all mutation takes `&mut self`, no internal locking.
//! - Keys are always text and unique; duplicate inserts fail.
//! - Every fallible step returns a `Result`; allocation uses
//!   `try_reserve_exact` so out-of-memory is reported instead of aborting.
//! - Insert and remove are all-or-nothing: an insert stages every fallible
//!   step (entry, grown order vector, replacement table, grown chain) on
//!   copies and only then installs them, so a failed insert leaves contents
//!   and capacity as they were.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its precomputed `u64` hash; rehashing reuses it and
//!   never calls the hasher again.
//! - The bucket of an entry is `hash & (capacity - 1)`; capacity is a power
//!   of two that only doubles, synchronously, inside the insert that reaches
//!   it.
//! - The default hasher is the weak shift-xor `BuildStrHasher`; lookups
//!   confirm every hash match with a full key comparison, so collisions
//!   never alias keys. Any `BuildHasher` may be supplied instead.
//!
//! Positions
//! - Insertion positions are not stable identifiers: removing position `i`
//!   moves every later entry up by one.

pub mod byte_buffer;
mod entry;
mod error;
pub mod hash;
mod ordered_map;
mod ordered_map_proptest;
pub mod text_buffer;

// Public surface
pub use byte_buffer::ByteBuffer;
pub use entry::{Entry, EntryType, Value};
pub use error::{BufferError, MapError};
pub use hash::{str_hash, BuildStrHasher};
pub use ordered_map::{Iter, OrderedMap, DEFAULT_BUCKETS, MIN_BUCKETS};
pub use text_buffer::TextBuffer;
