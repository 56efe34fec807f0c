//! Stateless key hashing.
//!
//! The default map hasher is a shift-xor string hash: for every byte,
//! `h = (h << 6) ^ (h >> 26) ^ byte`, starting from zero. It is cheap and
//! deterministic but weak, so lookups always confirm a hash match with a
//! full key comparison.

use core::hash::{BuildHasher, Hasher};

/// Hashes `key` with the default string hash.
#[inline]
pub fn str_hash(key: &str) -> u64 {
    let mut h = StrHasher::default();
    h.write(key.as_bytes());
    h.finish()
}

/// Streaming form of [`str_hash`].
#[derive(Clone, Copy, Debug, Default)]
pub struct StrHasher {
    state: u64,
}

impl Hasher for StrHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state = (self.state << 6) ^ (self.state >> 26) ^ u64::from(b);
        }
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }
}

/// `BuildHasher` for [`StrHasher`]; the default hasher of `OrderedMap`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuildStrHasher;

impl BuildHasher for BuildStrHasher {
    type Hasher = StrHasher;

    #[inline]
    fn build_hasher(&self) -> StrHasher {
        StrHasher::default()
    }
}
