//! OrderedMap: text-keyed hash map whose entries are also addressable by
//! insertion position.
//!
//! Entries live in a single `SlotMap` arena. The bucket table (one
//! `ByteBuffer` chain per bucket) and the order vector (one `ByteBuffer`)
//! both hold `EntryId`s encoded as 8-byte elements, never the entries
//! themselves, so the arena is the only owner and a removed id can never
//! alias a later entry.
//!
//! The bucket of an entry is always `hash & (capacity - 1)`. Capacity is a
//! power of two and grows by doubling, synchronously, inside the insert that
//! finds `len() >= capacity()`. That one insert pays O(n) for the rehash.

use crate::byte_buffer::{ByteBuffer, DEFAULT_MIN};
use crate::entry::{Entry, EntryType, Value};
use crate::error::{BufferError, MapError};
use crate::hash::BuildStrHasher;
use core::fmt;
use core::hash::{BuildHasher, Hasher};
use core::num::NonZeroUsize;
use core::slice::ChunksExact;
use slotmap::{new_key_type, Key, KeyData, SlotMap};
use tracing::{debug, trace};

/// Bucket count used by `new()` and after `clear()` when no explicit
/// capacity was requested.
pub const DEFAULT_BUCKETS: usize = 8;
/// Smallest bucket count the table is ever created with.
pub const MIN_BUCKETS: usize = DEFAULT_MIN;

new_key_type! {
    struct EntryId;
}

const ID_BYTES: usize = core::mem::size_of::<u64>();
const ID_WIDTH: NonZeroUsize = match NonZeroUsize::new(ID_BYTES) {
    Some(w) => w,
    None => panic!("entry ids are never zero-sized"),
};

fn encode_id(id: EntryId) -> [u8; ID_BYTES] {
    id.data().as_ffi().to_ne_bytes()
}

fn decode_id(raw: &[u8]) -> EntryId {
    let mut bytes = [0u8; ID_BYTES];
    bytes.copy_from_slice(raw);
    KeyData::from_ffi(u64::from_ne_bytes(bytes)).into()
}

/// Rounds a requested bucket count up to a usable power of two.
fn bucket_count_for(requested: usize) -> Result<usize, MapError> {
    requested
        .max(MIN_BUCKETS)
        .checked_next_power_of_two()
        .ok_or(MapError::Alloc)
}

#[inline]
fn bucket_index(hash: u64, buckets: usize) -> usize {
    (hash as usize) & (buckets - 1)
}

/// Appends `raw` to `chain`, growing the chain first when it is full.
fn push_id(chain: &mut ByteBuffer, raw: &[u8]) -> Result<(), BufferError> {
    if chain.is_full() {
        chain.grow()?;
    }
    chain.insert(raw)
}

fn alloc_table(buckets: usize) -> Result<Vec<ByteBuffer>, MapError> {
    let mut table = Vec::new();
    table
        .try_reserve_exact(buckets)
        .map_err(|_| MapError::Alloc)?;
    table.resize_with(buckets, || ByteBuffer::new(ID_WIDTH));
    Ok(table)
}

/// Everything an insert needs, prepared but not yet visible.
struct StagedInsert {
    entry: Entry,
    // Replacements for storage that had to grow.
    order: Option<ByteBuffer>,
    table: Option<Vec<ByteBuffer>>,
    bucket: usize,
    chain: Option<ByteBuffer>,
}

pub struct OrderedMap<S = BuildStrHasher> {
    hasher: S,
    slots: SlotMap<EntryId, Entry>,
    buckets: Vec<ByteBuffer>,
    order: ByteBuffer,
    initial_buckets: usize,
}

impl OrderedMap {
    /// Empty map with the default string hasher. Nothing is allocated until
    /// the first insert, which sizes the table to `DEFAULT_BUCKETS`.
    pub fn new() -> Self {
        Self::with_hasher(BuildStrHasher)
    }

    /// Map with a bucket table allocated up front. `buckets` is rounded up
    /// to `MIN_BUCKETS` and then to a power of two.
    pub fn with_capacity(buckets: usize) -> Result<Self, MapError> {
        Self::with_capacity_and_hasher(buckets, BuildStrHasher)
    }
}

impl Default for OrderedMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over entries in insertion order.
pub struct Iter<'a> {
    order: ChunksExact<'a, u8>,
    slots: &'a SlotMap<EntryId, Entry>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Entry;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.order.next()?;
        self.slots.get(decode_id(raw))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl<S: BuildHasher> OrderedMap<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            slots: SlotMap::with_key(),
            buckets: Vec::new(),
            order: ByteBuffer::new(ID_WIDTH),
            initial_buckets: DEFAULT_BUCKETS,
        }
    }

    pub fn with_capacity_and_hasher(buckets: usize, hasher: S) -> Result<Self, MapError> {
        let count = bucket_count_for(buckets)?;
        let mut map = Self::with_hasher(hasher);
        map.initial_buckets = count;
        map.buckets = alloc_table(count)?;
        map.order = ByteBuffer::with_capacity(ID_BYTES, count)?;
        Ok(map)
    }

    fn hash_key(&self, key: &str) -> u64 {
        let mut h = self.hasher.build_hasher();
        h.write(key.as_bytes());
        h.finish()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Current bucket count; zero before the first insert and after `clear`.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Finds `key` in its chain: `(bucket, position in chain, id)`.
    ///
    /// A matching hash is confirmed with a full key comparison.
    fn locate(&self, key: &str, hash: u64) -> Option<(usize, usize, EntryId)> {
        if self.buckets.is_empty() {
            return None;
        }
        let bucket = bucket_index(hash, self.buckets.len());
        self.buckets[bucket]
            .iter()
            .enumerate()
            .find_map(|(pos, raw)| {
                let id = decode_id(raw);
                let entry = self.slots.get(id)?;
                (entry.hash() == hash && entry.key() == key).then_some((bucket, pos, id))
            })
    }

    fn find_id(&self, key: &str) -> Option<EntryId> {
        self.locate(key, self.hash_key(key)).map(|(_, _, id)| id)
    }

    fn id_at(&self, index: usize) -> Option<EntryId> {
        self.order.get(index).map(decode_id)
    }

    fn out_of_range(&self, index: usize) -> MapError {
        MapError::IndexOutOfRange {
            index,
            len: self.len(),
        }
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.find_id(key).is_some()
    }

    /// Current insertion position of `key`.
    pub fn position_of(&self, key: &str) -> Option<usize> {
        let raw = encode_id(self.find_id(key)?);
        self.order.index_of(&raw, 0)
    }

    /// Builds a table of `count` chains holding every current entry. The
    /// map itself is not touched.
    fn build_table(&self, count: usize) -> Result<Vec<ByteBuffer>, MapError> {
        let mut table = alloc_table(count)?;
        for raw in self.order.iter() {
            let Some(entry) = self.slots.get(decode_id(raw)) else {
                continue;
            };
            push_id(&mut table[bucket_index(entry.hash(), count)], raw)?;
        }
        Ok(table)
    }

    fn install_table(&mut self, table: Vec<ByteBuffer>) {
        trace!(
            from = self.buckets.len(),
            to = table.len(),
            entries = self.len(),
            "rehashed bucket table"
        );
        self.buckets = table;
    }

    /// Rebuilds the bucket table with `buckets` chains (rounded up to a
    /// power of two, at least `MIN_BUCKETS`).
    ///
    /// The new table is filled completely before it replaces the old one,
    /// so a failure leaves the map exactly as it was. Entries and their
    /// order positions are never touched.
    pub fn rehash(&mut self, buckets: usize) -> Result<(), MapError> {
        let table = self.build_table(bucket_count_for(buckets)?)?;
        self.install_table(table);
        Ok(())
    }

    /// Bucket count the next insert needs, if it differs from the current
    /// table: the initial size for an unallocated map, double when full.
    fn next_table_size(&self) -> Result<Option<usize>, MapError> {
        if self.buckets.is_empty() {
            Ok(Some(self.initial_buckets))
        } else if self.len() >= self.buckets.len() {
            let doubled = self.buckets.len().checked_mul(2).ok_or(MapError::Alloc)?;
            Ok(Some(doubled))
        } else {
            Ok(None)
        }
    }

    /// Does every fallible step of an insert without making anything
    /// visible: builds the entry, reserves a slot in the order vector,
    /// prepares the replacement table when one is due and reserves room in
    /// the target chain. Dropping the result leaves the map as it was.
    fn stage_insert(&self, key: &str, value: Value) -> Result<StagedInsert, MapError> {
        if self.has_key(key) {
            return Err(MapError::DuplicateKey(key.to_owned()));
        }
        let hash = self.hash_key(key);
        let entry = Entry::new(key, hash, value)?;

        let order = if self.order.is_full() {
            Some(self.order.grown()?)
        } else {
            None
        };

        let table = match self.next_table_size()? {
            Some(count) => Some(self.build_table(count).map_err(|err| {
                debug!(buckets = count, error = %err, "rehash before insert failed");
                err
            })?),
            None => None,
        };

        let buckets = table.as_ref().map_or(self.buckets.len(), Vec::len);
        let bucket = bucket_index(hash, buckets);
        let current = table.as_ref().unwrap_or(&self.buckets);
        let chain = if current[bucket].is_full() {
            Some(current[bucket].grown()?)
        } else {
            None
        };

        Ok(StagedInsert {
            entry,
            order,
            table,
            bucket,
            chain,
        })
    }

    /// Publishes a staged insert. Every step left here is infallible.
    fn commit_insert(&mut self, staged: StagedInsert) {
        let StagedInsert {
            entry,
            order,
            table,
            bucket,
            chain,
        } = staged;
        if let Some(order) = order {
            self.order = order;
        }
        if let Some(table) = table {
            self.install_table(table);
        }
        if let Some(chain) = chain {
            self.buckets[bucket] = chain;
        }

        let id = self.slots.insert(entry);
        let raw = encode_id(id);
        let linked = self.buckets[bucket]
            .insert(&raw)
            .and_then(|()| self.order.insert(&raw));
        debug_assert!(linked.is_ok(), "room was reserved while staging");
    }

    /// Adds a new entry at the end of the insertion order.
    ///
    /// Fails with `DuplicateKey` if `key` is present. On any failure the
    /// map is left unchanged, including its capacity.
    pub fn insert(&mut self, key: &str, value: Value) -> Result<(), MapError> {
        let staged = self.stage_insert(key, value)?;
        self.commit_insert(staged);
        Ok(())
    }

    pub fn insert_integer(&mut self, key: &str, value: i64) -> Result<(), MapError> {
        self.insert(key, Value::integer(value))
    }

    pub fn insert_array(&mut self, key: &str, bytes: &[u8]) -> Result<(), MapError> {
        self.insert(key, Value::array(bytes)?)
    }

    pub fn insert_text(&mut self, key: &str, text: &str) -> Result<(), MapError> {
        self.insert(key, Value::text(text)?)
    }

    pub fn get_by_key(&self, key: &str) -> Option<&Entry> {
        self.slots.get(self.find_id(key)?)
    }

    pub fn get_by_index(&self, index: usize) -> Option<&Entry> {
        self.slots.get(self.id_at(index)?)
    }

    fn entry_by_key(&self, key: &str) -> Result<&Entry, MapError> {
        self.get_by_key(key)
            .ok_or_else(|| MapError::KeyNotFound(key.to_owned()))
    }

    fn entry_by_index(&self, index: usize) -> Result<&Entry, MapError> {
        self.get_by_index(index)
            .ok_or_else(|| self.out_of_range(index))
    }

    /// Replaces the value of `key`, or inserts it when absent. The old
    /// payload is released first; key, hash and position do not change.
    pub fn set_by_key(&mut self, key: &str, value: Value) -> Result<(), MapError> {
        match self.find_id(key).and_then(|id| self.slots.get_mut(id)) {
            Some(entry) => {
                entry.replace_value(value);
                Ok(())
            }
            None => self.insert(key, value),
        }
    }

    /// Replaces the value at insertion position `index`.
    pub fn set_by_index(&mut self, index: usize, value: Value) -> Result<(), MapError> {
        let entry = self
            .id_at(index)
            .and_then(|id| self.slots.get_mut(id))
            .ok_or(MapError::IndexOutOfRange {
                index,
                len: self.order.len(),
            })?;
        entry.replace_value(value);
        Ok(())
    }

    pub fn set_integer_by_key(&mut self, key: &str, value: i64) -> Result<(), MapError> {
        self.set_by_key(key, Value::integer(value))
    }

    pub fn set_array_by_key(&mut self, key: &str, bytes: &[u8]) -> Result<(), MapError> {
        self.set_by_key(key, Value::array(bytes)?)
    }

    pub fn set_text_by_key(&mut self, key: &str, text: &str) -> Result<(), MapError> {
        self.set_by_key(key, Value::text(text)?)
    }

    pub fn set_integer_by_index(&mut self, index: usize, value: i64) -> Result<(), MapError> {
        self.set_by_index(index, Value::integer(value))
    }

    pub fn set_array_by_index(&mut self, index: usize, bytes: &[u8]) -> Result<(), MapError> {
        self.set_by_index(index, Value::array(bytes)?)
    }

    pub fn set_text_by_index(&mut self, index: usize, text: &str) -> Result<(), MapError> {
        self.set_by_index(index, Value::text(text)?)
    }

    pub fn entry_type_by_key(&self, key: &str) -> Result<EntryType, MapError> {
        Ok(self.entry_by_key(key)?.entry_type())
    }

    pub fn entry_type_by_index(&self, index: usize) -> Result<EntryType, MapError> {
        Ok(self.entry_by_index(index)?.entry_type())
    }

    pub fn get_integer_by_key(&self, key: &str) -> Result<i64, MapError> {
        self.entry_by_key(key)?.integer()
    }

    pub fn get_integer_by_index(&self, index: usize) -> Result<i64, MapError> {
        self.entry_by_index(index)?.integer()
    }

    pub fn get_array_len_by_key(&self, key: &str) -> Result<usize, MapError> {
        self.entry_by_key(key)?.array_len()
    }

    pub fn get_array_len_by_index(&self, index: usize) -> Result<usize, MapError> {
        self.entry_by_index(index)?.array_len()
    }

    pub fn get_text_len_by_key(&self, key: &str) -> Result<usize, MapError> {
        self.entry_by_key(key)?.text_len()
    }

    pub fn get_text_len_by_index(&self, index: usize) -> Result<usize, MapError> {
        self.entry_by_index(index)?.text_len()
    }

    /// Copies the array stored under `key` into `dst`, returning its length.
    /// `dst` must be at least that long; otherwise nothing is written.
    pub fn get_array_by_key(&self, key: &str, dst: &mut [u8]) -> Result<usize, MapError> {
        self.entry_by_key(key)?.read_array(dst)
    }

    pub fn get_array_by_index(&self, index: usize, dst: &mut [u8]) -> Result<usize, MapError> {
        self.entry_by_index(index)?.read_array(dst)
    }

    /// Copies the text stored under `key` into `dst` without a terminator.
    pub fn get_text_by_key(&self, key: &str, dst: &mut [u8]) -> Result<usize, MapError> {
        self.entry_by_key(key)?.read_text(dst)
    }

    pub fn get_text_by_index(&self, index: usize, dst: &mut [u8]) -> Result<usize, MapError> {
        self.entry_by_index(index)?.read_text(dst)
    }

    /// Unlinks `id` from its chain and from order position `at`, then takes
    /// it out of the arena.
    fn detach(&mut self, bucket: usize, chain_pos: usize, at: usize, id: EntryId) -> Option<Entry> {
        self.buckets[bucket].remove(chain_pos).ok()?;
        self.order.remove(at).ok()?;
        self.slots.remove(id)
    }

    /// Removes `key` and returns its entry. Later entries move up one
    /// position.
    pub fn remove_by_key(&mut self, key: &str) -> Result<Entry, MapError> {
        let not_found = || MapError::KeyNotFound(key.to_owned());
        let (bucket, chain_pos, id) = self
            .locate(key, self.hash_key(key))
            .ok_or_else(not_found)?;
        let at = self.order.index_of(&encode_id(id), 0).ok_or_else(not_found)?;
        self.detach(bucket, chain_pos, at, id).ok_or_else(not_found)
    }

    /// Removes the entry at insertion position `index` and returns it.
    /// Later entries move up one position.
    pub fn remove_by_index(&mut self, index: usize) -> Result<Entry, MapError> {
        let id = self.id_at(index).ok_or_else(|| self.out_of_range(index))?;
        let hash = self
            .slots
            .get(id)
            .map(Entry::hash)
            .ok_or_else(|| self.out_of_range(index))?;
        let bucket = bucket_index(hash, self.buckets.len());
        let chain_pos = self.buckets[bucket]
            .index_of(&encode_id(id), 0)
            .ok_or_else(|| self.out_of_range(index))?;
        let err = self.out_of_range(index);
        self.detach(bucket, chain_pos, index, id).ok_or(err)
    }

    /// Destroys every entry and releases all table storage. The next insert
    /// starts from a freshly sized table.
    pub fn clear(&mut self) {
        let dropped = self.len();
        for raw in self.order.iter() {
            self.slots.remove(decode_id(raw));
        }
        debug_assert!(self.slots.is_empty());
        self.slots = SlotMap::with_key();
        self.buckets = Vec::new();
        self.order.clear();
        trace!(entries = dropped, "cleared map");
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            order: self.order.iter(),
            slots: &self.slots,
        }
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().map(Entry::key)
    }
}

impl<'a, S: BuildHasher> IntoIterator for &'a OrderedMap<S> {
    type Item = &'a Entry;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl<S: BuildHasher> fmt::Debug for OrderedMap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|e| (e.key(), e.value())))
            .finish()
    }
}
