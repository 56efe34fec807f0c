//! ByteBuffer: growable, type-erased contiguous buffer.
//!
//! The buffer stores fixed-width elements as raw bytes. The element width is
//! chosen at construction and every element-level operation checks the
//! supplied value against it; nothing is inferred from content.
//!
//! Capacity and length are tracked separately. Capacity only changes through
//! `grow`, `resize`, `shrink`, `reserve` and `clear`; inserting into a full
//! buffer fails instead of growing it. Storage exposed by a capacity increase
//! is always zero-filled.

use crate::error::BufferError;
use core::fmt;
use core::num::NonZeroUsize;
use core::ops::Range;
use core::slice::ChunksExact;

/// Floor for any non-zero capacity.
pub const DEFAULT_MIN: usize = 4;

/// Smallest power of two strictly greater than `x`.
fn pow2_above(x: usize) -> Option<usize> {
    x.checked_add(1)?.checked_next_power_of_two()
}

#[derive(Clone)]
pub struct ByteBuffer {
    // Exactly `cap * width` bytes; unallocated when `cap == 0`.
    data: Vec<u8>,
    width: usize,
    cap: usize,
    len: usize,
}

impl ByteBuffer {
    /// Empty buffer of `width`-byte elements. Does not allocate.
    pub const fn new(width: NonZeroUsize) -> Self {
        Self {
            data: Vec::new(),
            width: width.get(),
            cap: 0,
            len: 0,
        }
    }

    /// Zeroed buffer with room for `max(capacity, DEFAULT_MIN)` elements.
    /// A zero `width` is rejected with `ZeroWidth`.
    pub fn with_capacity(width: usize, capacity: usize) -> Result<Self, BufferError> {
        let width = NonZeroUsize::new(width).ok_or(BufferError::ZeroWidth)?;
        let mut buf = Self::new(width);
        buf.resizer(capacity.max(DEFAULT_MIN))?;
        Ok(buf)
    }

    /// Buffer holding a copy of `values`, which must be a whole number of
    /// `width`-byte elements.
    pub fn from_slice(width: usize, values: &[u8]) -> Result<Self, BufferError> {
        let mut buf = Self::with_capacity(width, values.len() / width.max(1))?;
        buf.extend_from_slice(values)?;
        Ok(buf)
    }

    fn resizer(&mut self, new_cap: usize) -> Result<(), BufferError> {
        if new_cap == self.cap {
            return Ok(());
        }
        let Some(bytes) = new_cap.checked_mul(self.width) else {
            return Err(BufferError::Alloc { requested: new_cap });
        };
        if bytes > self.data.len() {
            self.data
                .try_reserve_exact(bytes - self.data.len())
                .map_err(|_| BufferError::Alloc { requested: new_cap })?;
            self.data.resize(bytes, 0);
        } else {
            self.data.truncate(bytes);
            self.data.shrink_to_fit();
        }
        self.cap = new_cap;
        self.len = self.len.min(new_cap);
        Ok(())
    }

    fn grow_target(&self) -> Result<usize, BufferError> {
        if self.cap == 0 {
            return Ok(DEFAULT_MIN);
        }
        self.cap
            .checked_mul(2)
            .and_then(pow2_above)
            .ok_or(BufferError::Alloc {
                requested: usize::MAX,
            })
    }

    /// Grows to the next power of two above `capacity * 2`, or to
    /// `DEFAULT_MIN` when nothing is allocated yet.
    pub fn grow(&mut self) -> Result<(), BufferError> {
        let target = self.grow_target()?;
        self.resizer(target)
    }

    /// A copy of this buffer with the capacity `grow` would give it; `self`
    /// is not modified. Allocation failure is reported, not aborted on.
    pub fn grown(&self) -> Result<Self, BufferError> {
        let mut out = Self {
            data: Vec::new(),
            width: self.width,
            cap: 0,
            len: 0,
        };
        out.resizer(self.grow_target()?)?;
        let bytes = self.len * self.width;
        out.data[..bytes].copy_from_slice(&self.data[..bytes]);
        out.len = self.len;
        Ok(out)
    }

    /// Sets the capacity to exactly `max(capacity, DEFAULT_MIN)`, keeping
    /// content that still fits. Returns whether the capacity changed.
    pub fn resize(&mut self, capacity: usize) -> Result<bool, BufferError> {
        let old = self.cap;
        self.resizer(capacity.max(DEFAULT_MIN))?;
        Ok(self.cap != old)
    }

    /// Releases unused capacity, down to `len` when `exact` or to the next
    /// power of two otherwise. Buffers at or below `DEFAULT_MIN`, and empty
    /// buffers, are left alone. Returns whether the capacity decreased.
    pub fn shrink(&mut self, exact: bool) -> Result<bool, BufferError> {
        if self.cap <= DEFAULT_MIN || self.len == 0 {
            return Ok(false);
        }
        let target = if exact {
            self.len
        } else {
            self.len.checked_next_power_of_two().unwrap_or(self.cap)
        };
        if target >= self.cap {
            return Ok(false);
        }
        self.resizer(target)?;
        Ok(true)
    }

    /// Ensures room for at least `capacity` elements. Never shrinks.
    pub fn reserve(&mut self, capacity: usize) -> Result<(), BufferError> {
        if capacity <= self.cap {
            return Ok(());
        }
        self.resizer(capacity.max(DEFAULT_MIN))
    }

    /// Forgets every element but keeps the allocation.
    #[inline]
    pub fn wipe(&mut self) {
        self.len = 0;
    }

    /// Releases the allocation; capacity becomes zero.
    pub fn clear(&mut self) {
        self.data = Vec::new();
        self.cap = 0;
        self.len = 0;
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    /// True when another insert would fail. An unallocated buffer is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len >= self.cap
    }

    /// The live elements as one contiguous byte slice.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len * self.width]
    }

    /// Live elements, one `width`-byte slice each.
    #[inline]
    pub fn iter(&self) -> ChunksExact<'_, u8> {
        self.as_bytes().chunks_exact(self.width)
    }

    #[inline]
    fn slot(&self, index: usize) -> Range<usize> {
        index * self.width..(index + 1) * self.width
    }

    fn check_width(&self, value: &[u8]) -> Result<(), BufferError> {
        if value.len() != self.width {
            return Err(BufferError::WidthMismatch {
                expected: self.width,
                found: value.len(),
            });
        }
        Ok(())
    }

    pub fn insert(&mut self, value: &[u8]) -> Result<(), BufferError> {
        self.append(value).map(|_| ())
    }

    /// Writes `value` after the last element and returns its index.
    pub fn append(&mut self, value: &[u8]) -> Result<usize, BufferError> {
        self.check_width(value)?;
        if self.is_full() {
            return Err(BufferError::Full {
                capacity: self.cap,
            });
        }
        let index = self.len;
        let slot = self.slot(index);
        self.data[slot].copy_from_slice(value);
        self.len += 1;
        Ok(index)
    }

    /// Appends several elements at once. Fails without writing anything if
    /// they do not all fit.
    pub fn extend_from_slice(&mut self, values: &[u8]) -> Result<(), BufferError> {
        if values.len() % self.width != 0 {
            return Err(BufferError::WidthMismatch {
                expected: self.width,
                found: values.len(),
            });
        }
        let count = values.len() / self.width;
        if count > self.cap - self.len {
            return Err(BufferError::Full {
                capacity: self.cap,
            });
        }
        let start = self.len * self.width;
        self.data[start..start + values.len()].copy_from_slice(values);
        self.len += count;
        Ok(())
    }

    pub fn append_buffer(&mut self, other: &ByteBuffer) -> Result<(), BufferError> {
        if other.width != self.width {
            return Err(BufferError::WidthMismatch {
                expected: self.width,
                found: other.width,
            });
        }
        self.extend_from_slice(other.as_bytes())
    }

    /// Replaces the content with as many of `other`'s elements as fit.
    pub fn copy_from(&mut self, other: &ByteBuffer) -> Result<(), BufferError> {
        if other.width != self.width {
            return Err(BufferError::WidthMismatch {
                expected: self.width,
                found: other.width,
            });
        }
        let n = other.len.min(self.cap);
        let bytes = n * self.width;
        self.data[..bytes].copy_from_slice(&other.data[..bytes]);
        self.data[bytes..].fill(0);
        self.len = n;
        Ok(())
    }

    /// Writes `value` into every slot up to capacity.
    pub fn fill(&mut self, value: &[u8]) -> Result<(), BufferError> {
        self.check_width(value)?;
        for slot in self.data.chunks_exact_mut(self.width) {
            slot.copy_from_slice(value);
        }
        self.len = self.cap;
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        (index < self.len).then(|| &self.data[self.slot(index)])
    }

    pub fn set(&mut self, index: usize, value: &[u8]) -> Result<(), BufferError> {
        self.check_width(value)?;
        if index >= self.len {
            return Err(BufferError::OutOfBounds {
                index,
                len: self.len,
            });
        }
        let slot = self.slot(index);
        self.data[slot].copy_from_slice(value);
        Ok(())
    }

    /// Removes the last element and returns its bytes.
    pub fn pop(&mut self) -> Option<&[u8]> {
        self.len = self.len.checked_sub(1)?;
        Some(&self.data[self.slot(self.len)])
    }

    pub fn peek(&self) -> Option<&[u8]> {
        self.get(self.len.checked_sub(1)?)
    }

    /// Reverses element order in place.
    pub fn reverse(&mut self) {
        let w = self.width;
        for i in 0..self.len / 2 {
            let j = self.len - 1 - i;
            let (head, tail) = self.data.split_at_mut(j * w);
            head[i * w..(i + 1) * w].swap_with_slice(&mut tail[..w]);
        }
    }

    /// Removes the element at `index`, shifting later elements left.
    pub fn remove(&mut self, index: usize) -> Result<(), BufferError> {
        self.remove_range(index, 1)
    }

    /// Removes `range` elements starting at `index` (a zero range removes
    /// one). Ranges running past the end truncate at `index`.
    pub fn remove_range(&mut self, index: usize, range: usize) -> Result<(), BufferError> {
        if index >= self.len {
            return Err(BufferError::OutOfBounds {
                index,
                len: self.len,
            });
        }
        let range = range.max(1);
        if index == 0 && range >= self.len {
            self.wipe();
            return Ok(());
        }
        let w = self.width;
        let end = index.saturating_add(range);
        if end >= self.len {
            self.data[index * w..self.len * w].fill(0);
            self.len = index;
        } else {
            self.data.copy_within(end * w..self.len * w, index * w);
            let new_len = self.len - range;
            self.data[new_len * w..self.len * w].fill(0);
            self.len = new_len;
        }
        Ok(())
    }

    /// Removes the first element equal to `value`, returning where it was.
    pub fn remove_value(&mut self, value: &[u8]) -> Option<usize> {
        let index = self.index_of(value, 0)?;
        self.remove(index).ok()?;
        Some(index)
    }

    /// Position of the first element equal to `value` at or after `start`.
    pub fn index_of(&self, value: &[u8], start: usize) -> Option<usize> {
        if value.len() != self.width {
            return None;
        }
        self.iter()
            .enumerate()
            .skip(start)
            .find(|(_, e)| *e == value)
            .map(|(i, _)| i)
    }

    pub fn item_count(&self, value: &[u8]) -> usize {
        if value.len() != self.width {
            return 0;
        }
        self.iter().filter(|e| *e == value).count()
    }
}

impl PartialEq for ByteBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.as_bytes() == other.as_bytes()
    }
}

impl Eq for ByteBuffer {}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("width", &self.width)
            .field("len", &self.len)
            .field("capacity", &self.cap)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn width(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn u32_buf(values: &[u32], capacity: usize) -> ByteBuffer {
        let mut b = ByteBuffer::with_capacity(4, capacity).unwrap();
        for v in values {
            b.insert(&v.to_ne_bytes()).unwrap();
        }
        b
    }

    fn u32s(b: &ByteBuffer) -> Vec<u32> {
        b.iter()
            .map(|e| u32::from_ne_bytes(e.try_into().unwrap()))
            .collect()
    }

    #[test]
    fn new_does_not_allocate_and_is_full() {
        let b = ByteBuffer::new(width(8));
        assert_eq!(b.capacity(), 0);
        assert!(b.data.is_empty());
        assert!(b.is_full());
        assert!(b.is_empty());
    }

    /// Zero-width buffers are refused with an error.
    #[test]
    fn zero_width_is_rejected() {
        assert_eq!(
            ByteBuffer::with_capacity(0, 4).unwrap_err(),
            BufferError::ZeroWidth
        );
        assert_eq!(
            ByteBuffer::from_slice(0, &[]).unwrap_err(),
            BufferError::ZeroWidth
        );
        assert_eq!(
            ByteBuffer::from_slice(0, &[1, 2]).unwrap_err(),
            BufferError::ZeroWidth
        );
    }

    #[test]
    fn with_capacity_floors_and_zeroes() {
        let b = ByteBuffer::with_capacity(2, 1).unwrap();
        assert_eq!(b.capacity(), DEFAULT_MIN);
        assert_eq!(b.data, vec![0u8; DEFAULT_MIN * 2]);
        let b = ByteBuffer::with_capacity(1, 10).unwrap();
        assert_eq!(b.capacity(), 10);
    }

    /// Invariant: insert into a full buffer fails and changes nothing.
    #[test]
    fn insert_into_full_buffer_fails_without_growing() {
        let mut b = u32_buf(&[1, 2, 3, 4], 4);
        assert!(b.is_full());
        assert_eq!(
            b.insert(&5u32.to_ne_bytes()),
            Err(BufferError::Full { capacity: 4 })
        );
        assert_eq!(b.capacity(), 4);
        assert_eq!(u32s(&b), vec![1, 2, 3, 4]);
    }

    #[test]
    fn append_reports_written_index() {
        let mut b = ByteBuffer::with_capacity(1, 4).unwrap();
        assert_eq!(b.append(&[7]), Ok(0));
        assert_eq!(b.append(&[8]), Ok(1));
        assert_eq!(b.as_bytes(), &[7, 8]);
    }

    #[test]
    fn width_is_checked_on_every_write() {
        let mut b = ByteBuffer::with_capacity(4, 4).unwrap();
        assert_eq!(
            b.insert(&[1, 2]),
            Err(BufferError::WidthMismatch {
                expected: 4,
                found: 2
            })
        );
        assert!(b.extend_from_slice(&[1, 2, 3]).is_err());
        assert!(b.fill(&[0]).is_err());
        assert!(b.is_empty());
    }

    #[test]
    fn grow_from_empty_then_past_double() {
        let mut b = ByteBuffer::new(NonZeroUsize::MIN);
        b.grow().unwrap();
        assert_eq!(b.capacity(), DEFAULT_MIN);
        b.grow().unwrap();
        // next power of two strictly above 4 * 2
        assert_eq!(b.capacity(), 16);
        assert!(b.data.iter().all(|&x| x == 0));
    }

    #[test]
    fn grown_copy_leaves_source_alone() {
        let src = u32_buf(&[1, 2, 3, 4], 4);
        let copy = src.grown().unwrap();
        assert_eq!(src.capacity(), 4);
        assert_eq!(copy.capacity(), 16);
        assert_eq!(u32s(&copy), vec![1, 2, 3, 4]);
        assert_eq!(copy, src);
        assert!(copy.data[16..].iter().all(|&x| x == 0));

        let empty = ByteBuffer::new(width(2)).grown().unwrap();
        assert_eq!(empty.capacity(), DEFAULT_MIN);
        assert!(empty.is_empty());
    }

    #[test]
    fn grow_preserves_content_and_zero_fills_tail() {
        let mut b = u32_buf(&[9, 8, 7], 4);
        b.grow().unwrap();
        assert_eq!(u32s(&b), vec![9, 8, 7]);
        assert!(b.data[3 * 4..].iter().all(|&x| x == 0));
    }

    #[test]
    fn resize_sets_exact_capacity_and_clamps_len() {
        let mut b = u32_buf(&[1, 2, 3, 4, 5, 6], 8);
        assert_eq!(b.resize(5), Ok(true));
        assert_eq!(b.capacity(), 5);
        assert_eq!(u32s(&b), vec![1, 2, 3, 4, 5]);
        assert_eq!(b.resize(5), Ok(false));
        // floored to the minimum
        assert_eq!(b.resize(0), Ok(true));
        assert_eq!(b.capacity(), DEFAULT_MIN);
        assert_eq!(u32s(&b), vec![1, 2, 3, 4]);
    }

    #[test]
    fn shrink_exact_and_power_of_two() {
        let mut b = u32_buf(&[1, 2, 3, 4, 5], 32);
        assert_eq!(b.shrink(false), Ok(true));
        assert_eq!(b.capacity(), 8);
        assert_eq!(b.shrink(true), Ok(true));
        assert_eq!(b.capacity(), 5);
        assert_eq!(u32s(&b), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn shrink_is_noop_when_small_or_empty() {
        let mut small = u32_buf(&[1], 4);
        assert_eq!(small.shrink(true), Ok(false));
        let mut empty = ByteBuffer::with_capacity(4, 64).unwrap();
        assert_eq!(empty.shrink(true), Ok(false));
        assert_eq!(empty.capacity(), 64);
    }

    #[test]
    fn reserve_never_shrinks() {
        let mut b = ByteBuffer::with_capacity(1, 16).unwrap();
        b.reserve(2).unwrap();
        assert_eq!(b.capacity(), 16);
        b.reserve(20).unwrap();
        assert_eq!(b.capacity(), 20);
    }

    /// Invariant: reads are bounded by length, not capacity.
    #[test]
    fn get_and_set_are_bounded_by_len() {
        let mut b = u32_buf(&[1, 2], 8);
        assert!(b.get(1).is_some());
        assert!(b.get(2).is_none());
        assert_eq!(
            b.set(5, &0u32.to_ne_bytes()),
            Err(BufferError::OutOfBounds { index: 5, len: 2 })
        );
        b.set(0, &42u32.to_ne_bytes()).unwrap();
        assert_eq!(u32s(&b), vec![42, 2]);
    }

    #[test]
    fn remove_last_truncates_and_interior_shifts() {
        let mut b = u32_buf(&[1, 2, 3, 4], 4);
        b.remove(3).unwrap();
        assert_eq!(u32s(&b), vec![1, 2, 3]);
        assert!(b.data[12..].iter().all(|&x| x == 0));

        b.remove(0).unwrap();
        assert_eq!(u32s(&b), vec![2, 3]);
        assert!(b.data[8..].iter().all(|&x| x == 0));

        assert_eq!(
            b.remove(2),
            Err(BufferError::OutOfBounds { index: 2, len: 2 })
        );
    }

    #[test]
    fn remove_range_variants() {
        let mut whole = u32_buf(&[1, 2, 3], 4);
        whole.remove_range(0, 10).unwrap();
        assert!(whole.is_empty());
        assert_eq!(whole.capacity(), 4);

        let mut suffix = u32_buf(&[1, 2, 3, 4, 5], 8);
        suffix.remove_range(2, 100).unwrap();
        assert_eq!(u32s(&suffix), vec![1, 2]);

        let mut interior = u32_buf(&[1, 2, 3, 4, 5], 8);
        interior.remove_range(1, 2).unwrap();
        assert_eq!(u32s(&interior), vec![1, 4, 5]);
        assert!(interior.data[12..].iter().all(|&x| x == 0));

        let mut zero = u32_buf(&[1, 2, 3], 4);
        zero.remove_range(1, 0).unwrap();
        assert_eq!(u32s(&zero), vec![1, 3]);
    }

    #[test]
    fn index_of_and_item_count_compare_whole_elements() {
        let b = u32_buf(&[5, 6, 5, 7, 5], 8);
        let five = 5u32.to_ne_bytes();
        assert_eq!(b.index_of(&five, 0), Some(0));
        assert_eq!(b.index_of(&five, 1), Some(2));
        assert_eq!(b.index_of(&five, 5), None);
        assert_eq!(b.index_of(&[5], 0), None);
        assert_eq!(b.item_count(&five), 3);
        assert_eq!(b.item_count(&9u32.to_ne_bytes()), 0);
    }

    #[test]
    fn remove_value_drops_first_match() {
        let mut b = u32_buf(&[5, 6, 5], 4);
        assert_eq!(b.remove_value(&5u32.to_ne_bytes()), Some(0));
        assert_eq!(u32s(&b), vec![6, 5]);
        assert_eq!(b.remove_value(&9u32.to_ne_bytes()), None);
    }

    #[test]
    fn extend_is_all_or_nothing() {
        let mut b = ByteBuffer::with_capacity(1, 4).unwrap();
        b.extend_from_slice(&[1, 2]).unwrap();
        assert!(b.extend_from_slice(&[3, 4, 5]).is_err());
        assert_eq!(b.as_bytes(), &[1, 2]);
        b.extend_from_slice(&[3, 4]).unwrap();
        assert!(b.is_full());
    }

    #[test]
    fn copy_from_keeps_what_fits() {
        let src = ByteBuffer::from_slice(1, &[1, 2, 3, 4, 5, 6]).unwrap();
        let mut dst = ByteBuffer::with_capacity(1, 4).unwrap();
        dst.copy_from(&src).unwrap();
        assert_eq!(dst.as_bytes(), &[1, 2, 3, 4]);
        assert!(dst.copy_from(&ByteBuffer::new(width(2))).is_err());
    }

    #[test]
    fn append_buffer_requires_matching_width_and_room() {
        let mut a = ByteBuffer::from_slice(1, &[1, 2]).unwrap();
        a.resize(8).unwrap();
        let b = ByteBuffer::from_slice(1, &[3, 4]).unwrap();
        a.append_buffer(&b).unwrap();
        assert_eq!(a.as_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn fill_pop_peek_reverse() {
        let mut b = ByteBuffer::with_capacity(2, 4).unwrap();
        b.fill(&[1, 1]).unwrap();
        assert_eq!(b.len(), 4);
        b.set(3, &[9, 9]).unwrap();
        assert_eq!(b.peek(), Some(&[9u8, 9][..]));
        assert_eq!(b.pop(), Some(&[9u8, 9][..]));
        assert_eq!(b.len(), 3);

        let mut r = u32_buf(&[1, 2, 3, 4, 5], 8);
        r.reverse();
        assert_eq!(u32s(&r), vec![5, 4, 3, 2, 1]);

        let mut e = ByteBuffer::new(NonZeroUsize::MIN);
        assert!(e.pop().is_none());
        assert!(e.peek().is_none());
    }

    #[test]
    fn wipe_keeps_allocation_clear_releases_it() {
        let mut b = u32_buf(&[1, 2], 8);
        b.wipe();
        assert!(b.is_empty());
        assert_eq!(b.capacity(), 8);
        b.clear();
        assert_eq!(b.capacity(), 0);
        assert!(b.data.is_empty());
    }

    #[test]
    fn equality_ignores_spare_capacity() {
        let a = ByteBuffer::from_slice(1, &[1, 2]).unwrap();
        let mut b = ByteBuffer::with_capacity(1, 32).unwrap();
        b.extend_from_slice(&[1, 2]).unwrap();
        assert_eq!(a, b);
    }
}
