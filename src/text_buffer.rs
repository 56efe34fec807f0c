//! TextBuffer: growable text that is always NUL-terminated.
//!
//! Storage is sized to exactly `len + 1` bytes so the content can be handed
//! to consumers expecting a terminated string. `len` never counts the
//! terminator. Every mutation reserves first and writes second, so an
//! allocation failure leaves the previous content untouched.

use crate::error::BufferError;
use core::cmp::Ordering;
use core::fmt::{self, Write as _};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::str::FromStr;

#[derive(Clone, Default)]
pub struct TextBuffer {
    // Content plus one trailing NUL; unallocated until first written.
    data: String,
}

/// Byte-wise comparison over at most `n` positions that stops at the first
/// NUL both sides share. Positions past either slice read as NUL.
fn compare_terminated(a: &[u8], b: &[u8], n: usize) -> Ordering {
    for i in 0..n {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return x.cmp(&y);
        }
        if x == 0 {
            break;
        }
    }
    Ordering::Equal
}

fn alloc_error(requested: usize) -> BufferError {
    BufferError::Alloc { requested }
}

impl TextBuffer {
    pub const fn new() -> Self {
        Self {
            data: String::new(),
        }
    }

    pub fn from_text(s: &str) -> Result<Self, BufferError> {
        let mut t = Self::new();
        t.copy_from_str(s)?;
        Ok(t)
    }

    /// Fresh storage holding `content` and a terminator, sized exactly.
    fn terminated(content: &str) -> Result<String, BufferError> {
        let size = content.len().checked_add(1).ok_or(alloc_error(usize::MAX))?;
        let mut s = String::new();
        s.try_reserve_exact(size).map_err(|_| alloc_error(size))?;
        s.push_str(content);
        s.push('\0');
        Ok(s)
    }

    /// Makes room for `additional` more content bytes.
    fn reserve_exact(&mut self, additional: usize) -> Result<(), BufferError> {
        let extra = if self.data.is_empty() {
            additional.checked_add(1).ok_or(alloc_error(usize::MAX))?
        } else {
            additional
        };
        self.data
            .try_reserve_exact(extra)
            .map_err(|_| alloc_error(self.len().saturating_add(extra)))
    }

    fn unterminate(&mut self) {
        if !self.data.is_empty() {
            self.data.pop();
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len().saturating_sub(1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.data[..self.len()]
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.as_str().as_bytes()
    }

    /// Content followed by its terminator.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        if self.data.is_empty() {
            b"\0"
        } else {
            self.data.as_bytes()
        }
    }

    /// Releases the storage.
    pub fn clear(&mut self) {
        self.data = String::new();
    }

    /// Replaces the content with `s`. On failure the old content remains.
    pub fn copy_from_str(&mut self, s: &str) -> Result<(), BufferError> {
        self.data = Self::terminated(s)?;
        Ok(())
    }

    pub fn copy_from(&mut self, other: &TextBuffer) -> Result<(), BufferError> {
        self.copy_from_str(other.as_str())
    }

    pub fn push_str(&mut self, s: &str) -> Result<(), BufferError> {
        self.reserve_exact(s.len())?;
        self.unterminate();
        self.data.push_str(s);
        self.data.push('\0');
        Ok(())
    }

    pub fn push(&mut self, c: char) -> Result<(), BufferError> {
        self.push_str(c.encode_utf8(&mut [0; 4]))
    }

    pub fn append(&mut self, other: &TextBuffer) -> Result<(), BufferError> {
        self.push_str(other.as_str())
    }

    /// Appends formatted text, e.g. `t.append_fmt(format_args!("{}-{}", a, b))`.
    ///
    /// The output is measured with a counting pass first and the storage is
    /// reserved before anything is written, so the result is never
    /// truncated. Returns the number of bytes appended.
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<usize, BufferError> {
        struct Measure(usize);
        impl fmt::Write for Measure {
            fn write_str(&mut self, s: &str) -> fmt::Result {
                self.0 += s.len();
                Ok(())
            }
        }

        let mut measure = Measure(0);
        measure.write_fmt(args).map_err(|_| BufferError::Format)?;
        self.reserve_exact(measure.0)?;

        let old_len = self.len();
        self.unterminate();
        let written = self.data.write_fmt(args);
        if written.is_err() {
            self.data.truncate(old_len);
        }
        self.data.push('\0');
        written.map_err(|_| BufferError::Format)?;
        Ok(self.len() - old_len)
    }

    /// strncmp-style ordering over `max(self.len(), other.len())` bytes.
    ///
    /// Comparison ends at the first NUL present on both sides, so any
    /// content after an embedded NUL does not take part.
    pub fn compare_to(&self, other: &TextBuffer) -> Ordering {
        self.compare_str(other.as_str())
    }

    pub fn compare_str(&self, other: &str) -> Ordering {
        let n = self.len().max(other.len());
        compare_terminated(self.as_bytes(), other.as_bytes(), n)
    }

    /// Byte offset of the first `needle` at or after `start`.
    pub fn find(&self, needle: &str, start: usize) -> Option<usize> {
        self.as_str()
            .get(start..)?
            .find(needle)
            .map(|at| at + start)
    }

    pub fn count(&self, c: char) -> usize {
        self.as_str().matches(c).count()
    }

    /// Replaces every `from` with `to`; returns how many were replaced.
    pub fn replace(&mut self, from: char, to: char) -> Result<usize, BufferError> {
        let hits = self.count(from);
        if hits == 0 || from == to {
            return Ok(0);
        }
        let size = self.len() - hits * from.len_utf8() + hits * to.len_utf8() + 1;
        let mut out = String::new();
        out.try_reserve_exact(size).map_err(|_| alloc_error(size))?;
        out.extend(self.as_str().chars().map(|c| if c == from { to } else { c }));
        out.push('\0');
        self.data = out;
        Ok(hits)
    }

    pub fn make_ascii_uppercase(&mut self) {
        let n = self.len();
        self.data[..n].make_ascii_uppercase();
    }

    pub fn make_ascii_lowercase(&mut self) {
        let n = self.len();
        self.data[..n].make_ascii_lowercase();
    }

    /// Reverses the content char by char.
    pub fn reverse(&mut self) -> Result<(), BufferError> {
        if self.len() < 2 {
            return Ok(());
        }
        let size = self.data.len();
        let mut out = String::new();
        out.try_reserve_exact(size).map_err(|_| alloc_error(size))?;
        out.extend(self.as_str().chars().rev());
        out.push('\0');
        self.data = out;
        Ok(())
    }

    /// Parses the content, ignoring surrounding whitespace.
    pub fn parse<T: FromStr>(&self) -> Result<T, T::Err> {
        self.as_str().trim().parse()
    }

    /// Replaces the content with everything `reader` holds, from the start.
    /// Returns the number of bytes read.
    pub fn read_from<R: Read + Seek>(&mut self, reader: &mut R) -> io::Result<usize> {
        let size = reader.seek(SeekFrom::End(0))?;
        reader.rewind()?;
        let oom = |requested| io::Error::new(io::ErrorKind::OutOfMemory, alloc_error(requested));
        let cap = usize::try_from(size)
            .ok()
            .and_then(|s| s.checked_add(1))
            .ok_or_else(|| oom(usize::MAX))?;

        let mut raw = Vec::new();
        raw.try_reserve_exact(cap).map_err(|_| oom(cap))?;
        reader.by_ref().take(size).read_to_end(&mut raw)?;
        let mut text =
            String::from_utf8(raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let n = text.len();
        text.push('\0');
        self.data = text;
        Ok(n)
    }

    pub fn read_whole_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut t = Self::new();
        t.read_from(&mut file)?;
        Ok(t)
    }
}

impl PartialEq for TextBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for TextBuffer {}

impl TryFrom<&str> for TextBuffer {
    type Error = BufferError;

    fn try_from(s: &str) -> Result<Self, BufferError> {
        Self::from_text(s)
    }
}

impl fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn text(s: &str) -> TextBuffer {
        TextBuffer::from_text(s).unwrap()
    }

    #[test]
    fn new_is_empty_but_terminated_view() {
        let t = TextBuffer::new();
        assert_eq!(t.len(), 0);
        assert!(t.is_empty());
        assert_eq!(t.as_bytes_with_nul(), b"\0");
        assert_eq!(t.as_str(), "");
    }

    /// Invariant: storage is `len + 1` bytes ending in NUL.
    #[test]
    fn content_is_terminated_and_len_excludes_nul() {
        let t = text("kektus");
        assert_eq!(t.len(), 6);
        assert_eq!(t.as_bytes_with_nul(), b"kektus\0");
        assert_eq!(t.as_bytes(), b"kektus");
    }

    #[test]
    fn push_and_append_keep_terminator() {
        let mut t = TextBuffer::new();
        t.push_str("ab").unwrap();
        t.push('c').unwrap();
        t.push('é').unwrap();
        t.append(&text("!")).unwrap();
        assert_eq!(t.as_str(), "abcé!");
        assert_eq!(t.as_bytes_with_nul().last(), Some(&0));
        assert_eq!(t.len(), "abcé!".len());
    }

    #[test]
    fn copy_from_replaces_content() {
        let mut t = text("long original");
        t.copy_from(&text("short")).unwrap();
        assert_eq!(t.as_str(), "short");
        assert_eq!(t.as_bytes_with_nul(), b"short\0");
    }

    #[test]
    fn append_fmt_writes_measured_size() {
        let mut t = text("id=");
        let n = t.append_fmt(format_args!("{}:{:04}", "x", 7)).unwrap();
        assert_eq!(n, 6);
        assert_eq!(t.as_str(), "id=x:0007");

        let mut empty = TextBuffer::new();
        assert_eq!(empty.append_fmt(format_args!("{}", 12345)).unwrap(), 5);
        assert_eq!(empty.as_bytes_with_nul(), b"12345\0");
    }

    #[test]
    fn append_fmt_failure_leaves_content() {
        struct Boom;
        impl fmt::Display for Boom {
            fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
                Err(fmt::Error)
            }
        }
        let mut t = text("keep");
        assert_eq!(
            t.append_fmt(format_args!("{}", Boom)),
            Err(BufferError::Format)
        );
        assert_eq!(t.as_bytes_with_nul(), b"keep\0");
    }

    #[test]
    fn compare_orders_bytewise() {
        assert_eq!(text("abc").compare_to(&text("abc")), Ordering::Equal);
        assert_eq!(text("abc").compare_to(&text("abd")), Ordering::Less);
        assert_eq!(text("b").compare_to(&text("abc")), Ordering::Greater);
        assert_eq!(text("abc").compare_str("abcd"), Ordering::Less);
        assert_eq!(TextBuffer::new().compare_str(""), Ordering::Equal);
    }

    /// Known contract: comparison stops at a shared NUL, so bytes after an
    /// embedded NUL are ignored.
    #[test]
    fn compare_ignores_content_after_shared_nul() {
        assert_eq!(text("a\0x").compare_to(&text("a\0yz")), Ordering::Equal);
        assert_ne!(text("a\0x"), text("a\0yz"));
    }

    #[test]
    fn find_and_count() {
        let t = text("one two one");
        assert_eq!(t.find("one", 0), Some(0));
        assert_eq!(t.find("one", 1), Some(8));
        assert_eq!(t.find("three", 0), None);
        assert_eq!(t.find("one", 100), None);
        assert_eq!(t.count('o'), 3);
        assert_eq!(t.count('z'), 0);
    }

    #[test]
    fn replace_case_and_reverse() {
        let mut t = text("a-b-c");
        assert_eq!(t.replace('-', '+'), Ok(2));
        assert_eq!(t.as_str(), "a+b+c");
        assert_eq!(t.replace('+', 'é'), Ok(2));
        assert_eq!(t.as_bytes_with_nul(), "aébéc\0".as_bytes());

        let mut c = text("MiXeD 1");
        c.make_ascii_uppercase();
        assert_eq!(c.as_str(), "MIXED 1");
        c.make_ascii_lowercase();
        assert_eq!(c.as_str(), "mixed 1");

        let mut r = text("héllo");
        r.reverse().unwrap();
        assert_eq!(r.as_str(), "olléh");
        assert_eq!(r.as_bytes_with_nul().last(), Some(&0));
    }

    #[test]
    fn parse_trims_whitespace() {
        assert_eq!(text(" 42\n").parse::<i64>(), Ok(42));
        assert!(text("x").parse::<i64>().is_err());
    }

    #[test]
    fn read_from_takes_whole_reader() {
        let mut src = Cursor::new(b"line one\nline two\n".to_vec());
        src.set_position(5);
        let mut t = text("old");
        assert_eq!(t.read_from(&mut src).unwrap(), 18);
        assert_eq!(t.as_str(), "line one\nline two\n");
        assert_eq!(t.as_bytes_with_nul().last(), Some(&0));
    }

    #[test]
    fn read_from_rejects_invalid_utf8() {
        let mut src = Cursor::new(vec![0xff, 0xfe]);
        let mut t = text("old");
        let err = t.read_from(&mut src).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(t.as_str(), "old");
    }

    #[test]
    fn read_whole_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("ordmap-text-{}.txt", std::process::id()));
        std::fs::write(&path, "from disk").unwrap();
        let t = TextBuffer::read_whole_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(t.as_str(), "from disk");
        assert!(TextBuffer::read_whole_file(&path).is_err());
    }
}
