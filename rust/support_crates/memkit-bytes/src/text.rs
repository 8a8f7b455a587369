//! Byte buffer for text with a terminating zero at both edges.
//!
//! A [`TextBuf`] is a header-prefixed block with one-byte elements and one
//! trailing byte. At all times `data[len] == 0` and `data[capacity] == 0`,
//! so a reader that stops at the first zero, or one that runs to the end of
//! the allocation, always observes termination.

use std::{ffi::CStr, fmt, io};

use memkit_alloc::Allocator;
use memkit_common::{Error, Result, verify_arg, verify_integrity};

use crate::{
    growth::text_capacity,
    layout::{BlockHeader, BlockLayout, RawBlock},
};

/// Growable, zero-terminated byte buffer.
///
/// Created either from an allocator ([`TextBuf::create`]), in which case it
/// grows on demand, or inside a caller buffer ([`TextBuf::create_static`]),
/// in which case its capacity is fixed and any operation that would exceed
/// it fails with an overflow error and leaves the contents unchanged.
pub struct TextBuf<'a> {
    raw: RawBlock<'a>,
    len: usize,
}

impl<'a> TextBuf<'a> {
    /// Creates an empty buffer holding at least `initial_capacity` bytes
    /// (64 bytes at minimum).
    pub fn create(initial_capacity: usize, alloc: &'a dyn Allocator) -> Result<TextBuf<'a>> {
        let capacity = text_capacity(initial_capacity)
            .ok_or_else(|| Error::invalid_arg("initial_capacity", "capacity fits in usize"))?;
        let raw = RawBlock::allocate(BlockLayout::new(1, 1)?, capacity, 1, alloc)?;
        unsafe { raw.data_ptr().as_ptr().write_bytes(0, capacity + 1) };
        Ok(TextBuf { raw, len: 0 })
    }

    /// Places an empty buffer inside `buffer`.
    ///
    /// The header is stored at the start of `buffer` (after at most 7 bytes
    /// of alignment padding) and one byte is reserved for the terminator,
    /// so an 8-aligned buffer of `n` bytes holds `n - 33` bytes of text.
    /// Dropping the buffer wipes `buffer` back to an empty string.
    pub fn create_static(buffer: &'a mut [u8]) -> Result<TextBuf<'a>> {
        let raw = RawBlock::in_buffer(buffer, 1)?;
        let capacity = raw.cached_capacity();
        unsafe { raw.data_ptr().as_ptr().write_bytes(0, capacity + 1) };
        Ok(TextBuf { raw, len: 0 })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Text capacity in bytes, excluding the terminator.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.raw.cached_capacity()
    }

    /// Whether the buffer lives in a fixed caller buffer.
    #[inline]
    pub fn is_static(&self) -> bool {
        self.raw.is_static()
    }

    pub fn header(&self) -> Result<BlockHeader> {
        self.raw.header()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage()[..self.len]
    }

    /// The text followed by its terminating zero.
    #[inline]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.storage()[..=self.len]
    }

    /// The text up to the first zero byte.
    pub fn as_c_str(&self) -> Result<&CStr> {
        CStr::from_bytes_until_nul(self.as_bytes_with_nul())
            .map_err(|_| Error::integrity("text terminator missing"))
    }

    pub fn as_str(&self) -> std::result::Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(self.as_bytes())
    }

    /// Appends raw bytes. Appending an empty slice is a no-op.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let len = self.raw.len()?;
        let new_len = self.required(len, bytes.len())?;
        self.ensure(new_len)?;
        self.storage_mut()[len..new_len].copy_from_slice(bytes);
        self.set_len(new_len)
    }

    pub fn append_text(&mut self, text: &str) -> Result<()> {
        self.append(text.as_bytes())
    }

    /// Replaces every non-overlapping occurrence of `needle`, scanning left
    /// to right, and returns the number of replacements.
    ///
    /// An empty `needle` is an argument error. No match leaves the buffer
    /// untouched. The buffer grows first if the result is longer; if it
    /// cannot, nothing is modified.
    pub fn replace(&mut self, needle: &[u8], replacement: &[u8]) -> Result<usize> {
        verify_arg!(needle, !needle.is_empty());
        let len = self.raw.len()?;
        let matches = count_matches(&self.storage()[..len], needle);
        if matches == 0 {
            return Ok(0);
        }
        let new_len = (len - matches * needle.len())
            .checked_add(matches * replacement.len())
            .ok_or_else(|| Error::overflow(usize::MAX, self.capacity()))?;
        self.ensure(new_len)?;

        // Move the source to the tail so the forward pass never writes over
        // bytes it has not read yet.
        let shift = new_len.saturating_sub(len);
        let buf = self.storage_mut();
        buf.copy_within(0..len, shift);
        let end = shift + len;
        let (mut read, mut write) = (shift, 0);
        while read < end {
            if buf[read..end].starts_with(needle) {
                buf[write..write + replacement.len()].copy_from_slice(replacement);
                write += replacement.len();
                read += needle.len();
            } else {
                buf[write] = buf[read];
                write += 1;
                read += 1;
            }
        }
        debug_assert_eq!(write, new_len);
        if new_len < len {
            buf[new_len..len].fill(0);
        }
        self.set_len(new_len)?;
        Ok(matches)
    }

    /// Overwrites the contents with formatted text.
    ///
    /// The formatted length is measured first; the buffer grows (or, when
    /// static, fails with an overflow error before anything is written)
    /// and then receives the text.
    pub fn format(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        let old_len = self.raw.len()?;
        self.write_formatted(0, args)?;
        let new_len = self.len;
        if new_len < old_len {
            self.storage_mut()[new_len..old_len].fill(0);
        }
        Ok(())
    }

    /// Appends formatted text.
    pub fn append_format(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        let len = self.raw.len()?;
        self.write_formatted(len, args)
    }

    /// Resets the length to zero; the capacity is retained.
    pub fn clear(&mut self) -> Result<()> {
        self.truncate(0)
    }

    /// Shortens the text to `len` bytes. Has no effect if `len` is not
    /// shorter than the current length.
    pub fn truncate(&mut self, len: usize) -> Result<()> {
        let current = self.raw.len()?;
        if len < current {
            self.storage_mut()[len..current].fill(0);
            self.set_len(len)?;
        }
        Ok(())
    }

    /// Releases the block. A static buffer is wiped to an empty string
    /// instead.
    pub fn destroy(self) -> Result<()> {
        self.raw.release()
    }

    /// The whole storage: `capacity` text bytes plus the trailing
    /// terminator. Every byte is initialized.
    fn storage(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.raw.data_ptr().as_ptr(), self.capacity() + 1) }
    }

    fn storage_mut(&mut self) -> &mut [u8] {
        let size = self.capacity() + 1;
        unsafe { std::slice::from_raw_parts_mut(self.raw.data_ptr().as_ptr(), size) }
    }

    fn required(&self, len: usize, additional: usize) -> Result<usize> {
        len.checked_add(additional)
            .ok_or_else(|| Error::overflow(usize::MAX, self.capacity()))
    }

    fn set_len(&mut self, len: usize) -> Result<()> {
        self.raw.set_len(len)?;
        self.storage_mut()[len] = 0;
        self.len = len;
        Ok(())
    }

    /// Makes room for `required` bytes of text.
    fn ensure(&mut self, required: usize) -> Result<()> {
        let capacity = self.capacity();
        if required <= capacity {
            return Ok(());
        }
        if self.is_static() {
            return Err(Error::overflow(required, capacity));
        }
        let new_capacity = text_capacity(required)
            .ok_or_else(|| Error::out_of_memory(usize::MAX, 1))?;
        self.raw.grow(new_capacity)?;
        unsafe {
            self.raw
                .data_ptr()
                .as_ptr()
                .add(capacity + 1)
                .write_bytes(0, new_capacity - capacity)
        };
        Ok(())
    }

    fn write_formatted(&mut self, offset: usize, args: fmt::Arguments<'_>) -> Result<()> {
        let mut counter = LengthCounter(0);
        fmt::write(&mut counter, args).map_err(formatting_failed)?;
        let new_len = self.required(offset, counter.0)?;
        self.ensure(new_len)?;

        let mut writer = SliceWriter {
            buf: &mut self.storage_mut()[offset..new_len],
            pos: 0,
        };
        let written = fmt::write(&mut writer, args).map(|_| writer.pos);
        let written = written.map_err(formatting_failed)?;
        verify_integrity!("formatted text", written == counter.0);
        self.set_len(new_len)
    }
}

fn formatting_failed(_: fmt::Error) -> Error {
    Error::invalid_arg("args", "formatting trait implementation returned an error")
}

fn count_matches(haystack: &[u8], needle: &[u8]) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        if haystack[i..].starts_with(needle) {
            count += 1;
            i += needle.len();
        } else {
            i += 1;
        }
    }
    count
}

struct LengthCounter(usize);

impl fmt::Write for LengthCounter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

struct SliceWriter<'b> {
    buf: &'b mut [u8],
    pos: usize,
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.pos.checked_add(s.len()).ok_or(fmt::Error)?;
        self.buf
            .get_mut(self.pos..end)
            .ok_or(fmt::Error)?
            .copy_from_slice(s.as_bytes());
        self.pos = end;
        Ok(())
    }
}

impl fmt::Write for TextBuf<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

impl io::Write for TextBuf<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Display for TextBuf<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for TextBuf<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextBuf")
            .field("text", &String::from_utf8_lossy(self.as_bytes()))
            .field("capacity", &self.capacity())
            .field("static", &self.is_static())
            .finish()
    }
}
