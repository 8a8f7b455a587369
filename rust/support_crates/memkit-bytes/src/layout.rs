//! Header-prefixed block layout shared by [`Array`](crate::Array) and
//! [`TextBuf`](crate::TextBuf).
//!
//! A block is one allocation holding a [`BlockHeader`] directly followed by
//! the element storage. The handle points at the first element; the header
//! sits at a fixed negative offset from it.
//!
//! When `element_alignment` exceeds [`HEADER_SIZE`], the header is shifted
//! forward inside the block by `element_alignment - HEADER_SIZE` bytes so the
//! first element lands on an `element_alignment` boundary while the block
//! itself is allocated with `element_alignment`.

use std::{marker::PhantomData, ptr::NonNull};

use memkit_alloc::{Allocator, MAX_ALIGNMENT};
use memkit_common::{Error, Result, verify_arg, verify_integrity};

use crate::align::align_up;

/// Sentinel stored in every live header ("MEMKHDR1").
pub const HEADER_MAGIC: u64 = u64::from_le_bytes(*b"MEMKHDR1");

/// Size of [`BlockHeader`] in bytes; identical on every target.
pub const HEADER_SIZE: usize = std::mem::size_of::<BlockHeader>();

/// Element sizes must lie strictly between 0 and this bound.
pub const MAX_ELEMENT_SIZE: usize = i16::MAX as usize;

const _: () = assert!(HEADER_SIZE == 32);

/// Metadata stored immediately before the first element of a block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub magic: u64,
    pub element_size: u32,
    pub element_alignment: u32,
    /// Allocated element slots (bytes for text buffers, excluding the
    /// terminator).
    pub capacity: u64,
    pub len: u64,
}

/// Validated element geometry of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    element_size: usize,
    element_alignment: usize,
}

impl BlockLayout {
    /// Validates `element_size` (in `(0, i16::MAX)`, a multiple of the
    /// alignment) and `element_alignment` (a power of two, at most 64).
    pub fn new(element_size: usize, element_alignment: usize) -> Result<BlockLayout> {
        verify_arg!(element_size, element_size > 0);
        verify_arg!(element_size, element_size < MAX_ELEMENT_SIZE);
        verify_arg!(element_alignment, element_alignment.is_power_of_two());
        verify_arg!(element_alignment, element_alignment <= MAX_ALIGNMENT);
        verify_arg!(element_size, element_size % element_alignment == 0);
        Ok(BlockLayout {
            element_size,
            element_alignment,
        })
    }

    #[inline]
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    #[inline]
    pub fn element_alignment(&self) -> usize {
        self.element_alignment
    }

    /// Bytes from the block start to the first element.
    #[inline]
    pub fn prefix(&self) -> usize {
        self.element_alignment.max(HEADER_SIZE)
    }

    /// Bytes from the block start to the header.
    #[inline]
    pub fn header_offset(&self) -> usize {
        self.prefix() - HEADER_SIZE
    }

    /// Alignment requested from the allocator for the block.
    #[inline]
    pub fn block_alignment(&self) -> usize {
        self.element_alignment
            .max(std::mem::align_of::<BlockHeader>())
    }

    /// Total block size for `capacity` elements plus `trailing` extra bytes:
    /// `capacity * element_size + max(element_alignment, HEADER_SIZE) + trailing`.
    pub fn block_size(&self, capacity: usize, trailing: usize) -> Result<usize> {
        capacity
            .checked_mul(self.element_size)
            .and_then(|n| n.checked_add(self.prefix()))
            .and_then(|n| n.checked_add(trailing))
            .filter(|&n| n <= isize::MAX as usize)
            .ok_or_else(|| Error::invalid_arg("capacity", "block size fits in isize"))
    }
}

/// Allocation size for `capacity` elements of the given geometry.
pub fn required_size(
    capacity: usize,
    element_size: usize,
    element_alignment: usize,
) -> Result<usize> {
    BlockLayout::new(element_size, element_alignment)?.block_size(capacity, 0)
}

/// Reads and validates the header that precedes `data`.
///
/// # Safety
///
/// `data` must point [`HEADER_SIZE`] bytes past a readable, 8-byte aligned
/// region, e.g. the first element of a live memkit block.
pub unsafe fn header_from_data(data: *const u8) -> Result<BlockHeader> {
    let header = unsafe { data.sub(HEADER_SIZE).cast::<BlockHeader>().read() };
    verify_integrity!("block header", header.magic == HEADER_MAGIC);
    verify_integrity!("block header", header.len <= header.capacity);
    Ok(header)
}

/// Where a block's memory comes from.
#[derive(Clone, Copy)]
enum Backing<'a> {
    Allocator(&'a dyn Allocator),
    /// A caller buffer: fixed capacity, wiped instead of freed. `pad` is the
    /// distance from the start of the buffer to the block base.
    Static {
        pad: usize,
        buffer: PhantomData<&'a mut [u8]>,
    },
}

/// Untyped owner of one header-prefixed block.
///
/// The handle caches the data pointer and the total block size, so the
/// block can always be released with the layout it was allocated with, even
/// when the in-memory header has been corrupted.
pub(crate) struct RawBlock<'a> {
    data: NonNull<u8>,
    layout: BlockLayout,
    /// Extra bytes after the element storage (the text terminator).
    trailing: usize,
    /// Total block size in bytes, starting at the block base.
    size: usize,
    backing: Backing<'a>,
}

impl<'a> RawBlock<'a> {
    /// Allocates a block for `capacity` elements with zero length.
    pub(crate) fn allocate(
        layout: BlockLayout,
        capacity: usize,
        trailing: usize,
        alloc: &'a dyn Allocator,
    ) -> Result<RawBlock<'a>> {
        let size = layout.block_size(capacity, trailing)?;
        let base = alloc.allocate_aligned(layout.block_alignment(), size)?;
        let block = RawBlock {
            data: unsafe { base.add(layout.prefix()) },
            layout,
            trailing,
            size,
            backing: Backing::Allocator(alloc),
        };
        block.write_header(capacity, 0);
        Ok(block)
    }

    /// Places a byte block (element size 1) inside a caller buffer.
    ///
    /// The header is aligned inside the buffer; the capacity is whatever
    /// remains after the padding, the header and `trailing` bytes.
    pub(crate) fn in_buffer(buffer: &'a mut [u8], trailing: usize) -> Result<RawBlock<'a>> {
        let layout = BlockLayout::new(1, 1)?;
        let addr = buffer.as_ptr() as usize;
        let pad = align_up(addr, std::mem::align_of::<BlockHeader>()) - addr;
        let overhead = pad + HEADER_SIZE + trailing;
        verify_arg!(buffer, buffer.len() >= overhead);
        let capacity = buffer.len() - overhead;
        let base = NonNull::from(buffer).cast::<u8>();
        let block = RawBlock {
            data: unsafe { base.add(pad + layout.prefix()) },
            layout,
            trailing,
            size: layout.block_size(capacity, trailing)?,
            backing: Backing::Static {
                pad,
                buffer: PhantomData,
            },
        };
        block.write_header(capacity, 0);
        Ok(block)
    }

    #[inline]
    pub(crate) fn layout(&self) -> BlockLayout {
        self.layout
    }

    #[inline]
    pub(crate) fn is_static(&self) -> bool {
        matches!(self.backing, Backing::Static { .. })
    }

    #[inline]
    pub(crate) fn data_ptr(&self) -> NonNull<u8> {
        self.data
    }

    /// Capacity derived from the handle's own view of the block.
    #[inline]
    pub(crate) fn cached_capacity(&self) -> usize {
        (self.size - self.layout.prefix() - self.trailing) / self.layout.element_size()
    }

    /// Reads the header and checks it against the handle.
    pub(crate) fn header(&self) -> Result<BlockHeader> {
        let header = unsafe { header_from_data(self.data.as_ptr()) }?;
        verify_integrity!(
            "block header",
            header.element_size as usize == self.layout.element_size()
        );
        verify_integrity!(
            "block header",
            header.element_alignment as usize == self.layout.element_alignment()
        );
        verify_integrity!(
            "block header",
            header.capacity as usize == self.cached_capacity()
        );
        Ok(header)
    }

    /// Element count recorded in the header.
    pub(crate) fn len(&self) -> Result<usize> {
        Ok(self.header()?.len as usize)
    }

    pub(crate) fn set_len(&mut self, len: usize) -> Result<()> {
        let header = self.header()?;
        verify_integrity!("block length", len as u64 <= header.capacity);
        unsafe { (*self.header_ptr()).len = len as u64 };
        Ok(())
    }

    /// Reallocates the block to hold `new_capacity` elements.
    ///
    /// Static blocks cannot grow and fail with an overflow error. On failure
    /// the block is unchanged.
    pub(crate) fn grow(&mut self, new_capacity: usize) -> Result<()> {
        let header = self.header()?;
        let old_capacity = header.capacity as usize;
        let alloc = match self.backing {
            Backing::Allocator(alloc) => alloc,
            Backing::Static { .. } => {
                return Err(Error::overflow(
                    new_capacity.saturating_mul(self.layout.element_size()),
                    old_capacity * self.layout.element_size(),
                ));
            }
        };
        let new_size = self.layout.block_size(new_capacity, self.trailing)?;
        let new_base = unsafe {
            alloc.reallocate_aligned(
                self.base(),
                self.layout.block_alignment(),
                self.size,
                new_size,
            )?
        };
        self.data = unsafe { new_base.add(self.layout.prefix()) };
        self.size = new_size;
        unsafe { header_from_data(self.data.as_ptr()) }?;
        unsafe { (*self.header_ptr()).capacity = new_capacity as u64 };
        log::debug!("block grew from {old_capacity} to {new_capacity} elements ({new_size} bytes)");
        Ok(())
    }

    /// Releases the block, reporting a corrupted header as an integrity
    /// error. Memory is released either way.
    pub(crate) fn release(self) -> Result<()> {
        let checked = self.header().map(|_| ());
        drop(self);
        checked
    }

    /// Overwrites the magic tag, simulating a stray write into the header.
    #[cfg(test)]
    pub(crate) fn corrupt_magic(&mut self) {
        unsafe { (*self.header_ptr()).magic = 0 };
    }

    #[inline]
    fn header_ptr(&self) -> *mut BlockHeader {
        unsafe { self.data.as_ptr().sub(HEADER_SIZE).cast::<BlockHeader>() }
    }

    #[inline]
    fn base(&self) -> NonNull<u8> {
        unsafe { self.data.sub(self.layout.prefix()) }
    }

    fn write_header(&self, capacity: usize, len: usize) {
        let header = BlockHeader {
            magic: HEADER_MAGIC,
            element_size: self.layout.element_size() as u32,
            element_alignment: self.layout.element_alignment() as u32,
            capacity: capacity as u64,
            len: len as u64,
        };
        unsafe { self.header_ptr().write(header) };
    }
}

impl Drop for RawBlock<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.header() {
            log::error!("releasing block with an invalid header: {e}");
        }
        match self.backing {
            Backing::Allocator(alloc) => unsafe {
                alloc.deallocate(self.base(), self.layout.block_alignment(), self.size)
            },
            Backing::Static { pad, .. } => unsafe {
                // Leave the caller's buffer holding an empty string, starting
                // at its first byte rather than at the aligned block base.
                self.base()
                    .sub(pad)
                    .write_bytes(0, pad + self.layout.prefix() + 1);
            },
        }
    }
}
