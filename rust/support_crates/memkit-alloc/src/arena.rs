//! Static arena allocator over a caller-supplied byte buffer.
//!
//! [`StaticArena`] bump-allocates from a fixed region. Blocks are never freed
//! individually (deallocation only updates the counters) and can never be
//! resized, since a block in the middle of the bump region has no room to
//! grow. The whole region is reclaimed when the arena is destroyed, which
//! also ends the borrow of the caller's buffer.

use std::{cell::Cell, marker::PhantomData, ptr::NonNull};

use memkit_common::{Error, Result, verify_arg};

use crate::{
    Allocator,
    counter::{AllocCounters, AllocStats, report_teardown},
    lifecycle::{ARENA_LIVE, Registration},
    validate_request,
};

const STRATEGY: &str = "static arena";

/// Bump allocator over a borrowed, fixed-size buffer.
///
/// Only one instance may be live per thread.
pub struct StaticArena<'buf> {
    /// Start of the caller's buffer.
    base: NonNull<u8>,
    /// Buffer length in bytes.
    capacity: usize,
    /// Bump pointer: offset of the first free byte.
    cursor: Cell<usize>,
    counters: AllocCounters,
    _registration: Registration,
    _buffer: PhantomData<&'buf mut [u8]>,
}

impl<'buf> StaticArena<'buf> {
    /// Creates the arena over `buffer`.
    ///
    /// Fails with `InvalidArgument` on an empty buffer and with
    /// `InvalidOperation` if another arena is live on this thread.
    pub fn create(buffer: &'buf mut [u8]) -> Result<StaticArena<'buf>> {
        verify_arg!(buffer, !buffer.is_empty());
        let registration = Registration::acquire(&ARENA_LIVE, STRATEGY)?;
        let capacity = buffer.len();
        let base = NonNull::from(buffer).cast::<u8>();
        Ok(StaticArena {
            base,
            capacity,
            cursor: Cell::new(0),
            counters: AllocCounters::new(),
            _registration: registration,
            _buffer: PhantomData,
        })
    }

    /// Total size of the backing buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes consumed so far, including alignment padding.
    pub fn used(&self) -> usize {
        self.cursor.get()
    }

    /// Bytes still available before accounting for alignment padding.
    pub fn remaining(&self) -> usize {
        self.capacity - self.cursor.get()
    }

    /// Tears the arena down, reclaiming the whole region, and returns its
    /// final statistics.
    pub fn destroy(self) -> AllocStats {
        self.cursor.set(0);
        self.counters.snapshot()
    }
}

impl Allocator for StaticArena<'_> {
    fn allocate_aligned(&self, alignment: usize, size: usize) -> Result<NonNull<u8>> {
        validate_request(alignment, size)?;
        let base = self.base.as_ptr() as usize;
        let current = base + self.cursor.get();
        let start = current
            .checked_next_multiple_of(alignment)
            .map(|aligned| aligned - base)
            .ok_or_else(|| Error::out_of_memory(size, alignment))?;
        let end = start
            .checked_add(size)
            .filter(|&end| end <= self.capacity)
            .ok_or_else(|| Error::out_of_memory(size, alignment))?;
        let consumed = end - self.cursor.get();
        self.cursor.set(end);
        self.counters.record_allocation(consumed);
        let ptr = unsafe { self.base.add(start) };
        log::trace!("{STRATEGY}: allocate {size} bytes (align {alignment}) at offset {start}");
        Ok(ptr)
    }

    unsafe fn reallocate_aligned(
        &self,
        _ptr: NonNull<u8>,
        alignment: usize,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>> {
        validate_request(alignment, new_size)?;
        log::trace!("{STRATEGY}: rejected reallocate {old_size} -> {new_size} bytes");
        Err(Error::out_of_memory(new_size, alignment))
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _alignment: usize, _size: usize) {
        self.counters.record_deallocation(0);
    }

    fn counters(&self) -> &AllocCounters {
        &self.counters
    }
}

impl Drop for StaticArena<'_> {
    fn drop(&mut self) {
        report_teardown(STRATEGY, &self.counters.snapshot());
    }
}

impl std::fmt::Debug for StaticArena<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticArena")
            .field("capacity", &self.capacity)
            .field("used", &self.cursor.get())
            .field("stats", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}
