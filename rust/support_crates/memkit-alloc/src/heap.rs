//! Tracking heap allocator backed by the global allocator.

use std::{alloc::Layout, ptr::NonNull};

use memkit_common::{Error, Result};

use crate::{
    Allocator,
    counter::{AllocCounters, AllocStats, report_teardown},
    lifecycle::{HEAP_LIVE, Registration},
    validate_request,
};

const STRATEGY: &str = "heap allocator";

/// Allocator that delegates to the system allocator and counts every
/// operation.
///
/// Only one instance may be live per thread. Tearing it down with
/// [`HeapAllocator::destroy`] (or by dropping it) logs a warning when
/// allocations and frees, or opens and closes, do not match; teardown always
/// completes.
pub struct HeapAllocator {
    counters: AllocCounters,
    _registration: Registration,
}

impl HeapAllocator {
    /// Creates the heap allocator for the current thread.
    ///
    /// Fails with `InvalidOperation` if another instance is still live.
    pub fn create() -> Result<HeapAllocator> {
        let registration = Registration::acquire(&HEAP_LIVE, STRATEGY)?;
        Ok(HeapAllocator {
            counters: AllocCounters::new(),
            _registration: registration,
        })
    }

    /// Tears the allocator down and returns its final statistics.
    pub fn destroy(self) -> AllocStats {
        self.counters.snapshot()
    }
}

impl Allocator for HeapAllocator {
    fn allocate_aligned(&self, alignment: usize, size: usize) -> Result<NonNull<u8>> {
        let layout = validate_request(alignment, size)?;
        let ptr = unsafe { std::alloc::alloc(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| Error::out_of_memory(size, alignment))?;
        self.counters.record_allocation(size);
        log::trace!("{STRATEGY}: allocate {size} bytes (align {alignment}) at {ptr:p}");
        Ok(ptr)
    }

    unsafe fn reallocate_aligned(
        &self,
        ptr: NonNull<u8>,
        alignment: usize,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>> {
        validate_request(alignment, new_size)?;
        let old_layout = validate_request(alignment, old_size)?;
        let new_ptr = unsafe { std::alloc::realloc(ptr.as_ptr(), old_layout, new_size) };
        let new_ptr =
            NonNull::new(new_ptr).ok_or_else(|| Error::out_of_memory(new_size, alignment))?;
        self.counters.record_reallocation(old_size, new_size);
        log::trace!("{STRATEGY}: reallocate {old_size} -> {new_size} bytes, {ptr:p} -> {new_ptr:p}");
        Ok(new_ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, alignment: usize, size: usize) {
        unsafe {
            std::alloc::dealloc(
                ptr.as_ptr(),
                Layout::from_size_align_unchecked(size, alignment),
            )
        };
        self.counters.record_deallocation(size);
        log::trace!("{STRATEGY}: deallocate {size} bytes at {ptr:p}");
    }

    fn counters(&self) -> &AllocCounters {
        &self.counters
    }
}

impl Drop for HeapAllocator {
    fn drop(&mut self) {
        report_teardown(STRATEGY, &self.counters.snapshot());
    }
}

impl std::fmt::Debug for HeapAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapAllocator")
            .field("stats", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}
