//! Allocator abstraction for memkit containers.
//!
//! Every container in the workspace is constructed from an [`Allocator`] and
//! returns its memory through the same allocator when it is destroyed. Two
//! strategies are provided:
//!
//! - [`HeapAllocator`]: delegates to the global allocator and counts every
//!   operation, reporting imbalance at teardown.
//! - [`StaticArena`]: bump-allocates from a caller-supplied byte buffer,
//!   never frees individually and refuses to resize blocks.
//!
//! Both strategies also track file handles opened through them, so that a
//! "possible resource leak" diagnostic can be emitted when the allocator is
//! torn down with unbalanced open/close counts.
//!
//! Allocators are single-threaded: they are neither `Send` nor `Sync`, and at
//! most one live instance of each strategy may exist per thread.

use std::{
    alloc::Layout,
    fs::{File, OpenOptions},
    path::Path,
    ptr::NonNull,
};

use memkit_common::{Error, Result, verify_arg};

pub mod arena;
pub mod counter;
pub mod files;
pub mod heap;
mod lifecycle;

pub use arena::StaticArena;
pub use counter::{AllocCounters, AllocStats, Counter};
pub use files::StreamMode;
pub use heap::HeapAllocator;

/// Largest alignment any strategy accepts.
pub const MAX_ALIGNMENT: usize = 64;

/// Alignment used by [`Allocator::allocate`] and [`Allocator::reallocate`]
/// (the platform `malloc` guarantee on 64-bit targets).
pub const DEFAULT_ALIGNMENT: usize = 16;

/// Capability set every allocation strategy implements.
///
/// The trait is object safe; containers keep a `&dyn Allocator` and use it
/// for growth and release. Unlike `malloc`/`free`, release and resize take
/// the original size and alignment of the block, which the caller always
/// knows.
pub trait Allocator {
    /// Allocates `size` bytes aligned to [`DEFAULT_ALIGNMENT`].
    ///
    /// A zero `size` is an argument error, never a valid empty allocation.
    fn allocate(&self, size: usize) -> Result<NonNull<u8>> {
        self.allocate_aligned(DEFAULT_ALIGNMENT, size)
    }

    /// Allocates `size` bytes whose address is a multiple of `alignment`.
    ///
    /// `alignment` must be a power of two no greater than [`MAX_ALIGNMENT`].
    fn allocate_aligned(&self, alignment: usize, size: usize) -> Result<NonNull<u8>>;

    /// Resizes a block obtained from [`Allocator::allocate`].
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator with
    /// [`DEFAULT_ALIGNMENT`] and a current size of `old_size`.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>> {
        unsafe { self.reallocate_aligned(ptr, DEFAULT_ALIGNMENT, old_size, new_size) }
    }

    /// Resizes a block, in place or by moving it. On failure the original
    /// block is left untouched and still owned by the caller.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator with `alignment` and
    /// a current size of `old_size`.
    unsafe fn reallocate_aligned(
        &self,
        ptr: NonNull<u8>,
        alignment: usize,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>>;

    /// Releases a block.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator with `alignment` and
    /// a current size of `size`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, alignment: usize, size: usize);

    /// Operation counters of this instance.
    fn counters(&self) -> &AllocCounters;

    /// Snapshot of the operation counters.
    fn stats(&self) -> AllocStats {
        self.counters().snapshot()
    }

    /// Opens a file and records the open.
    fn open(&self, path: &Path, options: &OpenOptions) -> Result<File> {
        files::open_tracked(self.counters(), path, options)
    }

    /// Closes a file previously returned by [`Allocator::open`].
    fn close(&self, file: File) {
        files::close_tracked(self.counters(), file)
    }

    /// Opens a file with a C stream mode string (`"r"`, `"w+"`, `"ab"`, ...).
    fn fopen(&self, path: &Path, mode: &str) -> Result<File> {
        let mode = StreamMode::parse(mode)?;
        files::open_tracked(self.counters(), path, &mode.open_options())
    }

    /// Syncs written data to disk and closes a stream previously returned by
    /// [`Allocator::fopen`].
    fn fclose(&self, file: File) -> Result<()> {
        files::fclose_tracked(self.counters(), file)
    }
}

/// Validates an allocation request and turns it into a [`Layout`].
pub fn validate_request(alignment: usize, size: usize) -> Result<Layout> {
    verify_arg!(size, size != 0);
    verify_arg!(alignment, alignment.is_power_of_two());
    verify_arg!(alignment, alignment <= MAX_ALIGNMENT);
    Layout::from_size_align(size, alignment)
        .map_err(|_| Error::invalid_arg("size", "size rounded to alignment fits in isize"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_request() {
        assert!(validate_request(8, 16).is_ok());
        assert!(validate_request(64, 1).is_ok());
        assert!(validate_request(8, 0).unwrap_err().is_invalid_arg());
        assert!(validate_request(3, 16).unwrap_err().is_invalid_arg());
        assert!(validate_request(128, 16).unwrap_err().is_invalid_arg());
        assert!(validate_request(8, usize::MAX).unwrap_err().is_invalid_arg());
    }

    #[test]
    fn test_allocator_is_object_safe() {
        let heap = HeapAllocator::create().unwrap();
        let alloc: &dyn Allocator = &heap;
        let p = alloc.allocate(24).unwrap();
        assert_eq!(p.as_ptr() as usize % DEFAULT_ALIGNMENT, 0);
        unsafe { alloc.deallocate(p, DEFAULT_ALIGNMENT, 24) };
        assert!(heap.destroy().is_balanced());
    }
}
