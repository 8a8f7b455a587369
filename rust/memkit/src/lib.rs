//! # Memkit: allocator-aware containers
//!
//! Memkit provides a small set of containers that obtain all of their
//! memory from an explicitly passed allocator and return it to the same
//! allocator when they are destroyed:
//!
//! * [`Array`]: a typed, contiguous, reallocating sequence
//! * [`TextBuf`]: a zero-terminated byte buffer, allocator-backed or placed
//!   in a fixed caller buffer
//! * [`Dictionary`]: a hash table of plain-old-data records keyed by their
//!   leading field
//!
//! Arrays and text buffers share one layout: a 32-byte header (magic tag,
//! element size and alignment, capacity, length) immediately followed by
//! the elements, in a single allocation. The handle points at the first
//! element, so the header can always be found from the data pointer.
//!
//! ## Allocators
//!
//! Two strategies implement [`Allocator`]:
//!
//! * [`HeapAllocator`] delegates to the global allocator
//! * [`StaticArena`] bump-allocates from a caller buffer and cannot resize
//!
//! Each counts allocations, frees, reallocations and tracked file handles,
//! and logs a "possible memory leak" or "possible resource leak" warning
//! (through the `log` facade) when it is torn down unbalanced. At most one
//! instance of each strategy may be live per thread.
//!
//! ```
//! use memkit::{Array, HeapAllocator, TextBuf};
//!
//! let heap = HeapAllocator::create()?;
//! let mut numbers = Array::<u32>::create(1, &heap)?;
//! numbers.extend(&[1, 2, 3])?;
//!
//! let mut text = TextBuf::create(0, &heap)?;
//! text.format(format_args!("{} numbers", numbers.len()))?;
//! assert_eq!(text.as_str().ok(), Some("3 numbers"));
//!
//! numbers.destroy()?;
//! text.destroy()?;
//! assert!(heap.destroy().is_balanced());
//! # Ok::<(), memkit::Error>(())
//! ```
//!
//! ## Module Organization
//!
//! * [`common`] - Error type and verification helpers
//! * [`allocator`] - Allocator trait, strategies and counters
//! * [`bytes`] - Header layout, growth policy, array and text buffer
//! * [`collections`] - Dictionary, key shapes and strategies

pub use memkit_alloc as allocator;
pub use memkit_bytes as bytes;
pub use memkit_collections as collections;
pub use memkit_common as common;

pub use memkit_alloc::{AllocStats, Allocator, HeapAllocator, StaticArena};
pub use memkit_bytes::{Array, TextBuf};
pub use memkit_collections::{
    DictRecord, Dictionary, DictionaryConfig, KeyShape, KeyStrategy, TextKey,
};
pub use memkit_common::{Error, ErrorKind, Result};
