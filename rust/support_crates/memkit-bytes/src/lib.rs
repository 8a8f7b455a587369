//! Header-prefixed containers.
//!
//! Every container in this crate lives in a single allocation: a fixed-size
//! [`BlockHeader`] (magic tag, element size and alignment, capacity, length)
//! placed immediately before the first element. The owning handle keeps a
//! pointer to the first element plus the allocator that must be used to
//! grow and release the block.
//!
//! ```text
//!  block start (aligned to max(element_alignment, 8))
//!  │
//!  ▼
//!  [ padding ][ BlockHeader (32 bytes) ][ element 0 ][ element 1 ] ... [ trailing ]
//!                                       ▲
//!                                       └── data pointer, aligned to element_alignment
//! ```
//!
//! - [`Array`]: a typed, contiguous, reallocating sequence.
//! - [`TextBuf`]: a byte buffer that keeps a terminating zero both after the
//!   last byte and at the capacity boundary; allocator-backed or placed in a
//!   fixed caller buffer.

pub mod align;
pub mod array;
pub mod growth;
pub mod layout;
pub mod text;

pub use array::Array;
pub use layout::{BlockHeader, BlockLayout, HEADER_MAGIC, HEADER_SIZE, required_size};
pub use text::TextBuf;
