//! Test utilities for the memkit workspace.
//!
//! - Sample dictionary records keyed by integer and by fixed-size text
//! - Seeded generators for keys, words and records
//! - Temporary files for the allocator's file-tracking tests

pub mod data_gen;
pub mod records;
