//! Sample record types for dictionary tests.

use bytemuck::{Pod, Zeroable};
use memkit_collections::{DictRecord, TextKey};

/// Integer-keyed record.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct Employee {
    pub id: i64,
    pub name: [u8; 16],
}

impl Employee {
    /// Builds a record; `name` is truncated to 16 bytes.
    pub fn new(id: i64, name: &str) -> Employee {
        let mut bytes = [0u8; 16];
        let len = name.len().min(bytes.len());
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        Employee { id, name: bytes }
    }

    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(16);
        std::str::from_utf8(&self.name[..end]).unwrap_or_default()
    }
}

impl DictRecord for Employee {
    type Key = i64;
}

/// Text-keyed record.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct Term {
    pub text: TextKey<24>,
    pub hits: u64,
}

impl Term {
    /// Builds a record. Panics if `text` does not fit in 24 bytes.
    pub fn new(text: &str, hits: u64) -> Term {
        Term {
            text: TextKey::new(text).expect("term text fits in 24 bytes"),
            hits,
        }
    }
}

impl DictRecord for Term {
    type Key = TextKey<24>;
}
