//! Hash dictionary keyed by a field embedded in caller-defined records.
//!
//! Records are plain-old-data ([`bytemuck::Pod`]) structs whose first field
//! is the key. The key type declares its [`KeyShape`] (fixed-width integer
//! or zero-terminated fixed-size text), and the dictionary picks a matching
//! [`KeyStrategy`] (hash plus compare) when it is built. Bucket storage is
//! obtained from, and returned to, a [`memkit_alloc::Allocator`].
//!
//! - [`Dictionary`]: open addressing with Robin Hood probing.
//! - [`DictionaryConfig`]: sizing, load factor and hash seed.
//! - [`TextKey`]: fixed-capacity text key.

pub mod config;
pub mod dictionary;
pub mod key;
mod table;

pub use config::DictionaryConfig;
pub use dictionary::{Cursor, Dictionary, DictionaryBuilder, Iter};
pub use key::{DictKey, DictRecord, KeyShape, KeyStrategy, TextKey};
