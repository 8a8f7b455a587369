//! Key shapes and the built-in hash/compare strategies.

use std::{cmp::Ordering, fmt};

use bytemuck::{Pod, Zeroable};
use memkit_common::{Error, Result, verify_arg};
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Declared shape of a dictionary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape {
    /// A fixed-width integer of `width` bytes (1, 2, 4 or 8).
    Integer { width: usize, signed: bool },
    /// Zero-terminated text in a buffer of `capacity` bytes. A full buffer
    /// carries no terminator.
    Text { capacity: usize },
}

/// A type that can serve as a dictionary key.
pub trait DictKey: Pod {
    const SHAPE: KeyShape;
}

macro_rules! impl_integer_key {
    ($($ty:ty => $signed:literal),* $(,)?) => {
        $(
            impl DictKey for $ty {
                const SHAPE: KeyShape = KeyShape::Integer {
                    width: std::mem::size_of::<$ty>(),
                    signed: $signed,
                };
            }
        )*
    };
}

impl_integer_key!(
    i8 => true, i16 => true, i32 => true, i64 => true,
    u8 => false, u16 => false, u32 => false, u64 => false,
);

/// A record stored in a [`Dictionary`](crate::Dictionary).
///
/// The key must be the first field of the record: `KEY_OFFSET` exists so
/// that a record can declare where its key lives, and building a dictionary
/// over a record whose key is anywhere else fails with an integrity error.
///
/// ```
/// use bytemuck::{Pod, Zeroable};
/// use memkit_collections::DictRecord;
///
/// #[repr(C)]
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// struct Account {
///     id: u32,
///     flags: u32,
///     balance: i64,
/// }
///
/// impl DictRecord for Account {
///     type Key = u32;
/// }
/// ```
pub trait DictRecord: Pod {
    type Key: DictKey;

    /// Byte offset of the key inside the record.
    const KEY_OFFSET: usize = 0;
}

/// Fixed-capacity text key: up to `N` bytes, zero-padded.
#[repr(transparent)]
#[derive(Clone, Copy)]
pub struct TextKey<const N: usize>([u8; N]);

unsafe impl<const N: usize> Zeroable for TextKey<N> {}
unsafe impl<const N: usize> Pod for TextKey<N> {}

impl<const N: usize> DictKey for TextKey<N> {
    const SHAPE: KeyShape = KeyShape::Text { capacity: N };
}

impl<const N: usize> TextKey<N> {
    /// Creates a key from `text`, which must fit in `N` bytes and contain no
    /// zero byte.
    pub fn new(text: &str) -> Result<TextKey<N>> {
        Self::from_bytes(text.as_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<TextKey<N>> {
        verify_arg!(bytes, bytes.len() <= N);
        verify_arg!(bytes, !bytes.contains(&0));
        let mut key = [0u8; N];
        key[..bytes.len()].copy_from_slice(bytes);
        Ok(TextKey(key))
    }

    /// The key text up to (excluding) the first zero byte.
    pub fn as_bytes(&self) -> &[u8] {
        until_nul(&self.0)
    }

    pub fn as_str(&self) -> std::result::Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(self.as_bytes())
    }
}

impl<const N: usize> Default for TextKey<N> {
    fn default() -> Self {
        TextKey([0; N])
    }
}

impl<const N: usize> fmt::Debug for TextKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextKey({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl<const N: usize> PartialEq for TextKey<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<const N: usize> Eq for TextKey<N> {}

impl<const N: usize> std::hash::Hash for TextKey<N> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl<const N: usize> PartialOrd for TextKey<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<const N: usize> Ord for TextKey<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

/// Hashes key bytes with a seed.
pub type HashFn = fn(key: &[u8], seed: u64) -> u64;

/// Orders two keys given as bytes.
pub type CompareFn = fn(a: &[u8], b: &[u8]) -> Ordering;

/// Hash and compare functions for one key shape.
///
/// Both functions receive the raw key bytes of a record, exactly
/// `size_of::<K>()` bytes long.
#[derive(Clone, Copy)]
pub struct KeyStrategy {
    pub hash: HashFn,
    pub compare: CompareFn,
}

impl KeyStrategy {
    /// Built-in strategy for `shape`: bit-mixing hash with numeric compare
    /// for integers, xxh3 with lexicographic compare for text.
    pub fn for_shape(shape: KeyShape) -> Result<KeyStrategy> {
        let compare: CompareFn = match shape {
            KeyShape::Text { capacity } => {
                verify_arg!(capacity, capacity > 0);
                return Ok(KeyStrategy {
                    hash: hash_text,
                    compare: compare_text,
                });
            }
            KeyShape::Integer { width, signed } => match (width, signed) {
                (1, true) => compare_integer::<i8>,
                (2, true) => compare_integer::<i16>,
                (4, true) => compare_integer::<i32>,
                (8, true) => compare_integer::<i64>,
                (1, false) => compare_integer::<u8>,
                (2, false) => compare_integer::<u16>,
                (4, false) => compare_integer::<u32>,
                (8, false) => compare_integer::<u64>,
                _ => return Err(Error::invalid_arg("width", "width is 1, 2, 4 or 8")),
            },
        };
        Ok(KeyStrategy {
            hash: hash_integer,
            compare,
        })
    }
}

impl fmt::Debug for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStrategy").finish_non_exhaustive()
    }
}

/// Integer key hash: the key value (zero-extended to 64 bits) mixed with
/// the seed through the splitmix64 finalizer.
pub fn hash_integer(key: &[u8], seed: u64) -> u64 {
    let mut bytes = [0u8; 8];
    let width = key.len().min(8);
    bytes[..width].copy_from_slice(&key[..width]);
    let mut x = u64::from_ne_bytes(bytes) ^ seed;
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Text key hash: xxh3 over the bytes before the first zero.
pub fn hash_text(key: &[u8], seed: u64) -> u64 {
    xxh3_64_with_seed(until_nul(key), seed)
}

pub fn compare_text(a: &[u8], b: &[u8]) -> Ordering {
    until_nul(a).cmp(until_nul(b))
}

/// Numeric order for keys of exactly `size_of::<T>()` bytes. Keys of any
/// other width (a strategy paired with a different key type) fall back to
/// byte order, which still agrees with byte equality.
fn compare_integer<T: Pod + Ord>(a: &[u8], b: &[u8]) -> Ordering {
    match (
        bytemuck::try_pod_read_unaligned::<T>(a),
        bytemuck::try_pod_read_unaligned::<T>(b),
    ) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

/// Encodes `value` as the native bytes of an integer key of `shape`.
///
/// Returns the buffer and the key width; values outside the key type's
/// range are an argument error.
pub(crate) fn integer_key_bytes(shape: KeyShape, value: i64) -> Result<([u8; 8], usize)> {
    let KeyShape::Integer { width, signed } = shape else {
        return Err(Error::invalid_arg("key", "dictionary has integer keys"));
    };
    let bits = (width * 8) as u32;
    let fits = match (bits, signed) {
        (64, true) => true,
        (64, false) => value >= 0,
        (_, true) => {
            let max = (1i64 << (bits - 1)) - 1;
            (-max - 1..=max).contains(&value)
        }
        (_, false) => value >= 0 && value < (1i64 << bits),
    };
    verify_arg!(key, fits);
    let native = value.to_ne_bytes();
    let low = if cfg!(target_endian = "little") {
        &native[..width]
    } else {
        &native[8 - width..]
    };
    let mut bytes = [0u8; 8];
    bytes[..width].copy_from_slice(low);
    Ok((bytes, width))
}
