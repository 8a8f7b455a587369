//! Hash dictionary over [`DictRecord`]s.

use std::{
    fmt,
    mem::{align_of, size_of},
    time::{SystemTime, UNIX_EPOCH},
};

use bytemuck::bytes_of;
use memkit_alloc::Allocator;
use memkit_bytes::Array;
use memkit_common::{Error, Result, verify_arg, verify_integrity};

use crate::{
    config::DictionaryConfig,
    key::{DictKey, DictRecord, KeyStrategy, hash_integer, integer_key_bytes},
    table::{Bucket, Table},
};

/// Tag held by every live dictionary handle ("MEMKDICT").
const DICTIONARY_MAGIC: u64 = u64::from_le_bytes(*b"MEMKDICT");

type Finalizer<'a, R> = Box<dyn FnMut(&mut R) + 'a>;

/// Hash table of records keyed by their leading field.
///
/// Lookups take a key value of the record's key type; the dictionary hashes
/// and compares the key's bytes with its [`KeyStrategy`]. An optional
/// finalizer runs on every record still stored when the dictionary is
/// cleared, destroyed or dropped. Records handed back by
/// [`set`](Dictionary::set) (replaced) or [`delete`](Dictionary::delete) are
/// not finalized.
///
/// ```
/// use bytemuck::{Pod, Zeroable};
/// use memkit_alloc::HeapAllocator;
/// use memkit_collections::{DictRecord, Dictionary};
///
/// #[repr(C)]
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// struct Score {
///     player: u32,
///     points: u32,
/// }
///
/// impl DictRecord for Score {
///     type Key = u32;
/// }
///
/// let heap = HeapAllocator::create()?;
/// let mut scores = Dictionary::<Score>::create(&heap)?;
/// scores.set(Score { player: 7, points: 10 })?;
/// scores.set(Score { player: 7, points: 12 })?;
/// assert_eq!(scores.len(), 1);
/// assert_eq!(scores.get(&7)?.map(|s| s.points), Some(12));
/// scores.destroy()?;
/// # Ok::<(), memkit_common::Error>(())
/// ```
pub struct Dictionary<'a, R: DictRecord> {
    magic: u64,
    table: Table<'a, R>,
    strategy: KeyStrategy,
    grow_at_percent: usize,
    seed: u64,
    len: usize,
    /// Bumped by every `set`, `delete` and `clear`.
    modifications: u64,
    finalizer: Option<Finalizer<'a, R>>,
}

impl<'a, R: DictRecord> Dictionary<'a, R> {
    pub fn builder(alloc: &'a dyn Allocator) -> DictionaryBuilder<'a, R> {
        DictionaryBuilder {
            alloc,
            config: DictionaryConfig::default(),
            strategy: None,
            finalizer: None,
        }
    }

    /// Creates a dictionary with the default configuration and the built-in
    /// strategy for the record's key shape.
    pub fn create(alloc: &'a dyn Allocator) -> Result<Dictionary<'a, R>> {
        Self::builder(alloc).build()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.table.len()
    }

    /// Hash seed in use.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn strategy(&self) -> KeyStrategy {
        self.strategy
    }

    /// Inserts `record`, or replaces the stored record with the same key.
    ///
    /// Returns the replaced record. When the table has to grow and the
    /// allocator fails, the dictionary is unchanged.
    pub fn set(&mut self, record: R) -> Result<Option<R>> {
        self.check()?;
        let hash = self.hash(key_bytes(&record));
        if let Some(index) = self.find(hash, key_bytes(&record)) {
            let slot = &mut self.table.as_mut_slice()[index];
            let replaced = std::mem::replace(&mut slot.record, record);
            self.modifications += 1;
            return Ok(Some(replaced));
        }
        if self.len * 100 >= self.table.len() * self.grow_at_percent {
            self.grow()?;
        }
        self.table.insert_new(hash, record);
        self.len += 1;
        self.modifications += 1;
        Ok(None)
    }

    pub fn get(&self, key: &R::Key) -> Result<Option<&R>> {
        self.check()?;
        Ok(self.lookup(bytes_of(key)))
    }

    /// Mutable access to a stored record. The key field must not be
    /// changed through the returned reference.
    pub fn get_mut(&mut self, key: &R::Key) -> Result<Option<&mut R>> {
        self.check()?;
        let key = bytes_of(key);
        let index = self.find(self.hash(key), key);
        Ok(index.map(|index| &mut self.table.as_mut_slice()[index].record))
    }

    pub fn contains_key(&self, key: &R::Key) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Looks up a record of an integer-keyed dictionary by key value.
    ///
    /// Fails with an argument error when the dictionary's keys are not
    /// integers or `key` is out of the key type's range.
    pub fn get_by_integer_key(&self, key: i64) -> Result<Option<&R>> {
        self.check()?;
        let (bytes, width) = integer_key_bytes(R::Key::SHAPE, key)?;
        Ok(self.lookup(&bytes[..width]))
    }

    /// Removes the record with `key` and returns it.
    pub fn delete(&mut self, key: &R::Key) -> Result<Option<R>> {
        self.check()?;
        Ok(self.remove(bytes_of(key)))
    }

    pub fn delete_by_integer_key(&mut self, key: i64) -> Result<Option<R>> {
        self.check()?;
        let (bytes, width) = integer_key_bytes(R::Key::SHAPE, key)?;
        Ok(self.remove(&bytes[..width]))
    }

    /// Finalizes and removes every record; the bucket count is retained.
    pub fn clear(&mut self) -> Result<()> {
        self.check()?;
        self.finalize_all();
        self.table.clear();
        self.len = 0;
        self.modifications += 1;
        Ok(())
    }

    /// Iterates over the stored records in bucket order.
    pub fn iter(&self) -> Iter<'_, R> {
        Iter {
            buckets: self.table.as_slice().iter(),
            remaining: self.len,
        }
    }

    /// Starts a detached iteration; advance it with
    /// [`next_entry`](Dictionary::next_entry).
    pub fn cursor(&self) -> Result<Cursor> {
        self.check()?;
        Ok(Cursor {
            position: 0,
            len: self.len,
            buckets: self.table.len(),
            modifications: self.modifications,
        })
    }

    /// Returns the next record of a detached iteration.
    ///
    /// Fails with an integrity error if the dictionary was modified after
    /// the cursor was created.
    pub fn next_entry(&self, cursor: &mut Cursor) -> Result<Option<&R>> {
        self.check()?;
        verify_integrity!(
            "dictionary iteration",
            cursor.len == self.len
                && cursor.buckets == self.table.len()
                && cursor.modifications == self.modifications
        );
        let buckets = self.table.as_slice();
        while let Some(bucket) = buckets.get(cursor.position) {
            cursor.position += 1;
            if bucket.is_live() {
                return Ok(Some(&bucket.record));
            }
        }
        Ok(None)
    }

    /// Copies every record into a new array allocated from `alloc`.
    pub fn export_to_array<'b>(&self, alloc: &'b dyn Allocator) -> Result<Array<'b, R>> {
        self.check()?;
        let mut array = Array::create(self.len, alloc)?;
        for record in self.iter() {
            array.append(*record)?;
        }
        Ok(array)
    }

    /// Finalizes the remaining records and releases the bucket table.
    ///
    /// Memory is released even when the handle fails validation; the
    /// integrity error is reported afterwards.
    pub fn destroy(self) -> Result<()> {
        let checked = self.check();
        drop(self);
        checked
    }

    fn check(&self) -> Result<()> {
        verify_integrity!("dictionary", self.magic == DICTIONARY_MAGIC);
        Ok(())
    }

    #[inline]
    fn hash(&self, key: &[u8]) -> u64 {
        (self.strategy.hash)(key, self.seed)
    }

    fn find(&self, hash: u64, key: &[u8]) -> Option<usize> {
        self.table.find(hash, key, self.strategy.compare)
    }

    fn lookup(&self, key: &[u8]) -> Option<&R> {
        let index = self.find(self.hash(key), key)?;
        Some(&self.table.as_slice()[index].record)
    }

    fn remove(&mut self, key: &[u8]) -> Option<R> {
        self.modifications += 1;
        let index = self.find(self.hash(key), key)?;
        self.len -= 1;
        Some(self.table.remove(index))
    }

    fn grow(&mut self) -> Result<()> {
        let old_buckets = self.table.len();
        let buckets = old_buckets
            .checked_mul(2)
            .ok_or_else(|| Error::out_of_memory(usize::MAX, align_of::<Bucket<R>>()))?;
        let mut table = Table::allocate(buckets, self.table.allocator())?;
        for bucket in self.table.live() {
            table.insert_new(bucket.hash, bucket.record);
        }
        self.table = table;
        log::debug!(
            "dictionary grew from {old_buckets} to {buckets} buckets ({} entries)",
            self.len
        );
        Ok(())
    }

    fn finalize_all(&mut self) {
        if let Some(finalizer) = self.finalizer.as_mut() {
            for bucket in self.table.as_mut_slice() {
                if bucket.is_live() {
                    finalizer(&mut bucket.record);
                }
            }
        }
    }
}

impl<R: DictRecord> Drop for Dictionary<'_, R> {
    fn drop(&mut self) {
        self.finalize_all();
    }
}

impl<R: DictRecord> fmt::Debug for Dictionary<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dictionary")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("seed", &self.seed)
            .finish()
    }
}

impl<'d, R: DictRecord> IntoIterator for &'d Dictionary<'_, R> {
    type Item = &'d R;
    type IntoIter = Iter<'d, R>;

    fn into_iter(self) -> Iter<'d, R> {
        self.iter()
    }
}

/// Builder for [`Dictionary`].
pub struct DictionaryBuilder<'a, R: DictRecord> {
    alloc: &'a dyn Allocator,
    config: DictionaryConfig,
    strategy: Option<KeyStrategy>,
    finalizer: Option<Finalizer<'a, R>>,
}

impl<'a, R: DictRecord> DictionaryBuilder<'a, R> {
    pub fn config(mut self, config: DictionaryConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the built-in strategy for the key shape.
    ///
    /// The functions receive `size_of::<R::Key>()` bytes per key. The
    /// built-in integer strategies accept keys of any width, ordering
    /// mismatched widths by bytes.
    pub fn strategy(mut self, strategy: KeyStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Sets a function run on each record still stored at `clear`,
    /// `destroy` or drop.
    pub fn finalizer(mut self, finalizer: impl FnMut(&mut R) + 'a) -> Self {
        self.finalizer = Some(Box::new(finalizer));
        self
    }

    /// Validates the record layout and configuration and allocates the
    /// bucket table.
    ///
    /// The record's key must sit at offset 0 (integrity error otherwise)
    /// and the record may not require more than pointer alignment.
    pub fn build(self) -> Result<Dictionary<'a, R>> {
        verify_integrity!("record layout", R::KEY_OFFSET == 0);
        verify_integrity!(
            "record layout",
            size_of::<R::Key>() <= size_of::<R>()
        );
        verify_arg!(record, size_of::<R>() > 0);
        verify_arg!(record, align_of::<R>() <= align_of::<usize>());
        self.config.validate()?;

        let strategy = match self.strategy {
            Some(strategy) => strategy,
            None => KeyStrategy::for_shape(R::Key::SHAPE)?,
        };
        let seed = self.config.seed.unwrap_or_else(clock_seed);
        let buckets = self.config.initial_buckets();
        let table = Table::allocate(buckets, self.alloc)?;
        log::debug!("dictionary created with {buckets} buckets");
        Ok(Dictionary {
            magic: DICTIONARY_MAGIC,
            table,
            strategy,
            grow_at_percent: self.config.grow_at_percent as usize,
            seed,
            len: 0,
            modifications: 0,
            finalizer: self.finalizer,
        })
    }
}

/// Position of a detached iteration plus the dictionary state it started
/// from.
#[derive(Debug, Clone)]
pub struct Cursor {
    position: usize,
    len: usize,
    buckets: usize,
    modifications: u64,
}

impl Cursor {
    /// Rewinds to the first record. The snapshot is kept, so a dictionary
    /// modified since the cursor was created still fails the next call.
    pub fn restart(&mut self) {
        self.position = 0;
    }
}

/// Borrowing iterator over a dictionary's records.
pub struct Iter<'d, R> {
    buckets: std::slice::Iter<'d, Bucket<R>>,
    remaining: usize,
}

impl<'d, R: DictRecord> Iterator for Iter<'d, R> {
    type Item = &'d R;

    fn next(&mut self) -> Option<&'d R> {
        let bucket = self.buckets.by_ref().find(|bucket| bucket.is_live())?;
        self.remaining -= 1;
        Some(&bucket.record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<R: DictRecord> ExactSizeIterator for Iter<'_, R> {}

fn key_bytes<R: DictRecord>(record: &R) -> &[u8] {
    &bytes_of(record)[..size_of::<R::Key>()]
}

fn clock_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default();
    hash_integer(&nanos.to_ne_bytes(), u64::from(std::process::id()))
}
