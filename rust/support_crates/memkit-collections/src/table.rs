//! Robin Hood bucket table backing the dictionary.

use std::{
    cmp::Ordering,
    mem::{align_of, size_of},
    ptr::NonNull,
};

use bytemuck::{Pod, bytes_of};
use memkit_alloc::Allocator;
use memkit_common::{Error, Result};

/// One slot of the table.
///
/// `dib` is the distance from the home bucket plus one; zero marks an
/// empty slot.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct Bucket<R> {
    pub hash: u64,
    pub dib: u32,
    pub record: R,
}

impl<R: Pod> Bucket<R> {
    fn empty() -> Bucket<R> {
        Bucket {
            hash: 0,
            dib: 0,
            record: R::zeroed(),
        }
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.dib != 0
    }
}

/// Power-of-two array of buckets in a single allocation.
pub(crate) struct Table<'a, R> {
    buckets: NonNull<Bucket<R>>,
    count: usize,
    alloc: &'a dyn Allocator,
}

impl<'a, R: Pod> Table<'a, R> {
    /// Allocates `count` empty buckets; `count` must be a power of two.
    pub fn allocate(count: usize, alloc: &'a dyn Allocator) -> Result<Table<'a, R>> {
        debug_assert!(count.is_power_of_two());
        let size = count
            .checked_mul(size_of::<Bucket<R>>())
            .filter(|&size| size <= isize::MAX as usize)
            .ok_or_else(|| Error::out_of_memory(usize::MAX, align_of::<Bucket<R>>()))?;
        let ptr = alloc.allocate_aligned(align_of::<Bucket<R>>(), size)?;
        unsafe { ptr.as_ptr().write_bytes(0, size) };
        Ok(Table {
            buckets: ptr.cast(),
            count,
            alloc,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn allocator(&self) -> &'a dyn Allocator {
        self.alloc
    }

    #[inline]
    pub fn as_slice(&self) -> &[Bucket<R>] {
        unsafe { std::slice::from_raw_parts(self.buckets.as_ptr(), self.count) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Bucket<R>] {
        unsafe { std::slice::from_raw_parts_mut(self.buckets.as_ptr(), self.count) }
    }

    /// Looks up the slot holding a record whose leading `key.len()` bytes
    /// compare equal to `key`.
    pub fn find(
        &self,
        hash: u64,
        key: &[u8],
        compare: fn(&[u8], &[u8]) -> Ordering,
    ) -> Option<usize> {
        let mask = self.count - 1;
        let buckets = self.as_slice();
        let mut index = hash as usize & mask;
        let mut dib = 1;
        loop {
            let bucket = &buckets[index];
            if bucket.dib < dib {
                return None;
            }
            if bucket.hash == hash
                && compare(&bytes_of(&bucket.record)[..key.len()], key) == Ordering::Equal
            {
                return Some(index);
            }
            index = (index + 1) & mask;
            dib += 1;
        }
    }

    /// Inserts a record whose key is not present. The table must have at
    /// least one empty slot.
    pub fn insert_new(&mut self, hash: u64, record: R) {
        let mask = self.count - 1;
        let buckets = self.as_mut_slice();
        let mut entry = Bucket {
            hash,
            dib: 1,
            record,
        };
        let mut index = hash as usize & mask;
        loop {
            let slot = &mut buckets[index];
            if !slot.is_live() {
                *slot = entry;
                return;
            }
            if slot.dib < entry.dib {
                std::mem::swap(slot, &mut entry);
            }
            index = (index + 1) & mask;
            entry.dib += 1;
        }
    }

    /// Removes the record at `index`, shifting the following run back by
    /// one slot.
    pub fn remove(&mut self, index: usize) -> R {
        let mask = self.count - 1;
        let buckets = self.as_mut_slice();
        let removed = buckets[index].record;
        let mut hole = index;
        loop {
            let next = (hole + 1) & mask;
            if buckets[next].dib <= 1 {
                buckets[hole] = Bucket::empty();
                return removed;
            }
            buckets[hole] = buckets[next];
            buckets[hole].dib -= 1;
            hole = next;
        }
    }

    pub fn clear(&mut self) {
        self.as_mut_slice().fill(Bucket::empty());
    }

    pub fn live(&self) -> impl Iterator<Item = &Bucket<R>> {
        self.as_slice().iter().filter(|bucket| bucket.is_live())
    }
}

impl<R> Drop for Table<'_, R> {
    fn drop(&mut self) {
        let size = self.count * size_of::<Bucket<R>>();
        unsafe {
            self.alloc
                .deallocate(self.buckets.cast(), align_of::<Bucket<R>>(), size)
        };
    }
}
