//! Typed growable array stored in a header-prefixed block.

use std::{
    fmt,
    marker::PhantomData,
    mem::{align_of, size_of},
    ops::{Deref, DerefMut},
};

use memkit_alloc::Allocator;
use memkit_common::{Error, Result, verify_arg};

use crate::{
    growth::array_capacity,
    layout::{BlockHeader, BlockLayout, RawBlock},
};

/// A contiguous, reallocating sequence of `T` owned by a single block.
///
/// The array borrows its allocator for `'a` and returns the block to it on
/// [`destroy`](Array::destroy) or drop. [`as_ptr`](Array::as_ptr) is the
/// first element of the block; the [`BlockHeader`] lies immediately before
/// it, so external code can recover length and capacity from the pointer
/// alone (see [`header_from_data`](crate::layout::header_from_data)).
///
/// Operations that touch the header validate it first and return an
/// integrity error when its magic tag or geometry no longer matches.
pub struct Array<'a, T: Copy> {
    raw: RawBlock<'a>,
    /// Length as of the last successful operation; slice views use only
    /// this and the cached capacity.
    len: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: Copy> Array<'a, T> {
    /// Creates an empty array with room for at least `capacity` elements.
    ///
    /// The capacity is rounded up by the growth policy, so any seed up to 4
    /// yields 4.
    pub fn create(capacity: usize, alloc: &'a dyn Allocator) -> Result<Array<'a, T>> {
        Self::with_alignment(capacity, align_of::<T>(), alloc)
    }

    /// Creates an empty array whose elements are placed on `alignment`
    /// boundaries.
    ///
    /// `alignment` must be at least `align_of::<T>()`, at most 64, and must
    /// divide `size_of::<T>()`.
    pub fn with_alignment(
        capacity: usize,
        alignment: usize,
        alloc: &'a dyn Allocator,
    ) -> Result<Array<'a, T>> {
        verify_arg!(alignment, alignment >= align_of::<T>());
        let layout = BlockLayout::new(size_of::<T>(), alignment)?;
        let capacity = array_capacity(0, capacity)
            .ok_or_else(|| Error::invalid_arg("capacity", "capacity fits in usize"))?;
        let raw = RawBlock::allocate(layout, capacity, 0, alloc)?;
        Ok(Array {
            raw,
            len: 0,
            _marker: PhantomData,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.raw.cached_capacity()
    }

    /// Alignment of the first element.
    #[inline]
    pub fn alignment(&self) -> usize {
        self.raw.layout().element_alignment()
    }

    /// Re-reads the length from the header and resynchronizes the cached
    /// value.
    pub fn count(&mut self) -> Result<usize> {
        let len = self.raw.len()?;
        self.len = len;
        Ok(len)
    }

    /// Copy of the block header.
    pub fn header(&self) -> Result<BlockHeader> {
        self.raw.header()
    }

    /// Appends one element, growing the block when it is full.
    ///
    /// If growth fails the array is left empty (length 0) and the
    /// allocator's error is returned; the block itself stays valid.
    pub fn append(&mut self, item: T) -> Result<()> {
        let len = self.raw.len()?;
        let required = len
            .checked_add(1)
            .ok_or_else(|| Error::overflow(usize::MAX, self.capacity()))?;
        self.grow_or_reset(required)?;
        unsafe { self.data_mut().add(len).write(item) };
        self.set_len(required)
    }

    /// Appends every element of `items`, growing at most once.
    ///
    /// An empty `items` is an argument error. Growth failure behaves as in
    /// [`append`](Array::append).
    pub fn extend(&mut self, items: &[T]) -> Result<()> {
        verify_arg!(items, !items.is_empty());
        let len = self.raw.len()?;
        let required = len
            .checked_add(items.len())
            .ok_or_else(|| Error::overflow(usize::MAX, self.capacity()))?;
        self.grow_or_reset(required)?;
        unsafe {
            std::ptr::copy_nonoverlapping(items.as_ptr(), self.data_mut().add(len), items.len())
        };
        self.set_len(required)
    }

    /// Ensures room for `additional` more elements without changing the
    /// length. Unlike [`append`](Array::append), a failure leaves the
    /// contents untouched.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let len = self.raw.len()?;
        let required = len
            .checked_add(additional)
            .ok_or_else(|| Error::overflow(usize::MAX, self.capacity()))?;
        self.grow_for(required)
    }

    /// Removes and returns the last element.
    pub fn pop(&mut self) -> Result<Option<T>> {
        let len = self.raw.len()?;
        if len == 0 {
            return Ok(None);
        }
        let item = unsafe { self.data().add(len - 1).read() };
        self.set_len(len - 1)?;
        Ok(Some(item))
    }

    /// Resets the length to zero; the capacity is retained.
    pub fn clear(&mut self) -> Result<()> {
        self.set_len(0)
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.data(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.data_mut(), self.len) }
    }

    /// Pointer to the first element slot.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.data()
    }

    /// Forward iterator over the elements; see [`Iter::restart`].
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            items: self.as_slice(),
            index: 0,
        }
    }

    /// Releases the block through the owning allocator.
    ///
    /// The memory is returned even when the header is found corrupted; the
    /// integrity error is reported afterwards.
    pub fn destroy(self) -> Result<()> {
        self.raw.release()
    }

    #[inline]
    fn data(&self) -> *const T {
        self.raw.data_ptr().as_ptr().cast::<T>()
    }

    #[inline]
    fn data_mut(&mut self) -> *mut T {
        self.raw.data_ptr().as_ptr().cast::<T>()
    }

    fn set_len(&mut self, len: usize) -> Result<()> {
        self.raw.set_len(len)?;
        self.len = len;
        Ok(())
    }

    fn grow_for(&mut self, required: usize) -> Result<()> {
        let capacity = self.capacity();
        if required <= capacity {
            return Ok(());
        }
        let new_capacity = array_capacity(capacity, required).ok_or_else(|| {
            Error::out_of_memory(usize::MAX, self.raw.layout().block_alignment())
        })?;
        self.raw.grow(new_capacity)
    }

    fn grow_or_reset(&mut self, required: usize) -> Result<()> {
        match self.grow_for(required) {
            Err(e) if !e.is_integrity() => {
                self.set_len(0)?;
                Err(e)
            }
            other => other,
        }
    }
}

impl<T: Copy> Deref for Array<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Copy> DerefMut for Array<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<'r, T: Copy> IntoIterator for &'r Array<'_, T> {
    type Item = &'r T;
    type IntoIter = Iter<'r, T>;

    fn into_iter(self) -> Iter<'r, T> {
        self.iter()
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for Array<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("items", &self.as_slice())
            .finish()
    }
}

/// Index-based forward iterator over an [`Array`].
#[derive(Clone)]
pub struct Iter<'r, T> {
    items: &'r [T],
    index: usize,
}

impl<T> Iter<'_, T> {
    /// Rewinds to the first element.
    pub fn restart(&mut self) {
        self.index = 0;
    }
}

impl<'r, T> Iterator for Iter<'r, T> {
    type Item = &'r T;

    fn next(&mut self) -> Option<&'r T> {
        let item = self.items.get(self.index)?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.items.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

#[cfg(test)]
mod tests {
    use memkit_alloc::{HeapAllocator, StaticArena};

    use super::*;
    use crate::{align::is_aligned_ptr, layout::header_from_data};

    #[repr(C, align(64))]
    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Line([u8; 64]);

    #[repr(C, align(16))]
    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Pair {
        a: u64,
        b: u32,
    }

    #[test]
    fn test_append_grows_past_minimum() {
        let heap = HeapAllocator::create().unwrap();
        let mut array = Array::<i32>::create(1, &heap).unwrap();
        assert_eq!(array.capacity(), 4);
        for i in 0..=4 {
            array.append(i).unwrap();
        }
        assert_eq!(array.count().unwrap(), 5);
        assert_eq!(array.capacity(), 8);
        assert_eq!(array.as_slice(), &[0, 1, 2, 3, 4]);
        array.destroy().unwrap();
        assert!(heap.destroy().is_balanced());
    }

    #[test]
    fn test_capacity_sequence_on_append() {
        let heap = HeapAllocator::create().unwrap();
        let mut array = Array::<u16>::create(0, &heap).unwrap();
        let mut capacities = vec![array.capacity()];
        for i in 0..1300u16 {
            array.append(i).unwrap();
            if *capacities.last().unwrap() != array.capacity() {
                capacities.push(array.capacity());
            }
        }
        assert_eq!(
            capacities,
            vec![4, 8, 16, 32, 64, 128, 256, 512, 1024, 1228, 1473]
        );
        assert!(array.iter().copied().eq(0..1300u16));
    }

    #[test]
    fn test_header_is_readable_from_data_pointer() {
        let heap = HeapAllocator::create().unwrap();
        let mut array = Array::<u64>::create(10, &heap).unwrap();
        array.extend(&[7, 8, 9]).unwrap();
        let header = unsafe { header_from_data(array.as_ptr().cast()) }.unwrap();
        assert_eq!(header.len, 3);
        assert_eq!(header.capacity, 16);
        assert_eq!(header.element_size, 8);
        assert_eq!(header.element_alignment, 8);
        assert_eq!(array.header().unwrap(), header);
    }

    #[test]
    fn test_alignment_is_preserved_across_growth() {
        let heap = HeapAllocator::create().unwrap();
        let mut lines = Array::<Line>::create(1, &heap).unwrap();
        let mut pairs = Array::<Pair>::create(1, &heap).unwrap();
        for i in 0..100u8 {
            lines.append(Line([i; 64])).unwrap();
            pairs
                .append(Pair {
                    a: i as u64,
                    b: i as u32,
                })
                .unwrap();
            assert!(is_aligned_ptr(lines.as_ptr(), 64));
            assert!(is_aligned_ptr(pairs.as_ptr(), 16));
        }
        assert_eq!(lines[99], Line([99; 64]));
        assert_eq!(pairs[42].b, 42);
    }

    #[test]
    fn test_over_alignment() {
        let heap = HeapAllocator::create().unwrap();
        let mut array = Array::<[u64; 4]>::with_alignment(2, 32, &heap).unwrap();
        assert_eq!(array.alignment(), 32);
        for i in 0..20 {
            array.append([i; 4]).unwrap();
            assert!(is_aligned_ptr(array.as_ptr(), 32));
        }
        assert!(
            Array::<u64>::with_alignment(4, 4, &heap)
                .unwrap_err()
                .is_invalid_arg()
        );
        assert!(
            Array::<u64>::with_alignment(4, 16, &heap)
                .unwrap_err()
                .is_invalid_arg()
        );
        assert!(
            Array::<[u8; 128]>::with_alignment(4, 128, &heap)
                .unwrap_err()
                .is_invalid_arg()
        );
    }

    #[test]
    fn test_zero_sized_elements_are_rejected() {
        let heap = HeapAllocator::create().unwrap();
        assert!(Array::<()>::create(4, &heap).unwrap_err().is_invalid_arg());
        assert!(
            Array::<[u8; 40000]>::create(4, &heap)
                .unwrap_err()
                .is_invalid_arg()
        );
    }

    #[test]
    fn test_extend_grows_once() {
        let heap = HeapAllocator::create().unwrap();
        let mut array = Array::<u32>::create(4, &heap).unwrap();
        let items: Vec<u32> = (0..1000).collect();
        array.extend(&items).unwrap();
        assert_eq!(array.len(), 1000);
        assert_eq!(array.capacity(), 1024);
        assert_eq!(heap.stats().reallocations, 1);
        assert!(array.extend(&[]).unwrap_err().is_invalid_arg());
        assert_eq!(array.as_slice(), items.as_slice());
    }

    #[test]
    fn test_failed_growth_leaves_array_empty() {
        let mut buf = [0u8; 256];
        let arena = StaticArena::create(&mut buf).unwrap();
        let mut array = Array::<u64>::create(4, &arena).unwrap();
        for i in 0..4 {
            array.append(i).unwrap();
        }
        let err = array.append(4).unwrap_err();
        assert!(err.is_out_of_memory());
        assert_eq!(array.len(), 0);
        assert_eq!(array.count().unwrap(), 0);
        assert_eq!(array.capacity(), 4);
        array.append(10).unwrap();
        assert_eq!(array.as_slice(), &[10]);
    }

    #[test]
    fn test_reserve_failure_keeps_contents() {
        let mut buf = [0u8; 256];
        let arena = StaticArena::create(&mut buf).unwrap();
        let mut array = Array::<u64>::create(4, &arena).unwrap();
        array.extend(&[1, 2, 3]).unwrap();
        assert!(array.reserve(1).is_ok());
        assert!(array.reserve(10).unwrap_err().is_out_of_memory());
        assert_eq!(array.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn test_corrupted_header_is_detected() {
        let heap = HeapAllocator::create().unwrap();
        let mut array = Array::<u32>::create(4, &heap).unwrap();
        array.extend(&[1, 2]).unwrap();
        array.raw.corrupt_magic();
        assert!(array.append(3).unwrap_err().is_integrity());
        assert!(array.count().unwrap_err().is_integrity());
        assert!(array.pop().unwrap_err().is_integrity());
        assert_eq!(array.len(), 2);
        assert_eq!(array.as_slice(), &[1, 2]);
        assert!(array.destroy().unwrap_err().is_integrity());
        assert!(heap.destroy().is_balanced());
    }

    #[test]
    fn test_pop_get_clear() {
        let heap = HeapAllocator::create().unwrap();
        let mut array = Array::<i64>::create(4, &heap).unwrap();
        assert_eq!(array.pop().unwrap(), None);
        array.extend(&[1, 2, 3]).unwrap();
        *array.get_mut(1).unwrap() = 20;
        assert_eq!(array.get(1), Some(&20));
        assert_eq!(array.get(3), None);
        assert_eq!(array.pop().unwrap(), Some(3));
        assert_eq!(array.len(), 2);
        array.clear().unwrap();
        assert!(array.is_empty());
        assert_eq!(array.capacity(), 4);
    }

    #[test]
    fn test_iteration_restarts() {
        let heap = HeapAllocator::create().unwrap();
        let mut array = Array::<u8>::create(4, &heap).unwrap();
        array.extend(b"abc").unwrap();
        let mut iter = array.iter();
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.next(), Some(&b'a'));
        assert_eq!(iter.next(), Some(&b'b'));
        iter.restart();
        assert_eq!(iter.copied().collect::<Vec<_>>(), b"abc");
        let mut total = 0u32;
        for byte in &array {
            total += *byte as u32;
        }
        assert_eq!(total, 97 + 98 + 99);
    }

    #[test]
    fn test_random_appends_match_vec() {
        let heap = HeapAllocator::create().unwrap();
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        let mut array = Array::<u32>::create(1, &heap).unwrap();
        let mut expected = Vec::new();
        for _ in 0..200 {
            if rng.u8(..) < 200 {
                let batch: Vec<u32> = (0..rng.usize(1..20)).map(|_| rng.u32(..)).collect();
                array.extend(&batch).unwrap();
                expected.extend_from_slice(&batch);
            } else {
                assert_eq!(array.pop().unwrap(), expected.pop());
            }
            assert!(array.capacity() >= array.len());
        }
        assert_eq!(array.as_slice(), expected.as_slice());
        drop(array);
        let stats = heap.destroy();
        assert!(stats.is_balanced());
        assert_eq!(stats.live_bytes, 0);
    }

    #[test]
    fn test_debug_output() {
        let heap = HeapAllocator::create().unwrap();
        let mut array = Array::<u8>::create(4, &heap).unwrap();
        array.append(1).unwrap();
        assert_eq!(
            format!("{array:?}"),
            "Array { len: 1, capacity: 4, items: [1] }"
        );
    }
}
