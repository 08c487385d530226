//! Mirrored `TArray<T>`: a contiguous buffer with a length and a capacity.
//!
//! The struct is the foreign runtime's exact layout (`Data`, `ArrayNum`,
//! `ArrayMax`), so a foreign address can be viewed through
//! [`TArray::from_address`] and read in place. Locally created arrays own
//! their buffer and grow it with [`default_calculate_slack_grow`].

use std::fmt;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ops::{Index, IndexMut};
use std::ptr::{self, NonNull};
use std::slice;

use tracing::debug;

use super::SizeType;
use super::growth::default_calculate_slack_grow;
use crate::memory::{self, Address, alloc};
use crate::{check, check_slow, checkf};

#[repr(C)]
pub struct TArray<T> {
    data: *mut T,
    array_num: SizeType,
    array_max: SizeType,
    _owns: PhantomData<T>,
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    use crate::memory::layout::array;
    use std::mem::offset_of;

    assert!(size_of::<TArray<u8>>() == array::SIZE);
    assert!(size_of::<TArray<u64>>() == array::SIZE);
    assert!(offset_of!(TArray<u8>, data) == array::DATA);
    assert!(offset_of!(TArray<u8>, array_num) == array::NUM);
    assert!(offset_of!(TArray<u8>, array_max) == array::MAX);
};

unsafe impl<T: Send> Send for TArray<T> {}
unsafe impl<T: Sync> Sync for TArray<T> {}

impl<T> TArray<T> {
    /// Empty array; nothing is allocated until the first element arrives.
    pub const fn new() -> Self {
        Self {
            data: ptr::null_mut(),
            array_num: 0,
            array_max: 0,
            _owns: PhantomData,
        }
    }

    /// Empty array with room for exactly `capacity` elements.
    pub fn with_capacity(capacity: SizeType) -> Self {
        let mut array = Self::new();
        array.reserve(capacity);
        array
    }

    /// Views a foreign `TArray` in place.
    ///
    /// # Safety
    ///
    /// `address` must point at a live `TArray<T>` whose `Data` holds at least
    /// `ArrayNum` initialized elements for the duration of `'a`.
    pub unsafe fn from_address<'a>(address: Address) -> &'a Self {
        let array: &Self = unsafe { memory::view(address) };
        array.check_invariants();
        array
    }

    /// Raw pointer to the first element (null when nothing was allocated).
    pub fn get_data(&self) -> *const T {
        self.data
    }

    pub fn get_data_mut(&mut self) -> *mut T {
        self.data
    }

    /// Size in bytes of one element.
    pub fn get_type_size(&self) -> u32 {
        size_of::<T>() as u32
    }

    /// Unused capacity in elements.
    pub fn get_slack(&self) -> SizeType {
        self.array_max - self.array_num
    }

    /// Checks `0 <= Num <= Max`.
    pub fn check_invariants(&self) {
        checkf!(
            self.array_num >= 0 && self.array_max >= self.array_num,
            "ArrayNum ({}) must be within 0..=ArrayMax ({})",
            self.array_num,
            self.array_max
        );
    }

    /// Element pointer usable for writes; zero-sized elements never allocate.
    fn data_ptr(&self) -> *mut T {
        if self.data.is_null() {
            NonNull::dangling().as_ptr()
        } else {
            self.data
        }
    }

    fn range_check(&self, index: SizeType) {
        check_slow!(self.array_num >= 0 && self.array_max >= self.array_num);
        checkf!(
            index >= 0 && index < self.array_num,
            "Array index out of bounds: {} from an array of size {}",
            index,
            self.array_num
        );
    }

    pub fn is_valid_index(&self, index: SizeType) -> bool {
        index >= 0 && index < self.array_num
    }

    pub fn is_empty(&self) -> bool {
        self.array_num == 0
    }

    pub fn num(&self) -> SizeType {
        self.array_num
    }

    pub fn max(&self) -> SizeType {
        self.array_max
    }

    pub fn as_slice(&self) -> &[T] {
        if self.array_num <= 0 {
            return &[];
        }
        unsafe { slice::from_raw_parts(self.data_ptr(), self.array_num as usize) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if self.array_num <= 0 {
            return &mut [];
        }
        unsafe { slice::from_raw_parts_mut(self.data_ptr(), self.array_num as usize) }
    }

    pub fn get(&self, index: SizeType) -> Option<&T> {
        if self.is_valid_index(index) {
            Some(&self.as_slice()[index as usize])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, index: SizeType) -> Option<&mut T> {
        if self.is_valid_index(index) {
            Some(&mut self.as_mut_slice()[index as usize])
        } else {
            None
        }
    }

    pub fn last(&self) -> Option<&T> {
        self.as_slice().last()
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// Index of the first element equal to `item`.
    pub fn find(&self, item: &T) -> Option<SizeType>
    where
        T: PartialEq,
    {
        self.index_of_by_key(item)
    }

    /// Index of the last element equal to `item`.
    pub fn find_last(&self, item: &T) -> Option<SizeType>
    where
        T: PartialEq,
    {
        self.find_last_by_predicate(|element| element == item)
    }

    /// Searches the first `count` elements backwards for a predicate match.
    pub fn find_last_by_predicate_in<P>(&self, mut pred: P, count: SizeType) -> Option<SizeType>
    where
        P: FnMut(&T) -> bool,
    {
        check!(count >= 0 && count <= self.num());
        self.as_slice()[..count as usize]
            .iter()
            .rposition(|element| pred(element))
            .map(|index| index as SizeType)
    }

    pub fn find_last_by_predicate<P>(&self, pred: P) -> Option<SizeType>
    where
        P: FnMut(&T) -> bool,
    {
        self.find_last_by_predicate_in(pred, self.array_num)
    }

    pub fn index_of_by_key<K: ?Sized>(&self, key: &K) -> Option<SizeType>
    where
        T: PartialEq<K>,
    {
        self.index_of_by_predicate(|element| element == key)
    }

    pub fn index_of_by_predicate<P>(&self, mut pred: P) -> Option<SizeType>
    where
        P: FnMut(&T) -> bool,
    {
        self.as_slice()
            .iter()
            .position(|element| pred(element))
            .map(|index| index as SizeType)
    }

    pub fn find_by_key<K: ?Sized>(&self, key: &K) -> Option<&T>
    where
        T: PartialEq<K>,
    {
        self.as_slice().iter().find(|element| *element == key)
    }

    pub fn find_by_predicate<P>(&self, mut pred: P) -> Option<&T>
    where
        P: FnMut(&T) -> bool,
    {
        self.as_slice().iter().find(|element| pred(element))
    }

    pub fn find_by_predicate_mut<P>(&mut self, mut pred: P) -> Option<&mut T>
    where
        P: FnMut(&T) -> bool,
    {
        self.as_mut_slice().iter_mut().find(|element| pred(element))
    }

    /// Copies of every element matching `pred`, in order.
    pub fn filter_by_predicate<P>(&self, mut pred: P) -> TArray<T>
    where
        T: Clone,
        P: FnMut(&T) -> bool,
    {
        let mut results = TArray::new();
        for element in self.iter().filter(|element| pred(element)) {
            results.add(element.clone());
        }
        results
    }

    pub fn contains<K: ?Sized>(&self, item: &K) -> bool
    where
        T: PartialEq<K>,
    {
        self.find_by_key(item).is_some()
    }

    pub fn contains_by_predicate<P>(&self, pred: P) -> bool
    where
        P: FnMut(&T) -> bool,
    {
        self.find_by_predicate(pred).is_some()
    }

    /// Makes room for `count` more elements without changing `Num`.
    /// Returns the index the first of them will occupy.
    fn add_uninitialized(&mut self, count: SizeType) -> SizeType {
        check_slow!(self.array_num >= 0 && self.array_max >= self.array_num);
        check!(count >= 0);

        let old_num = self.array_num;
        let new_num = old_num.checked_add(count);
        checkf!(new_num.is_some(), "TArray length overflow adding {} to {}", count, old_num);
        let new_num = new_num.unwrap_or(SizeType::MAX);
        if new_num > self.array_max {
            self.resize_grow(new_num);
        }
        old_num
    }

    fn resize_grow(&mut self, new_num: SizeType) {
        let new_max = default_calculate_slack_grow(
            new_num,
            self.array_max,
            size_of::<T>(),
            true,
            align_of::<T>() as u32,
        );
        debug!(
            "Growing TArray of {}-byte elements: {} -> {} for {} elements",
            size_of::<T>(),
            self.array_max,
            new_max,
            new_num
        );
        self.resize_to(new_max);
    }

    fn resize_to(&mut self, new_max: SizeType) {
        check!(new_max >= self.array_num);
        if new_max == self.array_max {
            return;
        }
        let old_bytes = self.array_max as usize * size_of::<T>();
        let new_bytes = new_max as usize * size_of::<T>();
        self.data = unsafe {
            alloc::realloc(self.data.cast(), old_bytes, new_bytes, align_of::<T>()).cast()
        };
        self.array_max = new_max;
    }

    /// Appends `item`, growing if needed. Returns its index, which is the
    /// length before the call.
    pub fn emplace(&mut self, item: T) -> SizeType {
        let index = self.add_uninitialized(1);
        unsafe { ptr::write(self.data_ptr().add(index as usize), item) };
        self.array_num += 1;
        index
    }

    pub fn add(&mut self, item: T) -> SizeType {
        self.emplace(item)
    }

    /// Appends `item` and returns a reference to it in place.
    pub fn add_get_ref(&mut self, item: T) -> &mut T {
        let index = self.emplace(item);
        &mut self.as_mut_slice()[index as usize]
    }

    /// Appends `count` default values. Returns the index of the first.
    pub fn add_defaulted(&mut self, count: SizeType) -> SizeType
    where
        T: Default,
    {
        let index = self.add_uninitialized(count);
        for offset in 0..count {
            unsafe { ptr::write(self.data_ptr().add((index + offset) as usize), T::default()) };
            self.array_num += 1;
        }
        index
    }

    /// Appends clones of every element of `items`.
    pub fn append(&mut self, items: &[T])
    where
        T: Clone,
    {
        let count = SizeType::try_from(items.len()).unwrap_or(SizeType::MAX);
        let index = self.add_uninitialized(count);
        for (offset, item) in items.iter().enumerate() {
            unsafe { ptr::write(self.data_ptr().add(index as usize + offset), item.clone()) };
            self.array_num += 1;
        }
    }

    /// Grows capacity to at least `number` elements.
    pub fn reserve(&mut self, number: SizeType) {
        check!(number >= 0);
        if number > self.array_max {
            self.resize_to(number);
        }
    }

    /// Removes and returns the last element.
    pub fn pop(&mut self) -> Option<T> {
        if self.array_num == 0 {
            return None;
        }
        self.array_num -= 1;
        Some(unsafe { ptr::read(self.data_ptr().add(self.array_num as usize)) })
    }

    pub fn remove_at(&mut self, index: SizeType) {
        self.remove_at_count(index, 1);
    }

    /// Removes `count` elements starting at `index` and shifts the tail down.
    /// Capacity is left unchanged.
    pub fn remove_at_count(&mut self, index: SizeType, count: SizeType) {
        if count == 0 {
            return;
        }
        checkf!(
            index >= 0 && count >= 0 && count <= self.array_num - index,
            "RemoveAt({}, {}) outside an array of size {}",
            index,
            count,
            self.array_num
        );

        unsafe {
            let start = self.data_ptr().add(index as usize);
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(start, count as usize));

            let num_to_move = self.array_num - index - count;
            if num_to_move != 0 {
                ptr::copy(start.add(count as usize), start, num_to_move as usize);
            }
        }
        self.array_num -= count;
    }

    /// Removes every element matching `pred`, keeping the order of the rest.
    /// Returns how many were removed.
    pub fn remove_all<P>(&mut self, mut pred: P) -> SizeType
    where
        P: FnMut(&T) -> bool,
    {
        let original = self.array_num;
        let mut index = 0;
        while index < self.array_num {
            if pred(&self.as_slice()[index as usize]) {
                self.remove_at(index);
            } else {
                index += 1;
            }
        }
        original - self.array_num
    }

    /// Keeps only the elements for which `keep` returns true.
    pub fn retain<P>(&mut self, mut keep: P)
    where
        P: FnMut(&T) -> bool,
    {
        self.remove_all(|item| !keep(item));
    }

    /// Drops every element and keeps the buffer.
    pub fn reset(&mut self) {
        unsafe { ptr::drop_in_place(self.as_mut_slice() as *mut [T]) };
        self.array_num = 0;
    }

    /// Drops every element and releases the buffer.
    pub fn empty(&mut self) {
        self.reset();
        self.resize_to(0);
    }
}

impl<T> Drop for TArray<T> {
    fn drop(&mut self) {
        self.empty();
    }
}

impl<T> Default for TArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<SizeType> for TArray<T> {
    type Output = T;

    fn index(&self, index: SizeType) -> &T {
        self.range_check(index);
        &self.as_slice()[index as usize]
    }
}

impl<T> IndexMut<SizeType> for TArray<T> {
    fn index_mut(&mut self, index: SizeType) -> &mut T {
        self.range_check(index);
        &mut self.as_mut_slice()[index as usize]
    }
}

impl<T: Clone> Clone for TArray<T> {
    fn clone(&self) -> Self {
        let mut array = TArray::with_capacity(self.array_num);
        array.append(self.as_slice());
        array
    }
}

/// Element-wise comparison.
impl<T: PartialEq> PartialEq for TArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for TArray<T> {}

impl<T: fmt::Debug> fmt::Debug for TArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for TArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut array = TArray::new();
        array.extend(iter);
        array
    }
}

impl<T> Extend<T> for TArray<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.add(item);
        }
    }
}

impl<'a, T> IntoIterator for &'a TArray<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut TArray<T> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::containers::growth::{capacity_changes, natural_alignment};
    use crate::memory::address_of;

    #[test]
    fn test_add_returns_previous_length() {
        let mut array = TArray::new();
        assert_eq!(array.add(10), 0);
        assert_eq!(array.add(20), 1);
        assert_eq!(array.emplace(30), 2);
        assert_eq!(array.num(), 3);
        assert_eq!(array[1], 20);
    }

    #[test]
    fn test_growth_follows_slack_policy() {
        let mut array: TArray<i32> = TArray::new();
        assert_eq!(array.max(), 0);
        assert!(array.get_data().is_null());

        let mut maxes = Vec::new();
        for value in 0..30 {
            array.add(value);
            if maxes.last() != Some(&array.max()) {
                maxes.push(array.max());
            }
        }
        assert_eq!(maxes, vec![4, 22, 47]);
        assert_eq!(array.get_slack(), 17);
    }

    fn observed_maxes<T: Default>(count: i32) -> Vec<SizeType> {
        let mut array: TArray<T> = TArray::new();
        let mut maxes = Vec::new();
        for _ in 0..count {
            array.add(T::default());
            if maxes.last() != Some(&array.max()) {
                maxes.push(array.max());
            }
        }
        maxes
    }

    fn replayed_maxes<T>(count: i32) -> Vec<SizeType> {
        let size = std::mem::size_of::<T>();
        capacity_changes(count, size, natural_alignment(size))
            .iter()
            .map(|change| change.new_max)
            .collect()
    }

    #[test]
    fn test_growth_replay_matches_array() {
        assert_eq!(replayed_maxes::<i32>(100), observed_maxes::<i32>(100));
        assert_eq!(replayed_maxes::<u8>(100), observed_maxes::<u8>(100));
        assert_eq!(replayed_maxes::<[u32; 3]>(100), observed_maxes::<[u32; 3]>(100));
        assert_eq!(replayed_maxes::<(u64, u16)>(100), observed_maxes::<(u64, u16)>(100));
    }

    #[test]
    fn test_mixed_adds_and_removes() {
        let mut array = TArray::new();
        let mut last_max = 0;
        for value in 0..40 {
            array.add(value);
            if value % 3 == 0 {
                array.remove_at(0);
            }
            assert!(array.max() >= last_max);
            last_max = array.max();
        }
        // 40 inserts, 14 removals (0, 3, ..., 39)
        assert_eq!(array.num(), 26);
        array.check_invariants();
    }

    #[test]
    fn test_remove_at_shifts_and_keeps_capacity() {
        let mut array: TArray<i32> = (0..10).collect();
        let max = array.max();

        array.remove_at_count(2, 3);
        assert_eq!(array.as_slice(), &[0, 1, 5, 6, 7, 8, 9]);
        assert_eq!(array.max(), max);

        array.remove_at(6);
        assert_eq!(array.as_slice(), &[0, 1, 5, 6, 7, 8]);
        array.remove_at_count(0, 0);
        assert_eq!(array.num(), 6);
    }

    #[test]
    fn test_remove_drops_elements() {
        let drops = Rc::new(Cell::new(0));
        struct Tracked(Rc<Cell<i32>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let mut array = TArray::new();
        for _ in 0..5 {
            array.add(Tracked(drops.clone()));
        }
        array.remove_at_count(1, 2);
        assert_eq!(drops.get(), 2);
        drop(array);
        assert_eq!(drops.get(), 5);
    }

    #[test]
    fn test_find_variants() {
        let array: TArray<i32> = [5, 7, 5, 9].into_iter().collect();
        assert_eq!(array.find(&5), Some(0));
        assert_eq!(array.find_last(&5), Some(2));
        assert_eq!(array.find(&42), None);
        assert_eq!(array.find_last_by_predicate(|v| *v > 6), Some(3));
        assert_eq!(array.find_last_by_predicate_in(|v| *v > 6, 3), Some(1));
        assert_eq!(array.index_of_by_predicate(|v| *v == 9), Some(3));
        assert_eq!(array.find_by_predicate(|v| *v > 5), Some(&7));
        assert!(array.find_by_predicate(|v| *v > 100).is_none());
        assert!(array.contains(&9));
        assert!(!array.contains(&1));
        assert!(array.contains_by_predicate(|v| v % 2 == 1));
    }

    #[test]
    fn test_filter_preserves_order() {
        let array: TArray<i32> = (1..=10).collect();
        let even = array.filter_by_predicate(|v| v % 2 == 0);
        assert_eq!(even.as_slice(), &[2, 4, 6, 8, 10]);
        assert_eq!(array.num(), 10);
    }

    #[test]
    fn test_is_valid_index() {
        let array: TArray<u8> = [1, 2, 3].into_iter().collect();
        assert!(array.is_valid_index(0));
        assert!(array.is_valid_index(2));
        assert!(!array.is_valid_index(3));
        assert!(!array.is_valid_index(-1));
        assert_eq!(array.get(3), None);
    }

    #[test]
    #[should_panic(expected = "Array index out of bounds: 3 from an array of size 3")]
    fn test_index_out_of_range_fails() {
        let array: TArray<u8> = [1, 2, 3].into_iter().collect();
        let _ = array[3];
    }

    #[test]
    #[should_panic(expected = "RemoveAt(2, 5)")]
    fn test_remove_out_of_range_fails() {
        let mut array: TArray<u8> = [1, 2, 3].into_iter().collect();
        array.remove_at_count(2, 5);
    }

    #[test]
    #[should_panic(expected = "CHECK FAILED")]
    fn test_remove_count_near_max_fails() {
        let mut array: TArray<u8> = [1, 2, 3].into_iter().collect();
        array.remove_at_count(1, SizeType::MAX);
    }

    #[test]
    fn test_reset_keeps_buffer_and_empty_releases_it() {
        let mut array: TArray<i32> = (0..5).collect();
        array.reset();
        assert_eq!(array.num(), 0);
        assert_eq!(array.max(), 22);

        array.empty();
        assert_eq!(array.max(), 0);
        assert!(array.get_data().is_null());
    }

    #[test]
    fn test_pop_and_remove_all() {
        let mut array: TArray<i32> = (0..6).collect();
        assert_eq!(array.pop(), Some(5));
        assert_eq!(array.remove_all(|v| v % 2 == 0), 3);
        assert_eq!(array.as_slice(), &[1, 3]);

        array.retain(|v| *v > 1);
        assert_eq!(array.as_slice(), &[3]);
    }

    #[test]
    fn test_add_defaulted_and_append() {
        let mut array: TArray<u16> = TArray::new();
        assert_eq!(array.add_defaulted(3), 0);
        array.append(&[7, 8]);
        assert_eq!(array.as_slice(), &[0, 0, 0, 7, 8]);
        *array.add_get_ref(1) += 1;
        assert_eq!(array.last(), Some(&2));
    }

    #[test]
    fn test_content_equality_and_clone() {
        let a: TArray<i32> = [1, 2, 3].into_iter().collect();
        let b = a.clone();
        let c: TArray<i32> = [1, 2, 4].into_iter().collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a.get_data(), b.get_data());
        assert_eq!(b.max(), 3);
    }

    #[test]
    fn test_reserve_is_exact() {
        let mut array: TArray<u64> = TArray::with_capacity(10);
        assert_eq!(array.max(), 10);
        array.reserve(5);
        assert_eq!(array.max(), 10);
    }

    #[test]
    fn test_view_over_local_array() {
        let array: TArray<i32> = [10, 20, 30].into_iter().collect();
        let view: &TArray<i32> = unsafe { TArray::from_address(address_of(&array)) };
        assert_eq!(view.num(), 3);
        assert_eq!(view[2], 30);
    }

    #[test]
    fn test_zero_sized_elements() {
        let mut array: TArray<()> = TArray::new();
        array.add(());
        array.add(());
        assert_eq!(array.num(), 2);
        assert_eq!(array.iter().count(), 2);
        array.remove_at(0);
        assert_eq!(array.num(), 1);
    }
}
