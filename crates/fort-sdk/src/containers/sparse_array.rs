//! Mirrored `TSparseArray<T>`: indexed slots recycled through an embedded
//! free list.
//!
//! A slot's storage is shared between a live element and a pair of free
//! list links. The occupancy bit decides which one it holds, and nothing
//! here reads a slot without consulting it first; [`Slot`] is the checked
//! view of that choice.

use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Index, IndexMut};

use super::array::TArray;
use super::bit_array::TBitArray;
use super::{INDEX_NONE, SizeType};
use crate::memory::{self, Address};
use crate::{check, checkf};

/// Links stored in a free slot
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeListLink {
    pub prev_free_index: SizeType,
    pub next_free_index: SizeType,
}

#[repr(C)]
pub union ElementOrFreeListLink<T> {
    element: ManuallyDrop<T>,
    link: FreeListLink,
}

/// Checked view of one slot
#[derive(Debug, PartialEq, Eq)]
pub enum Slot<'a, T> {
    Occupied(&'a T),
    Free { prev: SizeType, next: SizeType },
}

#[repr(C)]
pub struct TSparseArray<T> {
    data: TArray<ElementOrFreeListLink<T>>,
    allocation_flags: TBitArray,
    first_free_index: SizeType,
    num_free_indices: SizeType,
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    use crate::memory::layout::sparse_array;
    use std::mem::{offset_of, size_of};

    assert!(size_of::<TSparseArray<i32>>() == sparse_array::SIZE);
    assert!(size_of::<TSparseArray<u64>>() == sparse_array::SIZE);
    assert!(offset_of!(TSparseArray<i32>, data) == sparse_array::DATA);
    assert!(offset_of!(TSparseArray<i32>, allocation_flags) == sparse_array::ALLOCATION_FLAGS);
    assert!(offset_of!(TSparseArray<i32>, first_free_index) == sparse_array::FIRST_FREE_INDEX);
    assert!(offset_of!(TSparseArray<i32>, num_free_indices) == sparse_array::NUM_FREE_INDICES);
    assert!(offset_of!(FreeListLink, prev_free_index) == sparse_array::PREV_FREE_INDEX);
    assert!(offset_of!(FreeListLink, next_free_index) == sparse_array::NEXT_FREE_INDEX);
};

impl<T> TSparseArray<T> {
    pub fn new() -> Self {
        Self {
            data: TArray::new(),
            allocation_flags: TBitArray::new(),
            first_free_index: INDEX_NONE,
            num_free_indices: 0,
        }
    }

    /// Views a foreign `TSparseArray` in place.
    ///
    /// # Safety
    ///
    /// `address` must point at a live `TSparseArray<T>` for `'a`, and every
    /// slot flagged as allocated must hold an initialized `T`.
    pub unsafe fn from_address<'a>(address: Address) -> &'a Self {
        let sparse: &Self = unsafe { memory::view(address) };
        sparse.data.check_invariants();
        sparse.allocation_flags.check_invariants();
        sparse
    }

    /// Number of live elements.
    pub fn num(&self) -> SizeType {
        self.data.num() - self.num_free_indices
    }

    /// One past the highest slot index, occupied or not.
    pub fn get_max_index(&self) -> SizeType {
        self.data.num()
    }

    pub fn is_empty(&self) -> bool {
        self.num() == 0
    }

    pub fn num_free_indices(&self) -> SizeType {
        self.num_free_indices
    }

    pub fn first_free_index(&self) -> SizeType {
        self.first_free_index
    }

    pub fn is_allocated(&self, index: SizeType) -> bool {
        self.allocation_flags.get(index)
    }

    /// True when `index` names an occupied slot.
    pub fn is_valid_index(&self, index: SizeType) -> bool {
        self.allocation_flags.is_valid_index(index) && self.allocation_flags.get(index)
    }

    pub fn allocation_flags(&self) -> &TBitArray {
        &self.allocation_flags
    }

    pub fn slot(&self, index: SizeType) -> Slot<'_, T> {
        let slot = &self.data[index];
        if self.allocation_flags.get(index) {
            Slot::Occupied(unsafe { &*slot.element })
        } else {
            let link = unsafe { slot.link };
            Slot::Free {
                prev: link.prev_free_index,
                next: link.next_free_index,
            }
        }
    }

    pub fn get(&self, index: SizeType) -> Option<&T> {
        if !self.is_valid_index(index) {
            return None;
        }
        Some(unsafe { &*self.data[index].element })
    }

    pub fn get_mut(&mut self, index: SizeType) -> Option<&mut T> {
        if !self.is_valid_index(index) {
            return None;
        }
        Some(unsafe { &mut *self.data[index].element })
    }

    fn link_mut(&mut self, index: SizeType) -> &mut FreeListLink {
        unsafe { &mut self.data[index].link }
    }

    /// Claims a slot and returns its index. The slot is flagged as allocated
    /// but its storage still holds free list links; the caller must write an
    /// element into it before anything reads it.
    fn allocate_index(&mut self) -> SizeType {
        if self.num_free_indices > 0 {
            let index = self.first_free_index;
            self.first_free_index = unsafe { self.data[index].link.next_free_index };
            self.num_free_indices -= 1;
            if self.num_free_indices > 0 {
                let head = self.first_free_index;
                self.link_mut(head).prev_free_index = INDEX_NONE;
            }
            self.allocation_flags.set(index, true);
            index
        } else {
            let index = self.data.add(ElementOrFreeListLink {
                link: FreeListLink {
                    prev_free_index: INDEX_NONE,
                    next_free_index: INDEX_NONE,
                },
            });
            self.allocation_flags.add(true);
            index
        }
    }

    /// Stores `element` in a recycled slot if one is free, else in a new
    /// slot at the end. Returns the slot index.
    pub fn add(&mut self, element: T) -> SizeType {
        let index = self.allocate_index();
        self.data[index] = ElementOrFreeListLink {
            element: ManuallyDrop::new(element),
        };
        index
    }

    /// Drops the element at `index` and pushes its slot onto the free list.
    pub fn remove_at(&mut self, index: SizeType, count: SizeType) {
        checkf!(
            index >= 0 && count >= 0 && count <= self.get_max_index() - index,
            "RemoveAt({}, {}) outside a sparse array of max index {}",
            index,
            count,
            self.get_max_index()
        );
        for index in index..index + count {
            checkf!(
                self.is_valid_index(index),
                "RemoveAt({}) on a sparse array slot that is not allocated",
                index
            );
            unsafe { ManuallyDrop::drop(&mut self.data[index].element) };
            self.free_index(index);
        }
    }

    /// Removes and returns the element at `index`.
    pub fn take(&mut self, index: SizeType) -> Option<T> {
        if !self.is_valid_index(index) {
            return None;
        }
        let element = unsafe { ManuallyDrop::take(&mut self.data[index].element) };
        self.free_index(index);
        Some(element)
    }

    fn free_index(&mut self, index: SizeType) {
        if self.num_free_indices > 0 {
            let head = self.first_free_index;
            self.link_mut(head).prev_free_index = index;
        }
        let next_free_index = if self.num_free_indices > 0 {
            self.first_free_index
        } else {
            INDEX_NONE
        };
        self.data[index] = ElementOrFreeListLink {
            link: FreeListLink {
                prev_free_index: INDEX_NONE,
                next_free_index,
            },
        };
        self.first_free_index = index;
        self.num_free_indices += 1;
        self.allocation_flags.set(index, false);
    }

    /// Drops every element and releases the storage.
    pub fn empty(&mut self) {
        self.drop_elements();
        self.data.empty();
        self.allocation_flags.empty(0);
        self.first_free_index = INDEX_NONE;
        self.num_free_indices = 0;
    }

    fn drop_elements(&mut self) {
        let occupied: Vec<SizeType> = self.allocation_flags.iter_set_bits().collect();
        for index in occupied {
            unsafe { ManuallyDrop::drop(&mut self.data[index].element) };
        }
    }

    /// Live elements with their slot indices, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (SizeType, &T)> + '_ {
        self.allocation_flags
            .iter_set_bits()
            .map(move |index| (index, unsafe { &*self.data[index].element }))
    }

    /// Verifies that the free list and occupancy bits agree.
    pub fn check_invariants(&self) {
        self.data.check_invariants();
        self.allocation_flags.check_invariants();
        checkf!(
            self.allocation_flags.num() == self.data.num(),
            "Sparse array has {} slots but {} allocation flags",
            self.data.num(),
            self.allocation_flags.num()
        );
        let num_unallocated = self.data.num() - self.allocation_flags.count_set_bits();
        checkf!(
            num_unallocated == self.num_free_indices,
            "NumFreeIndices ({}) disagrees with {} unallocated slots",
            self.num_free_indices,
            num_unallocated
        );

        let mut walked = 0;
        let mut prev = INDEX_NONE;
        let mut index = if self.num_free_indices > 0 {
            self.first_free_index
        } else {
            INDEX_NONE
        };
        while index != INDEX_NONE && walked < self.num_free_indices {
            match self.slot(index) {
                Slot::Free { prev: back, next } => {
                    checkf!(
                        back == prev,
                        "Free slot {} links back to {} instead of {}",
                        index,
                        back,
                        prev
                    );
                    prev = index;
                    index = next;
                }
                Slot::Occupied(_) => {
                    checkf!(false, "Free list reaches allocated slot {}", index);
                }
            }
            walked += 1;
        }
        checkf!(
            walked == self.num_free_indices && index == INDEX_NONE,
            "Free list walk visited {} slots, NumFreeIndices is {}",
            walked,
            self.num_free_indices
        );
    }
}

impl<T> Drop for TSparseArray<T> {
    fn drop(&mut self) {
        self.drop_elements();
    }
}

impl<T> Default for TSparseArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<SizeType> for TSparseArray<T> {
    type Output = T;

    fn index(&self, index: SizeType) -> &T {
        checkf!(
            self.is_valid_index(index),
            "Sparse array index {} is not allocated (max index {})",
            index,
            self.get_max_index()
        );
        unsafe { &*self.data[index].element }
    }
}

impl<T> IndexMut<SizeType> for TSparseArray<T> {
    fn index_mut(&mut self, index: SizeType) -> &mut T {
        checkf!(
            self.is_valid_index(index),
            "Sparse array index {} is not allocated (max index {})",
            index,
            self.get_max_index()
        );
        unsafe { &mut *self.data[index].element }
    }
}

impl<T: fmt::Debug> fmt::Debug for TSparseArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for TSparseArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut sparse = TSparseArray::new();
        for element in iter {
            sparse.add(element);
        }
        sparse
    }
}
