//! Mirrored `TInlineAllocator<N>::ForElementType<T>`.
//!
//! `N` elements live inside the owning struct; larger capacities move to a
//! separately allocated secondary buffer. A null secondary pointer means the
//! inline storage is in use. The allocation does not record its own
//! capacity, so the owner passes it back on every resize and on release.

use std::mem::{MaybeUninit, align_of, size_of};
use std::ptr;

use crate::check;
use crate::memory::alloc;

/// Which storage currently backs an [`InlineAllocation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationKind {
    Inline,
    External,
}

#[repr(C)]
pub struct InlineAllocation<T: Copy, const N: usize> {
    inline_data: [MaybeUninit<T>; N],
    secondary_data: *mut T,
}

impl<T: Copy, const N: usize> InlineAllocation<T, N> {
    pub fn new() -> Self {
        Self {
            inline_data: unsafe { MaybeUninit::zeroed().assume_init() },
            secondary_data: ptr::null_mut(),
        }
    }

    pub fn kind(&self) -> AllocationKind {
        if self.secondary_data.is_null() {
            AllocationKind::Inline
        } else {
            AllocationKind::External
        }
    }

    pub fn get_initial_capacity(&self) -> usize {
        N
    }

    pub fn get_allocation(&self) -> *const T {
        match self.kind() {
            AllocationKind::Inline => self.inline_data.as_ptr().cast(),
            AllocationKind::External => self.secondary_data,
        }
    }

    pub fn get_allocation_mut(&mut self) -> *mut T {
        match self.kind() {
            AllocationKind::Inline => self.inline_data.as_mut_ptr().cast(),
            AllocationKind::External => self.secondary_data,
        }
    }

    /// Moves the first `previous_num` elements into storage for `new_max`
    /// elements. `previous_max` is the capacity the allocation was last
    /// resized to (`N` for a fresh one).
    pub fn resize_allocation(&mut self, previous_num: usize, previous_max: usize, new_max: usize) {
        check!(previous_num <= previous_max && previous_num <= new_max);

        match (self.kind(), new_max <= N) {
            (AllocationKind::Inline, true) => {}
            (AllocationKind::Inline, false) => {
                let secondary: *mut T = unsafe {
                    alloc::realloc(ptr::null_mut(), 0, new_max * size_of::<T>(), align_of::<T>())
                        .cast()
                };
                unsafe {
                    ptr::copy_nonoverlapping(self.inline_data.as_ptr().cast(), secondary, previous_num)
                };
                self.secondary_data = secondary;
            }
            (AllocationKind::External, true) => {
                unsafe {
                    ptr::copy_nonoverlapping(
                        self.secondary_data,
                        self.inline_data.as_mut_ptr().cast(),
                        previous_num,
                    );
                    self.release(previous_max);
                }
            }
            (AllocationKind::External, false) => {
                self.secondary_data = unsafe {
                    alloc::realloc(
                        self.secondary_data.cast(),
                        previous_max * size_of::<T>(),
                        new_max * size_of::<T>(),
                        align_of::<T>(),
                    )
                    .cast()
                };
            }
        }
    }

    /// Frees the secondary buffer, if any, and falls back to inline storage.
    ///
    /// # Safety
    ///
    /// `max` must be the capacity of the last resize.
    pub unsafe fn release(&mut self, max: usize) {
        if !self.secondary_data.is_null() {
            unsafe { alloc::free(self.secondary_data.cast(), max * size_of::<T>(), align_of::<T>()) };
            self.secondary_data = ptr::null_mut();
        }
    }
}

impl<T: Copy, const N: usize> Default for InlineAllocation<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
