//! Raw buffer management for locally owned mirrored containers.
//!
//! Buffers handed out here are only ever released through [`free`] with the
//! same byte count and alignment they were last sized to. Buffers that belong
//! to the foreign process never reach this module.

use std::alloc::{self, Layout};
use std::ptr;

use crate::checkf;

/// Resizes `ptr` from `old_bytes` to `new_bytes`, preserving the common prefix.
///
/// A null `ptr` (or `old_bytes == 0`) allocates fresh storage. Shrinking to
/// zero bytes releases the buffer and returns null.
///
/// # Safety
///
/// `ptr` must be null or a live allocation from this module sized to
/// `old_bytes` with alignment `align`.
pub(crate) unsafe fn realloc(ptr: *mut u8, old_bytes: usize, new_bytes: usize, align: usize) -> *mut u8 {
    if new_bytes == 0 {
        unsafe { free(ptr, old_bytes, align) };
        return ptr::null_mut();
    }

    checkf!(
        Layout::from_size_align(new_bytes, align).is_ok(),
        "cannot describe an allocation of {} bytes aligned to {}",
        new_bytes,
        align
    );
    let new_layout = unsafe { Layout::from_size_align_unchecked(new_bytes, align) };

    let out = if ptr.is_null() || old_bytes == 0 {
        unsafe { alloc::alloc(new_layout) }
    } else {
        let old_layout = unsafe { Layout::from_size_align_unchecked(old_bytes, align) };
        unsafe { alloc::realloc(ptr, old_layout, new_bytes) }
    };

    if out.is_null() {
        alloc::handle_alloc_error(new_layout);
    }
    out
}

/// Releases a buffer obtained from [`realloc`].
///
/// # Safety
///
/// Same contract as [`realloc`]'s `ptr`.
pub(crate) unsafe fn free(ptr: *mut u8, bytes: usize, align: usize) {
    if ptr.is_null() || bytes == 0 {
        return;
    }
    unsafe { alloc::dealloc(ptr, Layout::from_size_align_unchecked(bytes, align)) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realloc_preserves_prefix() {
        unsafe {
            let ptr = realloc(ptr::null_mut(), 0, 8, 4);
            assert!(!ptr.is_null());
            ptr::copy_nonoverlapping([1u8, 2, 3, 4].as_ptr(), ptr, 4);

            let grown = realloc(ptr, 8, 64, 4);
            assert_eq!(std::slice::from_raw_parts(grown, 4), &[1, 2, 3, 4]);

            free(grown, 64, 4);
        }
    }

    #[test]
    fn test_realloc_to_zero_frees() {
        unsafe {
            let ptr = realloc(ptr::null_mut(), 0, 16, 8);
            assert!(realloc(ptr, 16, 0, 8).is_null());
        }
    }
}
