//! Reinterpreting trusted foreign addresses.
//!
//! Nothing here validates that an address is live. A caller holding an
//! address from the offset resolver vouches for it; every view is only as
//! valid as that guarantee, and the foreign process may free or move the
//! object between reads.

pub(crate) mod alloc;
pub mod layout;

use std::any::type_name;
use std::mem::align_of;

use crate::checkf;

/// Address in the (shared) address space of the foreign runtime
pub type Address = usize;

/// Reinterprets `address` as a `T` in place.
///
/// A null or misaligned address is a contract violation.
///
/// # Safety
///
/// `address` must point at a live, initialized `T` that stays valid and
/// unmodified for `'a`.
pub unsafe fn view<'a, T>(address: Address) -> &'a T {
    check_address::<T>(address);
    unsafe { &*(address as *const T) }
}

/// Mutable counterpart of [`view`].
///
/// # Safety
///
/// As [`view`], and nothing else may access the object during `'a`.
/// Growing a container obtained this way reallocates its buffer with the
/// local allocator, which the foreign runtime does not share.
pub unsafe fn view_mut<'a, T>(address: Address) -> &'a mut T {
    check_address::<T>(address);
    unsafe { &mut *(address as *mut T) }
}

/// Copies a `T` out of `base + offset` without any alignment requirement.
///
/// # Safety
///
/// `base + offset .. base + offset + size_of::<T>()` must be readable and
/// hold a valid bit pattern for `T`.
pub unsafe fn read_at<T: Copy>(base: Address, offset: usize) -> T {
    checkf!(base != 0, "null base address read as {}", type_name::<T>());
    unsafe { std::ptr::read_unaligned((base + offset) as *const T) }
}

/// Address of a local value, for handing mirrored objects to code that
/// expects foreign addresses.
pub fn address_of<T>(value: &T) -> Address {
    value as *const T as Address
}

fn check_address<T>(address: Address) {
    checkf!(address != 0, "null address viewed as {}", type_name::<T>());
    checkf!(
        address % align_of::<T>() == 0,
        "address 0x{:X} is not aligned for {}",
        address,
        type_name::<T>()
    );
}
