//! Containers laid out exactly like the foreign runtime's.
//!
//! Each type is `#[repr(C)]` with its size and field offsets pinned against
//! [`crate::memory::layout`]. Locally built values own their buffers and
//! follow the foreign growth policy; views obtained through `from_address`
//! borrow foreign memory and must never be grown.

pub mod array;
pub mod bit_array;
pub mod growth;
pub mod inline_allocation;
pub mod map;
pub mod set;
pub mod sparse_array;
pub mod string;

/// Index and count type of every container
pub type SizeType = i32;

/// Link value meaning "no element"
pub const INDEX_NONE: SizeType = -1;

pub use array::TArray;
pub use bit_array::TBitArray;
pub use growth::{CapacityChange, capacity_changes, default_calculate_slack_grow, natural_alignment};
pub use inline_allocation::{AllocationKind, InlineAllocation};
pub use map::{TMap, TPair};
pub use set::{DefaultKeyFuncs, FSetElementId, KeyFuncs, TSet, TypeHash, hash_combine, pointer_hash};
pub use sparse_array::{Slot, TSparseArray};
pub use string::{FString, TChar};
