//! Mirrored `TSet<T>`: a sparse array of elements chained into a power of
//! two table of hash buckets.
//!
//! Every element records the bucket it is linked into (`HashIndex`) and the
//! next element of that chain (`HashNextId`), so the buckets hold only chain
//! heads. The bucket table lives in a one-slot inline allocation and is
//! rebuilt from scratch whenever it has to grow.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::slice;

use tracing::debug;

use super::inline_allocation::InlineAllocation;
use super::sparse_array::TSparseArray;
use super::{INDEX_NONE, SizeType};
use crate::memory::{self, Address};
use crate::{check, checkf};

const MIN_NUMBER_OF_HASHED_ELEMENTS: SizeType = 4;
const AVERAGE_NUMBER_OF_ELEMENTS_PER_HASH_BUCKET: SizeType = 2;
const BASE_NUMBER_OF_HASH_BUCKETS: SizeType = 8;

/// `GetTypeHash` of the foreign runtime.
pub trait TypeHash {
    fn get_type_hash(&self) -> u32;
}

macro_rules! impl_widening_type_hash {
    ($($ty:ty),*) => {
        $(impl TypeHash for $ty {
            fn get_type_hash(&self) -> u32 {
                *self as u32
            }
        })*
    };
}

impl_widening_type_hash!(u8, i8, u16, i16, u32, i32, bool, char);

impl TypeHash for u64 {
    fn get_type_hash(&self) -> u32 {
        (*self as u32).wrapping_add(((*self >> 32) as u32).wrapping_mul(23))
    }
}

impl TypeHash for i64 {
    fn get_type_hash(&self) -> u32 {
        (*self as u64).get_type_hash()
    }
}

/// `PointerHash`: the low four bits of an address are dropped (allocations
/// are at least 16-byte aligned) and the rest is mixed with [`hash_combine`].
pub fn pointer_hash(address: usize, c: u32) -> u32 {
    hash_combine(((address as u64) >> 4).get_type_hash(), c)
}

impl<T> TypeHash for *const T {
    fn get_type_hash(&self) -> u32 {
        pointer_hash(*self as usize, 0)
    }
}

impl<T> TypeHash for *mut T {
    fn get_type_hash(&self) -> u32 {
        pointer_hash(*self as usize, 0)
    }
}

impl<T: TypeHash + ?Sized> TypeHash for &T {
    fn get_type_hash(&self) -> u32 {
        (**self).get_type_hash()
    }
}

/// Combines two hashes the way the foreign runtime's `HashCombine` does.
pub fn hash_combine(a: u32, c: u32) -> u32 {
    let mut a = a;
    let mut b: u32 = 0x9e37_79b9;
    let mut c = c;

    a = a.wrapping_sub(b).wrapping_sub(c) ^ (c >> 13);
    b = b.wrapping_sub(c).wrapping_sub(a) ^ (a << 8);
    c = c.wrapping_sub(a).wrapping_sub(b) ^ (b >> 13);
    a = a.wrapping_sub(b).wrapping_sub(c) ^ (c >> 12);
    b = b.wrapping_sub(c).wrapping_sub(a) ^ (a << 16);
    c = c.wrapping_sub(a).wrapping_sub(b) ^ (b >> 5);
    a = a.wrapping_sub(b).wrapping_sub(c) ^ (c >> 3);
    b = b.wrapping_sub(c).wrapping_sub(a) ^ (a << 10);
    c.wrapping_sub(a).wrapping_sub(b) ^ (b >> 15)
}

/// How a set finds the key inside an element, compares keys, and hashes
/// them.
pub trait KeyFuncs<T> {
    type Key: ?Sized;

    fn get_set_key(element: &T) -> &Self::Key;
    fn matches(a: &Self::Key, b: &Self::Key) -> bool;
    fn get_key_hash(key: &Self::Key) -> u32;
}

/// The element is its own key.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyFuncs;

impl<T: TypeHash + PartialEq> KeyFuncs<T> for DefaultKeyFuncs {
    type Key = T;

    fn get_set_key(element: &T) -> &T {
        element
    }

    fn matches(a: &T, b: &T) -> bool {
        a == b
    }

    fn get_key_hash(key: &T) -> u32 {
        key.get_type_hash()
    }
}

/// Identifies an element slot of a set. Stays valid until that element is
/// removed.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FSetElementId {
    index: SizeType,
}

impl FSetElementId {
    pub const NONE: FSetElementId = FSetElementId { index: INDEX_NONE };

    pub const fn from_integer(index: SizeType) -> Self {
        Self { index }
    }

    pub const fn as_integer(self) -> SizeType {
        self.index
    }

    pub const fn is_valid_id(self) -> bool {
        self.index != INDEX_NONE
    }
}

#[repr(C)]
pub struct TSetElement<T> {
    value: T,
    hash_next_id: FSetElementId,
    hash_index: SizeType,
}

impl<T> TSetElement<T> {
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn hash_next_id(&self) -> FSetElementId {
        self.hash_next_id
    }

    pub fn hash_index(&self) -> SizeType {
        self.hash_index
    }
}

/// Bucket count for `num_hashed_elements`: one bucket below four elements,
/// then about two elements per bucket on top of a base of eight.
pub fn get_number_of_hash_buckets(num_hashed_elements: SizeType) -> SizeType {
    if num_hashed_elements >= MIN_NUMBER_OF_HASHED_ELEMENTS {
        let wanted = num_hashed_elements / AVERAGE_NUMBER_OF_ELEMENTS_PER_HASH_BUCKET
            + BASE_NUMBER_OF_HASH_BUCKETS;
        (wanted as u32).next_power_of_two() as SizeType
    } else {
        1
    }
}

#[repr(C)]
pub struct TSet<T, F = DefaultKeyFuncs> {
    elements: TSparseArray<TSetElement<T>>,
    hash: InlineAllocation<FSetElementId, 1>,
    hash_size: SizeType,
    _key_funcs: PhantomData<fn() -> F>,
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    use crate::memory::layout::{set, set_element_i32};
    use std::mem::{offset_of, size_of};

    assert!(size_of::<TSet<i32>>() == set::SIZE);
    assert!(size_of::<TSet<u64>>() == set::SIZE);
    assert!(offset_of!(TSet<i32>, elements) == set::ELEMENTS);
    assert!(offset_of!(TSet<i32>, hash) == set::HASH);
    assert!(offset_of!(TSet<i32>, hash_size) == set::HASH_SIZE);
    assert!(size_of::<TSetElement<i32>>() == set_element_i32::SIZE);
    assert!(offset_of!(TSetElement<i32>, value) == set_element_i32::VALUE);
    assert!(offset_of!(TSetElement<i32>, hash_next_id) == set_element_i32::HASH_NEXT_ID);
    assert!(offset_of!(TSetElement<i32>, hash_index) == set_element_i32::HASH_INDEX);
};

unsafe impl<T: Send, F> Send for TSet<T, F> {}
unsafe impl<T: Sync, F> Sync for TSet<T, F> {}

impl<T> TSet<T> {
    pub fn new() -> Self {
        Self::with_key_funcs()
    }
}

impl<T, F> TSet<T, F> {
    /// Empty set keyed by `F`. No buckets exist until the first element.
    pub fn with_key_funcs() -> Self {
        Self {
            elements: TSparseArray::new(),
            hash: InlineAllocation::new(),
            hash_size: 0,
            _key_funcs: PhantomData,
        }
    }

    /// Views a foreign `TSet` in place.
    ///
    /// # Safety
    ///
    /// `address` must point at a live `TSet<T>` for `'a` whose allocated
    /// elements are initialized and whose hash was built with `F`.
    pub unsafe fn from_address<'a>(address: Address) -> &'a Self {
        let set: &Self = unsafe { memory::view(address) };
        checkf!(
            set.hash_size == 0 || (set.hash_size as u32).is_power_of_two(),
            "HashSize ({}) must be zero or a power of two",
            set.hash_size
        );
        set
    }

    pub fn num(&self) -> SizeType {
        self.elements.num()
    }

    pub fn is_empty(&self) -> bool {
        self.num() == 0
    }

    pub fn get_hash_size(&self) -> SizeType {
        self.hash_size
    }

    pub fn get_max_index(&self) -> SizeType {
        self.elements.get_max_index()
    }

    pub fn elements(&self) -> &TSparseArray<TSetElement<T>> {
        &self.elements
    }

    /// Chain heads, one per bucket.
    pub fn hash_buckets(&self) -> &[FSetElementId] {
        if self.hash_size == 0 {
            return &[];
        }
        unsafe { slice::from_raw_parts(self.hash.get_allocation(), self.hash_size as usize) }
    }

    fn hash_buckets_mut(&mut self) -> &mut [FSetElementId] {
        if self.hash_size == 0 {
            return &mut [];
        }
        let hash_size = self.hash_size as usize;
        unsafe { slice::from_raw_parts_mut(self.hash.get_allocation_mut(), hash_size) }
    }

    pub fn is_valid_id(&self, id: FSetElementId) -> bool {
        id.is_valid_id() && self.elements.is_valid_index(id.as_integer())
    }

    pub fn get(&self, id: FSetElementId) -> Option<&T> {
        self.elements.get(id.as_integer()).map(|element| &element.value)
    }

    /// Mutable access by id. Changing the key part of the element breaks
    /// lookups until the next [`rehash`](TSet::rehash).
    pub fn get_mut(&mut self, id: FSetElementId) -> Option<&mut T> {
        self.elements
            .get_mut(id.as_integer())
            .map(|element| &mut element.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.elements.iter().map(|(_, element)| &element.value)
    }

    /// Elements paired with their ids, in slot order.
    pub fn iter_with_ids(&self) -> impl Iterator<Item = (FSetElementId, &T)> + '_ {
        self.elements
            .iter()
            .map(|(index, element)| (FSetElementId::from_integer(index), &element.value))
    }

    /// Drops every element and the bucket table.
    pub fn empty(&mut self) {
        self.elements.empty();
        unsafe { self.hash.release(self.hash_size as usize) };
        self.hash_size = 0;
    }

    /// Resizes the bucket table to `new_hash_size` buckets, all empty.
    fn reset_buckets(&mut self, new_hash_size: SizeType) {
        check!(new_hash_size == 0 || (new_hash_size as u32).is_power_of_two());
        if new_hash_size == 0 {
            unsafe { self.hash.release(self.hash_size as usize) };
        } else {
            self.hash
                .resize_allocation(0, self.hash_size as usize, new_hash_size as usize);
        }
        self.hash_size = new_hash_size;
        self.hash_buckets_mut().fill(FSetElementId::NONE);
    }
}

impl<T, F: KeyFuncs<T>> TSet<T, F> {
    fn bucket_of(&self, key_hash: u32) -> SizeType {
        (key_hash & (self.hash_size as u32 - 1)) as SizeType
    }

    /// Id of the element whose key matches `key`.
    pub fn find_id(&self, key: &F::Key) -> Option<FSetElementId> {
        if self.elements.num() == 0 || self.hash_size == 0 {
            return None;
        }

        let bucket = self.bucket_of(F::get_key_hash(key));
        let mut id = self.hash_buckets()[bucket as usize];
        while id.is_valid_id() {
            let element = &self.elements[id.as_integer()];
            if F::matches(F::get_set_key(&element.value), key) {
                return Some(id);
            }
            id = element.hash_next_id;
        }
        None
    }

    pub fn find(&self, key: &F::Key) -> Option<&T> {
        self.find_id(key).and_then(|id| self.get(id))
    }

    pub fn find_mut(&mut self, key: &F::Key) -> Option<&mut T> {
        let id = self.find_id(key)?;
        self.get_mut(id)
    }

    pub fn contains(&self, key: &F::Key) -> bool {
        self.find_id(key).is_some()
    }

    /// Inserts `value`, replacing (and dropping) an element with an equal
    /// key. The replaced element keeps its id.
    pub fn add(&mut self, value: T) -> FSetElementId {
        self.add_with_policy(value, true)
    }

    /// Inserts `value` only when no element has an equal key; otherwise
    /// drops `value` and returns the existing element's id.
    pub fn find_or_add(&mut self, value: T) -> FSetElementId {
        self.add_with_policy(value, false)
    }

    fn add_with_policy(&mut self, value: T, replace_existing: bool) -> FSetElementId {
        if let Some(id) = self.find_id(F::get_set_key(&value)) {
            if replace_existing {
                self.elements[id.as_integer()].value = value;
            }
            return id;
        }

        let id = FSetElementId::from_integer(self.elements.add(TSetElement {
            value,
            hash_next_id: FSetElementId::NONE,
            hash_index: 0,
        }));
        if !self.conditional_rehash(self.elements.num()) {
            self.hash_element(id);
        }
        id
    }

    /// Removes the element matching `key` and returns it.
    pub fn remove(&mut self, key: &F::Key) -> Option<T> {
        let id = self.find_id(key)?;
        self.remove_id(id)
    }

    /// Unlinks the element from its bucket chain and frees its slot.
    pub fn remove_id(&mut self, id: FSetElementId) -> Option<T> {
        if !self.is_valid_id(id) {
            return None;
        }

        if self.hash_size > 0 {
            let (hash_index, next_id) = {
                let element = &self.elements[id.as_integer()];
                (element.hash_index, element.hash_next_id)
            };
            let head = self.hash_buckets()[hash_index as usize];
            if head == id {
                self.hash_buckets_mut()[hash_index as usize] = next_id;
            } else {
                let mut current = head;
                while current.is_valid_id() {
                    let element = &mut self.elements[current.as_integer()];
                    if element.hash_next_id == id {
                        element.hash_next_id = next_id;
                        break;
                    }
                    current = element.hash_next_id;
                }
            }
        }

        self.elements
            .take(id.as_integer())
            .map(|element| element.value)
    }

    /// Grows the bucket table when `num_hashed_elements` needs more buckets.
    /// Returns true when it rehashed.
    fn conditional_rehash(&mut self, num_hashed_elements: SizeType) -> bool {
        let desired_hash_size = get_number_of_hash_buckets(num_hashed_elements);
        if num_hashed_elements > 0 && (self.hash_size == 0 || self.hash_size < desired_hash_size) {
            self.hash_size_to(desired_hash_size);
            true
        } else {
            false
        }
    }

    /// Rebuilds the bucket table sized for the current element count.
    pub fn rehash(&mut self) {
        let desired_hash_size = if self.elements.num() > 0 {
            get_number_of_hash_buckets(self.elements.num())
        } else {
            0
        };
        self.hash_size_to(desired_hash_size);
    }

    fn hash_size_to(&mut self, new_hash_size: SizeType) {
        debug!(
            "Rehashing set of {} elements: {} -> {} buckets",
            self.elements.num(),
            self.hash_size,
            new_hash_size
        );
        self.reset_buckets(new_hash_size);
        if new_hash_size == 0 {
            return;
        }
        let ids: Vec<SizeType> = self.elements.iter().map(|(index, _)| index).collect();
        for index in ids {
            self.hash_element(FSetElementId::from_integer(index));
        }
    }

    /// Links an element at the head of its bucket's chain.
    fn hash_element(&mut self, id: FSetElementId) {
        let key_hash = F::get_key_hash(F::get_set_key(&self.elements[id.as_integer()].value));
        let bucket = self.bucket_of(key_hash);
        let head = self.hash_buckets()[bucket as usize];

        let element = &mut self.elements[id.as_integer()];
        element.hash_index = bucket;
        element.hash_next_id = head;
        self.hash_buckets_mut()[bucket as usize] = id;
    }

    /// Verifies that every element is reachable from the bucket it records.
    pub fn check_invariants(&self) {
        self.elements.check_invariants();
        let mut reached = 0;
        for (bucket, &head) in self.hash_buckets().iter().enumerate() {
            let mut id = head;
            while id.is_valid_id() {
                let element = &self.elements[id.as_integer()];
                checkf!(
                    element.hash_index == bucket as SizeType,
                    "Set element {} is chained from bucket {} but records bucket {}",
                    id.as_integer(),
                    bucket,
                    element.hash_index
                );
                reached += 1;
                checkf!(
                    reached <= self.elements.num(),
                    "Set hash chains visit more elements than the set holds"
                );
                id = element.hash_next_id;
            }
        }
        checkf!(
            reached == self.elements.num(),
            "Set hash chains reach {} of {} elements",
            reached,
            self.elements.num()
        );
    }
}

impl<T, F> Drop for TSet<T, F> {
    fn drop(&mut self) {
        unsafe { self.hash.release(self.hash_size as usize) };
    }
}

impl<T, F> Default for TSet<T, F> {
    fn default() -> Self {
        Self::with_key_funcs()
    }
}

impl<T, F> Index<FSetElementId> for TSet<T, F> {
    type Output = T;

    fn index(&self, id: FSetElementId) -> &T {
        &self.elements[id.as_integer()].value
    }
}

impl<T, F> IndexMut<FSetElementId> for TSet<T, F> {
    fn index_mut(&mut self, id: FSetElementId) -> &mut T {
        &mut self.elements[id.as_integer()].value
    }
}

impl<T: fmt::Debug, F> fmt::Debug for TSet<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, F: KeyFuncs<T>> FromIterator<T> for TSet<T, F> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = TSet::with_key_funcs();
        for value in iter {
            set.add(value);
        }
        set
    }
}

impl<T, F: KeyFuncs<T>> Extend<T> for TSet<T, F> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sends every key to the same bucket.
    struct CollidingKeyFuncs;

    impl KeyFuncs<i32> for CollidingKeyFuncs {
        type Key = i32;

        fn get_set_key(element: &i32) -> &i32 {
            element
        }

        fn matches(a: &i32, b: &i32) -> bool {
            a == b
        }

        fn get_key_hash(_key: &i32) -> u32 {
            7
        }
    }

    #[test]
    fn test_number_of_hash_buckets() {
        assert_eq!(get_number_of_hash_buckets(0), 1);
        assert_eq!(get_number_of_hash_buckets(3), 1);
        assert_eq!(get_number_of_hash_buckets(4), 16);
        assert_eq!(get_number_of_hash_buckets(16), 16);
        assert_eq!(get_number_of_hash_buckets(17), 16);
        assert_eq!(get_number_of_hash_buckets(24), 32);
        assert_eq!(get_number_of_hash_buckets(100), 64);
    }

    #[test]
    fn test_type_hash() {
        assert_eq!(5i32.get_type_hash(), 5);
        assert_eq!((-1i32).get_type_hash(), u32::MAX);
        assert_eq!(0x0000_0002_0000_0001u64.get_type_hash(), 1 + 2 * 23);
        assert_eq!((&7u8).get_type_hash(), 7);
    }

    #[test]
    fn test_pointer_hash_matches_runtime_values() {
        let pointer = 0x1234_5670usize as *const u8;
        assert_eq!(pointer.get_type_hash(), 0x15B4_7675);
        assert_eq!((pointer as *mut u8).get_type_hash(), 0x15B4_7675);
        assert_eq!(pointer_hash(0x7FF6_1234_5670, 0), 0x2F17_158A);
        assert_eq!(std::ptr::null::<u8>().get_type_hash(), 0x0A94_D6D4);
        // Addresses differing only in the dropped bits share a hash.
        assert_eq!(pointer_hash(0x1234_5678, 0), pointer_hash(0x1234_5670, 0));
    }

    #[test]
    fn test_pointer_keys_in_set() {
        let values = [1u64, 2, 3, 4, 5];
        let mut set: TSet<*const u64> = TSet::new();
        for value in &values {
            set.add(value as *const u64);
        }
        assert_eq!(set.num(), 5);
        for value in &values {
            assert!(set.contains(&(value as *const u64)));
        }
        set.check_invariants();
    }

    #[test]
    fn test_hash_combine_mixes() {
        assert_ne!(hash_combine(1, 2), hash_combine(2, 1));
        assert_eq!(hash_combine(1, 2), hash_combine(1, 2));
    }

    #[test]
    fn test_inserted_values_are_found() {
        let mut set: TSet<i32> = TSet::new();
        for value in 0..100 {
            set.add(value * 7);
        }
        assert_eq!(set.num(), 100);
        for value in 0..100 {
            assert!(set.contains(&(value * 7)), "missing {}", value * 7);
        }
        assert!(!set.contains(&1));
        set.check_invariants();
    }

    #[test]
    fn test_hash_grows_with_elements() {
        let mut set: TSet<i32> = TSet::new();
        assert_eq!(set.get_hash_size(), 0);
        set.add(1);
        assert_eq!(set.get_hash_size(), 1);
        set.add(2);
        set.add(3);
        assert_eq!(set.get_hash_size(), 1);
        set.add(4);
        assert_eq!(set.get_hash_size(), 16);
        set.check_invariants();
    }

    #[test]
    fn test_duplicate_add_keeps_one_element() {
        let mut set: TSet<i32> = TSet::new();
        let first = set.add(9);
        let second = set.add(9);
        assert_eq!(first, second);
        assert_eq!(set.find_or_add(9), first);
        assert_eq!(set.num(), 1);
    }

    #[test]
    fn test_remove_then_lookup_misses() {
        let mut set: TSet<i32> = (0..20).collect();
        assert_eq!(set.remove(&5), Some(5));
        assert_eq!(set.remove(&5), None);
        assert!(!set.contains(&5));
        assert_eq!(set.num(), 19);
        set.check_invariants();

        // The freed slot is reused by the next insertion.
        let id = set.add(500);
        assert_eq!(id.as_integer(), 5);
        assert!(set.contains(&500));
        set.check_invariants();
    }

    #[test]
    fn test_collisions_chain_and_unlink() {
        let mut set: TSet<i32, CollidingKeyFuncs> = TSet::with_key_funcs();
        for value in 0..10 {
            set.add(value);
        }
        set.check_invariants();
        let buckets_in_use = set.hash_buckets().iter().filter(|id| id.is_valid_id()).count();
        assert_eq!(buckets_in_use, 1);

        // Remove from the head, the middle, and the tail of the chain.
        assert_eq!(set.remove(&9), Some(9));
        assert_eq!(set.remove(&4), Some(4));
        assert_eq!(set.remove(&0), Some(0));
        set.check_invariants();
        for value in [1, 2, 3, 5, 6, 7, 8] {
            assert!(set.contains(&value));
        }
    }

    #[test]
    fn test_rehash_preserves_membership() {
        let mut set: TSet<u64> = (0..50u64).map(|v| v << 33).collect();
        set.remove(&(10u64 << 33));
        set.rehash();
        assert_eq!(set.get_hash_size(), get_number_of_hash_buckets(49));
        for value in (0..50u64).filter(|v| *v != 10) {
            assert!(set.contains(&(value << 33)));
        }
        set.check_invariants();
    }

    #[test]
    fn test_empty_releases_buckets() {
        let mut set: TSet<i32> = (0..40).collect();
        set.empty();
        assert_eq!(set.num(), 0);
        assert_eq!(set.get_hash_size(), 0);
        assert!(set.find(&3).is_none());
        set.add(3);
        assert!(set.contains(&3));
    }

    #[test]
    fn test_iter_with_ids() {
        let set: TSet<i32> = [10, 20, 30].into_iter().collect();
        let pairs: Vec<(SizeType, i32)> = set
            .iter_with_ids()
            .map(|(id, value)| (id.as_integer(), *value))
            .collect();
        assert_eq!(pairs, vec![(0, 10), (1, 20), (2, 30)]);
        assert_eq!(set[FSetElementId::from_integer(1)], 20);
    }

    #[test]
    #[should_panic(expected = "records bucket")]
    fn test_corrupt_hash_index_fails() {
        let mut set: TSet<i32> = (0..8).collect();
        set.elements[0].hash_index += 1;
        set.check_invariants();
    }
}
