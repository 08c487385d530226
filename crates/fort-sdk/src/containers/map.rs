//! Mirrored `TMap<K, V>`: a set of key/value pairs hashed and compared by
//! key only.

use std::fmt;

use super::SizeType;
use super::set::{FSetElementId, KeyFuncs, TSet, TypeHash};
use crate::checkf;
use crate::memory::{self, Address};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TPair<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> TPair<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Self { key, value }
    }
}

/// Hashes and matches the key of a [`TPair`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PairKeyFuncs;

impl<K: TypeHash + PartialEq, V> KeyFuncs<TPair<K, V>> for PairKeyFuncs {
    type Key = K;

    fn get_set_key(element: &TPair<K, V>) -> &K {
        &element.key
    }

    fn matches(a: &K, b: &K) -> bool {
        a == b
    }

    fn get_key_hash(key: &K) -> u32 {
        key.get_type_hash()
    }
}

#[repr(C)]
pub struct TMap<K, V> {
    pairs: TSet<TPair<K, V>, PairKeyFuncs>,
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    use crate::memory::layout::map;
    use std::mem::{offset_of, size_of};

    assert!(size_of::<TMap<i32, u64>>() == map::SIZE);
    assert!(offset_of!(TMap<i32, u64>, pairs) == map::PAIRS);
    assert!(offset_of!(TPair<i32, u64>, key) == 0);
    assert!(offset_of!(TPair<i32, u64>, value) == 8);
};

impl<K, V> TMap<K, V> {
    pub fn new() -> Self {
        Self {
            pairs: TSet::with_key_funcs(),
        }
    }

    /// Views a foreign `TMap` in place.
    ///
    /// # Safety
    ///
    /// As [`TSet::from_address`] for `TSet<TPair<K, V>>`.
    pub unsafe fn from_address<'a>(address: Address) -> &'a Self {
        let map: &Self = unsafe { memory::view(address) };
        checkf!(
            map.pairs.get_hash_size() == 0 || (map.pairs.get_hash_size() as u32).is_power_of_two(),
            "HashSize ({}) must be zero or a power of two",
            map.pairs.get_hash_size()
        );
        map
    }

    pub fn num(&self) -> SizeType {
        self.pairs.num()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &TSet<TPair<K, V>, PairKeyFuncs> {
        &self.pairs
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.pairs.iter().map(|pair| (&pair.key, &pair.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.pairs.iter().map(|pair| &pair.key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.pairs.iter().map(|pair| &pair.value)
    }

    pub fn empty(&mut self) {
        self.pairs.empty();
    }
}

impl<K: TypeHash + PartialEq, V> TMap<K, V> {
    /// Sets `key` to `value`, replacing any previous value.
    pub fn add(&mut self, key: K, value: V) -> FSetElementId {
        self.pairs.add(TPair::new(key, value))
    }

    /// Value for `key`, inserting `value` first when the key is absent.
    pub fn find_or_add(&mut self, key: K, value: V) -> &mut V {
        let id = self.pairs.find_or_add(TPair::new(key, value));
        &mut self.pairs[id].value
    }

    pub fn find(&self, key: &K) -> Option<&V> {
        self.pairs.find(key).map(|pair| &pair.value)
    }

    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        self.pairs.find_mut(key).map(|pair| &mut pair.value)
    }

    /// Value for `key`; a missing key is a contract violation.
    pub fn find_checked(&self, key: &K) -> &V {
        let id = self.pairs.find_id(key);
        checkf!(id.is_some(), "Key not found in map of {} pairs", self.num());
        &self.pairs[id.unwrap_or(FSetElementId::NONE)].value
    }

    pub fn contains(&self, key: &K) -> bool {
        self.pairs.contains(key)
    }

    /// Removes `key` and returns its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.pairs.remove(key).map(|pair| pair.value)
    }

    pub fn check_invariants(&self) {
        self.pairs.check_invariants();
    }
}

impl<K, V> Default for TMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for TMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: TypeHash + PartialEq, V> FromIterator<(K, V)> for TMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = TMap::new();
        for (key, value) in iter {
            map.add(key, value);
        }
        map
    }
}
