//! Mirrored `TBitArray`: packed bits, 32 per word, four words inline.
//!
//! Slack invariant: every bit at or beyond `NumBits` in the final word is
//! zero. Word-level operations (counting, searching, comparing) rely on it,
//! so every mutation that can dirty the final word re-masks it.

use std::fmt;
use std::ptr;
use std::slice;

use tracing::debug;

use super::SizeType;
use super::growth::default_calculate_slack_grow;
use super::inline_allocation::{AllocationKind, InlineAllocation};
use crate::memory::{self, Address};
use crate::{check, checkf};

pub const NUM_BITS_PER_DWORD: i32 = 32;
pub const NUM_BITS_PER_DWORD_LOG_TWO: i32 = 5;
const FULL_WORD_MASK: u32 = u32::MAX;
const NUM_INLINE_WORDS: usize = 4;

/// Index of the highest set bit; `0` for `0`.
pub fn floor_log2(value: u32) -> u32 {
    if value == 0 { 0 } else { 31 - value.leading_zeros() }
}

/// Clears the lowest set bit of `mask` and returns its index.
pub fn get_and_clear_next_bit(mask: &mut u32) -> u32 {
    let lowest_bit_mask = *mask & mask.wrapping_neg();
    let bit_index = floor_log2(lowest_bit_mask);
    *mask ^= lowest_bit_mask;
    bit_index
}

/// Words needed to hold `num_bits` bits.
pub fn calculate_num_words(num_bits: SizeType) -> u32 {
    check!(num_bits >= 0);
    (num_bits as u32).div_ceil(NUM_BITS_PER_DWORD as u32)
}

/// Fills `words` with all ones or all zeros.
pub fn set_words(words: &mut [u32], value: bool) {
    if words.len() > 8 {
        unsafe { ptr::write_bytes(words.as_mut_ptr(), if value { 0xff } else { 0 }, words.len()) };
    } else {
        let word = if value { !0u32 } else { 0u32 };
        for slot in words.iter_mut() {
            *slot = word;
        }
    }
}

#[repr(C)]
pub struct TBitArray {
    allocator_instance: InlineAllocation<u32, NUM_INLINE_WORDS>,
    num_bits: SizeType,
    max_bits: SizeType,
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    use crate::memory::layout::bit_array;
    use std::mem::{offset_of, size_of};

    assert!(size_of::<TBitArray>() == bit_array::SIZE);
    assert!(offset_of!(TBitArray, allocator_instance) == bit_array::INLINE_DATA);
    assert!(offset_of!(TBitArray, num_bits) == bit_array::NUM_BITS);
    assert!(offset_of!(TBitArray, max_bits) == bit_array::MAX_BITS);
    assert!(NUM_INLINE_WORDS == bit_array::INLINE_WORDS);
};

unsafe impl Send for TBitArray {}
unsafe impl Sync for TBitArray {}

impl TBitArray {
    pub fn new() -> Self {
        // No final word exists while NumBits == 0, so slack is already clear.
        Self {
            allocator_instance: InlineAllocation::new(),
            num_bits: 0,
            max_bits: NUM_INLINE_WORDS as SizeType * NUM_BITS_PER_DWORD,
        }
    }

    /// `num_bits` bits, all set to `value`.
    pub fn with_value(value: bool, num_bits: SizeType) -> Self {
        let mut bits = Self::new();
        bits.init(value, num_bits);
        bits
    }

    /// Views a foreign `TBitArray` in place and verifies its invariants.
    ///
    /// # Safety
    ///
    /// `address` must point at a live `TBitArray` for the duration of `'a`.
    pub unsafe fn from_address<'a>(address: Address) -> &'a Self {
        let bits: &Self = unsafe { memory::view(address) };
        bits.check_invariants();
        bits
    }

    pub fn check_invariants(&self) {
        checkf!(
            self.num_bits <= self.max_bits,
            "TBitArray::NumBits ({}) should never be greater than MaxBits ({})",
            self.num_bits,
            self.max_bits
        );
        checkf!(
            self.num_bits >= 0 && self.max_bits >= 0,
            "NumBits ({}) and MaxBits ({}) should always be >= 0",
            self.num_bits,
            self.max_bits
        );

        let used_bits = self.num_bits % NUM_BITS_PER_DWORD;
        if used_bits != 0 {
            let last_word = self.get_data()[(self.num_bits / NUM_BITS_PER_DWORD) as usize];
            let slack_mask = FULL_WORD_MASK << used_bits;
            checkf!(
                last_word & slack_mask == 0,
                "TBitArray slack bits are non-zero, this will result in undefined behavior."
            );
        }
    }

    pub fn num(&self) -> SizeType {
        self.num_bits
    }

    pub fn max(&self) -> SizeType {
        self.max_bits
    }

    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    pub fn is_valid_index(&self, index: SizeType) -> bool {
        index >= 0 && index < self.num_bits
    }

    pub fn get_num_words(&self) -> u32 {
        calculate_num_words(self.num_bits)
    }

    pub fn get_max_words(&self) -> u32 {
        calculate_num_words(self.max_bits)
    }

    pub fn allocation_kind(&self) -> AllocationKind {
        self.allocator_instance.kind()
    }

    /// Live words, including the final partially used one.
    pub fn get_data(&self) -> &[u32] {
        unsafe {
            slice::from_raw_parts(
                self.allocator_instance.get_allocation(),
                self.get_num_words() as usize,
            )
        }
    }

    /// Mutable live words. Callers that write past `NumBits` in the final
    /// word must call [`clear_partial_slack_bits`](Self::clear_partial_slack_bits).
    pub fn get_data_mut(&mut self) -> &mut [u32] {
        let num_words = self.get_num_words() as usize;
        unsafe { slice::from_raw_parts_mut(self.allocator_instance.get_allocation_mut(), num_words) }
    }

    fn all_words_mut(&mut self) -> &mut [u32] {
        let max_words = self.get_max_words() as usize;
        unsafe { slice::from_raw_parts_mut(self.allocator_instance.get_allocation_mut(), max_words) }
    }

    /// Zeroes the bits of the final word that lie at or beyond `NumBits`.
    pub fn clear_partial_slack_bits(&mut self) {
        let used_bits = self.num_bits % NUM_BITS_PER_DWORD;
        if used_bits != 0 {
            let last_word_index = (self.num_bits / NUM_BITS_PER_DWORD) as usize;
            let slack_mask = FULL_WORD_MASK >> (NUM_BITS_PER_DWORD - used_bits);
            self.get_data_mut()[last_word_index] &= slack_mask;
        }
    }

    fn range_check(&self, index: SizeType) {
        checkf!(
            self.is_valid_index(index),
            "Bit index out of bounds: {} from a bit array of size {}",
            index,
            self.num_bits
        );
    }

    pub fn get(&self, index: SizeType) -> bool {
        self.range_check(index);
        let word = self.get_data()[(index >> NUM_BITS_PER_DWORD_LOG_TWO) as usize];
        word & (1 << (index & (NUM_BITS_PER_DWORD - 1))) != 0
    }

    pub fn set(&mut self, index: SizeType, value: bool) {
        self.range_check(index);
        let mask = 1u32 << (index & (NUM_BITS_PER_DWORD - 1));
        let word = &mut self.get_data_mut()[(index >> NUM_BITS_PER_DWORD_LOG_TWO) as usize];
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Resizes word storage to `new_max_words` and zeroes every word past
    /// the live ones.
    fn realloc_words(&mut self, new_max_words: u32) {
        let num_words = self.get_num_words() as usize;
        let previous_max_words = self.get_max_words() as usize;
        self.allocator_instance
            .resize_allocation(num_words, previous_max_words, new_max_words as usize);
        self.max_bits = new_max_words as SizeType * NUM_BITS_PER_DWORD;
        set_words(&mut self.all_words_mut()[num_words..], false);
    }

    /// Appends `count` zero bits and returns the index of the first.
    fn add_uninitialized(&mut self, count: SizeType) -> SizeType {
        check!(count >= 0);
        let old_num_bits = self.num_bits;
        let new_num_bits = old_num_bits + count;

        if new_num_bits > self.max_bits {
            let needed_words = calculate_num_words(new_num_bits);
            let max_words = if needed_words as usize <= NUM_INLINE_WORDS {
                NUM_INLINE_WORDS as u32
            } else {
                default_calculate_slack_grow(
                    needed_words as SizeType,
                    self.get_max_words() as SizeType,
                    std::mem::size_of::<u32>(),
                    true,
                    std::mem::align_of::<u32>() as u32,
                ) as u32
            };
            debug!(
                "Growing TBitArray to {} words for {} bits",
                max_words, new_num_bits
            );
            self.realloc_words(max_words);
        }

        // Words past the old final word may hold stale bits from before a reset.
        let old_num_words = calculate_num_words(old_num_bits) as usize;
        let new_num_words = calculate_num_words(new_num_bits) as usize;
        set_words(&mut self.all_words_mut()[old_num_words..new_num_words], false);

        self.num_bits = new_num_bits;
        old_num_bits
    }

    /// Appends one bit and returns its index.
    pub fn add(&mut self, value: bool) -> SizeType {
        let index = self.add_uninitialized(1);
        if value {
            self.set(index, true);
        }
        index
    }

    /// Appends `count` copies of `value` and returns the index of the first.
    pub fn add_many(&mut self, value: bool, count: SizeType) -> SizeType {
        let index = self.add_uninitialized(count);
        self.set_range(index, count, value);
        index
    }

    /// Replaces the contents with `num_bits` copies of `value`.
    pub fn init(&mut self, value: bool, num_bits: SizeType) {
        self.empty(num_bits);
        if num_bits > 0 {
            self.num_bits = num_bits;
            set_words(self.get_data_mut(), value);
            self.clear_partial_slack_bits();
        }
    }

    /// Sets bits `index .. index + num` to `value`.
    pub fn set_range(&mut self, index: SizeType, num: SizeType, value: bool) {
        checkf!(
            index >= 0 && num >= 0 && num <= self.num_bits - index,
            "SetRange({}, {}) outside a bit array of size {}",
            index,
            num,
            self.num_bits
        );
        if num == 0 {
            return;
        }

        let start_word = (index / NUM_BITS_PER_DWORD) as usize;
        let end_bit = index + num;
        let end_word = ((end_bit - 1) / NUM_BITS_PER_DWORD) as usize;
        let start_mask = FULL_WORD_MASK << (index % NUM_BITS_PER_DWORD);
        let end_mask = FULL_WORD_MASK >> (NUM_BITS_PER_DWORD - 1 - (end_bit - 1) % NUM_BITS_PER_DWORD);

        let words = self.get_data_mut();
        let apply = |word: &mut u32, mask: u32| {
            if value {
                *word |= mask;
            } else {
                *word &= !mask;
            }
        };

        if start_word == end_word {
            apply(&mut words[start_word], start_mask & end_mask);
            return;
        }
        apply(&mut words[start_word], start_mask);
        set_words(&mut words[start_word + 1..end_word], value);
        apply(&mut words[end_word], end_mask);
    }

    /// Removes `count` bits at `index`, shifting the rest down.
    pub fn remove_at(&mut self, index: SizeType, count: SizeType) {
        checkf!(
            index >= 0 && count >= 0 && count <= self.num_bits - index,
            "RemoveAt({}, {}) outside a bit array of size {}",
            index,
            count,
            self.num_bits
        );
        for target in index..self.num_bits - count {
            let bit = self.get(target + count);
            self.set(target, bit);
        }
        self.num_bits -= count;
        self.clear_partial_slack_bits();
    }

    /// Drops every bit and keeps the storage.
    pub fn reset(&mut self) {
        self.num_bits = 0;
    }

    /// Drops every bit and resizes storage for `expected_num_bits`.
    pub fn empty(&mut self, expected_num_bits: SizeType) {
        self.num_bits = 0;
        let max_words = calculate_num_words(expected_num_bits).max(NUM_INLINE_WORDS as u32);
        if max_words != self.get_max_words() {
            self.realloc_words(max_words);
        }
    }

    /// Number of set bits; exact because slack bits are always zero.
    pub fn count_set_bits(&self) -> SizeType {
        self.get_data()
            .iter()
            .map(|word| word.count_ones() as SizeType)
            .sum()
    }

    /// Index of the first bit equal to `value`.
    pub fn find(&self, value: bool) -> Option<SizeType> {
        let skip = if value { 0 } else { FULL_WORD_MASK };
        for (word_index, &word) in self.get_data().iter().enumerate() {
            if word == skip {
                continue;
            }
            let mut mask = if value { word } else { !word };
            let bit = get_and_clear_next_bit(&mut mask) as SizeType;
            let index = word_index as SizeType * NUM_BITS_PER_DWORD + bit;
            return (index < self.num_bits).then_some(index);
        }
        None
    }

    /// Indices of set bits in ascending order.
    pub fn iter_set_bits(&self) -> SetBitIterator<'_> {
        SetBitIterator {
            words: self.get_data(),
            word_index: 0,
            mask: 0,
        }
    }

    /// Every bit in order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.num_bits).map(move |index| self.get(index))
    }
}

impl Drop for TBitArray {
    fn drop(&mut self) {
        let max_words = self.get_max_words() as usize;
        unsafe { self.allocator_instance.release(max_words) };
    }
}

impl Default for TBitArray {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TBitArray {
    fn clone(&self) -> Self {
        let mut bits = TBitArray::new();
        bits.empty(self.num_bits);
        bits.num_bits = self.num_bits;
        bits.get_data_mut().copy_from_slice(self.get_data());
        bits
    }
}

/// Word-wise comparison; valid because slack bits are always zero.
impl PartialEq for TBitArray {
    fn eq(&self, other: &Self) -> bool {
        self.num_bits == other.num_bits && self.get_data() == other.get_data()
    }
}

impl Eq for TBitArray {}

impl fmt::Debug for TBitArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits: String = self.iter().map(|bit| if bit { '1' } else { '0' }).collect();
        f.debug_struct("TBitArray")
            .field("num_bits", &self.num_bits)
            .field("max_bits", &self.max_bits)
            .field("bits", &bits)
            .finish()
    }
}

impl FromIterator<bool> for TBitArray {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut bits = TBitArray::new();
        for bit in iter {
            bits.add(bit);
        }
        bits
    }
}

/// Walks set bits a word at a time with [`get_and_clear_next_bit`].
pub struct SetBitIterator<'a> {
    words: &'a [u32],
    word_index: usize,
    mask: u32,
}

impl Iterator for SetBitIterator<'_> {
    type Item = SizeType;

    fn next(&mut self) -> Option<SizeType> {
        while self.mask == 0 {
            if self.word_index >= self.words.len() {
                return None;
            }
            self.mask = self.words[self.word_index];
            self.word_index += 1;
        }
        let bit = get_and_clear_next_bit(&mut self.mask) as SizeType;
        Some((self.word_index as SizeType - 1) * NUM_BITS_PER_DWORD + bit)
    }
}
