//! Memory layout constants for the mirrored foreign structures
//!
//! Offsets are in bytes from the start of each structure on 64-bit targets.
//! Each container module pins its Rust definition to these values with
//! compile-time assertions, so a field reordering fails the build instead of
//! silently misreading foreign memory.

/// Pointer size of the foreign runtime
pub const POINTER: usize = 8;

/// `TArray<T>`: data pointer followed by the two counters
pub mod array {
    pub const DATA: usize = 0;
    pub const NUM: usize = super::POINTER;
    pub const MAX: usize = NUM + 4;
    pub const SIZE: usize = 16;
}

/// `TBitArray`: four inline words, secondary pointer, then the bit counters
pub mod bit_array {
    pub const INLINE_WORDS: usize = 4;
    pub const INLINE_DATA: usize = 0;
    pub const SECONDARY_DATA: usize = INLINE_WORDS * 4;
    pub const NUM_BITS: usize = SECONDARY_DATA + super::POINTER;
    pub const MAX_BITS: usize = NUM_BITS + 4;
    pub const SIZE: usize = 32;
}

/// `TSparseArray<T>`
pub mod sparse_array {
    pub const DATA: usize = 0;
    pub const ALLOCATION_FLAGS: usize = super::array::SIZE;
    pub const FIRST_FREE_INDEX: usize = ALLOCATION_FLAGS + super::bit_array::SIZE;
    pub const NUM_FREE_INDICES: usize = FIRST_FREE_INDEX + 4;
    pub const SIZE: usize = 56;

    /// Free-list link stored in an unoccupied slot
    pub const PREV_FREE_INDEX: usize = 0;
    pub const NEXT_FREE_INDEX: usize = 4;
}

/// `TSet<T>`: one inline hash bucket
pub mod set {
    pub const INLINE_HASH_BUCKETS: usize = 1;
    pub const ELEMENTS: usize = 0;
    pub const HASH: usize = super::sparse_array::SIZE;
    pub const HASH_SIZE: usize = HASH + 16;
    pub const SIZE: usize = 80;
}

/// `TSetElement<i32>`: value, then chain link, then owning bucket
pub mod set_element_i32 {
    pub const VALUE: usize = 0;
    pub const HASH_NEXT_ID: usize = 4;
    pub const HASH_INDEX: usize = 8;
    pub const SIZE: usize = 12;
}

/// `TMap<K, V>` is a `TSet<TPair<K, V>>`
pub mod map {
    pub const PAIRS: usize = 0;
    pub const SIZE: usize = super::set::SIZE;
}

/// `FString` is a `TArray<TCHAR>`
pub mod string {
    pub const DATA: usize = 0;
    pub const SIZE: usize = super::array::SIZE;
}

/// One row of the layout table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutField {
    pub structure: &'static str,
    pub field: &'static str,
    pub offset: usize,
    pub size: usize,
}

const fn field(structure: &'static str, field: &'static str, offset: usize, size: usize) -> LayoutField {
    LayoutField {
        structure,
        field,
        offset,
        size,
    }
}

/// Every mirrored field in declaration order
pub const TABLE: &[LayoutField] = &[
    field("TArray", "Data", array::DATA, POINTER),
    field("TArray", "ArrayNum", array::NUM, 4),
    field("TArray", "ArrayMax", array::MAX, 4),
    field("TBitArray", "InlineData", bit_array::INLINE_DATA, bit_array::INLINE_WORDS * 4),
    field("TBitArray", "SecondaryData", bit_array::SECONDARY_DATA, POINTER),
    field("TBitArray", "NumBits", bit_array::NUM_BITS, 4),
    field("TBitArray", "MaxBits", bit_array::MAX_BITS, 4),
    field("TSparseArray", "Data", sparse_array::DATA, array::SIZE),
    field("TSparseArray", "AllocationFlags", sparse_array::ALLOCATION_FLAGS, bit_array::SIZE),
    field("TSparseArray", "FirstFreeIndex", sparse_array::FIRST_FREE_INDEX, 4),
    field("TSparseArray", "NumFreeIndices", sparse_array::NUM_FREE_INDICES, 4),
    field("TSet", "Elements", set::ELEMENTS, sparse_array::SIZE),
    field("TSet", "Hash", set::HASH, 16),
    field("TSet", "HashSize", set::HASH_SIZE, 4),
    field("TMap", "Pairs", map::PAIRS, set::SIZE),
    field("FString", "Data", string::DATA, array::SIZE),
];

/// Total size of a mirrored structure, if known
pub fn size_of_structure(structure: &str) -> Option<usize> {
    match structure {
        "TArray" => Some(array::SIZE),
        "TBitArray" => Some(bit_array::SIZE),
        "TSparseArray" => Some(sparse_array::SIZE),
        "TSet" => Some(set::SIZE),
        "TMap" => Some(map::SIZE),
        "FString" => Some(string::SIZE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_fields_are_contiguous() {
        for pair in TABLE.windows(2) {
            let (prev, row) = (&pair[0], &pair[1]);
            if prev.structure != row.structure {
                continue;
            }
            assert!(
                prev.offset + prev.size <= row.offset,
                "{}::{} overlaps {}",
                row.structure,
                row.field,
                prev.field
            );
        }
    }

    #[test]
    fn test_table_fits_structure_size() {
        for row in TABLE {
            let size = size_of_structure(row.structure).unwrap();
            assert!(row.offset + row.size <= size, "{}::{}", row.structure, row.field);
        }
    }

    #[test]
    fn test_unknown_structure() {
        assert_eq!(size_of_structure("TQueue"), None);
    }
}
