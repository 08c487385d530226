//! Slack growth policy of the foreign allocator.
//!
//! Buffer capacities produced here must match the foreign runtime exactly:
//! any address computed relative to a buffer's end depends on them.

use crate::{check, check_slow};

/// Capacity of the first allocation of an empty container
pub const FIRST_GROW: usize = 4;
/// Headroom added on every later growth
pub const CONSTANT_GROW: usize = 16;
/// Largest alignment [`natural_alignment`] reports
pub const MAX_NATURAL_ALIGNMENT: u32 = 16;

/// Alignment a growable array of `bytes_per_element`-sized elements
/// quantizes with: the largest power of two dividing the element size,
/// capped at [`MAX_NATURAL_ALIGNMENT`].
///
/// The element size is always a multiple of this, so quantizing never
/// changes a capacity computed with it.
pub fn natural_alignment(bytes_per_element: usize) -> u32 {
    if bytes_per_element == 0 {
        return 1;
    }
    let shift = bytes_per_element.trailing_zeros().min(MAX_NATURAL_ALIGNMENT.trailing_zeros());
    1 << shift
}

/// Rounds a byte count up to the next multiple of `alignment`.
pub fn default_quantize_size(count: usize, alignment: u32) -> usize {
    let alignment = alignment as usize;
    if alignment <= 1 {
        return count;
    }
    count.div_ceil(alignment).saturating_mul(alignment)
}

/// New capacity for a container that needs room for `num_elements` and
/// currently has `num_allocated_elements` slots.
///
/// Growing from nothing allocates [`FIRST_GROW`] slots when that is enough;
/// otherwise capacity becomes `n + 3n/8 + 16`. The result saturates to
/// `i32::MAX` when it cannot hold `num_elements`.
pub fn default_calculate_slack_grow(
    num_elements: i32,
    num_allocated_elements: i32,
    bytes_per_element: usize,
    allow_quantize: bool,
    alignment: u32,
) -> i32 {
    check!(num_elements >= 0);
    check_slow!(num_allocated_elements >= 0);

    let requested = num_elements as usize;
    let mut grow = FIRST_GROW;
    if num_allocated_elements != 0 || requested > grow {
        grow = requested + 3 * requested / 8 + CONSTANT_GROW;
    }

    let capacity = if allow_quantize && bytes_per_element != 0 {
        default_quantize_size(grow.saturating_mul(bytes_per_element), alignment) / bytes_per_element
    } else {
        grow
    };

    let capacity = i32::try_from(capacity).unwrap_or(i32::MAX);
    if num_elements > capacity {
        i32::MAX
    } else {
        capacity
    }
}

/// A capacity change observed while appending one element at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityChange {
    /// Length that triggered the reallocation
    pub num: i32,
    pub old_max: i32,
    pub new_max: i32,
}

/// Replays appending `count` elements to an empty array and records every
/// reallocation.
///
/// With `alignment` set to [`natural_alignment`] of the element size the
/// capacities are the ones a growable array of such elements reaches. A
/// coarser alignment models a buffer quantized by its allocator instead.
pub fn capacity_changes(count: i32, bytes_per_element: usize, alignment: u32) -> Vec<CapacityChange> {
    let mut changes = Vec::new();
    let mut max = 0;
    for num in 1..=count.max(0) {
        if num > max {
            let new_max = default_calculate_slack_grow(num, max, bytes_per_element, true, alignment);
            changes.push(CapacityChange {
                num,
                old_max: max,
                new_max,
            });
            max = new_max;
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_grow_uses_minimum() {
        for requested in 0..=4 {
            assert_eq!(
                default_calculate_slack_grow(requested, 0, 4, false, 4),
                4,
                "requested {}",
                requested
            );
        }
    }

    #[test]
    fn test_first_grow_past_minimum() {
        // 5 + 15/8 + 16
        assert_eq!(default_calculate_slack_grow(5, 0, 4, false, 4), 22);
    }

    #[test]
    fn test_regrow_adds_headroom() {
        assert_eq!(default_calculate_slack_grow(5, 4, 4, false, 4), 22);
        assert_eq!(default_calculate_slack_grow(23, 22, 4, false, 4), 47);
        assert_eq!(default_calculate_slack_grow(100, 80, 4, false, 4), 153);
    }

    #[test]
    fn test_grow_saturates() {
        assert_eq!(
            default_calculate_slack_grow(i32::MAX, 1, 4, false, 4),
            i32::MAX
        );
        assert_eq!(
            default_calculate_slack_grow(i32::MAX - 10, 1, 4, true, 4),
            i32::MAX
        );
    }

    #[test]
    fn test_quantize_rounds_up() {
        assert_eq!(default_quantize_size(13, 8), 16);
        assert_eq!(default_quantize_size(16, 8), 16);
        assert_eq!(default_quantize_size(13, 0), 13);
        // 22 * 6 = 132 bytes rounds to 136, which still holds 22 elements
        assert_eq!(default_calculate_slack_grow(5, 0, 6, true, 8), 22);
    }

    #[test]
    #[should_panic(expected = "CHECK FAILED")]
    fn test_negative_request_fails() {
        default_calculate_slack_grow(-1, 0, 4, false, 4);
    }

    #[test]
    fn test_natural_alignment() {
        assert_eq!(natural_alignment(0), 1);
        assert_eq!(natural_alignment(1), 1);
        assert_eq!(natural_alignment(4), 4);
        assert_eq!(natural_alignment(12), 4);
        assert_eq!(natural_alignment(24), 8);
        assert_eq!(natural_alignment(64), 16);
    }

    #[test]
    fn test_capacity_changes() {
        let changes = capacity_changes(30, 4, natural_alignment(4));
        let maxes: Vec<i32> = changes.iter().map(|c| c.new_max).collect();
        assert_eq!(maxes, vec![4, 22, 47]);
        assert_eq!(changes[1].num, 5);
        assert_eq!(changes[1].old_max, 4);
        assert_eq!(changes[2].num, 23);
    }

    #[test]
    fn test_capacity_changes_coarse_alignment() {
        let changes = capacity_changes(30, 4, 8);
        let maxes: Vec<i32> = changes.iter().map(|c| c.new_max).collect();
        // 47 * 4 = 188 bytes quantizes to 192
        assert_eq!(maxes, vec![4, 22, 48]);
    }

    #[test]
    fn test_capacity_changes_empty() {
        assert!(capacity_changes(0, 4, natural_alignment(4)).is_empty());
    }
}
