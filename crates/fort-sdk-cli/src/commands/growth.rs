//! Growth command implementation.

use anyhow::{Result, bail};
use fort_sdk::containers::{CapacityChange, capacity_changes, natural_alignment};
use owo_colors::OwoColorize;
use tracing::debug;

/// Format one reallocation with the byte size of the new buffer
pub fn format_change(change: &CapacityChange, element_size: usize) -> String {
    format!(
        "at {:>8}: {:>8} -> {:>8} elements ({} bytes)",
        change.num,
        change.old_max,
        change.new_max,
        change.new_max as usize * element_size
    )
}

/// Alignment the replay quantizes with
pub fn effective_alignment(element_size: usize, alignment: Option<u32>) -> u32 {
    alignment.unwrap_or_else(|| natural_alignment(element_size))
}

/// Run the growth command
///
/// Without an explicit alignment the replay quantizes the way a growable
/// array of `element_size`-byte elements does.
pub fn run(element_size: usize, count: i32, alignment: Option<u32>) -> Result<bool> {
    if element_size == 0 {
        bail!("Element size must be non-zero");
    }
    if count < 0 {
        bail!("Element count must not be negative, got {}", count);
    }
    let alignment = effective_alignment(element_size, alignment);
    if !alignment.is_power_of_two() {
        bail!("Alignment must be a power of two, got {}", alignment);
    }

    debug!(
        "Replaying {} appends of {}-byte elements, alignment {}",
        count, element_size, alignment
    );
    let changes = capacity_changes(count, element_size, alignment);

    println!(
        "{}",
        format!("{} reallocations for {} elements", changes.len(), count).bold()
    );
    for change in &changes {
        println!("{}", format_change(change, element_size));
    }
    if let Some(last) = changes.last() {
        println!(
            "final capacity {} ({} slack)",
            last.new_max.cyan(),
            (last.new_max - count).cyan()
        );
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_change() {
        let change = CapacityChange {
            num: 5,
            old_max: 4,
            new_max: 22,
        };
        assert_eq!(
            format_change(&change, 4),
            "at        5:        4 ->       22 elements (88 bytes)"
        );
    }

    #[test]
    fn test_run_rejects_bad_arguments() {
        assert!(run(0, 10, None).is_err());
        assert!(run(4, -1, Some(8)).is_err());
        assert!(run(4, 10, Some(3)).is_err());
        assert!(run(4, 10, Some(0)).is_err());
    }

    #[test]
    fn test_run_accepts_empty_replay() {
        assert!(run(4, 0, Some(8)).unwrap());
        assert!(run(12, 30, None).unwrap());
    }

    #[test]
    fn test_default_alignment_follows_element_size() {
        assert_eq!(effective_alignment(4, None), 4);
        assert_eq!(effective_alignment(24, None), 8);
        assert_eq!(effective_alignment(4, Some(8)), 8);

        let changes = capacity_changes(30, 4, effective_alignment(4, None));
        assert_eq!(changes.last().map(|c| c.new_max), Some(47));
    }
}
