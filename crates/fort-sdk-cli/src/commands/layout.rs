//! Layout command implementation.

use anyhow::Result;
use fort_sdk::memory::layout::{LayoutField, TABLE, size_of_structure};
use owo_colors::OwoColorize;

/// Group the table rows by structure, keeping declaration order
pub fn grouped() -> Vec<(&'static str, Vec<&'static LayoutField>)> {
    let mut groups: Vec<(&'static str, Vec<&'static LayoutField>)> = Vec::new();
    for field in TABLE {
        let same_structure = groups
            .last()
            .is_some_and(|(structure, _)| *structure == field.structure);
        if same_structure {
            if let Some((_, fields)) = groups.last_mut() {
                fields.push(field);
            }
        } else {
            groups.push((field.structure, vec![field]));
        }
    }
    groups
}

pub fn format_field(field: &LayoutField) -> String {
    format!("  0x{:02X} {:<16} {:>3} bytes", field.offset, field.field, field.size)
}

/// Run the layout command
pub fn run() -> Result<bool> {
    for (structure, fields) in grouped() {
        let size = size_of_structure(structure).unwrap_or_default();
        println!("{} {}", structure.bold(), format!("({} bytes)", size).dimmed());
        for field in fields {
            println!("{}", format_field(field));
        }
    }
    Ok(true)
}
