//! Lookup command implementation.

use std::path::Path;

use anyhow::Result;
use fort_sdk::{PropertyDescriptor, PropertyRegistry};
use owo_colors::OwoColorize;
use tracing::warn;

/// Describe one descriptor on a single line
pub fn format_descriptor(class: &str, property: &str, descriptor: &PropertyDescriptor) -> String {
    if descriptor.is_resolved() {
        format!(
            "{}::{} offset 0x{:X} ({}) size {} type {}",
            class, property, descriptor.offset, descriptor.offset, descriptor.size, descriptor.property_type
        )
    } else {
        format!(
            "{}::{} unresolved size {} type {}",
            class, property, descriptor.size, descriptor.property_type
        )
    }
}

/// Look up `class::property`, returning the descriptor only when it is resolved
pub fn resolve<'r>(
    registry: &'r PropertyRegistry,
    class: &str,
    property: &str,
) -> Option<&'r PropertyDescriptor> {
    registry
        .lookup(class, property)
        .filter(|descriptor| descriptor.is_resolved())
}

/// Run the lookup command
pub fn run(catalog: &Path, class: &str, property: &str) -> Result<bool> {
    let registry = super::load_registry(catalog)?;

    match registry.lookup(class, property) {
        Some(descriptor) => {
            let line = format_descriptor(class, property, descriptor);
            if descriptor.is_resolved() {
                println!("{}", line.green());
            } else {
                warn!("{}::{} is known but has no resolved offset", class, property);
                println!("{}", line.yellow());
            }
        }
        None => {
            warn!("{}::{} is not in the catalog", class, property);
        }
    }

    Ok(resolve(&registry, class, property).is_some())
}
