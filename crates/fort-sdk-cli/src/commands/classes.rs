//! Classes command implementation.

use std::path::Path;

use anyhow::Result;
use fort_sdk::PropertyRegistry;
use owo_colors::OwoColorize;
use tracing::warn;

use super::lookup::format_descriptor;

/// One line per class: name and property count
pub fn class_summary(registry: &PropertyRegistry) -> Vec<String> {
    registry
        .classes()
        .map(|class| {
            let count = registry.properties_of(class).map_or(0, |properties| properties.count());
            format!("{:<40} {:>4} properties", class, count)
        })
        .collect()
}

/// One line per property of `class`, or `None` for an unknown class
pub fn class_properties(registry: &PropertyRegistry, class: &str) -> Option<Vec<String>> {
    let properties = registry.properties_of(class)?;
    Some(
        properties
            .map(|(name, descriptor)| format_descriptor(class, name, descriptor))
            .collect(),
    )
}

/// Run the classes command
pub fn run(catalog: &Path, class: Option<&str>) -> Result<bool> {
    let registry = super::load_registry(catalog)?;

    match class {
        None => {
            let version = if registry.version().is_empty() {
                "unversioned"
            } else {
                registry.version()
            };
            println!(
                "{}",
                format!(
                    "{} classes, {} properties ({})",
                    registry.num_classes(),
                    registry.len(),
                    version
                )
                .bold()
            );
            for line in class_summary(&registry) {
                println!("{}", line);
            }
            Ok(true)
        }
        Some(class) => match class_properties(&registry, class) {
            Some(lines) => {
                println!("{}", class.bold());
                for line in lines {
                    println!("  {}", line);
                }
                Ok(true)
            }
            None => {
                warn!("Class {} is not in the catalog", class);
                Ok(false)
            }
        },
    }
}
