//! CLI command implementations.
//!
//! Each `run` returns `Ok(false)` when the command completed but found
//! nothing to report, which the binary turns into exit status 1.

pub mod classes;
pub mod growth;
pub mod layout;
pub mod lookup;

use std::path::Path;

use anyhow::{Context, Result};
use fort_sdk::{PropertyRegistry, load_catalog};

/// Load a catalog file and freeze it into a registry
pub fn load_registry(path: &Path) -> Result<PropertyRegistry> {
    let catalog = load_catalog(path)
        .with_context(|| format!("Failed to load property catalog {}", path.display()))?;
    let registry = PropertyRegistry::from_catalog(&catalog)
        .with_context(|| format!("Invalid property catalog {}", path.display()))?;
    Ok(registry)
}
