//! JSON property catalog: the on-disk seed of a [`PropertyRegistry`].
//!
//! [`PropertyRegistry`]: super::PropertyRegistry

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::property::{PropertyDescriptor, PropertyType};
use crate::error::{Error, Result};

fn unresolved_offset() -> i32 {
    PropertyDescriptor::UNRESOLVED_OFFSET
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProperty {
    pub name: String,
    #[serde(default = "unresolved_offset")]
    pub offset: i32,
    #[serde(default)]
    pub size: i32,
    #[serde(rename = "type", default)]
    pub property_type: PropertyType,
}

impl CatalogProperty {
    pub fn descriptor(&self) -> PropertyDescriptor {
        PropertyDescriptor::new(self.offset, self.size, self.property_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogClass {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<CatalogProperty>,
}

/// Classes and properties as dumped from the foreign runtime's metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyCatalog {
    /// Build string of the foreign runtime the offsets were taken from
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub classes: Vec<CatalogClass>,
}

impl PropertyCatalog {
    pub fn num_properties(&self) -> usize {
        self.classes.iter().map(|class| class.properties.len()).sum()
    }

    fn validate(&self) -> Result<()> {
        for class in &self.classes {
            if class.name.is_empty() {
                return Err(Error::InvalidCatalog("class with an empty name".to_string()));
            }
            for property in &class.properties {
                if property.name.is_empty() {
                    return Err(Error::InvalidCatalog(format!(
                        "property with an empty name in class {}",
                        class.name
                    )));
                }
                if property.size < 0 {
                    return Err(Error::InvalidCatalog(format!(
                        "property {}::{} has negative size {}",
                        class.name, property.name, property.size
                    )));
                }
                if property.offset < PropertyDescriptor::UNRESOLVED_OFFSET {
                    return Err(Error::InvalidCatalog(format!(
                        "property {}::{} has invalid offset {}",
                        class.name, property.name, property.offset
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Parse a catalog from JSON text
pub fn parse_catalog(content: &str) -> Result<PropertyCatalog> {
    let catalog: PropertyCatalog = serde_json::from_str(content)?;
    catalog.validate()?;
    Ok(catalog)
}

/// Load a catalog from a JSON file
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<PropertyCatalog> {
    let content = fs::read_to_string(&path)?;
    let catalog = parse_catalog(&content)?;
    info!(
        "Loaded property catalog {} ({} classes, {} properties)",
        if catalog.version.is_empty() { "<unversioned>" } else { catalog.version.as_str() },
        catalog.classes.len(),
        catalog.num_properties()
    );
    Ok(catalog)
}

/// Save a catalog to a JSON file
pub fn save_catalog<P: AsRef<Path>>(path: P, catalog: &PropertyCatalog) -> Result<()> {
    let content = serde_json::to_string_pretty(catalog)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    const SAMPLE: &str = r#"{
        "version": "++Fortnite+Release-4.1",
        "classes": [
            { "name": "Pawn",
              "properties": [
                { "name": "Health", "offset": 808, "size": 4, "type": "FloatProperty" },
                { "name": "Controller", "offset": 1064, "size": 8, "type": "ObjectProperty" },
                { "name": "Shield", "size": 4, "type": "FloatProperty" }
              ] },
            { "name": "Actor" }
        ]
    }"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = parse_catalog(SAMPLE).unwrap();
        assert_eq!(catalog.version, "++Fortnite+Release-4.1");
        assert_eq!(catalog.classes.len(), 2);
        assert_eq!(catalog.num_properties(), 3);

        let health = &catalog.classes[0].properties[0];
        assert_eq!(health.descriptor(), PropertyDescriptor::new(808, 4, PropertyType::Float));

        let shield = &catalog.classes[0].properties[2];
        assert_eq!(shield.offset, PropertyDescriptor::UNRESOLVED_OFFSET);
        assert!(!shield.descriptor().is_resolved());
    }

    #[test]
    fn test_unknown_type_is_kept_as_unknown() {
        let catalog = parse_catalog(
            r#"{ "classes": [ { "name": "A", "properties": [
                { "name": "P", "offset": 0, "size": 16, "type": "FieldPathProperty" } ] } ] }"#,
        )
        .unwrap();
        assert_eq!(
            catalog.classes[0].properties[0].property_type,
            PropertyType::Unknown
        );
    }

    #[test]
    fn test_invalid_catalog_rejected() {
        let err = parse_catalog(
            r#"{ "classes": [ { "name": "A", "properties": [
                { "name": "P", "offset": -7, "size": 4, "type": "IntProperty" } ] } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidCatalog(_)));

        let err = parse_catalog("{ not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_save_and_load_catalog() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let catalog = parse_catalog(SAMPLE).unwrap();
        save_catalog(&path, &catalog).unwrap();
        let loaded = load_catalog(&path).unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn test_load_missing_catalog() {
        let dir = tempdir().unwrap();
        let err = load_catalog(dir.path().join("missing.json")).unwrap_err();
        assert!(err.is_not_found());
    }
}
