//! Name-to-offset catalog of foreign properties.
//!
//! A registry is assembled once through [`PropertyRegistryBuilder`] and is
//! immutable afterwards. Share it by reference (or behind an `Arc`) with
//! every reader; lookups never lock.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::catalog::PropertyCatalog;
use super::property::PropertyDescriptor;
use crate::error::{Error, Result};

type ClassProperties = BTreeMap<String, PropertyDescriptor>;

/// Frozen `(class, property) -> descriptor` mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyRegistry {
    classes: BTreeMap<String, ClassProperties>,
    version: String,
}

impl PropertyRegistry {
    pub fn builder() -> PropertyRegistryBuilder {
        PropertyRegistryBuilder::default()
    }

    /// Builds a registry holding every property of `catalog`.
    pub fn from_catalog(catalog: &PropertyCatalog) -> Result<Self> {
        Ok(Self::builder().catalog(catalog)?.build())
    }

    /// Descriptor registered for `class::property`.
    pub fn lookup(&self, class: &str, property: &str) -> Option<&PropertyDescriptor> {
        self.classes.get(class)?.get(property)
    }

    /// Like [`lookup`](Self::lookup), but a miss is logged and answered with
    /// [`PropertyDescriptor::UNRESOLVED`].
    pub fn get_property_by_name(&self, class: &str, property: &str) -> PropertyDescriptor {
        match self.lookup(class, property) {
            Some(descriptor) => *descriptor,
            None => {
                warn!("Failed to get {} from class {}", property, class);
                PropertyDescriptor::UNRESOLVED
            }
        }
    }

    /// Class names in sorted order.
    pub fn classes(&self) -> impl Iterator<Item = &str> + '_ {
        self.classes.keys().map(String::as_str)
    }

    /// Properties of one class in sorted order, if the class is known.
    pub fn properties_of(
        &self,
        class: &str,
    ) -> Option<impl Iterator<Item = (&str, &PropertyDescriptor)> + '_> {
        self.classes
            .get(class)
            .map(|properties| properties.iter().map(|(name, descriptor)| (name.as_str(), descriptor)))
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Total number of registered properties.
    pub fn len(&self) -> usize {
        self.classes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Foreign runtime build the offsets belong to, if the source recorded one.
    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Builder for [`PropertyRegistry`]
#[derive(Debug, Clone, Default)]
pub struct PropertyRegistryBuilder {
    classes: BTreeMap<String, ClassProperties>,
    version: Option<String>,
}

impl PropertyRegistryBuilder {
    /// Record the foreign runtime build the offsets were taken from
    pub fn version<S: Into<String>>(mut self, version: S) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Register a class with no properties yet
    pub fn class<S: Into<String>>(mut self, class: S) -> Self {
        self.classes.entry(class.into()).or_default();
        self
    }

    /// Register one property. A second descriptor for the same pair is an error.
    pub fn property<C, P>(mut self, class: C, property: P, descriptor: PropertyDescriptor) -> Result<Self>
    where
        C: Into<String>,
        P: Into<String>,
    {
        let class = class.into();
        let property = property.into();
        let properties = self.classes.entry(class.clone()).or_default();
        if properties.contains_key(&property) {
            return Err(Error::DuplicateProperty { class, property });
        }
        properties.insert(property, descriptor);
        Ok(self)
    }

    /// Register every class and property of `catalog`
    pub fn catalog(mut self, catalog: &PropertyCatalog) -> Result<Self> {
        if !catalog.version.is_empty() {
            self.version = Some(catalog.version.clone());
        }
        for class in &catalog.classes {
            self = self.class(class.name.as_str());
            for property in &class.properties {
                self = self.property(class.name.as_str(), property.name.as_str(), property.descriptor())?;
            }
        }
        Ok(self)
    }

    /// Freeze the registry
    pub fn build(self) -> PropertyRegistry {
        let registry = PropertyRegistry {
            classes: self.classes,
            version: self.version.unwrap_or_default(),
        };
        let unresolved = registry
            .classes
            .values()
            .flat_map(BTreeMap::values)
            .filter(|descriptor| !descriptor.is_resolved())
            .count();
        debug!(
            "Built property registry: {} classes, {} properties ({} unresolved)",
            registry.num_classes(),
            registry.len(),
            unresolved
        );
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::catalog::parse_catalog;
    use crate::reflection::property::PropertyType;

    fn sample_registry() -> PropertyRegistry {
        PropertyRegistry::builder()
            .version("++Fortnite+Release-4.1")
            .property("Pawn", "Health", PropertyDescriptor::new(808, 4, PropertyType::Float))
            .unwrap()
            .property("Pawn", "Controller", PropertyDescriptor::new(1064, 8, PropertyType::Object))
            .unwrap()
            .property("Actor", "Owner", PropertyDescriptor::new(0x108, 8, PropertyType::Object))
            .unwrap()
            .class("Emote")
            .build()
    }

    #[test]
    fn test_lookup_known_property() {
        let registry = sample_registry();
        let health = registry.lookup("Pawn", "Health").unwrap();
        assert_eq!(health.offset, 808);
        assert_eq!(health.property_type, PropertyType::Float);
        assert_eq!(registry.version(), "++Fortnite+Release-4.1");
    }

    #[test]
    fn test_lookup_miss() {
        let registry = sample_registry();
        assert!(registry.lookup("Pawn", "Shield").is_none());
        assert!(registry.lookup("Vehicle", "Health").is_none());
        // Names are case-sensitive
        assert!(registry.lookup("pawn", "health").is_none());
    }

    #[test]
    fn test_get_property_by_name_degrades() {
        let registry = sample_registry();
        assert_eq!(registry.get_property_by_name("Pawn", "Health").offset, 808);
        let missing = registry.get_property_by_name("Pawn", "Shield");
        assert!(!missing.is_resolved());
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let result = PropertyRegistry::builder()
            .property("Pawn", "Health", PropertyDescriptor::new(808, 4, PropertyType::Float))
            .unwrap()
            .property("Pawn", "Health", PropertyDescriptor::new(812, 4, PropertyType::Float));
        match result {
            Err(Error::DuplicateProperty { class, property }) => {
                assert_eq!(class, "Pawn");
                assert_eq!(property, "Health");
            }
            other => panic!("expected a duplicate error, got {:?}", other),
        }
    }

    #[test]
    fn test_listing() {
        let registry = sample_registry();
        let classes: Vec<&str> = registry.classes().collect();
        assert_eq!(classes, vec!["Actor", "Emote", "Pawn"]);
        assert_eq!(registry.num_classes(), 3);
        assert_eq!(registry.len(), 3);

        let pawn: Vec<&str> = registry
            .properties_of("Pawn")
            .unwrap()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(pawn, vec!["Controller", "Health"]);
        assert_eq!(registry.properties_of("Emote").unwrap().count(), 0);
        assert!(registry.properties_of("Vehicle").is_none());
    }

    #[test]
    fn test_from_catalog() {
        let catalog = parse_catalog(
            r#"{ "version": "v1", "classes": [
                { "name": "Pawn", "properties": [
                    { "name": "Health", "offset": 808, "size": 4, "type": "FloatProperty" },
                    { "name": "Shield", "size": 4, "type": "FloatProperty" } ] } ] }"#,
        )
        .unwrap();
        let registry = PropertyRegistry::from_catalog(&catalog).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.version(), "v1");
        assert!(!registry.lookup("Pawn", "Shield").unwrap().is_resolved());
    }

    #[test]
    fn test_from_catalog_with_duplicates() {
        let catalog = parse_catalog(
            r#"{ "classes": [
                { "name": "Pawn", "properties": [ { "name": "Health", "offset": 1, "size": 4 } ] },
                { "name": "Pawn", "properties": [ { "name": "Health", "offset": 2, "size": 4 } ] } ] }"#,
        )
        .unwrap();
        let err = PropertyRegistry::from_catalog(&catalog).unwrap_err();
        assert!(matches!(err, Error::DuplicateProperty { .. }));
    }

    #[test]
    fn test_registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PropertyRegistry>();
    }
}
