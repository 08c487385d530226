//! Property reflection: where named fields live inside foreign objects.
//!
//! Offsets are only known at run time, from the foreign runtime's own
//! metadata. A [`PropertyCatalog`] carries them in from disk, a
//! [`PropertyRegistry`] freezes them, and a [`FieldAccessor`] applies them
//! to object addresses.

pub mod accessor;
pub mod catalog;
pub mod property;
pub mod registry;

pub use accessor::{FieldAccessor, FieldType, FieldValue};
pub use catalog::{
    CatalogClass, CatalogProperty, PropertyCatalog, load_catalog, parse_catalog, save_catalog,
};
pub use property::{PropertyDescriptor, PropertyType};
pub use registry::{PropertyRegistry, PropertyRegistryBuilder};
