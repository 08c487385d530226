//! # fort-sdk
//!
//! Mirrored memory layouts of a closed-source game runtime.
//!
//! This crate provides:
//! - Containers laid out bit-for-bit like the runtime's (`TArray`,
//!   `TBitArray`, `TSparseArray`, `TSet`, `TMap`, `FString`), usable both as
//!   local values and as in-place views over foreign addresses
//! - The runtime's slack growth policy, reproduced exactly
//! - A property registry mapping `(class, property)` names to byte offsets,
//!   seeded from a JSON catalog, and a typed field accessor over it
//! - Contract-check macros that stop the process on a layout defect
//!
//! Addresses are trusted inputs. Nothing here validates that a foreign
//! object is still alive, and no container is internally synchronized.

pub mod checks;
pub mod containers;
pub mod error;
pub mod memory;
pub mod prelude;
pub mod reflection;

pub use containers::{
    FSetElementId, FString, INDEX_NONE, SizeType, TArray, TBitArray, TMap, TPair, TSet,
    TSparseArray, TypeHash,
};
pub use error::{Error, Result};
pub use memory::Address;
pub use reflection::{
    FieldAccessor, FieldType, FieldValue, PropertyCatalog, PropertyDescriptor, PropertyRegistry,
    PropertyRegistryBuilder, PropertyType, load_catalog, parse_catalog, save_catalog,
};
