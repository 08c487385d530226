//! Prelude module for convenient imports
//!
//! ```ignore
//! use fort_sdk::prelude::*;
//! ```
//!
//! This brings the following into scope:
//!
//! - Containers: `TArray`, `TBitArray`, `TSparseArray`, `TSet`, `TMap`, `FString`
//! - Reflection: `PropertyRegistry`, `PropertyDescriptor`, `PropertyType`, `FieldAccessor`
//! - Error handling: `Error`, `Result`

// Containers
pub use crate::containers::{
    FSetElementId, FString, INDEX_NONE, SizeType, TArray, TBitArray, TMap, TPair, TSet,
    TSparseArray, TypeHash,
};

// Memory views
pub use crate::memory::{Address, address_of};

// Reflection
pub use crate::reflection::{
    FieldAccessor, FieldValue, PropertyCatalog, PropertyDescriptor, PropertyRegistry, PropertyType,
};

// Error handling
pub use crate::error::{Error, Result};
