use thiserror::Error;

use crate::reflection::PropertyType;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid property catalog: {0}")]
    InvalidCatalog(String),

    #[error("Duplicate property {class}::{property}")]
    DuplicateProperty { class: String, property: String },

    #[error("Unknown property {class}::{property}")]
    UnknownProperty { class: String, property: String },

    #[error("Property {class}::{property} has no resolved offset")]
    UnresolvedProperty { class: String, property: String },

    #[error("Property {class}::{property} is {actual} bytes, requested type is {expected} bytes")]
    SizeMismatch {
        class: String,
        property: String,
        expected: usize,
        actual: i32,
    },

    #[error("Property {class}::{property} is a {actual}, cannot be read as {requested}")]
    TypeMismatch {
        class: String,
        property: String,
        requested: &'static str,
        actual: PropertyType,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Lookup misses caused by metadata drift rather than by a bad request.
    pub fn is_lookup_miss(&self) -> bool {
        matches!(
            self,
            Error::UnknownProperty { .. } | Error::UnresolvedProperty { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.is_not_found());

        let other_io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err2 = Error::Io(other_io_err);
        assert!(!err2.is_not_found());
    }

    #[test]
    fn test_error_is_lookup_miss() {
        let unknown = Error::UnknownProperty {
            class: "Pawn".to_string(),
            property: "Health".to_string(),
        };
        assert!(unknown.is_lookup_miss());

        let mismatch = Error::SizeMismatch {
            class: "Pawn".to_string(),
            property: "Health".to_string(),
            expected: 8,
            actual: 4,
        };
        assert!(!mismatch.is_lookup_miss());
    }

    #[test]
    fn test_error_display() {
        let err = Error::TypeMismatch {
            class: "Pawn".to_string(),
            property: "Health".to_string(),
            requested: "i32",
            actual: PropertyType::Float,
        };
        assert_eq!(
            err.to_string(),
            "Property Pawn::Health is a FloatProperty, cannot be read as i32"
        );
    }
}
