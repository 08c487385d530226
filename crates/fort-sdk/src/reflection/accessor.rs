//! Reading named fields of foreign objects through a [`PropertyRegistry`].
//!
//! [`FieldAccessor::get`] is the best-effort path: a property the registry
//! cannot place is logged and read as zero, and a placed one is read with no
//! further checks. [`FieldAccessor::try_get`] and [`FieldAccessor::get_ref`]
//! additionally compare the descriptor's size and type tag with the
//! requested Rust type and report any disagreement.

use std::mem::size_of;
use std::ptr;

use tracing::warn;

use super::property::{PropertyDescriptor, PropertyType};
use super::registry::PropertyRegistry;
use crate::containers::{FString, TArray, TMap, TSet};
use crate::error::{Error, Result};
use crate::memory::{self, Address};

/// A Rust type that can stand in for a foreign property.
pub trait FieldType {
    /// Name used in mismatch errors
    const TYPE_NAME: &'static str;

    /// Whether a property of `property_type` may be read as `Self`.
    fn is_compatible(property_type: PropertyType) -> bool;
}

/// A plain value read by copy. `zeroed` is what a failed lookup yields.
pub trait FieldValue: FieldType + Copy {
    fn zeroed() -> Self;
}

macro_rules! impl_numeric_field {
    ($($ty:ty => $($tag:ident)|+),* $(,)?) => {
        $(
            impl FieldType for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);

                fn is_compatible(property_type: PropertyType) -> bool {
                    matches!(property_type, $(PropertyType::$tag)|+)
                }
            }

            impl FieldValue for $ty {
                fn zeroed() -> Self {
                    0 as $ty
                }
            }
        )*
    };
}

// Bool properties may be single bits of a shared byte, so they read as u8.
impl_numeric_field! {
    u8 => Byte | Bool | Enum,
    i8 => Int8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int | Enum,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
}

impl<T> FieldType for *const T {
    const TYPE_NAME: &'static str = "object pointer";

    fn is_compatible(property_type: PropertyType) -> bool {
        property_type.is_object_reference()
    }
}

impl<T> FieldValue for *const T {
    fn zeroed() -> Self {
        ptr::null()
    }
}

impl<T> FieldType for *mut T {
    const TYPE_NAME: &'static str = "object pointer";

    fn is_compatible(property_type: PropertyType) -> bool {
        property_type.is_object_reference()
    }
}

impl<T> FieldValue for *mut T {
    fn zeroed() -> Self {
        ptr::null_mut()
    }
}

impl<T> FieldType for TArray<T> {
    const TYPE_NAME: &'static str = "TArray";

    fn is_compatible(property_type: PropertyType) -> bool {
        property_type == PropertyType::Array
    }
}

impl FieldType for FString {
    const TYPE_NAME: &'static str = "FString";

    fn is_compatible(property_type: PropertyType) -> bool {
        property_type == PropertyType::Str
    }
}

impl<T> FieldType for TSet<T> {
    const TYPE_NAME: &'static str = "TSet";

    fn is_compatible(property_type: PropertyType) -> bool {
        property_type == PropertyType::Set
    }
}

impl<K, V> FieldType for TMap<K, V> {
    const TYPE_NAME: &'static str = "TMap";

    fn is_compatible(property_type: PropertyType) -> bool {
        property_type == PropertyType::Map
    }
}

/// Reads registry-described fields at `object + offset`
#[derive(Debug, Clone, Copy)]
pub struct FieldAccessor<'r> {
    registry: &'r PropertyRegistry,
}

impl<'r> FieldAccessor<'r> {
    pub fn new(registry: &'r PropertyRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r PropertyRegistry {
        self.registry
    }

    /// Resolved descriptor of `class::property`.
    pub fn descriptor(&self, class: &str, property: &str) -> Result<&'r PropertyDescriptor> {
        let descriptor =
            self.registry
                .lookup(class, property)
                .ok_or_else(|| Error::UnknownProperty {
                    class: class.to_string(),
                    property: property.to_string(),
                })?;
        if !descriptor.is_resolved() {
            return Err(Error::UnresolvedProperty {
                class: class.to_string(),
                property: property.to_string(),
            });
        }
        Ok(descriptor)
    }

    /// Resolved descriptor of `class::property`, verified to be readable as
    /// `T`. A zero size or an `Unknown` tag means the metadata did not
    /// record it, and that part of the check is skipped.
    pub fn checked_descriptor<T: FieldType>(
        &self,
        class: &str,
        property: &str,
    ) -> Result<&'r PropertyDescriptor> {
        let descriptor = self.descriptor(class, property)?;
        if descriptor.size != 0 && descriptor.size as usize != size_of::<T>() {
            return Err(Error::SizeMismatch {
                class: class.to_string(),
                property: property.to_string(),
                expected: size_of::<T>(),
                actual: descriptor.size,
            });
        }
        if descriptor.property_type != PropertyType::Unknown
            && !T::is_compatible(descriptor.property_type)
        {
            return Err(Error::TypeMismatch {
                class: class.to_string(),
                property: property.to_string(),
                requested: T::TYPE_NAME,
                actual: descriptor.property_type,
            });
        }
        Ok(descriptor)
    }

    /// Address of `class::property` inside `object`, if resolved.
    pub fn field_address(&self, object: Address, class: &str, property: &str) -> Option<Address> {
        let descriptor = self.descriptor(class, property).ok()?;
        Some(object + descriptor.offset as usize)
    }

    /// Reads `class::property` of `object` as `T`.
    ///
    /// An unknown or unresolved property is logged and yields
    /// [`FieldValue::zeroed`], so a zero result does not prove the field
    /// holds zero. A resolved property is read without checking its size or
    /// type.
    ///
    /// # Safety
    ///
    /// `object` must be the base of a live object of `class` whose layout
    /// matches the registry, and the bytes at the property's offset must be
    /// a valid `T`.
    pub unsafe fn get<T: FieldValue>(&self, object: Address, class: &str, property: &str) -> T {
        match self.descriptor(class, property) {
            Ok(descriptor) => unsafe { memory::read_at(object, descriptor.offset as usize) },
            Err(err) => {
                warn!("Failed to get {} from class {}: {}", property, class, err);
                T::zeroed()
            }
        }
    }

    /// Reads `class::property` of `object` as `T` after checking that the
    /// descriptor's size and type agree with `T`.
    ///
    /// # Safety
    ///
    /// As [`get`](Self::get).
    pub unsafe fn try_get<T: FieldValue>(
        &self,
        object: Address,
        class: &str,
        property: &str,
    ) -> Result<T> {
        let descriptor = self.checked_descriptor::<T>(class, property)?;
        Ok(unsafe { memory::read_at(object, descriptor.offset as usize) })
    }

    /// Borrows `class::property` of `object` in place as a mirrored layout
    /// such as [`TArray`] or [`FString`]. Lookup misses and mismatches are
    /// logged and yield `None`.
    ///
    /// # Safety
    ///
    /// As [`get`](Self::get), and the object must stay live and unmodified
    /// for `'a`.
    pub unsafe fn get_ref<'a, T: FieldType>(
        &self,
        object: Address,
        class: &str,
        property: &str,
    ) -> Option<&'a T> {
        match self.checked_descriptor::<T>(class, property) {
            Ok(descriptor) => Some(unsafe { memory::view(object + descriptor.offset as usize) }),
            Err(err) => {
                warn!("Failed to get {} from class {}: {}", property, class, err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::address_of;

    #[repr(C)]
    struct FakePawn {
        header: [u8; 8],
        health: f32,
        team: i32,
        controller: *const u8,
        name: FString,
        scores: TArray<i32>,
    }

    fn fake_pawn() -> FakePawn {
        FakePawn {
            header: [0xAA; 8],
            health: 87.5,
            team: 3,
            controller: 0x1000 as *const u8,
            name: FString::from("Jonesy"),
            scores: [10, 20, 30].into_iter().collect(),
        }
    }

    fn pawn_registry() -> PropertyRegistry {
        PropertyRegistry::builder()
            .property("Pawn", "Health", PropertyDescriptor::new(8, 4, PropertyType::Float))
            .unwrap()
            .property("Pawn", "TeamIndex", PropertyDescriptor::new(12, 4, PropertyType::Int))
            .unwrap()
            .property("Pawn", "Controller", PropertyDescriptor::new(16, 8, PropertyType::Object))
            .unwrap()
            .property("Pawn", "PlayerName", PropertyDescriptor::new(24, 16, PropertyType::Str))
            .unwrap()
            .property("Pawn", "Scores", PropertyDescriptor::new(40, 16, PropertyType::Array))
            .unwrap()
            .property("Pawn", "Shield", PropertyDescriptor::UNRESOLVED)
            .unwrap()
            .build()
    }

    #[test]
    fn test_get_reads_at_offset() {
        let pawn = fake_pawn();
        let registry = pawn_registry();
        let accessor = FieldAccessor::new(&registry);
        let base = address_of(&pawn);

        let health: f32 = unsafe { accessor.get(base, "Pawn", "Health") };
        let team: i32 = unsafe { accessor.get(base, "Pawn", "TeamIndex") };
        let controller: *const u8 = unsafe { accessor.get(base, "Pawn", "Controller") };
        assert_eq!(health, 87.5);
        assert_eq!(team, 3);
        assert_eq!(controller as usize, 0x1000);
    }

    #[test]
    fn test_get_unknown_returns_zero() {
        let pawn = fake_pawn();
        let registry = pawn_registry();
        let accessor = FieldAccessor::new(&registry);
        let base = address_of(&pawn);

        let missing: i32 = unsafe { accessor.get(base, "Pawn", "Kills") };
        let unresolved: f32 = unsafe { accessor.get(base, "Pawn", "Shield") };
        let pointer: *mut u8 = unsafe { accessor.get(base, "Vehicle", "Driver") };
        assert_eq!(missing, 0);
        assert_eq!(unresolved, 0.0);
        assert!(pointer.is_null());
    }

    #[test]
    fn test_try_get_checks_capability() {
        let pawn = fake_pawn();
        let registry = pawn_registry();
        let accessor = FieldAccessor::new(&registry);
        let base = address_of(&pawn);

        let health: f32 = unsafe { accessor.try_get(base, "Pawn", "Health") }.unwrap();
        assert_eq!(health, 87.5);

        let err = unsafe { accessor.try_get::<i32>(base, "Pawn", "Health") }.unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { requested: "i32", .. }));

        let err = unsafe { accessor.try_get::<f64>(base, "Pawn", "Health") }.unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { expected: 8, actual: 4, .. }));

        let err = unsafe { accessor.try_get::<f32>(base, "Pawn", "Shield") }.unwrap_err();
        assert!(matches!(err, Error::UnresolvedProperty { .. }));

        let err = unsafe { accessor.try_get::<f32>(base, "Pawn", "Kills") }.unwrap_err();
        assert!(matches!(err, Error::UnknownProperty { .. }));
        assert!(err.is_lookup_miss());
    }

    #[test]
    fn test_get_ref_views_containers() {
        let pawn = fake_pawn();
        let registry = pawn_registry();
        let accessor = FieldAccessor::new(&registry);
        let base = address_of(&pawn);

        let name: &FString = unsafe { accessor.get_ref(base, "Pawn", "PlayerName") }.unwrap();
        assert_eq!(name.to_string(), "Jonesy");

        let scores: &TArray<i32> = unsafe { accessor.get_ref(base, "Pawn", "Scores") }.unwrap();
        assert_eq!(scores.as_slice(), &[10, 20, 30]);

        let wrong: Option<&FString> = unsafe { accessor.get_ref(base, "Pawn", "Scores") };
        assert!(wrong.is_none());
    }

    #[test]
    fn test_field_address() {
        let registry = pawn_registry();
        let accessor = FieldAccessor::new(&registry);
        assert_eq!(accessor.field_address(0x1000, "Pawn", "TeamIndex"), Some(0x100C));
        assert_eq!(accessor.field_address(0x1000, "Pawn", "Shield"), None);
    }

    #[test]
    fn test_unknown_tag_skips_type_check() {
        let registry = PropertyRegistry::builder()
            .property("A", "Raw", PropertyDescriptor::new(0, 4, PropertyType::Unknown))
            .unwrap()
            .build();
        let accessor = FieldAccessor::new(&registry);
        let value: u32 = 0xBEEF;
        let read = unsafe { accessor.try_get::<u32>(address_of(&value), "A", "Raw") }.unwrap();
        assert_eq!(read, 0xBEEF);
    }
}
