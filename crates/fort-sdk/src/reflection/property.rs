use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Property class of the foreign runtime's reflection system.
///
/// Parsed from and displayed as the foreign class name (`"FloatProperty"`).
/// Names this crate does not know become [`PropertyType::Unknown`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
    EnumIter,
)]
#[serde(from = "String", into = "String")]
pub enum PropertyType {
    #[strum(serialize = "BoolProperty")]
    Bool,
    #[strum(serialize = "ByteProperty")]
    Byte,
    #[strum(serialize = "Int8Property")]
    Int8,
    #[strum(serialize = "Int16Property")]
    Int16,
    #[strum(serialize = "UInt16Property")]
    UInt16,
    #[strum(serialize = "IntProperty")]
    Int,
    #[strum(serialize = "UInt32Property")]
    UInt32,
    #[strum(serialize = "Int64Property")]
    Int64,
    #[strum(serialize = "UInt64Property")]
    UInt64,
    #[strum(serialize = "FloatProperty")]
    Float,
    #[strum(serialize = "DoubleProperty")]
    Double,
    #[strum(serialize = "EnumProperty")]
    Enum,
    #[strum(serialize = "NameProperty")]
    Name,
    #[strum(serialize = "StrProperty")]
    Str,
    #[strum(serialize = "TextProperty")]
    Text,
    #[strum(serialize = "ObjectProperty")]
    Object,
    #[strum(serialize = "ClassProperty")]
    Class,
    #[strum(serialize = "WeakObjectProperty")]
    WeakObject,
    #[strum(serialize = "SoftObjectProperty")]
    SoftObject,
    #[strum(serialize = "InterfaceProperty")]
    Interface,
    #[strum(serialize = "StructProperty")]
    Struct,
    #[strum(serialize = "ArrayProperty")]
    Array,
    #[strum(serialize = "SetProperty")]
    Set,
    #[strum(serialize = "MapProperty")]
    Map,
    #[strum(serialize = "DelegateProperty")]
    Delegate,
    #[default]
    #[strum(serialize = "Unknown")]
    Unknown,
}

impl PropertyType {
    /// Parses a foreign property class name, mapping unknown names to
    /// [`PropertyType::Unknown`].
    pub fn from_class_name(name: &str) -> Self {
        name.parse().unwrap_or(Self::Unknown)
    }

    pub fn class_name(&self) -> &'static str {
        self.into()
    }

    /// Holds an address of another object.
    pub fn is_object_reference(&self) -> bool {
        matches!(self, Self::Object | Self::Class | Self::Interface)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::Array | Self::Set | Self::Map)
    }
}

impl From<String> for PropertyType {
    fn from(name: String) -> Self {
        Self::from_class_name(&name)
    }
}

impl From<PropertyType> for String {
    fn from(property_type: PropertyType) -> Self {
        property_type.to_string()
    }
}

/// Where one property lives inside its owning object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Byte offset from the object base, or [`PropertyDescriptor::UNRESOLVED_OFFSET`]
    pub offset: i32,
    /// Size in bytes of the property value
    pub size: i32,
    /// Foreign property class
    #[serde(rename = "type")]
    pub property_type: PropertyType,
}

impl PropertyDescriptor {
    /// Offset of a property the metadata names but does not place
    pub const UNRESOLVED_OFFSET: i32 = -1;

    pub const UNRESOLVED: PropertyDescriptor = PropertyDescriptor {
        offset: Self::UNRESOLVED_OFFSET,
        size: 0,
        property_type: PropertyType::Unknown,
    };

    pub fn new(offset: i32, size: i32, property_type: PropertyType) -> Self {
        Self {
            offset,
            size,
            property_type,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.offset >= 0
    }
}

impl Default for PropertyDescriptor {
    fn default() -> Self {
        Self::UNRESOLVED
    }
}
