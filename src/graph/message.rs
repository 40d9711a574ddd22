//! Message-family types
//!
//! Resolved message and enum declarations. References between types are arena
//! indexes into the owning [`SchemaGraph`](super::SchemaGraph).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::wire::WireKind;

/// Largest field number representable in a tag
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Index of a message type in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub(crate) usize);

/// Index of an enum type in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnumId(pub(crate) usize);

impl MessageId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl EnumId {
    pub fn index(self) -> usize {
        self.0
    }
}

// =============================================================================
// Scalar Kinds
// =============================================================================

/// Built-in scalar field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarKind {
    /// Parse a scalar keyword as written in a field declaration
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "double" => Some(Self::Double),
            "float" => Some(Self::Float),
            "int32" => Some(Self::Int32),
            "int64" => Some(Self::Int64),
            "uint32" => Some(Self::Uint32),
            "uint64" => Some(Self::Uint64),
            "sint32" => Some(Self::Sint32),
            "sint64" => Some(Self::Sint64),
            "fixed32" => Some(Self::Fixed32),
            "fixed64" => Some(Self::Fixed64),
            "sfixed32" => Some(Self::Sfixed32),
            "sfixed64" => Some(Self::Sfixed64),
            "bool" => Some(Self::Bool),
            "string" => Some(Self::String),
            "bytes" => Some(Self::Bytes),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
            Self::Fixed32 => "fixed32",
            Self::Fixed64 => "fixed64",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }

    /// Wire kind used for a single (unpacked) value of this scalar
    pub fn wire_kind(self) -> WireKind {
        match self {
            Self::Int32
            | Self::Int64
            | Self::Uint32
            | Self::Uint64
            | Self::Sint32
            | Self::Sint64
            | Self::Bool => WireKind::Varint,
            Self::Fixed64 | Self::Sfixed64 | Self::Double => WireKind::Fixed64,
            Self::Fixed32 | Self::Sfixed32 | Self::Float => WireKind::Fixed32,
            Self::String | Self::Bytes => WireKind::LengthDelimited,
        }
    }

    /// Whether repeated values of this kind may be packed
    pub fn is_packable(self) -> bool {
        !matches!(self, Self::String | Self::Bytes)
    }

    /// Inclusive integer range accepted by integral kinds
    pub fn int_range(self) -> Option<(i64, i64)> {
        match self {
            Self::Int32 | Self::Sint32 | Self::Sfixed32 => {
                Some((i64::from(i32::MIN), i64::from(i32::MAX)))
            }
            Self::Uint32 | Self::Fixed32 => Some((0, i64::from(u32::MAX))),
            Self::Uint64 | Self::Fixed64 => Some((0, i64::MAX)),
            Self::Int64 | Self::Sint64 | Self::Sfixed64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

// =============================================================================
// Fields and Messages
// =============================================================================

/// Resolved type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Scalar(ScalarKind),
    /// Reference to a message type
    Message(MessageId),
    /// Reference to a named primitive (enum) type
    Enum(EnumId),
}

impl FieldType {
    pub fn wire_kind(self) -> WireKind {
        match self {
            FieldType::Scalar(kind) => kind.wire_kind(),
            FieldType::Message(_) => WireKind::LengthDelimited,
            FieldType::Enum(_) => WireKind::Varint,
        }
    }

    pub fn is_packable(self) -> bool {
        match self {
            FieldType::Scalar(kind) => kind.is_packable(),
            FieldType::Message(_) => false,
            FieldType::Enum(_) => true,
        }
    }
}

/// A single numbered field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub number: u32,
    pub ty: FieldType,
    pub repeated: bool,
}

/// A resolved message type
#[derive(Debug, Clone, Serialize)]
pub struct MessageType {
    /// Bare name (e.g. "Order")
    pub name: String,
    /// Package-qualified name (e.g. "shop.orders.Order")
    pub full_name: String,
    /// Name of the unit that declared this type
    pub unit: String,
    /// Fields in declaration order
    pub fields: Vec<FieldSpec>,
    #[serde(skip)]
    by_number: HashMap<u32, usize>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
    /// Field indexes sorted by ascending number
    #[serde(skip)]
    encode_order: Vec<usize>,
}

impl MessageType {
    pub(crate) fn new(
        name: String,
        full_name: String,
        unit: String,
        fields: Vec<FieldSpec>,
    ) -> Self {
        let by_number = fields.iter().enumerate().map(|(i, f)| (f.number, i)).collect();
        let by_name = fields.iter().enumerate().map(|(i, f)| (f.name.clone(), i)).collect();
        let mut encode_order: Vec<usize> = (0..fields.len()).collect();
        encode_order.sort_by_key(|&i| fields[i].number);
        Self {
            name,
            full_name,
            unit,
            fields,
            by_number,
            by_name,
            encode_order,
        }
    }

    pub fn field_by_number(&self, number: u32) -> Option<&FieldSpec> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldSpec> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Fields in ascending field-number order
    pub fn fields_by_number(&self) -> impl Iterator<Item = &FieldSpec> {
        self.encode_order.iter().map(move |&i| &self.fields[i])
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name && self.unit == other.unit && self.fields == other.fields
    }
}

/// A resolved enum type: named integer symbols
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub full_name: String,
    pub unit: String,
    /// `(symbol, number)` pairs in declaration order
    pub values: Vec<(String, i32)>,
}

impl EnumType {
    pub fn number_of(&self, symbol: &str) -> Option<i32> {
        self.values.iter().find(|(s, _)| s == symbol).map(|(_, n)| *n)
    }

    pub fn symbol_of(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, n)| *n == number)
            .map(|(s, _)| s.as_str())
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(s, _)| s.as_str())
    }
}
