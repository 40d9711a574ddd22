//! Schema Units
//!
//! Parsed-but-unresolved schema declarations as supplied by callers. One unit
//! corresponds to one schema source file: either a package of message and enum
//! declarations, or a single configuration document.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ResolutionError;

/// A schema unit of either family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum SchemaUnit {
    Message(MessageUnit),
    Config(ConfigUnit),
}

impl SchemaUnit {
    pub fn name(&self) -> &str {
        match self {
            SchemaUnit::Message(u) => &u.name,
            SchemaUnit::Config(u) => &u.name,
        }
    }

    /// Units this one imports (always empty for config units)
    pub fn imports(&self) -> &[String] {
        match self {
            SchemaUnit::Message(u) => &u.imports,
            SchemaUnit::Config(_) => &[],
        }
    }
}

impl From<MessageUnit> for SchemaUnit {
    fn from(unit: MessageUnit) -> Self {
        SchemaUnit::Message(unit)
    }
}

impl From<ConfigUnit> for SchemaUnit {
    fn from(unit: ConfigUnit) -> Self {
        SchemaUnit::Config(unit)
    }
}

/// A package of message and enum declarations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageUnit {
    /// Unit name as used by imports (e.g. "common/address.proto")
    pub name: String,
    /// Package namespace (e.g. "shop.common")
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub messages: Vec<MessageDecl>,
    #[serde(default)]
    pub enums: Vec<EnumDecl>,
}

impl MessageUnit {
    pub fn new(name: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            ..Self::default()
        }
    }

    pub fn import(mut self, unit: impl Into<String>) -> Self {
        self.imports.push(unit.into());
        self
    }

    pub fn message(mut self, message: MessageDecl) -> Self {
        self.messages.push(message);
        self
    }

    pub fn enumeration(mut self, decl: EnumDecl) -> Self {
        self.enums.push(decl);
        self
    }

    /// Qualify a bare type name with this unit's package
    pub fn qualify(&self, name: &str) -> String {
        if self.package.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.package, name)
        }
    }
}

/// A message declaration with unresolved field types
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDecl {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

impl MessageDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a singular field
    pub fn field(
        mut self,
        name: impl Into<String>,
        number: u32,
        type_name: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            number,
            type_name: type_name.into(),
            repeated: false,
        });
        self
    }

    /// Add a repeated field
    pub fn repeated(
        mut self,
        name: impl Into<String>,
        number: u32,
        type_name: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            number,
            type_name: type_name.into(),
            repeated: true,
        });
        self
    }
}

/// A field declaration: `[repeated] type name = number`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub number: u32,
    /// Scalar keyword, bare type name or package-qualified type name
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub repeated: bool,
}

/// An enum declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    pub values: Vec<EnumValueDecl>,
}

impl EnumDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, name: impl Into<String>, number: i32) -> Self {
        self.values.push(EnumValueDecl {
            name: name.into(),
            number,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValueDecl {
    pub name: String,
    pub number: i32,
}

/// A configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigUnit {
    pub name: String,
    /// JSON Schema style document
    pub document: serde_json::Value,
}

impl ConfigUnit {
    pub fn new(name: impl Into<String>, document: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            document,
        }
    }
}

// =============================================================================
// Unit Sources
// =============================================================================

/// Supplies imported units on demand during resolution
pub trait UnitSource {
    /// Load a unit by import name. `Ok(None)` means the source does not know it.
    fn load_unit(&self, name: &str) -> Result<Option<SchemaUnit>, ResolutionError>;
}

/// A source that never provides anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSource;

impl UnitSource for NoSource {
    fn load_unit(&self, _name: &str) -> Result<Option<SchemaUnit>, ResolutionError> {
        Ok(None)
    }
}

/// In-memory source keyed by unit name
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    units: HashMap<String, SchemaUnit>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(mut self, unit: impl Into<SchemaUnit>) -> Self {
        let unit = unit.into();
        self.units.insert(unit.name().to_string(), unit);
        self
    }
}

impl UnitSource for MemorySource {
    fn load_unit(&self, name: &str) -> Result<Option<SchemaUnit>, ResolutionError> {
        Ok(self.units.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_message_unit() {
        let unit: SchemaUnit = serde_json::from_value(json!({
            "family": "message",
            "name": "order.proto",
            "package": "shop",
            "imports": ["common/address.proto"],
            "messages": [
                { "name": "Order", "fields": [
                    { "name": "order_id", "number": 1, "type": "string" },
                    { "name": "items", "number": 2, "type": "OrderItem", "repeated": true }
                ]}
            ]
        }))
        .unwrap();

        let SchemaUnit::Message(unit) = unit else {
            panic!("Expected message unit");
        };
        assert_eq!(unit.imports, vec!["common/address.proto"]);
        assert_eq!(unit.messages[0].fields.len(), 2);
        assert!(unit.messages[0].fields[1].repeated);
        assert!(!unit.messages[0].fields[0].repeated);
    }

    #[test]
    fn test_deserialize_config_unit() {
        let unit: SchemaUnit = serde_json::from_value(json!({
            "family": "config",
            "name": "mqtt",
            "document": { "type": "object" }
        }))
        .unwrap();
        assert_eq!(unit.name(), "mqtt");
        assert!(unit.imports().is_empty());
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new().with_unit(MessageUnit::new("a.proto", "a"));
        assert!(source.load_unit("a.proto").unwrap().is_some());
        assert!(source.load_unit("b.proto").unwrap().is_none());
    }

    #[test]
    fn test_qualify() {
        assert_eq!(MessageUnit::new("u", "shop.common").qualify("Address"), "shop.common.Address");
        assert_eq!(MessageUnit::new("u", "").qualify("Address"), "Address");
    }
}
