//! Configuration-family schema nodes
//!
//! A recursive tree describing valid configuration objects: typed properties,
//! string enums, closed/open objects and mutually exclusive `oneOf` variants.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Primitive kinds a configuration property can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    /// Any numeric value (integers are accepted by widening)
    Number,
    /// Integral numbers only
    Integer,
    Bool,
}

impl PrimitiveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Bool => "boolean",
        }
    }
}

/// An object shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, ConfigSchema>,
    #[serde(default)]
    pub required: BTreeSet<String>,
    /// Reject keys not listed in `properties`
    #[serde(default)]
    pub closed: bool,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn property(mut self, name: impl Into<String>, schema: ConfigSchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn require(mut self, name: impl Into<String>) -> Self {
        self.required.insert(name.into());
        self
    }

    pub fn closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }

    /// Label used in diagnostics
    pub fn label(&self, index: usize) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("option {}", index))
    }
}

/// A `oneOf` list of object shapes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub options: Vec<ObjectSchema>,
}

/// A configuration schema node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigSchema {
    Object(ObjectSchema),
    Variant(VariantSchema),
    EnumString { allowed: BTreeSet<String> },
    Primitive { primitive: PrimitiveKind },
}

impl ConfigSchema {
    pub fn string() -> Self {
        ConfigSchema::Primitive { primitive: PrimitiveKind::String }
    }

    pub fn number() -> Self {
        ConfigSchema::Primitive { primitive: PrimitiveKind::Number }
    }

    pub fn integer() -> Self {
        ConfigSchema::Primitive { primitive: PrimitiveKind::Integer }
    }

    pub fn boolean() -> Self {
        ConfigSchema::Primitive { primitive: PrimitiveKind::Bool }
    }

    pub fn string_enum<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConfigSchema::EnumString {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    pub fn one_of(options: Vec<ObjectSchema>) -> Self {
        ConfigSchema::Variant(VariantSchema { title: None, options })
    }

    /// Short description for diagnostics
    pub fn describe(&self) -> String {
        match self {
            ConfigSchema::Object(o) => match &o.title {
                Some(t) => format!("object `{}`", t),
                None => "object".to_string(),
            },
            ConfigSchema::Variant(v) => format!("oneOf({} options)", v.options.len()),
            ConfigSchema::EnumString { .. } => "string enum".to_string(),
            ConfigSchema::Primitive { primitive } => primitive.as_str().to_string(),
        }
    }
}

impl From<ObjectSchema> for ConfigSchema {
    fn from(object: ObjectSchema) -> Self {
        ConfigSchema::Object(object)
    }
}
