//! Error types for resolution, wire coding and the crate surface

use thiserror::Error;

use crate::validate::Violation;

/// Result type for crate-level operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Top-level error for everything the crate exposes
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("Validation failed with {} violation(s)", .violations.len())]
    ValidationFailed { violations: Vec<Violation> },

    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

/// Fatal errors raised while building a schema graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Unresolved reference `{name}` in {referrer}{}", did_you_mean(.suggestion))]
    UnresolvedReference {
        /// Where the reference was written (e.g. "shop.Order.shipping_address")
        referrer: String,
        name: String,
        suggestion: Option<String>,
    },

    #[error("Ambiguous reference `{name}` in {referrer}: candidates {candidates:?}")]
    AmbiguousReference {
        referrer: String,
        name: String,
        candidates: Vec<String>,
    },

    #[error("Schema cycle through non-repeated fields: {}", .chain.join(" -> "))]
    SchemaCycle { chain: Vec<String> },

    #[error("Duplicate field number {number} in {message}: `{first}` and `{second}`")]
    DuplicateFieldNumber {
        message: String,
        number: u32,
        first: String,
        second: String,
    },

    #[error("Duplicate field name `{field}` in {message}")]
    DuplicateFieldName { message: String, field: String },

    #[error("Duplicate type name `{name}` (declared in {first_unit} and {second_unit})")]
    DuplicateTypeName {
        name: String,
        first_unit: String,
        second_unit: String,
    },

    #[error("Invalid field number {number} for {message}.{field}")]
    InvalidFieldNumber {
        message: String,
        field: String,
        number: u32,
    },

    #[error("Invalid identifier `{identifier}` in unit {unit}")]
    InvalidIdentifier { unit: String, identifier: String },

    #[error("Invalid enum {name}: {reason}")]
    InvalidEnum { name: String, reason: String },

    #[error("Unit `{name}` imported by {imported_by} could not be found")]
    MissingUnit { name: String, imported_by: String },

    #[error("Invalid config schema in {unit} at {path}: {reason}")]
    InvalidConfigSchema {
        unit: String,
        path: String,
        reason: String,
    },

    #[error("Failed to load unit {name}: {reason}")]
    UnitLoad { name: String, reason: String },
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean `{}`?)", s),
        None => String::new(),
    }
}

/// Errors raised by the wire codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Wire type mismatch for {message}.{field}: expected {expected}, found {found}")]
    WireTypeMismatch {
        message: String,
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Truncated message: needed {needed} byte(s), {remaining} remaining")]
    TruncatedMessage { needed: usize, remaining: usize },

    #[error("Malformed varint")]
    MalformedVarint,

    #[error("Invalid wire kind {0}")]
    InvalidWireKind(u8),

    #[error("Invalid field number in tag (0 or above 536870911)")]
    InvalidFieldNumber,

    #[error("Invalid UTF-8 in string field {field}")]
    InvalidUtf8 { field: String },

    #[error("Integer overflow decoding {field}")]
    IntegerOverflow { field: String },

    #[error("Recursion limit of {limit} exceeded")]
    RecursionLimit { limit: usize },

    #[error("Message of {size} bytes exceeds limit of {limit}")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("Cannot encode {path}: expected {expected}, found {found}")]
    EncodeMismatch {
        path: String,
        expected: String,
        found: &'static str,
    },

    #[error("Unknown field `{field}` for message {message}")]
    UnknownField { message: String, field: String },

    #[error("Unknown message type: {0}")]
    UnknownMessage(String),
}
