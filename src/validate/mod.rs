//! Validation
//!
//! Checks a [`Value`] against a configuration schema or a message type and
//! collects every violation in one pass. Violations are data, not errors: a
//! report with violations is still a successful call.
//!
//! Ordering is deterministic. Missing required properties are reported in
//! sorted order first, then present keys are checked in record order.

mod config;
mod message;
mod path;

pub use path::{FieldPath, PathSegment};

pub(crate) use message::scalar_problem;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SchemaError};
use crate::graph::{ConfigSchema, MessageId, SchemaGraph, SchemaTarget};
use crate::value::Value;

// =============================================================================
// Violation Kinds
// =============================================================================

/// Category of a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A required property is absent
    MissingRequired,
    /// A closed object carries an undeclared property
    UnexpectedProperty,
    /// The value has the wrong tag for its schema
    TypeMismatch,
    /// A string is not in the allowed set (or not an enum symbol)
    EnumViolation,
    /// No `oneOf` option matched
    NoVariantMatched,
    /// More than one `oneOf` option matched
    AmbiguousVariant,
    /// A message record has a key that is not a declared field
    UnknownField,
    /// A number lies outside the range of its scalar kind
    OutOfRange,
    /// Nesting is deeper than the configured limit
    DepthExceeded,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingRequired => "V001",
            Self::UnexpectedProperty => "V002",
            Self::TypeMismatch => "V003",
            Self::EnumViolation => "V004",
            Self::NoVariantMatched => "V005",
            Self::AmbiguousVariant => "V006",
            Self::UnknownField => "V007",
            Self::OutOfRange => "V008",
            Self::DepthExceeded => "V009",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub path: FieldPath,
    pub kind: ViolationKind,
    /// Human-readable explanation
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.path, self.detail)
    }
}

/// Result of validating one value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations of one kind
    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }

    pub fn into_result(self) -> Result<()> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::ValidationFailed {
                violations: self.violations,
            })
        }
    }
}

// =============================================================================
// Validator
// =============================================================================

/// Validation limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Deepest record nesting accepted
    pub max_depth: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// Validates values against a resolved graph
#[derive(Debug, Clone, Copy)]
pub struct Validator<'g> {
    graph: &'g SchemaGraph,
    options: ValidationOptions,
}

impl<'g> Validator<'g> {
    pub fn new(graph: &'g SchemaGraph) -> Self {
        Self {
            graph,
            options: ValidationOptions::default(),
        }
    }

    pub fn with_options(graph: &'g SchemaGraph, options: ValidationOptions) -> Self {
        Self { graph, options }
    }

    /// Validate against a config unit or message type by name
    pub fn validate(&self, target: &str, value: &Value) -> Result<ValidationReport> {
        match self.graph.lookup(target) {
            Some(SchemaTarget::Config(def)) => {
                Ok(validate_config_with(&def.schema, value, self.options))
            }
            Some(SchemaTarget::Message(id)) => Ok(self.validate_message(id, value)),
            None => Err(SchemaError::UnknownSchema(target.to_string())),
        }
    }

    pub fn validate_message(&self, id: MessageId, value: &Value) -> ValidationReport {
        let mut walker = Walker::new(self.options);
        message::check_message(self.graph, &mut walker, id, value, 0);
        walker.into_report()
    }
}

/// Validate a value against a standalone configuration schema
pub fn validate_config_schema(schema: &ConfigSchema, value: &Value) -> ValidationReport {
    validate_config_with(schema, value, ValidationOptions::default())
}

fn validate_config_with(
    schema: &ConfigSchema,
    value: &Value,
    options: ValidationOptions,
) -> ValidationReport {
    let mut walker = Walker::new(options);
    config::check(&mut walker, schema, value, 0);
    walker.into_report()
}

/// Shared traversal state: the current path and collected violations
pub(crate) struct Walker {
    path: FieldPath,
    violations: Vec<Violation>,
    max_depth: usize,
}

impl Walker {
    fn new(options: ValidationOptions) -> Self {
        Self {
            path: FieldPath::root(),
            violations: Vec::new(),
            max_depth: options.max_depth,
        }
    }

    /// A walker starting at the same path with no violations yet
    fn fork(&self) -> Self {
        Self {
            path: self.path.clone(),
            violations: Vec::new(),
            max_depth: self.max_depth,
        }
    }

    fn report(&mut self, kind: ViolationKind, detail: impl Into<String>) {
        self.violations.push(Violation {
            path: self.path.clone(),
            kind,
            detail: detail.into(),
        });
    }

    fn report_at(&mut self, segment: PathSegment, kind: ViolationKind, detail: impl Into<String>) {
        self.violations.push(Violation {
            path: self.path.child(segment),
            kind,
            detail: detail.into(),
        });
    }

    /// Report `DepthExceeded` and return false when `depth` is over the limit
    fn enter(&mut self, depth: usize) -> bool {
        if depth > self.max_depth {
            let detail = format!("nesting exceeds maximum depth {}", self.max_depth);
            self.report(ViolationKind::DepthExceeded, detail);
            return false;
        }
        true
    }

    fn into_report(self) -> ValidationReport {
        ValidationReport {
            violations: self.violations,
        }
    }
}
