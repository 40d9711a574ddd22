//! schema-wire
//!
//! Schema resolution, validation and field-tagged binary encoding for two
//! schema families:
//!
//! - **Message schemas**: packages of numbered, typed fields and enums that
//!   import each other by unit name
//! - **Configuration schemas**: JSON Schema style objects with required
//!   properties, closed objects, string enums and `oneOf` variants
//!
//! ## Features
//!
//! - **Resolution**: cross-unit references bound to arena indexes, with
//!   fuzzy "did you mean" suggestions and cycle detection
//! - **Validation**: every violation collected in one pass, each with a path
//!   and a stable code
//! - **Wire Codec**: deterministic encoding; decoding skips unknown fields
//!
//! ## Architecture
//!
//! ```text
//! SchemaUnit ──▶ Resolver ──▶ SchemaGraph (immutable, Send + Sync)
//!                                 │
//!                   ┌─────────────┴─────────────┐
//!                   ▼                           ▼
//!               Validator                   WireCodec
//!          Value ─▶ ValidationReport    Value ◀─▶ Bytes
//! ```

pub mod checksum;
pub mod config;
pub mod error;
pub mod graph;
pub mod validate;
pub mod value;
pub mod wire;

pub use checksum::Checksum;
pub use config::SchemaWireConfig;
pub use error::{ResolutionError, Result, SchemaError, WireError};
pub use graph::{
    load_units_from_directory, resolve_units, ConfigSchema, DirectorySource, MessageId,
    Resolver, SchemaGraph, SchemaUnit,
};
pub use validate::{
    validate_config_schema, FieldPath, ValidationOptions, ValidationReport, Validator, Violation,
    ViolationKind,
};
pub use value::{Record, Value};
pub use wire::{WireCodec, WireKind, WireOptions};
