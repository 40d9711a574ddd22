//! Configuration management for schema-wire
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-wire.toml)
//! - Environment variables (SCHEMA_WIRE__*)
//!
//! ## Example config file (schema-wire.toml):
//! ```toml
//! [resolver]
//! unit_dirs = ["schemas", "vendor/schemas"]
//! strict_identifiers = true
//! skip_prefixes = ["target/", ".git/", "node_modules/"]
//!
//! [validation]
//! max_depth = 64
//!
//! [wire]
//! packed_repeated = false
//! max_decode_depth = 100
//! max_message_bytes = 67108864
//!
//! [logging]
//! filter = "info"
//! ```

use config_crate::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::graph::loader::LoadConfig;
use crate::validate::ValidationOptions;
use crate::wire::WireOptions;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaWireConfig {
    /// Unit discovery and resolution
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Validation limits
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Wire codec settings
    #[serde(default)]
    pub wire: WireConfig,

    /// Log filter used by the CLI
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Directories scanned for schema units
    #[serde(default = "default_unit_dirs")]
    pub unit_dirs: Vec<PathBuf>,

    /// Reject malformed package, type, field and enum symbol names
    #[serde(default = "default_true")]
    pub strict_identifiers: bool,

    /// Relative path prefixes ignored while scanning unit directories
    #[serde(default = "default_skip_prefixes")]
    pub skip_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Deepest record nesting accepted
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireConfig {
    /// Pack repeated numeric fields
    #[serde(default)]
    pub packed_repeated: bool,

    #[serde(default = "default_max_decode_depth")]
    pub max_decode_depth: usize,

    /// Largest payload accepted by the decoder
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when RUST_LOG is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

// Default value functions
fn default_unit_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("schemas")]
}

fn default_skip_prefixes() -> Vec<String> {
    LoadConfig::default().skip_prefixes
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> usize {
    ValidationOptions::default().max_depth
}

fn default_max_decode_depth() -> usize {
    WireOptions::default().max_decode_depth
}

fn default_max_message_bytes() -> usize {
    WireOptions::default().max_message_bytes
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            unit_dirs: default_unit_dirs(),
            strict_identifiers: true,
            skip_prefixes: default_skip_prefixes(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            packed_repeated: false,
            max_decode_depth: default_max_decode_depth(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl SchemaWireConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a required file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "schema-wire.toml",
            ".schema-wire.toml",
            "config/schema-wire.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) =
            directories::ProjectDirs::from("dev", "schema-wire", "schema-wire")
        {
            let xdg_config = config_dir.config_dir().join("schema-wire.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SCHEMA_WIRE__WIRE__PACKED_REPEATED=true
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_WIRE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Parse configuration from TOML text only (no files, no environment)
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn load_config(&self) -> LoadConfig {
        LoadConfig {
            skip_prefixes: self.resolver.skip_prefixes.clone(),
        }
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            max_depth: self.validation.max_depth,
        }
    }

    pub fn wire_options(&self) -> WireOptions {
        WireOptions {
            packed_repeated: self.wire.packed_repeated,
            max_decode_depth: self.wire.max_decode_depth,
            max_message_bytes: self.wire.max_message_bytes,
        }
    }
}
