//! Unit Loading
//!
//! Reads schema units from the filesystem. Two file shapes are recognised:
//!
//! - `<name>.schema.json` holds a configuration document and becomes a config
//!   unit called `<name>`
//! - any other `*.json` file with a `family` key must hold a serialized
//!   [`SchemaUnit`]; a file that fails to deserialize is an error
//!
//! JSON files without a `family` key are skipped with a warning.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::unit::{ConfigUnit, SchemaUnit, UnitSource};
use crate::error::ResolutionError;

const CONFIG_SUFFIX: &str = ".schema.json";

/// Configuration for directory scans
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Skip files whose relative path starts with one of these prefixes
    pub skip_prefixes: Vec<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: vec![
                "target/".to_string(),
                ".git/".to_string(),
                "node_modules/".to_string(),
            ],
        }
    }
}

/// Load every unit under `dir`, in path order
pub fn load_units_from_directory(dir: &Path) -> Result<Vec<SchemaUnit>, ResolutionError> {
    load_units_with(dir, &LoadConfig::default())
}

pub fn load_units_with(
    dir: &Path,
    config: &LoadConfig,
) -> Result<Vec<SchemaUnit>, ResolutionError> {
    if !dir.is_dir() {
        return Err(ResolutionError::UnitLoad {
            name: dir.display().to_string(),
            reason: "not a directory".to_string(),
        });
    }

    let mut units = Vec::new();
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path.extension().map_or(true, |ext| ext != "json") {
            continue;
        }

        let relative = path.strip_prefix(dir).unwrap_or(path);
        let relative_str = relative.to_string_lossy().replace('\\', "/");
        if config.skip_prefixes.iter().any(|p| relative_str.starts_with(p)) {
            continue;
        }

        match read_unit_file(path)? {
            Some(unit) => {
                debug!(unit = %unit.name(), path = %relative_str, "loaded unit");
                units.push(unit);
            }
            None => warn!(path = %relative_str, "skipping JSON file that is not a schema unit"),
        }
    }

    Ok(units)
}

/// Read one unit file. `Ok(None)` means valid JSON without a `family` tag.
pub fn read_unit_file(path: &Path) -> Result<Option<SchemaUnit>, ResolutionError> {
    let load_error = |reason: String| ResolutionError::UnitLoad {
        name: path.display().to_string(),
        reason,
    };

    let content = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
    let json: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| load_error(e.to_string()))?;

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if let Some(stem) = file_name.strip_suffix(CONFIG_SUFFIX) {
        return Ok(Some(ConfigUnit::new(stem, json).into()));
    }

    // Only a `family` tag marks the file as a unit; other JSON is left alone
    if json.get("family").is_none() {
        return Ok(None);
    }
    serde_json::from_value::<SchemaUnit>(json)
        .map(Some)
        .map_err(|e| load_error(e.to_string()))
}

// =============================================================================
// Directory Source
// =============================================================================

/// Loads imported units lazily from one or more directories
#[derive(Debug, Clone)]
pub struct DirectorySource {
    roots: Vec<PathBuf>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Candidate files for an import name, most specific first
    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let relative = Path::new(name);
        let mut out = Vec::with_capacity(self.roots.len() * 2);
        for root in &self.roots {
            out.push(root.join(format!("{}.json", name)));
            if relative.extension().is_some() {
                out.push(root.join(relative.with_extension("json")));
            }
        }
        out
    }
}

impl UnitSource for DirectorySource {
    fn load_unit(&self, name: &str) -> Result<Option<SchemaUnit>, ResolutionError> {
        for path in self.candidates(name) {
            if !path.is_file() {
                continue;
            }
            debug!(unit = name, path = %path.display(), "loading import from disk");
            let Some(unit) = read_unit_file(&path)? else {
                return Err(ResolutionError::UnitLoad {
                    name: name.to_string(),
                    reason: format!("{} is not a schema unit", path.display()),
                });
            };
            return Ok(Some(unit));
        }
        Ok(None)
    }
}
