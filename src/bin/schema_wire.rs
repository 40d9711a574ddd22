//! schema-wire CLI
//!
//! Resolves schema units from disk, validates JSON values against them and
//! converts between JSON and the wire format.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use schema_wire::graph::{load_units_with, DirectorySource, Resolver};
use schema_wire::{SchemaGraph, SchemaWireConfig, Validator, Value, WireCodec};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-wire")]
#[command(about = "Resolve, validate and encode message and configuration schemas")]
struct Cli {
    /// Configuration file (defaults to schema-wire.toml lookup)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Directory of schema units (repeatable, overrides [resolver] unit_dirs)
    #[arg(short, long = "units", global = true)]
    units: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve all units and print the graph summary
    Resolve,

    /// Validate a JSON value against a config unit or message type
    Validate {
        /// Config unit name or message name
        #[arg(short, long)]
        schema: String,
        /// JSON file holding the value
        value: PathBuf,
    },

    /// Encode a JSON value as a message and print hex
    Encode {
        #[arg(short, long)]
        message: String,
        /// JSON file holding the value
        value: PathBuf,
    },

    /// Decode a hex payload as a message and print JSON
    Decode {
        #[arg(short, long)]
        message: String,
        /// Payload as hex
        hex: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match SchemaWireConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load configuration: {}", e);
            std::process::exit(2);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli, &config) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// Returns `Ok(false)` when the command ran but found violations
fn run(cli: Cli, config: &SchemaWireConfig) -> anyhow::Result<bool> {
    let dirs = if cli.units.is_empty() {
        config.resolver.unit_dirs.clone()
    } else {
        cli.units.clone()
    };
    let graph = build_graph(&dirs, config)?;

    match cli.command {
        Commands::Resolve => {
            for id in graph.message_ids() {
                let message = graph.message_by_id(id);
                let recursive = if graph.is_recursive(id) { ", recursive" } else { "" };
                println!(
                    "message {} ({} fields, {} dependents{})",
                    message.full_name,
                    message.fields.len(),
                    graph.dependents(id).len(),
                    recursive
                );
            }
            for enum_type in graph.enums() {
                println!("enum    {} ({} values)", enum_type.full_name, enum_type.values.len());
            }
            for def in graph.configs() {
                println!("config  {} ({})", def.name, def.schema.describe());
            }
            println!();
            println!("fingerprint {}", graph.fingerprint());
            Ok(true)
        }

        Commands::Validate { schema, value } => {
            if graph.lookup(&schema).is_none() {
                bail!("unknown schema `{}`{}", schema, did_you_mean(&graph, &schema, None));
            }
            let value = read_value(&value)?;
            let report = Validator::with_options(&graph, config.validation_options())
                .validate(&schema, &value)?;
            if report.is_valid() {
                println!("✅ valid");
                return Ok(true);
            }
            for violation in &report.violations {
                println!("❌ {}", violation);
            }
            Ok(false)
        }

        Commands::Encode { message, value } => {
            ensure_message(&graph, &message)?;
            let value = read_value(&value)?;
            let bytes = WireCodec::with_options(&graph, config.wire_options())
                .encode_by_name(&message, &value)?;
            println!("{}", hex::encode(&bytes));
            Ok(true)
        }

        Commands::Decode { message, hex: payload } => {
            ensure_message(&graph, &message)?;
            let data = hex::decode(payload.trim()).context("payload is not valid hex")?;
            let value = WireCodec::with_options(&graph, config.wire_options())
                .decode_by_name(&message, &data)?;
            println!("{}", serde_json::to_string_pretty(&value.to_json())?);
            Ok(true)
        }
    }
}

fn build_graph(dirs: &[PathBuf], config: &SchemaWireConfig) -> anyhow::Result<SchemaGraph> {
    let Some((first, rest)) = dirs.split_first() else {
        bail!("no unit directories given");
    };

    let mut source = DirectorySource::new(first);
    for dir in rest {
        source = source.with_root(dir);
    }

    let mut resolver = Resolver::new()
        .with_source(source)
        .strict_identifiers(config.resolver.strict_identifiers);

    for dir in dirs {
        let units = load_units_with(dir, &config.load_config())
            .with_context(|| format!("loading units from {}", dir.display()))?;
        debug!(dir = %dir.display(), count = units.len(), "unit directory scanned");
        for unit in units {
            resolver.add_unit(unit);
        }
    }

    Ok(resolver.resolve()?)
}

fn ensure_message(graph: &SchemaGraph, name: &str) -> anyhow::Result<()> {
    if graph.message(name).is_none() {
        bail!("unknown message `{}`{}", name, did_you_mean(graph, name, Some("message")));
    }
    Ok(())
}

/// Closest known names for an unknown one, formatted for an error line
fn did_you_mean(graph: &SchemaGraph, name: &str, family: Option<&str>) -> String {
    let names: Vec<String> = graph
        .search(name, 10)
        .into_iter()
        .filter(|r| family.map_or(true, |f| r.family == f))
        .take(3)
        .map(|r| format!("`{}`", r.name))
        .collect();
    if names.is_empty() {
        String::new()
    } else {
        format!(" (did you mean {}?)", names.join(", "))
    }
}

fn read_value(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(Value::from(json))
}
