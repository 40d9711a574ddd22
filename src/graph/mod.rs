//! Schema Graph
//!
//! The resolved, immutable form of a set of schema units. Message and enum
//! types live in arenas and refer to each other by index, so recursive types
//! need no shared ownership. A petgraph reference graph over the message arena
//! answers dependency queries.
//!
//! A graph is built once by the [`Resolver`] and then only read. It is `Send +
//! Sync` and can be shared across threads for concurrent validation and
//! encoding.

pub mod analysis;
pub mod config_schema;
pub mod loader;
pub mod message;
pub mod patterns;
pub mod resolver;
pub mod unit;

pub use analysis::{EdgeKind, ReferenceGraph};
pub use config_schema::{ConfigSchema, ObjectSchema, PrimitiveKind, VariantSchema};
pub use loader::{load_units_from_directory, load_units_with, DirectorySource, LoadConfig};
pub use message::{
    EnumId, EnumType, FieldSpec, FieldType, MessageId, MessageType, ScalarKind, MAX_FIELD_NUMBER,
};
pub use resolver::{resolve_units, Resolver};
pub use unit::{
    ConfigUnit, EnumDecl, EnumValueDecl, FieldDecl, MemorySource, MessageDecl, MessageUnit,
    NoSource, SchemaUnit, UnitSource,
};

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::checksum::Checksum;

/// A named configuration schema (one per config unit)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigDef {
    pub name: String,
    pub schema: ConfigSchema,
}

/// Anything a value can be validated against
#[derive(Debug, Clone, Copy)]
pub enum SchemaTarget<'g> {
    Message(MessageId),
    Config(&'g ConfigDef),
}

/// A fuzzy search hit
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub name: String,
    pub family: &'static str,
    pub score: i64,
}

/// The resolved schema graph
#[derive(Debug)]
pub struct SchemaGraph {
    /// Names of every unit that took part in resolution, sorted
    pub(crate) units: Vec<String>,

    pub(crate) messages: Vec<MessageType>,
    pub(crate) enums: Vec<EnumType>,
    pub(crate) configs: Vec<ConfigDef>,

    /// Index: full name -> message
    messages_by_name: HashMap<String, MessageId>,
    /// Index: bare name -> messages (bare names can collide across packages)
    messages_by_short_name: HashMap<String, Vec<MessageId>>,
    enums_by_name: HashMap<String, EnumId>,
    configs_by_name: HashMap<String, usize>,

    /// Message reference graph, node `i` is `MessageId(i)`
    pub(crate) refs: ReferenceGraph,
    /// Messages on a (legal) reference cycle
    recursive: HashSet<MessageId>,

    fingerprint: Checksum,
}

/// Stable view hashed into the fingerprint
#[derive(Serialize)]
struct Snapshot<'a> {
    units: &'a [String],
    messages: &'a [MessageType],
    enums: &'a [EnumType],
    configs: &'a [ConfigDef],
}

impl SchemaGraph {
    pub(crate) fn new(
        units: Vec<String>,
        messages: Vec<MessageType>,
        enums: Vec<EnumType>,
        configs: Vec<ConfigDef>,
        refs: ReferenceGraph,
    ) -> Self {
        let mut messages_by_name = HashMap::with_capacity(messages.len());
        let mut messages_by_short_name: HashMap<String, Vec<MessageId>> = HashMap::new();
        for (i, message) in messages.iter().enumerate() {
            messages_by_name.insert(message.full_name.clone(), MessageId(i));
            messages_by_short_name
                .entry(message.name.clone())
                .or_default()
                .push(MessageId(i));
        }

        let enums_by_name = enums
            .iter()
            .enumerate()
            .map(|(i, e)| (e.full_name.clone(), EnumId(i)))
            .collect();
        let configs_by_name = configs
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();

        let recursive = analysis::recursive_messages(&refs);
        let fingerprint = Checksum::from_serializable(&Snapshot {
            units: &units,
            messages: &messages,
            enums: &enums,
            configs: &configs,
        });

        Self {
            units,
            messages,
            enums,
            configs,
            messages_by_name,
            messages_by_short_name,
            enums_by_name,
            configs_by_name,
            refs,
            recursive,
            fingerprint,
        }
    }

    // ========== Lookups ==========

    /// Find a message by full name, or by bare name when only one package
    /// declares it
    pub fn message(&self, name: &str) -> Option<MessageId> {
        let name = name.trim_start_matches('.');
        if let Some(&id) = self.messages_by_name.get(name) {
            return Some(id);
        }
        match self.messages_by_short_name.get(name).map(Vec::as_slice) {
            Some([only]) => Some(*only),
            _ => None,
        }
    }

    pub fn message_by_id(&self, id: MessageId) -> &MessageType {
        &self.messages[id.0]
    }

    pub fn enum_type(&self, name: &str) -> Option<EnumId> {
        self.enums_by_name.get(name.trim_start_matches('.')).copied()
    }

    pub fn enum_by_id(&self, id: EnumId) -> &EnumType {
        &self.enums[id.0]
    }

    pub fn config(&self, name: &str) -> Option<&ConfigDef> {
        self.configs_by_name.get(name).map(|&i| &self.configs[i])
    }

    /// Find a validation target by name. Config unit names take precedence
    /// over message names.
    pub fn lookup(&self, name: &str) -> Option<SchemaTarget<'_>> {
        self.config(name)
            .map(SchemaTarget::Config)
            .or_else(|| self.message(name).map(SchemaTarget::Message))
    }

    pub fn messages(&self) -> &[MessageType] {
        &self.messages
    }

    pub fn message_ids(&self) -> impl Iterator<Item = MessageId> + '_ {
        (0..self.messages.len()).map(MessageId)
    }

    pub fn enums(&self) -> &[EnumType] {
        &self.enums
    }

    pub fn configs(&self) -> &[ConfigDef] {
        &self.configs
    }

    pub fn unit_names(&self) -> &[String] {
        &self.units
    }

    // ========== Graph Queries ==========

    /// Messages referenced directly by `id`'s fields, in name order
    pub fn dependencies(&self, id: MessageId) -> Vec<MessageId> {
        self.neighbours(id, Direction::Outgoing)
    }

    /// Messages whose fields reference `id`, in name order
    pub fn dependents(&self, id: MessageId) -> Vec<MessageId> {
        self.neighbours(id, Direction::Incoming)
    }

    fn neighbours(&self, id: MessageId, direction: Direction) -> Vec<MessageId> {
        let mut out: Vec<MessageId> = self
            .refs
            .edges_directed(NodeIndex::new(id.0), direction)
            .map(|e| match direction {
                Direction::Outgoing => e.target(),
                Direction::Incoming => e.source(),
            })
            .filter_map(|idx| self.refs.node_weight(idx).copied())
            .collect();
        out.sort_by(|a, b| self.messages[a.0].full_name.cmp(&self.messages[b.0].full_name));
        out.dedup();
        out
    }

    /// Whether the message takes part in a reference cycle
    pub fn is_recursive(&self, id: MessageId) -> bool {
        self.recursive.contains(&id)
    }

    /// Search messages, enums and configs by name (fuzzy)
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        let matcher = SkimMatcherV2::default();
        let names = self
            .messages
            .iter()
            .map(|m| (m.full_name.as_str(), "message"))
            .chain(self.enums.iter().map(|e| (e.full_name.as_str(), "enum")))
            .chain(self.configs.iter().map(|c| (c.name.as_str(), "config")));

        let mut results: Vec<SearchResult> = names
            .filter_map(|(name, family)| {
                matcher.fuzzy_match(name, query).map(|score| SearchResult {
                    name: name.to_string(),
                    family,
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        results.truncate(limit);
        results
    }

    /// Content hash of the resolved graph. Equal inputs give equal
    /// fingerprints regardless of the order units were supplied in.
    pub fn fingerprint(&self) -> &Checksum {
        &self.fingerprint
    }
}
