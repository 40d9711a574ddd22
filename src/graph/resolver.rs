//! Schema Resolution
//!
//! Turns a set of [`SchemaUnit`]s into a frozen [`SchemaGraph`]:
//!
//! 1. collect units, pulling imports from a [`UnitSource`] when needed
//! 2. index every declared type by package-qualified name
//! 3. check field numbers, field names, enums and identifiers
//! 4. bind type references to arena indexes
//! 5. reject cycles made only of singular message fields
//! 6. parse configuration documents
//!
//! Units are processed in name order so the resulting graph does not depend on
//! the order callers added them in.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, info};

use super::analysis::{build_reference_graph, find_illegal_cycle};
use super::message::{
    EnumId, EnumType, FieldSpec, FieldType, MessageId, MessageType, ScalarKind, MAX_FIELD_NUMBER,
};
use super::patterns::parse_config_schema;
use super::unit::{MessageUnit, NoSource, SchemaUnit, UnitSource};
use super::{ConfigDef, SchemaGraph};
use crate::error::ResolutionError;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"))
}

fn package_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").expect("package pattern")
    })
}

/// Best fuzzy match for `query` among `candidates`
pub(crate) fn suggest_name<'c>(
    candidates: impl Iterator<Item = &'c str>,
    query: &str,
) -> Option<String> {
    let matcher = SkimMatcherV2::default();
    candidates
        .filter_map(|c| matcher.fuzzy_match(c, query).map(|score| (score, c)))
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)))
        .map(|(_, c)| c.to_string())
}

/// Where a full name was declared
#[derive(Debug, Clone)]
struct Declared {
    slot: TypeSlot,
    unit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeSlot {
    Message(usize),
    Enum(usize),
}

/// Builds a [`SchemaGraph`] from schema units
pub struct Resolver {
    units: Vec<SchemaUnit>,
    source: Box<dyn UnitSource>,
    strict_identifiers: bool,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            source: Box::new(NoSource),
            strict_identifiers: true,
        }
    }

    /// Source used to load imports that were not added directly
    pub fn with_source(mut self, source: impl UnitSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    /// Check package, type, field and enum symbol spelling
    pub fn strict_identifiers(mut self, strict: bool) -> Self {
        self.strict_identifiers = strict;
        self
    }

    pub fn add_unit(&mut self, unit: impl Into<SchemaUnit>) -> &mut Self {
        self.units.push(unit.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<SchemaUnit>) -> Self {
        self.add_unit(unit);
        self
    }

    /// Resolve every unit into an immutable graph
    pub fn resolve(self) -> Result<SchemaGraph, ResolutionError> {
        let units = self.collect_units()?;

        let mut message_units: Vec<&MessageUnit> = Vec::new();
        let mut config_defs = Vec::new();
        for unit in units.values() {
            match unit {
                SchemaUnit::Message(m) => message_units.push(m),
                SchemaUnit::Config(c) => {
                    debug!(unit = %c.name, "parsing config unit");
                    config_defs.push(ConfigDef {
                        name: c.name.clone(),
                        schema: parse_config_schema(&c.name, &c.document)?,
                    });
                }
            }
        }

        if self.strict_identifiers {
            for unit in &message_units {
                check_identifiers(unit)?;
            }
        }

        let declared = index_declarations(&message_units)?;

        let mut enums = Vec::new();
        for unit in &message_units {
            for decl in &unit.enums {
                enums.push(build_enum(unit, decl)?);
            }
        }

        let by_unit: HashMap<&str, &MessageUnit> =
            message_units.iter().map(|u| (u.name.as_str(), *u)).collect();

        let mut messages = Vec::new();
        for unit in &message_units {
            for decl in &unit.messages {
                let full_name = unit.qualify(&decl.name);
                let mut fields = Vec::with_capacity(decl.fields.len());
                let mut numbers: HashMap<u32, &str> = HashMap::new();
                let mut names: HashSet<&str> = HashSet::new();

                for field in &decl.fields {
                    if field.number == 0 || field.number > MAX_FIELD_NUMBER {
                        return Err(ResolutionError::InvalidFieldNumber {
                            message: full_name.clone(),
                            field: field.name.clone(),
                            number: field.number,
                        });
                    }
                    if let Some(first) = numbers.insert(field.number, &field.name) {
                        return Err(ResolutionError::DuplicateFieldNumber {
                            message: full_name.clone(),
                            number: field.number,
                            first: first.to_string(),
                            second: field.name.clone(),
                        });
                    }
                    if !names.insert(&field.name) {
                        return Err(ResolutionError::DuplicateFieldName {
                            message: full_name.clone(),
                            field: field.name.clone(),
                        });
                    }

                    let referrer = format!("{}.{}", full_name, field.name);
                    let ty = bind_type(unit, &field.type_name, &referrer, &declared, &by_unit)?;
                    fields.push(FieldSpec {
                        name: field.name.clone(),
                        number: field.number,
                        ty,
                        repeated: field.repeated,
                    });
                }

                messages.push(MessageType::new(
                    decl.name.clone(),
                    full_name,
                    unit.name.clone(),
                    fields,
                ));
            }
        }

        let refs = build_reference_graph(&messages);
        if let Some(chain) = find_illegal_cycle(&refs, &messages) {
            return Err(ResolutionError::SchemaCycle { chain });
        }

        let unit_names: Vec<String> = units.keys().cloned().collect();
        let graph = SchemaGraph::new(unit_names, messages, enums, config_defs, refs);

        info!(
            units = graph.unit_names().len(),
            messages = graph.messages().len(),
            enums = graph.enums().len(),
            configs = graph.configs().len(),
            fingerprint = graph.fingerprint().short(),
            "schema graph resolved"
        );

        Ok(graph)
    }

    /// Gather added units plus the transitive closure of their imports
    fn collect_units(&self) -> Result<BTreeMap<String, SchemaUnit>, ResolutionError> {
        let mut units: BTreeMap<String, SchemaUnit> = BTreeMap::new();
        for unit in &self.units {
            if let Some(existing) = units.get(unit.name()) {
                if existing != unit {
                    return Err(ResolutionError::UnitLoad {
                        name: unit.name().to_string(),
                        reason: "two different units share this name".to_string(),
                    });
                }
                continue;
            }
            units.insert(unit.name().to_string(), unit.clone());
        }

        let mut pending: Vec<(String, String)> = units
            .values()
            .flat_map(|u| u.imports().iter().map(move |i| (i.clone(), u.name().to_string())))
            .collect();

        while let Some((name, imported_by)) = pending.pop() {
            if units.contains_key(&name) {
                continue;
            }
            let Some(unit) = self.source.load_unit(&name)? else {
                return Err(ResolutionError::MissingUnit { name, imported_by });
            };
            if unit.name() != name {
                return Err(ResolutionError::UnitLoad {
                    name: name.clone(),
                    reason: format!("source returned unit named `{}`", unit.name()),
                });
            }
            debug!(unit = %name, imported_by = %imported_by, "loaded imported unit");
            pending.extend(unit.imports().iter().map(|i| (i.clone(), name.clone())));
            units.insert(name, unit);
        }

        Ok(units)
    }
}

/// Resolve a set of units with no lazy import source
pub fn resolve_units<I, U>(units: I) -> Result<SchemaGraph, ResolutionError>
where
    I: IntoIterator<Item = U>,
    U: Into<SchemaUnit>,
{
    let mut resolver = Resolver::new();
    for unit in units {
        resolver.add_unit(unit);
    }
    resolver.resolve()
}

fn check_identifiers(unit: &MessageUnit) -> Result<(), ResolutionError> {
    let invalid = |identifier: &str| ResolutionError::InvalidIdentifier {
        unit: unit.name.clone(),
        identifier: identifier.to_string(),
    };

    if !unit.package.is_empty() && !package_re().is_match(&unit.package) {
        return Err(invalid(&unit.package));
    }
    for message in &unit.messages {
        if !identifier_re().is_match(&message.name) {
            return Err(invalid(&message.name));
        }
        for field in &message.fields {
            if !identifier_re().is_match(&field.name) {
                return Err(invalid(&field.name));
            }
        }
    }
    for decl in &unit.enums {
        if !identifier_re().is_match(&decl.name) {
            return Err(invalid(&decl.name));
        }
        for value in &decl.values {
            if !identifier_re().is_match(&value.name) {
                return Err(invalid(&value.name));
            }
        }
    }
    Ok(())
}

fn index_declarations(
    units: &[&MessageUnit],
) -> Result<HashMap<String, Declared>, ResolutionError> {
    let mut declared: HashMap<String, Declared> = HashMap::new();
    let mut message_idx = 0;
    let mut enum_idx = 0;

    for unit in units {
        let names = unit
            .messages
            .iter()
            .map(|m| (m.name.as_str(), true))
            .chain(unit.enums.iter().map(|e| (e.name.as_str(), false)));

        for (name, is_message) in names {
            let slot = if is_message {
                message_idx += 1;
                TypeSlot::Message(message_idx - 1)
            } else {
                enum_idx += 1;
                TypeSlot::Enum(enum_idx - 1)
            };
            let full_name = unit.qualify(name);
            if let Some(first) = declared.get(&full_name) {
                return Err(ResolutionError::DuplicateTypeName {
                    name: full_name,
                    first_unit: first.unit.clone(),
                    second_unit: unit.name.clone(),
                });
            }
            declared.insert(
                full_name,
                Declared {
                    slot,
                    unit: unit.name.clone(),
                },
            );
        }
    }

    Ok(declared)
}

fn build_enum(
    unit: &MessageUnit,
    decl: &super::unit::EnumDecl,
) -> Result<EnumType, ResolutionError> {
    let full_name = unit.qualify(&decl.name);
    let invalid = |reason: String| ResolutionError::InvalidEnum {
        name: full_name.clone(),
        reason,
    };

    if decl.values.is_empty() {
        return Err(invalid("enum declares no values".to_string()));
    }
    let mut symbols = HashSet::new();
    let mut numbers = HashSet::new();
    for value in &decl.values {
        if !symbols.insert(value.name.as_str()) {
            return Err(invalid(format!("duplicate symbol `{}`", value.name)));
        }
        if !numbers.insert(value.number) {
            return Err(invalid(format!("duplicate number {}", value.number)));
        }
    }

    Ok(EnumType {
        name: decl.name.clone(),
        full_name: full_name.clone(),
        unit: unit.name.clone(),
        values: decl.values.iter().map(|v| (v.name.clone(), v.number)).collect(),
    })
}

fn bind_type(
    unit: &MessageUnit,
    type_name: &str,
    referrer: &str,
    declared: &HashMap<String, Declared>,
    by_unit: &HashMap<&str, &MessageUnit>,
) -> Result<FieldType, ResolutionError> {
    if let Some(kind) = ScalarKind::from_keyword(type_name) {
        return Ok(FieldType::Scalar(kind));
    }

    let to_field_type = |d: &Declared| match d.slot {
        TypeSlot::Message(i) => FieldType::Message(MessageId(i)),
        TypeSlot::Enum(i) => FieldType::Enum(EnumId(i)),
    };

    let unresolved = || ResolutionError::UnresolvedReference {
        referrer: referrer.to_string(),
        name: type_name.to_string(),
        suggestion: suggest_name(
            declared.keys().map(String::as_str),
            type_name.trim_start_matches('.'),
        ),
    };

    if type_name.contains('.') {
        let full_name = type_name.trim_start_matches('.');
        return declared.get(full_name).map(to_field_type).ok_or_else(unresolved);
    }

    if let Some(found) = declared.get(&unit.qualify(type_name)) {
        return Ok(to_field_type(found));
    }

    let mut candidates: Vec<String> = Vec::new();
    for import in &unit.imports {
        let Some(imported) = by_unit.get(import.as_str()) else {
            continue;
        };
        let full_name = imported.qualify(type_name);
        if declared.get(&full_name).map_or(false, |d| d.unit == imported.name)
            && !candidates.contains(&full_name)
        {
            candidates.push(full_name);
        }
    }

    match candidates.len() {
        0 => Err(unresolved()),
        1 => Ok(to_field_type(&declared[&candidates[0]])),
        _ => Err(ResolutionError::AmbiguousReference {
            referrer: referrer.to_string(),
            name: type_name.to_string(),
            candidates,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::unit::{ConfigUnit, EnumDecl, MemorySource, MessageDecl};
    use serde_json::json;

    fn address_unit() -> MessageUnit {
        MessageUnit::new("common/address.proto", "shop.common").message(
            MessageDecl::new("Address")
                .field("street", 1, "string")
                .field("city", 2, "string"),
        )
    }

    fn order_unit() -> MessageUnit {
        MessageUnit::new("orders/order.proto", "shop.orders")
            .import("common/address.proto")
            .message(
                MessageDecl::new("Order")
                    .field("order_id", 1, "string")
                    .repeated("items", 2, "OrderItem")
                    .field("shipping_address", 3, "Address"),
            )
            .message(MessageDecl::new("OrderItem").field("sku", 1, "string"))
    }

    #[test]
    fn test_cross_unit_reference() {
        let graph = resolve_units([order_unit(), address_unit()]).unwrap();
        let order = graph.message("shop.orders.Order").unwrap();
        let order = graph.message_by_id(order);
        let address = graph.message("shop.common.Address").unwrap();
        assert_eq!(
            order.field_by_name("shipping_address").unwrap().ty,
            FieldType::Message(address)
        );
    }

    #[test]
    fn test_lazy_import_from_source() {
        let graph = Resolver::new()
            .with_source(MemorySource::new().with_unit(address_unit()))
            .with_unit(order_unit())
            .resolve()
            .unwrap();
        assert!(graph.message("shop.common.Address").is_some());
        assert_eq!(graph.unit_names(), ["common/address.proto", "orders/order.proto"]);
    }

    #[test]
    fn test_missing_import() {
        let err = resolve_units([order_unit()]).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::MissingUnit {
                name: "common/address.proto".into(),
                imported_by: "orders/order.proto".into(),
            }
        );
    }

    #[test]
    fn test_unresolved_reference_suggests() {
        let unit = MessageUnit::new("a.proto", "shop")
            .message(MessageDecl::new("Address").field("street", 1, "string"))
            .message(MessageDecl::new("Order").field("ship_to", 1, "Adress"));
        let err = resolve_units([unit]).unwrap_err();
        match err {
            ResolutionError::UnresolvedReference { referrer, name, suggestion } => {
                assert_eq!(referrer, "shop.Order.ship_to");
                assert_eq!(name, "Adress");
                assert_eq!(suggestion.as_deref(), Some("shop.Address"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unimported_unit_is_not_visible_by_bare_name() {
        let unit = MessageUnit::new("orders.proto", "shop.orders")
            .message(MessageDecl::new("Order").field("ship_to", 1, "Address"));
        let err = resolve_units([SchemaUnit::from(unit), address_unit().into()]).unwrap_err();
        assert!(matches!(err, ResolutionError::UnresolvedReference { .. }));
    }

    #[test]
    fn test_ambiguous_bare_name() {
        let a = MessageUnit::new("a.proto", "a").message(MessageDecl::new("Thing"));
        let b = MessageUnit::new("b.proto", "b").message(MessageDecl::new("Thing"));
        let c = MessageUnit::new("c.proto", "c")
            .import("a.proto")
            .import("b.proto")
            .message(MessageDecl::new("User").field("thing", 1, "Thing"));
        let err = resolve_units([a, b, c]).unwrap_err();
        match err {
            ResolutionError::AmbiguousReference { candidates, .. } => {
                assert_eq!(candidates, vec!["a.Thing", "b.Thing"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_field_number() {
        let unit = MessageUnit::new("a.proto", "a").message(
            MessageDecl::new("M").field("x", 1, "string").field("y", 1, "int32"),
        );
        let err = resolve_units([unit]).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::DuplicateFieldNumber {
                message: "a.M".into(),
                number: 1,
                first: "x".into(),
                second: "y".into(),
            }
        );
    }

    #[test]
    fn test_duplicate_type_name_across_units() {
        let a = MessageUnit::new("a.proto", "shop").message(MessageDecl::new("M"));
        let b = MessageUnit::new("b.proto", "shop").enumeration(EnumDecl::new("M").value("X", 0));
        let err = resolve_units([a, b]).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::DuplicateTypeName { ref name, .. } if name == "shop.M"
        ));
    }

    #[test]
    fn test_invalid_field_number() {
        let unit =
            MessageUnit::new("a.proto", "a").message(MessageDecl::new("M").field("x", 0, "string"));
        assert!(matches!(
            resolve_units([unit]).unwrap_err(),
            ResolutionError::InvalidFieldNumber { number: 0, .. }
        ));
    }

    #[test]
    fn test_invalid_identifier() {
        let unit = MessageUnit::new("a.proto", "a")
            .message(MessageDecl::new("M").field("bad-name", 1, "string"));
        assert!(matches!(
            resolve_units([unit.clone()]).unwrap_err(),
            ResolutionError::InvalidIdentifier { .. }
        ));
        assert!(Resolver::new().strict_identifiers(false).with_unit(unit).resolve().is_ok());
    }

    #[test]
    fn test_enum_reference_and_checks() {
        let unit = MessageUnit::new("a.proto", "a")
            .enumeration(EnumDecl::new("Status").value("PENDING", 0).value("DONE", 1))
            .message(MessageDecl::new("M").field("status", 1, "Status"));
        let graph = resolve_units([unit]).unwrap();
        let m = graph.message_by_id(graph.message("a.M").unwrap());
        assert!(matches!(m.fields[0].ty, FieldType::Enum(_)));

        let bad = MessageUnit::new("b.proto", "b")
            .enumeration(EnumDecl::new("Status").value("A", 0).value("B", 0));
        assert!(matches!(resolve_units([bad]).unwrap_err(), ResolutionError::InvalidEnum { .. }));
    }

    #[test]
    fn test_cycle_rules() {
        let legal = MessageUnit::new("t.proto", "t")
            .message(
                MessageDecl::new("Node")
                    .field("label", 1, "string")
                    .repeated("children", 2, "Node"),
            );
        assert!(resolve_units([legal]).is_ok());

        let illegal = MessageUnit::new("t.proto", "t")
            .message(MessageDecl::new("A").field("b", 1, "B"))
            .message(MessageDecl::new("B").field("a", 1, "t.A"));
        assert_eq!(
            resolve_units([illegal]).unwrap_err(),
            ResolutionError::SchemaCycle { chain: vec!["t.A".into(), "t.B".into(), "t.A".into()] }
        );
    }

    #[test]
    fn test_config_units_resolve() {
        let unit = ConfigUnit::new(
            "limits",
            json!({ "type": "object", "properties": { "max": { "type": "integer" } } }),
        );
        let graph = resolve_units([unit]).unwrap();
        assert!(graph.config("limits").is_some());
    }

    #[test]
    fn test_resolution_is_order_independent() {
        let a = resolve_units([SchemaUnit::from(order_unit()), address_unit().into()]).unwrap();
        let b = resolve_units([SchemaUnit::from(address_unit()), order_unit().into()]).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.messages(), b.messages());
    }
}
