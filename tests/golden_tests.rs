//! Golden Tests for Resolution, Validation and Wire Coding
//!
//! End-to-end scenarios over the fixture units in `tests/fixtures`.

use std::fs;
use std::path::PathBuf;

use proptest::prelude::*;

use schema_wire::graph::{
    ConfigUnit, DirectorySource, FieldType, MessageDecl, MessageUnit, Resolver, SchemaUnit,
};
use schema_wire::{
    load_units_from_directory, resolve_units, validate_config_schema, FieldPath, Record,
    ResolutionError, SchemaGraph, Validator, Value, ViolationKind, WireCodec, WireError,
    WireOptions,
};

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn message_unit(json: &str) -> SchemaUnit {
    serde_json::from_str(json).unwrap()
}

fn address_unit() -> SchemaUnit {
    message_unit(include_str!("fixtures/common_address.json"))
}

fn order_unit() -> SchemaUnit {
    message_unit(include_str!("fixtures/order.json"))
}

fn mqtt_unit() -> SchemaUnit {
    let document = serde_json::from_str(include_str!("fixtures/mqtt_table.schema.json")).unwrap();
    ConfigUnit::new("mqtt_table", document).into()
}

fn shop_graph() -> SchemaGraph {
    resolve_units([order_unit(), address_unit(), mqtt_unit()]).unwrap()
}

fn json_value(json: serde_json::Value) -> Value {
    Value::from(json)
}

fn order_value() -> Value {
    json_value(serde_json::from_str(include_str!("fixtures/order_value.json")).unwrap())
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn test_cross_unit_reference_binds_to_address() {
    let graph = shop_graph();
    let order_id = graph.message("shop.orders.Order").unwrap();
    let order = graph.message_by_id(order_id);
    let address = graph.message("shop.common.Address").unwrap();

    assert_eq!(order.fields.len(), 8);
    assert_eq!(
        order.field_by_name("shipping_address").unwrap().ty,
        FieldType::Message(address)
    );
    assert_eq!(graph.message_by_id(address).unit, "common/address.proto");

    let deps: Vec<&str> = graph
        .dependencies(order_id)
        .into_iter()
        .map(|id| graph.message_by_id(id).full_name.as_str())
        .collect();
    assert_eq!(
        deps,
        vec!["shop.common.Address", "shop.orders.OrderItem", "shop.orders.PaymentDetails"]
    );
}

#[test]
fn test_fingerprint_is_deterministic() {
    let a = resolve_units([order_unit(), address_unit(), mqtt_unit()]).unwrap();
    let b = resolve_units([mqtt_unit(), address_unit(), order_unit()]).unwrap();
    assert_eq!(a.fingerprint(), b.fingerprint());

    let without_config = resolve_units([order_unit(), address_unit()]).unwrap();
    assert_ne!(a.fingerprint(), without_config.fingerprint());
}

#[test]
fn test_unresolved_reference_suggests_close_name() {
    let SchemaUnit::Message(mut order) = order_unit() else {
        panic!("Expected message unit");
    };
    order.messages[0].fields[4].type_name = "Adress".to_string();

    let err = resolve_units([SchemaUnit::from(order), address_unit()]).unwrap_err();
    assert_eq!(
        err,
        ResolutionError::UnresolvedReference {
            referrer: "shop.orders.Order.shipping_address".into(),
            name: "Adress".into(),
            suggestion: Some("shop.common.Address".into()),
        }
    );
    assert!(err.to_string().contains("did you mean `shop.common.Address`?"));
}

#[test]
fn test_duplicate_field_number_and_type_name() {
    let SchemaUnit::Message(mut order) = order_unit() else {
        panic!("Expected message unit");
    };
    order.messages[1].fields[1].number = 1;
    let err = resolve_units([SchemaUnit::from(order), address_unit()]).unwrap_err();
    assert!(matches!(
        err,
        ResolutionError::DuplicateFieldNumber { ref message, number: 1, .. }
            if message == "shop.orders.OrderItem"
    ));

    let clash = MessageUnit::new("other/address.proto", "shop.common")
        .message(MessageDecl::new("Address").field("line", 1, "string"));
    let err = resolve_units([SchemaUnit::from(clash), address_unit()]).unwrap_err();
    assert_eq!(
        err,
        ResolutionError::DuplicateTypeName {
            name: "shop.common.Address".into(),
            first_unit: "common/address.proto".into(),
            second_unit: "other/address.proto".into(),
        }
    );
}

#[test]
fn test_cycles_through_singular_fields_rejected() {
    let tree = MessageUnit::new("tree.proto", "tree")
        .message(
            MessageDecl::new("Node")
                .field("value", 1, "int32")
                .repeated("children", 2, "Node"),
        );
    assert!(resolve_units([tree]).is_ok());

    let chain = MessageUnit::new("chain.proto", "a")
        .message(MessageDecl::new("A").field("b", 1, "B"))
        .message(MessageDecl::new("B").field("c", 1, "C"))
        .message(MessageDecl::new("C").field("a", 1, "A"));
    assert_eq!(
        resolve_units([chain]).unwrap_err(),
        ResolutionError::SchemaCycle {
            chain: vec!["a.A".into(), "a.B".into(), "a.C".into(), "a.A".into()]
        }
    );
}

#[test]
fn test_lazy_import_from_directory() {
    let temp = tempfile::TempDir::new().unwrap();
    let common = temp.path().join("common");
    fs::create_dir_all(&common).unwrap();
    fs::write(common.join("address.json"), include_str!("fixtures/common_address.json")).unwrap();

    let graph = Resolver::new()
        .with_source(DirectorySource::new(temp.path()))
        .with_unit(order_unit())
        .resolve()
        .unwrap();
    assert!(graph.message("shop.common.Address").is_some());

    let err = resolve_units([order_unit()]).unwrap_err();
    assert!(matches!(err, ResolutionError::MissingUnit { .. }));
}

#[test]
fn test_load_fixture_directory() {
    let units = load_units_from_directory(&fixtures_path()).unwrap();
    let mut names: Vec<&str> = units.iter().map(|u| u.name()).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["ambiguous_variant", "common/address.proto", "mqtt_table", "orders/order.proto"]
    );

    let graph = resolve_units(units).unwrap();
    assert_eq!(graph.messages().len(), 4);
    assert_eq!(graph.configs().len(), 2);
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_mqtt_source_passes() {
    let graph = shop_graph();
    let value = json_value(serde_json::json!({ "topic": "sensors/temp", "type": {} }));
    let report = Validator::new(&graph).validate("mqtt_table", &value).unwrap();
    assert!(report.is_valid(), "{:?}", report.violations);
}

#[test]
fn test_mqtt_sink_matches_only_sink() {
    let graph = shop_graph();
    let validator = Validator::new(&graph);

    let sink = json_value(serde_json::json!({ "topic": "x", "type": { "retain": true } }));
    assert!(validator.validate("mqtt_table", &sink).unwrap().is_valid());

    let extra = json_value(serde_json::json!({
        "topic": "x",
        "type": { "retain": true, "extra": 1 }
    }));
    let report = validator.validate("mqtt_table", &extra).unwrap();
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].kind, ViolationKind::NoVariantMatched);
    assert_eq!(report.violations[0].path, FieldPath::root().field("type"));
    assert!(report.clone().into_result().is_err());
}

#[test]
fn test_ambiguous_variant_fixture() {
    let document =
        serde_json::from_str(include_str!("fixtures/ambiguous_variant.schema.json")).unwrap();
    let graph = resolve_units([ConfigUnit::new("endpoint", document)]).unwrap();
    let schema = &graph.config("endpoint").unwrap().schema;

    let value = json_value(serde_json::json!({ "transport": { "url": "https://example.com" } }));
    let report = validate_config_schema(schema, &value);
    assert_eq!(report.violations.len(), 1);
    let violation = &report.violations[0];
    assert_eq!(violation.kind, ViolationKind::AmbiguousVariant);
    assert_eq!(violation.path.to_string(), ".transport");
    assert!(violation.detail.contains("Http, Https"));
}

#[test]
fn test_order_fixture_validates() {
    let graph = shop_graph();
    let value = order_value();
    let report = Validator::new(&graph).validate("Order", &value).unwrap();
    assert!(report.is_valid(), "{:?}", report.violations);
}

#[test]
fn test_concurrent_validation_shares_graph() {
    let graph = shop_graph();
    let value = order_value();
    let order = graph.message("Order").unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let report = Validator::new(&graph).validate_message(order, &value);
                    let bytes = WireCodec::new(&graph).encode(order, &value).unwrap();
                    (report.is_valid(), bytes)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().all(|(valid, _)| *valid));
        assert!(results.windows(2).all(|w| w[0].1 == w[1].1));
    });
}

// =============================================================================
// Wire Coding
// =============================================================================

#[test]
fn test_order_fixture_round_trip() {
    let graph = shop_graph();
    let codec = WireCodec::new(&graph);
    let value = order_value();

    let bytes = codec.encode_by_name("shop.orders.Order", &value).unwrap();
    let decoded = codec.decode_by_name("shop.orders.Order", &bytes).unwrap();
    assert!(decoded.semantic_eq(&value), "{:?}", decoded);
}

#[test]
fn test_empty_notes_round_trip() {
    let graph = shop_graph();
    let codec = WireCodec::new(&graph);
    let value = json_value(serde_json::json!({ "order_id": "o-1", "notes": [] }));
    assert!(Validator::new(&graph).validate("Order", &value).unwrap().is_valid());

    let bytes = codec.encode_by_name("Order", &value).unwrap();
    let decoded = codec.decode_by_name("Order", &bytes).unwrap();
    assert!(!decoded.as_record().unwrap().contains_key("notes"));
    assert!(decoded.semantic_eq(&value));
}

#[test]
fn test_total_must_convert_exactly() {
    let graph = shop_graph();
    let order = graph.message("Order").unwrap();
    let exact: Value = Record::new().with("total", Value::Int(1 << 53)).into();
    let lossy: Value = Record::new().with("total", Value::Int((1 << 53) + 1)).into();

    assert!(Validator::new(&graph).validate_message(order, &exact).is_valid());
    let report = Validator::new(&graph).validate_message(order, &lossy);
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].kind, ViolationKind::OutOfRange);
    assert!(WireCodec::new(&graph).encode(order, &lossy).is_err());
}

#[test]
fn test_truncated_string_payload() {
    let graph = shop_graph();
    let codec = WireCodec::new(&graph);
    let value: Value = Record::new().with("order_id", "ord-2024-0042").into();

    let bytes = codec.encode_by_name("Order", &value).unwrap();
    let truncated = &bytes[..bytes.len() - 3];
    assert!(matches!(
        codec.decode_by_name("Order", truncated),
        Err(WireError::TruncatedMessage { .. })
    ));
}

#[test]
fn test_old_reader_skips_new_fields() {
    let graph = shop_graph();
    let full = WireCodec::new(&graph)
        .encode_by_name("Order", &order_value())
        .unwrap();

    // A reader that only knows the first two fields
    let old = MessageUnit::new("orders/order.proto", "shop.orders").message(
        MessageDecl::new("Order")
            .field("order_id", 1, "string")
            .field("customer_id", 2, "int64"),
    );
    let old_graph = resolve_units([old]).unwrap();
    let decoded = WireCodec::new(&old_graph).decode_by_name("Order", &full).unwrap();
    let expected: Value = Record::new()
        .with("order_id", "ord-2024-0042")
        .with("customer_id", Value::Int(918_273_645))
        .into();
    assert_eq!(decoded, expected);
}

// =============================================================================
// Round-trip Property
// =============================================================================

const TWO_53: i64 = 1 << 53;
const TWO_24: i64 = 1 << 24;

/// Values a `double` field accepts: any float, including non-finite ones,
/// and integers that convert exactly
fn arb_double() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<f64>().prop_map(Value::Float),
        (-TWO_53..=TWO_53).prop_map(Value::Int),
        Just(Value::Float(f64::INFINITY)),
        Just(Value::Float(f64::NEG_INFINITY)),
        Just(Value::Float(f64::NAN)),
    ]
}

fn arb_float() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<f32>().prop_map(|f| Value::Float(f64::from(f))),
        (-TWO_24..=TWO_24).prop_map(Value::Int),
        Just(Value::Float(f64::NEG_INFINITY)),
        Just(Value::Float(f64::NAN)),
    ]
}

fn arb_item() -> impl Strategy<Value = Value> {
    (
        "[A-Z]{2}-[0-9]{1,4}",
        proptest::option::of(any::<u32>()),
        arb_double(),
        proptest::option::of(any::<i32>()),
    )
        .prop_map(|(sku, quantity, unit_price, discount)| {
            let mut item = Record::new().with("sku", sku).with("unit_price", unit_price);
            if let Some(q) = quantity {
                item.insert("quantity", Value::Int(i64::from(q)));
            }
            if let Some(d) = discount {
                item.insert("discount", Value::from(d));
            }
            item.into()
        })
}

fn arb_address() -> impl Strategy<Value = Value> {
    ("[a-zA-Z0-9 ]{0,20}", "\\PC{0,10}").prop_map(|(street, city)| {
        Record::new().with("street", street).with("city", city).into()
    })
}

fn arb_payment() -> impl Strategy<Value = Value> {
    (any::<i64>(), any::<bool>(), 0..=i64::MAX).prop_map(|(amount, captured, reference)| {
        Record::new()
            .with("amount_cents", amount)
            .with("captured", captured)
            .with("reference", reference)
            .into()
    })
}

fn arb_order() -> impl Strategy<Value = Value> {
    (
        "[a-z0-9-]{0,16}",
        any::<i64>(),
        proptest::collection::vec(arb_item(), 0..4),
        proptest::sample::select(vec!["PENDING", "PAID", "SHIPPED", "CANCELLED"]),
        proptest::option::of(arb_address()),
        arb_double(),
        proptest::option::of(proptest::collection::vec("\\PC{0,8}", 0..3)),
        proptest::option::of(arb_payment()),
    )
        .prop_map(|(id, customer, items, status, address, total, notes, payment)| {
            let mut order = Record::new()
                .with("order_id", id)
                .with("customer_id", customer)
                .with("items", items)
                .with("status", status)
                .with("total", total);
            if let Some(address) = address {
                order.insert("shipping_address", address);
            }
            if let Some(notes) = notes {
                order.insert("notes", Value::List(notes.into_iter().map(Value::from).collect()));
            }
            if let Some(payment) = payment {
                order.insert("payment", payment);
            }
            order.into()
        })
}

fn sensor_graph() -> SchemaGraph {
    let unit = MessageUnit::new("sensor.proto", "sensor").message(
        MessageDecl::new("Reading")
            .field("celsius", 1, "float")
            .repeated("samples", 2, "float")
            .repeated("weights", 3, "double")
            .field("offset", 4, "double"),
    );
    resolve_units([unit]).unwrap()
}

fn arb_reading() -> impl Strategy<Value = Value> {
    (
        arb_float(),
        proptest::collection::vec(arb_float(), 0..5),
        proptest::collection::vec(arb_double(), 0..5),
        proptest::option::of(arb_double()),
    )
        .prop_map(|(celsius, samples, weights, offset)| {
            let mut reading = Record::new()
                .with("celsius", celsius)
                .with("samples", samples)
                .with("weights", weights);
            if let Some(offset) = offset {
                reading.insert("offset", offset);
            }
            reading.into()
        })
}

proptest! {
    /// Floating fields, integral inputs and empty lists survive encode then decode.
    #[test]
    fn reading_round_trip(reading in arb_reading(), packed in any::<bool>()) {
        let graph = sensor_graph();
        let id = graph.message("Reading").unwrap();
        let report = Validator::new(&graph).validate_message(id, &reading);
        prop_assert!(report.is_valid(), "generated invalid reading: {:?}", report.violations);

        let options = WireOptions { packed_repeated: packed, ..WireOptions::default() };
        let codec = WireCodec::with_options(&graph, options);
        let decoded = codec.decode(id, &codec.encode(id, &reading).unwrap()).unwrap();
        prop_assert!(decoded.semantic_eq(&reading), "decoded {:?} from {:?}", decoded, reading);
    }

    /// Every valid order survives encode then decode.
    #[test]
    fn order_round_trip(order in arb_order(), packed in any::<bool>()) {
        let graph = shop_graph();
        let id = graph.message("Order").unwrap();
        let report = Validator::new(&graph).validate_message(id, &order);
        prop_assert!(report.is_valid(), "generated invalid order: {:?}", report.violations);

        let options = WireOptions { packed_repeated: packed, ..WireOptions::default() };
        let codec = WireCodec::with_options(&graph, options);
        let bytes = codec.encode(id, &order).unwrap();
        let decoded = codec.decode(id, &bytes).unwrap();
        prop_assert!(decoded.semantic_eq(&order), "decoded {:?} from {:?}", decoded, order);
    }

    /// Encoding does not depend on record key order.
    #[test]
    fn encoding_is_deterministic(order in arb_order()) {
        let graph = shop_graph();
        let codec = WireCodec::new(&graph);
        let Value::Record(record) = &order else {
            unreachable!("generator builds records");
        };
        let mut entries: Vec<(String, Value)> = record
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        entries.reverse();
        let reversed: Record = entries.into_iter().collect();
        prop_assert_eq!(
            codec.encode_by_name("Order", &order).unwrap(),
            codec.encode_by_name("Order", &Value::Record(reversed)).unwrap()
        );
    }
}
