//! Message-family checks

use super::{PathSegment, ViolationKind, Walker};
use crate::graph::{FieldSpec, FieldType, MessageId, ScalarKind, SchemaGraph};
use crate::value::{i64_fits_f32, i64_fits_f64, Value};

pub(super) fn check_message(
    graph: &SchemaGraph,
    walker: &mut Walker,
    id: MessageId,
    value: &Value,
    depth: usize,
) {
    if !walker.enter(depth) {
        return;
    }
    let message = graph.message_by_id(id);
    let Some(record) = value.as_record() else {
        walker.report(
            ViolationKind::TypeMismatch,
            format!("expected message `{}`, found {}", message.full_name, value.kind_name()),
        );
        return;
    };

    for (key, item) in record.iter() {
        walker.path.push(PathSegment::Field(key.to_string()));
        match message.field_by_name(key) {
            None => walker.report(
                ViolationKind::UnknownField,
                format!("`{}` has no field `{}`", message.full_name, key),
            ),
            Some(field) if field.repeated => match item {
                Value::List(items) => {
                    for (i, element) in items.iter().enumerate() {
                        walker.path.push(PathSegment::Index(i));
                        check_field_value(graph, walker, field, element, depth);
                        walker.path.pop();
                    }
                }
                other => walker.report(
                    ViolationKind::TypeMismatch,
                    format!("repeated field expects a list, found {}", other.kind_name()),
                ),
            },
            Some(field) => check_field_value(graph, walker, field, item, depth),
        }
        walker.path.pop();
    }
}

fn check_field_value(
    graph: &SchemaGraph,
    walker: &mut Walker,
    field: &FieldSpec,
    value: &Value,
    depth: usize,
) {
    match field.ty {
        FieldType::Scalar(kind) => {
            if let Some((kind, detail)) = scalar_problem(kind, value) {
                walker.report(kind, detail);
            }
        }
        FieldType::Enum(id) => {
            let enum_type = graph.enum_by_id(id);
            match value {
                Value::String(symbol) if enum_type.number_of(symbol).is_some() => {}
                Value::String(symbol) => {
                    let symbols: Vec<&str> = enum_type.symbols().collect();
                    walker.report(
                        ViolationKind::EnumViolation,
                        format!(
                            "`{}` is not a symbol of `{}` [{}]",
                            symbol,
                            enum_type.full_name,
                            symbols.join(", ")
                        ),
                    );
                }
                other => walker.report(
                    ViolationKind::TypeMismatch,
                    format!(
                        "expected `{}` symbol, found {}",
                        enum_type.full_name,
                        other.kind_name()
                    ),
                ),
            }
        }
        FieldType::Message(target) => check_message(graph, walker, target, value, depth + 1),
    }
}

/// Why a value cannot be carried by a scalar kind, if it cannot
pub(crate) fn scalar_problem(kind: ScalarKind, value: &Value) -> Option<(ViolationKind, String)> {
    let mismatch = || {
        Some((
            ViolationKind::TypeMismatch,
            format!("expected {}, found {}", kind.keyword(), value.kind_name()),
        ))
    };

    if let Some((min, max)) = kind.int_range() {
        return match value {
            Value::Int(n) if (min..=max).contains(n) => None,
            Value::Int(n) => Some((
                ViolationKind::OutOfRange,
                format!("{} is outside the {} range {}..={}", n, kind.keyword(), min, max),
            )),
            _ => mismatch(),
        };
    }

    match (kind, value) {
        (ScalarKind::Bool, Value::Bool(_))
        | (ScalarKind::String, Value::String(_))
        | (ScalarKind::Bytes, Value::Bytes(_))
        | (ScalarKind::Double, Value::Float(_)) => None,
        (ScalarKind::Double, Value::Int(n)) => {
            if i64_fits_f64(*n) {
                None
            } else {
                Some((
                    ViolationKind::OutOfRange,
                    format!("{} is not exactly representable as double", n),
                ))
            }
        }
        (ScalarKind::Float, Value::Float(f)) => {
            if !f.is_finite() || f64::from(*f as f32) == *f {
                None
            } else {
                Some((
                    ViolationKind::OutOfRange,
                    format!("{} is not exactly representable as float", f),
                ))
            }
        }
        (ScalarKind::Float, Value::Int(n)) => {
            if i64_fits_f32(*n) {
                None
            } else {
                Some((
                    ViolationKind::OutOfRange,
                    format!("{} is not exactly representable as float", n),
                ))
            }
        }
        _ => mismatch(),
    }
}
