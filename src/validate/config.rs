//! Configuration-family checks

use super::{PathSegment, ViolationKind, Walker};
use crate::graph::{ConfigSchema, ObjectSchema, PrimitiveKind, VariantSchema};
use crate::value::Value;

pub(super) fn check(walker: &mut Walker, schema: &ConfigSchema, value: &Value, depth: usize) {
    match schema {
        ConfigSchema::Object(object) => check_object(walker, object, value, depth),
        ConfigSchema::Variant(variant) => check_variant(walker, variant, value, depth),
        ConfigSchema::EnumString { allowed } => match value {
            Value::String(s) if allowed.contains(s) => {}
            other => {
                let shown = match other {
                    Value::String(s) => format!("`{}`", s),
                    other => other.kind_name().to_string(),
                };
                let allowed: Vec<&str> = allowed.iter().map(String::as_str).collect();
                walker.report(
                    ViolationKind::EnumViolation,
                    format!("{} is not one of [{}]", shown, allowed.join(", ")),
                );
            }
        },
        ConfigSchema::Primitive { primitive } => {
            let ok = matches!(
                (primitive, value),
                (PrimitiveKind::String, Value::String(_))
                    | (PrimitiveKind::Bool, Value::Bool(_))
                    | (PrimitiveKind::Integer, Value::Int(_))
                    | (PrimitiveKind::Number, Value::Int(_) | Value::Float(_))
            );
            if !ok {
                walker.report(
                    ViolationKind::TypeMismatch,
                    format!("expected {}, found {}", primitive.as_str(), value.kind_name()),
                );
            }
        }
    }
}

fn check_object(walker: &mut Walker, object: &ObjectSchema, value: &Value, depth: usize) {
    if !walker.enter(depth) {
        return;
    }
    let Some(record) = value.as_record() else {
        walker.report(
            ViolationKind::TypeMismatch,
            format!("expected object, found {}", value.kind_name()),
        );
        return;
    };

    for name in &object.required {
        if !record.contains_key(name) {
            walker.report_at(
                PathSegment::Field(name.clone()),
                ViolationKind::MissingRequired,
                format!("missing required property `{}`", name),
            );
        }
    }

    for (key, item) in record.iter() {
        match object.properties.get(key) {
            Some(schema) => {
                walker.path.push(PathSegment::Field(key.to_string()));
                check(walker, schema, item, depth + 1);
                walker.path.pop();
            }
            None if object.closed => walker.report_at(
                PathSegment::Field(key.to_string()),
                ViolationKind::UnexpectedProperty,
                format!("property `{}` is not allowed", key),
            ),
            None => {}
        }
    }
}

/// Try every option in isolation; exactly one must accept the value
fn check_variant(walker: &mut Walker, variant: &VariantSchema, value: &Value, depth: usize) {
    let mut matched = Vec::new();
    let mut failures = Vec::new();

    for (i, option) in variant.options.iter().enumerate() {
        let mut trial = walker.fork();
        check_object(&mut trial, option, value, depth);
        if trial.violations.is_empty() {
            matched.push(option.label(i));
        } else {
            let first = &trial.violations[0];
            let more = trial.violations.len() - 1;
            let mut summary = format!("{}: {} at {}", option.label(i), first.detail, first.path);
            if more > 0 {
                summary.push_str(&format!(" (+{} more)", more));
            }
            failures.push(summary);
        }
    }

    match matched.len() {
        1 => {}
        0 => walker.report(
            ViolationKind::NoVariantMatched,
            format!("no option matched: {}", failures.join("; ")),
        ),
        _ => walker.report(
            ViolationKind::AmbiguousVariant,
            format!("value matches more than one option: {}", matched.join(", ")),
        ),
    }
}
