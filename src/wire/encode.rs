//! Value to wire bytes

use bytes::{BufMut, Bytes, BytesMut};

use super::varint::{put_length_delimited, put_tag, put_varint, zigzag_encode};
use super::{WireKind, WireOptions};
use crate::error::WireError;
use crate::graph::{FieldType, MessageId, ScalarKind, SchemaGraph};
use crate::validate::{scalar_problem, FieldPath, PathSegment};
use crate::value::Value;

pub(super) struct Encoder<'g> {
    graph: &'g SchemaGraph,
    options: WireOptions,
    path: FieldPath,
}

impl<'g> Encoder<'g> {
    pub(super) fn new(graph: &'g SchemaGraph, options: WireOptions) -> Self {
        Self {
            graph,
            options,
            path: FieldPath::root(),
        }
    }

    pub(super) fn encode(mut self, id: MessageId, value: &Value) -> Result<Bytes, WireError> {
        let mut buf = BytesMut::new();
        self.write_message(id, value, &mut buf, 0)?;
        Ok(buf.freeze())
    }

    fn mismatch(&self, expected: impl Into<String>, found: &Value) -> WireError {
        WireError::EncodeMismatch {
            path: self.path.to_string(),
            expected: expected.into(),
            found: found.kind_name(),
        }
    }

    fn write_message(
        &mut self,
        id: MessageId,
        value: &Value,
        buf: &mut BytesMut,
        depth: usize,
    ) -> Result<(), WireError> {
        if depth > self.options.max_decode_depth {
            return Err(WireError::RecursionLimit {
                limit: self.options.max_decode_depth,
            });
        }

        let graph = self.graph;
        let message = graph.message_by_id(id);
        let Some(record) = value.as_record() else {
            return Err(self.mismatch(format!("message {}", message.full_name), value));
        };

        if let Some(key) = record.keys().find(|k| message.field_by_name(k).is_none()) {
            return Err(WireError::UnknownField {
                message: message.full_name.clone(),
                field: key.to_string(),
            });
        }

        for field in message.fields_by_number() {
            let Some(item) = record.get(&field.name) else {
                continue;
            };
            self.path.push(PathSegment::Field(field.name.clone()));

            if field.repeated {
                let Some(items) = item.as_list() else {
                    let expected = format!("list of {}", describe(graph, field.ty));
                    return Err(self.mismatch(expected, item));
                };
                if self.options.packed_repeated && field.ty.is_packable() && !items.is_empty() {
                    let mut payload = BytesMut::new();
                    for (i, element) in items.iter().enumerate() {
                        self.path.push(PathSegment::Index(i));
                        self.write_value(field.ty, element, &mut payload, depth)?;
                        self.path.pop();
                    }
                    put_tag(buf, field.number, WireKind::LengthDelimited);
                    put_length_delimited(buf, &payload);
                } else {
                    for (i, element) in items.iter().enumerate() {
                        self.path.push(PathSegment::Index(i));
                        put_tag(buf, field.number, field.ty.wire_kind());
                        self.write_value(field.ty, element, buf, depth)?;
                        self.path.pop();
                    }
                }
            } else {
                put_tag(buf, field.number, field.ty.wire_kind());
                self.write_value(field.ty, item, buf, depth)?;
            }

            self.path.pop();
        }
        Ok(())
    }

    /// Write one payload (no tag)
    fn write_value(
        &mut self,
        ty: FieldType,
        value: &Value,
        buf: &mut BytesMut,
        depth: usize,
    ) -> Result<(), WireError> {
        match ty {
            FieldType::Scalar(kind) => {
                if let Some((_, detail)) = scalar_problem(kind, value) {
                    return Err(self.mismatch(detail, value));
                }
                write_scalar(kind, value, buf);
                Ok(())
            }
            FieldType::Enum(id) => {
                let enum_type = self.graph.enum_by_id(id);
                let number = value.as_str().and_then(|s| enum_type.number_of(s));
                let Some(number) = number else {
                    return Err(self.mismatch(format!("symbol of {}", enum_type.full_name), value));
                };
                put_varint(buf, i64::from(number) as u64);
                Ok(())
            }
            FieldType::Message(target) => {
                let mut nested = BytesMut::new();
                self.write_message(target, value, &mut nested, depth + 1)?;
                put_length_delimited(buf, &nested);
                Ok(())
            }
        }
    }
}

fn describe(graph: &SchemaGraph, ty: FieldType) -> String {
    match ty {
        FieldType::Scalar(kind) => kind.keyword().to_string(),
        FieldType::Message(id) => graph.message_by_id(id).full_name.clone(),
        FieldType::Enum(id) => graph.enum_by_id(id).full_name.clone(),
    }
}

/// Write a scalar that `scalar_problem` already accepted
fn write_scalar(kind: ScalarKind, value: &Value, buf: &mut BytesMut) {
    let int = match value {
        Value::Int(n) => *n,
        _ => 0,
    };
    let float = match value {
        Value::Int(n) => *n as f64,
        Value::Float(f) => *f,
        _ => 0.0,
    };

    match kind {
        // Negative int32/int64 are sign-extended to ten bytes
        ScalarKind::Int32 | ScalarKind::Int64 | ScalarKind::Uint32 | ScalarKind::Uint64 => {
            put_varint(buf, int as u64)
        }
        ScalarKind::Sint32 | ScalarKind::Sint64 => put_varint(buf, zigzag_encode(int)),
        ScalarKind::Bool => put_varint(buf, u64::from(matches!(value, Value::Bool(true)))),
        ScalarKind::Fixed32 => buf.put_u32_le(int as u32),
        ScalarKind::Sfixed32 => buf.put_i32_le(int as i32),
        ScalarKind::Fixed64 => buf.put_u64_le(int as u64),
        ScalarKind::Sfixed64 => buf.put_i64_le(int),
        ScalarKind::Double => buf.put_f64_le(float),
        ScalarKind::Float => buf.put_f32_le(float as f32),
        ScalarKind::String => {
            if let Value::String(s) = value {
                put_length_delimited(buf, s.as_bytes());
            }
        }
        ScalarKind::Bytes => {
            if let Value::Bytes(b) = value {
                put_length_delimited(buf, b);
            }
        }
    }
}
