//! Wire bytes to value

use bytes::Buf;
use tracing::trace;

use super::varint::{ensure, get_length_delimited, get_varint, skip, zigzag_decode};
use super::WireKind;
use crate::error::WireError;
use crate::graph::{
    FieldSpec, FieldType, MessageId, MessageType, ScalarKind, SchemaGraph, MAX_FIELD_NUMBER,
};
use crate::value::{Record, Value};

pub(super) struct Decoder<'g> {
    graph: &'g SchemaGraph,
    max_depth: usize,
}

impl<'g> Decoder<'g> {
    pub(super) fn new(graph: &'g SchemaGraph, max_depth: usize) -> Self {
        Self { graph, max_depth }
    }

    pub(super) fn decode(&self, id: MessageId, data: &[u8]) -> Result<Value, WireError> {
        self.read_message(id, data, 0)
    }

    fn read_message(
        &self,
        id: MessageId,
        mut buf: &[u8],
        depth: usize,
    ) -> Result<Value, WireError> {
        if depth > self.max_depth {
            return Err(WireError::RecursionLimit { limit: self.max_depth });
        }

        let message = self.graph.message_by_id(id);
        let mut record = Record::new();

        while buf.has_remaining() {
            let key = get_varint(&mut buf)?;
            let kind = WireKind::from_u8((key & 0x7) as u8)?;
            let number = key >> 3;
            if number == 0 || number > u64::from(MAX_FIELD_NUMBER) {
                return Err(WireError::InvalidFieldNumber);
            }

            let Some(field) = message.field_by_number(number as u32) else {
                trace!(
                    message = %message.full_name,
                    number,
                    kind = kind.as_str(),
                    "skipping unknown field"
                );
                skip(&mut buf, kind)?;
                continue;
            };

            let expected = field.ty.wire_kind();
            if field.repeated && field.ty.is_packable() && kind == WireKind::LengthDelimited {
                let mut packed = get_length_delimited(&mut buf)?;
                let mut items = Vec::new();
                while packed.has_remaining() {
                    items.push(self.read_value(message, field, &mut packed, depth)?);
                }
                append(&mut record, &field.name, items);
                continue;
            }

            if kind != expected {
                return Err(WireError::WireTypeMismatch {
                    message: message.full_name.clone(),
                    field: field.name.clone(),
                    expected: expected.as_str(),
                    found: kind.as_str(),
                });
            }

            let value = self.read_value(message, field, &mut buf, depth)?;
            if field.repeated {
                append(&mut record, &field.name, vec![value]);
            } else {
                // Last occurrence wins
                record.insert(field.name.clone(), value);
            }
        }

        Ok(Value::Record(record))
    }

    /// Read one payload of the field's element type
    fn read_value(
        &self,
        message: &MessageType,
        field: &FieldSpec,
        buf: &mut &[u8],
        depth: usize,
    ) -> Result<Value, WireError> {
        let field_name = || format!("{}.{}", message.full_name, field.name);

        match field.ty {
            FieldType::Scalar(kind) => read_scalar(kind, buf, field_name),
            FieldType::Enum(id) => {
                let number = get_varint(buf)? as i64 as i32;
                let enum_type = self.graph.enum_by_id(id);
                Ok(match enum_type.symbol_of(number) {
                    Some(symbol) => Value::String(symbol.to_string()),
                    None => Value::Int(i64::from(number)),
                })
            }
            FieldType::Message(target) => {
                let payload = get_length_delimited(buf)?;
                self.read_message(target, payload, depth + 1)
            }
        }
    }
}

fn append(record: &mut Record, name: &str, items: Vec<Value>) {
    match record.get_mut(name) {
        Some(Value::List(existing)) => existing.extend(items),
        _ => {
            record.insert(name.to_string(), Value::List(items));
        }
    }
}

fn overflow(field_name: &impl Fn() -> String) -> WireError {
    WireError::IntegerOverflow {
        field: field_name(),
    }
}

fn read_scalar(
    kind: ScalarKind,
    buf: &mut &[u8],
    field_name: impl Fn() -> String,
) -> Result<Value, WireError> {
    let value = match kind {
        ScalarKind::Int32 => Value::Int(i64::from(get_varint(buf)? as i32)),
        ScalarKind::Int64 => Value::Int(get_varint(buf)? as i64),
        ScalarKind::Uint32 => Value::Int(i64::from(get_varint(buf)? as u32)),
        ScalarKind::Uint64 => {
            let raw = get_varint(buf)?;
            Value::Int(i64::try_from(raw).map_err(|_| overflow(&field_name))?)
        }
        ScalarKind::Sint32 => Value::Int(i64::from(zigzag_decode(get_varint(buf)?) as i32)),
        ScalarKind::Sint64 => Value::Int(zigzag_decode(get_varint(buf)?)),
        ScalarKind::Bool => Value::Bool(get_varint(buf)? != 0),
        ScalarKind::Fixed32 => {
            ensure(buf, 4)?;
            Value::Int(i64::from(buf.get_u32_le()))
        }
        ScalarKind::Sfixed32 => {
            ensure(buf, 4)?;
            Value::Int(i64::from(buf.get_i32_le()))
        }
        ScalarKind::Float => {
            ensure(buf, 4)?;
            Value::Float(f64::from(buf.get_f32_le()))
        }
        ScalarKind::Fixed64 => {
            ensure(buf, 8)?;
            let raw = buf.get_u64_le();
            Value::Int(i64::try_from(raw).map_err(|_| overflow(&field_name))?)
        }
        ScalarKind::Sfixed64 => {
            ensure(buf, 8)?;
            Value::Int(buf.get_i64_le())
        }
        ScalarKind::Double => {
            ensure(buf, 8)?;
            Value::Float(buf.get_f64_le())
        }
        ScalarKind::String => {
            let payload = get_length_delimited(buf)?;
            let s = std::str::from_utf8(payload)
                .map_err(|_| WireError::InvalidUtf8 { field: field_name() })?;
            Value::String(s.to_string())
        }
        ScalarKind::Bytes => Value::Bytes(get_length_delimited(buf)?.to_vec()),
    };
    Ok(value)
}
