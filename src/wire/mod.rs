//! Wire Codec
//!
//! Field-tagged binary encoding of message-family values. Every field is a
//! varint tag `(number << 3) | kind` followed by a payload whose shape the wire
//! kind determines. The format carries no header and is not self-describing:
//! decoding needs the same [`MessageType`](crate::graph::MessageType) that
//! encoded it.
//!
//! Encoding is deterministic (fields in ascending number order). Decoding skips
//! unknown fields so older readers accept newer payloads.

mod decode;
mod encode;
pub mod varint;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::WireError;
use crate::graph::{MessageId, SchemaGraph};
use crate::value::Value;

/// Payload shape announced by a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WireKind {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireKind {
    pub fn from_u8(kind: u8) -> Result<Self, WireError> {
        match kind {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            5 => Ok(Self::Fixed32),
            other => Err(WireError::InvalidWireKind(other)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Varint => "varint",
            Self::Fixed64 => "fixed64",
            Self::LengthDelimited => "length-delimited",
            Self::Fixed32 => "fixed32",
        }
    }
}

/// Codec settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireOptions {
    /// Pack repeated numeric fields into one length-delimited payload
    pub packed_repeated: bool,
    /// Deepest message nesting accepted (encode and decode)
    pub max_decode_depth: usize,
    /// Largest payload `decode` accepts
    pub max_message_bytes: usize,
}

impl Default for WireOptions {
    fn default() -> Self {
        Self {
            packed_repeated: false,
            max_decode_depth: 100,
            max_message_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Encoder and decoder bound to a resolved graph
#[derive(Debug, Clone, Copy)]
pub struct WireCodec<'g> {
    graph: &'g SchemaGraph,
    options: WireOptions,
}

impl<'g> WireCodec<'g> {
    pub fn new(graph: &'g SchemaGraph) -> Self {
        Self {
            graph,
            options: WireOptions::default(),
        }
    }

    pub fn with_options(graph: &'g SchemaGraph, options: WireOptions) -> Self {
        Self { graph, options }
    }

    pub fn options(&self) -> &WireOptions {
        &self.options
    }

    /// Encode a record as the given message type
    pub fn encode(&self, id: MessageId, value: &Value) -> Result<Bytes, WireError> {
        encode::Encoder::new(self.graph, self.options).encode(id, value)
    }

    /// Decode a payload as the given message type
    pub fn decode(&self, id: MessageId, data: &[u8]) -> Result<Value, WireError> {
        if data.len() > self.options.max_message_bytes {
            return Err(WireError::MessageTooLarge {
                size: data.len(),
                limit: self.options.max_message_bytes,
            });
        }
        decode::Decoder::new(self.graph, self.options.max_decode_depth).decode(id, data)
    }

    pub fn encode_by_name(&self, message: &str, value: &Value) -> Result<Bytes, WireError> {
        self.encode(self.message_id(message)?, value)
    }

    pub fn decode_by_name(&self, message: &str, data: &[u8]) -> Result<Value, WireError> {
        self.decode(self.message_id(message)?, data)
    }

    fn message_id(&self, name: &str) -> Result<MessageId, WireError> {
        self.graph
            .message(name)
            .ok_or_else(|| WireError::UnknownMessage(name.to_string()))
    }
}
