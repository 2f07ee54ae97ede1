//! Translation between the service's JSON packet representation and the
//! in-memory [`Packet`] model.
//!
//! The wire packet is an array of protocol objects, each with an `id` and an
//! array of field objects:
//!
//! ```text
//! [
//!   {"id": "IP",  "fields": [{"id": "dst", "value": "10.0.0.1"}]},
//!   {"id": "TCP", "fields": [{"id": "dport", "value": 80}]}
//! ]
//! ```
//!
//! Protocol objects may carry extra keys (offsets, lengths, display values);
//! they are ignored. Field values must be a JSON string or an integer.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::model::{Field, FieldValue, Packet, Protocol};

/// Errors raised when a wire value cannot be mapped to the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    /// A value has the wrong JSON type.
    #[error("{path}: expected {expected}, found {found}")]
    Shape {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A required key is absent.
    #[error("{path}: missing key `{key}`")]
    MissingKey { path: String, key: &'static str },

    /// A field value is neither a string nor an integer.
    #[error("{path}: unsupported field value ({found})")]
    UnsupportedValue { path: String, found: &'static str },

    /// An integer field value does not fit in 64 signed bits.
    #[error("{path}: integer out of range")]
    IntegerOutOfRange { path: String },

    /// A base64 payload could not be decoded.
    #[error("{path}: invalid base64: {reason}")]
    InvalidBase64 { path: String, reason: String },

    /// Text is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// A capture decoded to zero packets.
    #[error("capture contains no packets")]
    EmptyCapture,
}

/// Result type for translation operations.
pub type TranslationResult<T> = Result<T, TranslationError>;

/// Result key holding the base64 frame of a packet.
pub const FRAME_KEY: &str = "binary";

/// Older result key for the frame, read when [`FRAME_KEY`] is absent.
const LEGACY_FRAME_KEY: &str = "bytes";

/// A packet as returned by the service, with its encoded frame when known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketData {
    /// Structured packet.
    pub packet: Packet,
    /// Raw frame bytes computed by the service.
    pub bytes: Option<Vec<u8>>,
}

impl PacketData {
    /// Wraps a packet with no known frame bytes.
    pub fn new(packet: Packet) -> Self {
        Self {
            packet,
            bytes: None,
        }
    }

    /// Parses a packet-returning service result.
    ///
    /// Accepts either a bare protocol array, or an object whose `data` key
    /// holds the protocol array and whose optional `binary` key holds the
    /// base64 frame. `bytes` is read when `binary` is absent.
    pub fn from_result(value: &Value) -> TranslationResult<Self> {
        match value {
            Value::Array(_) => Ok(Self::new(from_wire(value)?)),
            Value::Object(obj) => {
                let data = obj.get("data").ok_or_else(|| TranslationError::MissingKey {
                    path: "result".to_string(),
                    key: "data",
                })?;
                let packet = from_wire(data)?;
                let (key, frame) = match obj.get(FRAME_KEY) {
                    Some(frame) => (FRAME_KEY, Some(frame)),
                    None => (LEGACY_FRAME_KEY, obj.get(LEGACY_FRAME_KEY)),
                };
                let path = format!("result.{key}");
                let bytes = match frame {
                    None | Some(Value::Null) => None,
                    Some(Value::String(b64)) => Some(decode_base64(&path, b64)?),
                    Some(other) => {
                        return Err(TranslationError::Shape {
                            path,
                            expected: "string",
                            found: kind_of(other),
                        });
                    }
                };
                Ok(Self { packet, bytes })
            }
            other => Err(TranslationError::Shape {
                path: "result".to_string(),
                expected: "protocol array or packet object",
                found: kind_of(other),
            }),
        }
    }
}

/// Converts a model packet to its wire representation.
pub fn to_wire(packet: &Packet) -> Value {
    Value::Array(packet.protocols.iter().map(protocol_to_wire).collect())
}

fn protocol_to_wire(protocol: &Protocol) -> Value {
    let fields: Vec<Value> = protocol
        .fields
        .iter()
        .map(|field| {
            let value = match &field.value {
                FieldValue::Str(s) => Value::String(s.clone()),
                FieldValue::Int(n) => Value::from(*n),
            };
            json!({ "id": field.id, "value": value })
        })
        .collect();
    json!({ "id": protocol.id, "fields": fields })
}

/// Converts a wire packet to the model.
///
/// Protocol and field order are preserved. Any shape the model cannot
/// represent fails the whole conversion.
pub fn from_wire(value: &Value) -> TranslationResult<Packet> {
    let protocols = expect_array("packet", value)?;
    let mut packet = Packet::new();

    for (i, entry) in protocols.iter().enumerate() {
        let path = format!("packet[{i}]");
        let obj = expect_object(&path, entry)?;
        let mut protocol = Protocol::new(expect_str_key(&path, obj, "id")?);

        let fields_path = format!("{path}.fields");
        let fields = obj.get("fields").ok_or_else(|| TranslationError::MissingKey {
            path: path.clone(),
            key: "fields",
        })?;

        for (j, entry) in expect_array(&fields_path, fields)?.iter().enumerate() {
            let field_path = format!("{fields_path}[{j}]");
            let obj = expect_object(&field_path, entry)?;
            let id = expect_str_key(&field_path, obj, "id")?;
            let raw = obj.get("value").ok_or_else(|| TranslationError::MissingKey {
                path: field_path.clone(),
                key: "value",
            })?;
            let value = value_from_wire(&format!("{field_path}.value"), raw)?;
            protocol.fields.push(Field { id, value });
        }

        packet.push(protocol);
    }

    Ok(packet)
}

fn value_from_wire(path: &str, value: &Value) -> TranslationResult<FieldValue> {
    match value {
        Value::String(s) => Ok(FieldValue::Str(s.clone())),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(FieldValue::Int(i))
            } else if n.is_u64() {
                Err(TranslationError::IntegerOutOfRange {
                    path: path.to_string(),
                })
            } else {
                Err(TranslationError::UnsupportedValue {
                    path: path.to_string(),
                    found: "float",
                })
            }
        }
        other => Err(TranslationError::UnsupportedValue {
            path: path.to_string(),
            found: kind_of(other),
        }),
    }
}

/// Parses JSON text describing a packet.
pub fn parse_description(text: &str) -> TranslationResult<Value> {
    serde_json::from_str(text).map_err(|e| TranslationError::InvalidJson(e.to_string()))
}

/// Encodes raw bytes as standard base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes standard base64; `path` names the value in errors.
pub fn decode_base64(path: &str, text: &str) -> TranslationResult<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| TranslationError::InvalidBase64 {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

/// Returns a short name for a JSON value's type.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expect_array<'a>(path: &str, value: &'a Value) -> TranslationResult<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| TranslationError::Shape {
        path: path.to_string(),
        expected: "array",
        found: kind_of(value),
    })
}

fn expect_object<'a>(path: &str, value: &'a Value) -> TranslationResult<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| TranslationError::Shape {
        path: path.to_string(),
        expected: "object",
        found: kind_of(value),
    })
}

fn expect_str_key(
    path: &str,
    obj: &Map<String, Value>,
    key: &'static str,
) -> TranslationResult<String> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(TranslationError::Shape {
            path: format!("{path}.{key}"),
            expected: "string",
            found: kind_of(other),
        }),
        None => Err(TranslationError::MissingKey {
            path: path.to_string(),
            key,
        }),
    }
}
