//! Envelope and method types for the packet service protocol.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::JSONRPC_VERSION;

/// Remote methods exposed by the packet service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Report the service version. Takes no parameters.
    GetVersion,
    /// Exchange a client/protocol version pair for a version handle.
    GetVersionHandler,
    /// Build a packet from a JSON description.
    BuildPkt,
    /// Decode a base64 capture file into packets.
    ReadPcap,
    /// Encode base64 frames into a capture file.
    WritePcap,
    /// Fetch the protocol/field metadata catalogue.
    GetTree,
    /// Merge raw bytes with an edited packet and recompute derived fields.
    ReconstructPkt,
    /// List the service's predefined templates.
    GetTemplates,
    /// Fetch one predefined template as base64 JSON.
    GetTemplate,
}

impl Method {
    /// Returns the wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetVersion => "get_version",
            Self::GetVersionHandler => "get_version_handler",
            Self::BuildPkt => "build_pkt",
            Self::ReadPcap => "read_pcap",
            Self::WritePcap => "write_pcap",
            Self::GetTree => "get_tree",
            Self::ReconstructPkt => "reconstruct_pkt",
            Self::GetTemplates => "get_templates",
            Self::GetTemplate => "get_template",
        }
    }

    /// Returns true if the method takes the version handle as its first
    /// positional parameter.
    pub fn is_versioned(&self) -> bool {
        !matches!(self, Self::GetVersion | Self::GetVersionHandler)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outgoing request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// JSON-RPC version literal.
    pub jsonrpc: String,
    /// Correlation id, unique within a session.
    pub id: String,
    /// Remote method name.
    pub method: String,
    /// Parameters; omitted entirely for parameterless calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Creates a request with the current JSON-RPC version.
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Error object carried by a failed reply.
///
/// Decoding never fails on the members: a non-integer `code` becomes `0` and
/// a non-string `message` is kept as its JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Service-defined error code.
    #[serde(default, deserialize_with = "lenient_code")]
    pub code: i64,
    /// Human-readable message.
    #[serde(default, deserialize_with = "lenient_message")]
    pub message: String,
    /// Optional extra payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Incoming reply envelope, before validation.
///
/// `result` distinguishes an explicit `null` (`Some(Value::Null)`) from an
/// absent key (`None`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// JSON-RPC version literal.
    pub jsonrpc: String,
    /// Echoed correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Result payload on success.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    /// Error payload on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// Returns the id as text. Numeric ids are rendered in decimal.
    pub fn id_text(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn lenient_code<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_i64().unwrap_or_default())
}

fn lenient_message<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(message) => message,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// A validated reply: exactly one of result or error.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The call succeeded with this result.
    Success(Value),
    /// The service rejected the call.
    Failure(RpcError),
}
