//! JSON-RPC envelope types and codec for the remote packet service.
//!
//! The packet service speaks JSON-RPC 2.0 over a strict request/reply
//! channel. Every request carries a string id that the reply must echo back.
//!
//! # Envelope Structure
//!
//! Requests:
//!
//! ```text
//! {"jsonrpc": "2.0", "id": "7", "method": "build_pkt", "params": [...]}
//! ```
//!
//! Replies carry exactly one of `result` or `error`:
//!
//! ```text
//! {"jsonrpc": "2.0", "id": "7", "result": {...}}
//! {"jsonrpc": "2.0", "id": "7", "error": {"code": -32000, "message": "..."}}
//! ```
//!
//! # Example
//!
//! ```rust
//! use pktedit_protocol::{encode_request, decode_reply, Method, Reply};
//!
//! let bytes = encode_request(Method::GetVersion.as_str(), None, "1").unwrap();
//! assert!(!bytes.is_empty());
//!
//! let reply = br#"{"jsonrpc":"2.0","id":"1","result":{"version":"1.0"}}"#;
//! assert!(matches!(decode_reply(reply, "1"), Ok(Reply::Success(_))));
//! ```

mod codec;
mod error;
mod types;

pub use codec::{decode_reply, decode_response, encode_request};
pub use error::{ProtocolError, ProtocolResult};
pub use types::{Method, Reply, Request, Response, RpcError};

/// JSON-RPC version literal carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";
