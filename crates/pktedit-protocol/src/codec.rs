//! Request encoding and reply validation.
//!
//! The codec fails closed: anything that is not a well-formed reply to the
//! outstanding request id is an error, never a result.

use serde_json::Value;
use tracing::error;

use crate::JSONRPC_VERSION;
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{Reply, Request, Response};

/// Encodes a request envelope to JSON bytes.
pub fn encode_request(method: &str, params: Option<Value>, id: &str) -> ProtocolResult<Vec<u8>> {
    let request = Request::new(id, method, params);
    serde_json::to_vec(&request).map_err(ProtocolError::Serialization)
}

/// Parses reply bytes and checks version and correlation.
///
/// The returned envelope is guaranteed to carry `expected_id`, but may still
/// hold both or neither of `result` and `error`; use [`decode_reply`] for a
/// fully validated reply.
pub fn decode_response(data: &[u8], expected_id: &str) -> ProtocolResult<Response> {
    if data.is_empty() {
        return Err(ProtocolError::Malformed("empty reply".to_string()));
    }

    let response: Response =
        serde_json::from_slice(data).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    if response.jsonrpc != JSONRPC_VERSION {
        return Err(ProtocolError::UnsupportedVersion(response.jsonrpc));
    }

    let Some(received) = response.id_text() else {
        error!(expected = %expected_id, "reply has no id");
        return Err(ProtocolError::MissingId {
            expected: expected_id.to_string(),
        });
    };

    if received != expected_id {
        error!(
            expected = %expected_id,
            received = %received,
            "reply id mismatch"
        );
        return Err(ProtocolError::IdMismatch {
            expected: expected_id.to_string(),
            received,
        });
    }

    Ok(response)
}

/// Decodes and validates a reply to the request `expected_id`.
pub fn decode_reply(data: &[u8], expected_id: &str) -> ProtocolResult<Reply> {
    let response = decode_response(data, expected_id)?;

    match (response.result, response.error) {
        (Some(result), None) => Ok(Reply::Success(result)),
        (None, Some(err)) => Ok(Reply::Failure(err)),
        (Some(_), Some(_)) => Err(ProtocolError::InvalidEnvelope(
            "reply carries both result and error",
        )),
        (None, None) => Err(ProtocolError::InvalidEnvelope(
            "reply carries neither result nor error",
        )),
    }
}
