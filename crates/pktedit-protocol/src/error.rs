//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding requests or validating replies.
///
/// A well-formed reply carrying an `error` object is not a protocol error;
/// see [`crate::Reply::Failure`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Failed to serialize the request envelope.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Reply bytes are not a valid JSON-RPC envelope.
    #[error("malformed reply: {0}")]
    Malformed(String),

    /// Reply does not carry a correlation id.
    #[error("reply is missing its id (expected {expected})")]
    MissingId { expected: String },

    /// Reply id does not match the outstanding request.
    #[error("reply id mismatch: expected {expected}, received {received}")]
    IdMismatch { expected: String, received: String },

    /// Reply carries both or neither of `result` and `error`.
    #[error("invalid reply envelope: {0}")]
    InvalidEnvelope(&'static str),

    /// Reply declares a JSON-RPC version other than 2.0.
    #[error("unsupported JSON-RPC version: {0}")]
    UnsupportedVersion(String),
}
