//! Client error types.

use std::io;

use pktedit_core::{TemplateError, TranslationError};
use pktedit_protocol::ProtocolError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Classified failure returned by every service and editor operation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not connect, or the transport failed mid-exchange.
    #[error("connection error: {0}")]
    Connection(String),

    /// No reply within the configured timeout.
    #[error("timed out after {0}s waiting for the packet service")]
    Timeout(u64),

    /// The session is not in a state that allows this call.
    #[error("session is not open: {0}")]
    NotConnected(&'static str),

    /// Version handshake with the service failed.
    #[error("version negotiation failed: {0}")]
    Negotiation(String),

    /// Malformed or uncorrelated reply.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The service answered with an error object.
    #[error("service error: {message}")]
    Remote { code: i64, message: String },

    /// A reply could not be mapped to the packet model.
    #[error("translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Template store failure.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// An edit could not be applied to the current packet.
    #[error("invalid edit: {0}")]
    InvalidEdit(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Returns true if the session was closed by this failure and must be
    /// reopened before the next call.
    pub fn requires_reopen(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::Protocol(_) | Self::Negotiation(_)
        )
    }

    /// Creates an invalid edit error.
    pub fn invalid_edit(message: impl Into<String>) -> Self {
        Self::InvalidEdit(message.into())
    }
}
