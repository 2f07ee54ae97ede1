//! Packet service session, operations, editor model and CLI
//!
//! This crate provides the `pktedit` command-line interface and the
//! [`PacketEditorModel`] consumed by editor front ends.

pub mod cli;
pub mod commands;
pub mod config;
pub mod editor;
pub mod error;
pub mod negotiate;
pub mod service;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use cli::Cli;
pub use config::ClientConfig;
pub use editor::{Document, DocumentSource, PacketEditorModel};
pub use error::{ClientError, ClientResult};
pub use service::ServiceClient;
pub use session::{Session, SessionState};
pub use transport::{BoxFuture, Transport, ZmqTransport};
