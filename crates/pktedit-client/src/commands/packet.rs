//! Packet commands: version, build, decode, encode, tree.

use std::path::Path;

use serde_json::json;
use tracing::info;

use crate::commands::{packet_json, print_json};
use crate::editor::PacketEditorModel;
use crate::error::{ClientError, ClientResult};
use crate::service::ServiceClient;

/// Prints the negotiated service version and handle.
pub async fn version(client: &ServiceClient) -> ClientResult<()> {
    print_json(&json!({
        "service_version": client.service_version().await,
        "version_handle": client.version_handle().await,
    }))
}

/// Builds a packet from a JSON description file.
pub async fn build(editor: &mut PacketEditorModel, input: &Path) -> ClientResult<()> {
    let text = tokio::fs::read_to_string(input).await?;
    editor.load_from_json(&text).await?;
    print_document(editor)
}

/// Decodes the first packet of a capture file.
pub async fn decode(editor: &mut PacketEditorModel, input: &Path) -> ClientResult<()> {
    let capture = tokio::fs::read(input).await?;
    editor.load_from_capture(&capture).await?;
    print_document(editor)
}

/// Builds a JSON description and writes the result as a capture file.
pub async fn encode(editor: &mut PacketEditorModel, input: &Path, output: &Path) -> ClientResult<()> {
    let text = tokio::fs::read_to_string(input).await?;
    editor.load_from_json(&text).await?;
    let capture = editor.save_to_capture().await?;
    tokio::fs::write(output, &capture).await?;
    info!(path = %output.display(), len = capture.len(), "capture written");
    Ok(())
}

/// Prints the protocol metadata tree.
pub async fn tree(client: &ServiceClient) -> ClientResult<()> {
    let tree = client.fetch_metadata_tree().await?;
    print_json(&tree)
}

fn print_document(editor: &PacketEditorModel) -> ClientResult<()> {
    let document = editor
        .document()
        .ok_or_else(|| ClientError::invalid_edit("no packet loaded"))?;
    print_json(&packet_json(&document.data))
}
