//! Subcommand implementations.

pub mod config;
pub mod packet;
pub mod templates;

use std::sync::Arc;

use pktedit_core::wire::{FRAME_KEY, encode_base64};
use pktedit_core::{PacketData, TemplateStore, to_wire};
use serde_json::{Value, json};
use tracing::info;

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::editor::PacketEditorModel;
use crate::error::{ClientError, ClientResult};
use crate::service::ServiceClient;

/// Opens a negotiated client using CLI overrides on top of the config.
pub async fn connect(cli: &Cli, config: &ClientConfig) -> ClientResult<ServiceClient> {
    let endpoint = cli
        .endpoint
        .clone()
        .unwrap_or_else(|| config.service.endpoint.clone());
    let timeout = cli
        .timeout
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| config.service.timeout());

    let client = ServiceClient::zmq(timeout);
    let version = client.open(&endpoint).await?;
    info!(endpoint = %endpoint, service_version = %version, "connected to packet service");
    Ok(client)
}

/// Creates an editor model over a connected client.
pub fn editor(client: ServiceClient, config: &ClientConfig) -> PacketEditorModel {
    PacketEditorModel::new(Arc::new(client), TemplateStore::new(config.templates_dir()))
}

/// Renders packet data as printable JSON.
pub fn packet_json(data: &PacketData) -> Value {
    let mut out = json!({ "data": to_wire(&data.packet) });
    if let Some(bytes) = &data.bytes {
        out[FRAME_KEY] = Value::String(encode_base64(bytes));
    }
    out
}

/// Pretty-prints a JSON value to stdout.
pub fn print_json(value: &Value) -> ClientResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ClientError::invalid_edit(format!("failed to render output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pktedit_core::{Packet, Protocol};

    #[test]
    fn packet_json_includes_bytes_when_known() {
        let packet = Packet::new().with_protocol(Protocol::new("IP").with_field("ttl", 64_i64));
        let without = packet_json(&PacketData::new(packet.clone()));
        assert_eq!(
            without,
            json!({"data": [{"id": "IP", "fields": [{"id": "ttl", "value": 64}]}]})
        );

        let with = packet_json(&PacketData {
            packet,
            bytes: Some(b"\x45".to_vec()),
        });
        assert_eq!(with["binary"], json!("RQ=="));
    }
}
