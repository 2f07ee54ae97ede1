//! Typed packet operations on top of a negotiated session.
//!
//! [`ServiceClient`] owns the [`Session`] behind an async mutex, so callers on
//! any task queue behind the one in-flight exchange instead of interleaving
//! with it.

use std::time::Duration;

use pktedit_core::template::display_name;
use pktedit_core::wire::{decode_base64, encode_base64, kind_of, parse_description};
use pktedit_core::{Packet, PacketData, TranslationError, to_wire};
use pktedit_protocol::Method;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::{ClientError, ClientResult};
use crate::negotiate::negotiate;
use crate::session::Session;
use crate::transport::Transport;

/// Client for the remote packet service.
#[derive(Debug)]
pub struct ServiceClient {
    session: Mutex<Session>,
}

impl ServiceClient {
    /// Wraps an existing session.
    pub fn new(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(transport: Box<dyn Transport>, timeout: Duration) -> Self {
        Self::new(Session::new(transport, timeout))
    }

    /// Creates a client over ZeroMQ.
    pub fn zmq(timeout: Duration) -> Self {
        Self::new(Session::zmq(timeout))
    }

    /// Connects and negotiates. Returns the service version.
    ///
    /// Any previous session is torn down first.
    #[instrument(skip(self))]
    pub async fn open(&self, endpoint: &str) -> ClientResult<String> {
        let mut session = self.session.lock().await;
        session.open(endpoint).await?;
        negotiate(&mut session).await
    }

    /// Closes the session. Safe to call repeatedly.
    pub async fn close(&self) {
        self.session.lock().await.close();
    }

    /// Returns true once the handshake has completed.
    pub async fn is_open(&self) -> bool {
        let mut session = self.session.lock().await;
        session.discard_cancelled();
        session.is_open()
    }

    /// Returns the negotiated version handle.
    pub async fn version_handle(&self) -> Option<String> {
        self.session.lock().await.version_handle().map(str::to_string)
    }

    /// Returns the version reported by the service.
    pub async fn service_version(&self) -> Option<String> {
        self.session.lock().await.service_version().map(str::to_string)
    }

    async fn call(&self, method: Method, args: Vec<Value>) -> ClientResult<Value> {
        self.session.lock().await.call_versioned(method, args).await
    }

    /// Builds a packet from a JSON description.
    ///
    /// The result includes values the service computed (checksums,
    /// lengths, defaults).
    #[instrument(skip_all)]
    pub async fn build(&self, description: &Value) -> ClientResult<PacketData> {
        let result = self.call(Method::BuildPkt, vec![description.clone()]).await?;
        Ok(PacketData::from_result(&result)?)
    }

    /// Builds a model packet.
    pub async fn build_packet(&self, packet: &Packet) -> ClientResult<PacketData> {
        self.build(&to_wire(packet)).await
    }

    /// Decodes the first packet of a capture file.
    ///
    /// The service returns every packet in the capture; only the first is
    /// kept and the rest are dropped without error, since the editor works
    /// on a single frame.
    #[instrument(skip_all, fields(len = capture.len()))]
    pub async fn decode_capture(&self, capture: &[u8]) -> ClientResult<PacketData> {
        let result = self
            .call(Method::ReadPcap, vec![Value::String(encode_base64(capture))])
            .await?;
        let packets = result.as_array().ok_or_else(|| TranslationError::Shape {
            path: "read_pcap".to_string(),
            expected: "array",
            found: kind_of(&result),
        })?;
        let first = packets.first().ok_or(TranslationError::EmptyCapture)?;
        if packets.len() > 1 {
            debug!(
                discarded = packets.len() - 1,
                "capture holds several packets, keeping the first"
            );
        }
        Ok(PacketData::from_result(first)?)
    }

    /// Encodes one frame into capture-file bytes.
    #[instrument(skip_all, fields(len = frame.len()))]
    pub async fn encode_capture(&self, frame: &[u8]) -> ClientResult<Vec<u8>> {
        let frames = Value::Array(vec![Value::String(encode_base64(frame))]);
        let result = self.call(Method::WritePcap, vec![frames]).await?;
        match &result {
            Value::String(b64) => Ok(decode_base64("write_pcap", b64)?),
            other => Err(TranslationError::Shape {
                path: "write_pcap".to_string(),
                expected: "string",
                found: kind_of(other),
            }
            .into()),
        }
    }

    /// Merges raw frame bytes with an edited packet.
    ///
    /// The service recomputes bytes affected by the edit and leaves the rest
    /// intact. Returns `None` when the service declines with a null result.
    #[instrument(skip_all, fields(len = raw.len()))]
    pub async fn reconstruct(&self, raw: &[u8], edited: &Packet) -> ClientResult<Option<PacketData>> {
        let args = vec![Value::String(encode_base64(raw)), to_wire(edited)];
        let result = self.call(Method::ReconstructPkt, args).await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(PacketData::from_result(&result)?))
    }

    /// Fetches the protocol/field metadata catalogue, unmodified.
    pub async fn fetch_metadata_tree(&self) -> ClientResult<Value> {
        self.call(Method::GetTree, Vec::new()).await
    }

    /// Lists the service's predefined templates, without file extensions.
    pub async fn list_templates(&self) -> ClientResult<Vec<String>> {
        let result = self.call(Method::GetTemplates, Vec::new()).await?;
        let entries = result.as_array().ok_or_else(|| TranslationError::Shape {
            path: "get_templates".to_string(),
            expected: "array",
            found: kind_of(&result),
        })?;
        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| match entry {
                Value::String(name) => Ok(display_name(name).to_string()),
                other => Err(ClientError::from(TranslationError::Shape {
                    path: format!("get_templates[{i}]"),
                    expected: "string",
                    found: kind_of(other),
                })),
            })
            .collect()
    }

    /// Fetches a predefined template as a JSON packet description.
    pub async fn fetch_template(&self, name: &str) -> ClientResult<Value> {
        let result = self
            .call(Method::GetTemplate, vec![Value::String(name.to_string())])
            .await?;
        let Value::String(b64) = &result else {
            return Err(TranslationError::Shape {
                path: "get_template".to_string(),
                expected: "string",
                found: kind_of(&result),
            }
            .into());
        };
        let bytes = decode_base64("get_template", b64)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| TranslationError::InvalidJson(e.to_string()))?;
        Ok(parse_description(&text)?)
    }
}
