//! Editor-facing packet document model.
//!
//! [`PacketEditorModel`] is the only surface the presentation layer talks
//! to: it loads and saves documents (capture bytes, JSON descriptions,
//! templates), applies field edits through the service, and announces
//! template list changes. A failed operation leaves the current document
//! untouched.

use std::path::PathBuf;
use std::sync::Arc;

use pktedit_core::wire::parse_description;
use pktedit_core::{FieldValue, Packet, PacketData, Protocol, TemplateStore, to_wire};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};
use crate::service::ServiceClient;

/// Where the current document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Decoded from capture bytes.
    Capture,
    /// Built from a JSON description.
    Description,
    /// Loaded from a user template.
    Template(String),
    /// Edited in place.
    Edited,
}

/// The packet currently open in the editor.
#[derive(Debug, Clone)]
pub struct Document {
    /// Service-computed packet and frame bytes.
    pub data: PacketData,
    /// Origin of the document.
    pub source: DocumentSource,
}

/// Packet document model shared by editor front ends.
#[derive(Debug)]
pub struct PacketEditorModel {
    client: Arc<ServiceClient>,
    templates: TemplateStore,
    document: Option<Document>,
    templates_changed: watch::Sender<u64>,
}

impl PacketEditorModel {
    /// Creates an empty model.
    pub fn new(client: Arc<ServiceClient>, templates: TemplateStore) -> Self {
        let (templates_changed, _) = watch::channel(0);
        Self {
            client,
            templates,
            document: None,
            templates_changed,
        }
    }

    /// Returns the service client.
    pub fn client(&self) -> &Arc<ServiceClient> {
        &self.client
    }

    /// Returns the user template store.
    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// Returns the current document.
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Returns the current packet model.
    pub fn current_packet(&self) -> Option<&Packet> {
        self.document.as_ref().map(|d| &d.data.packet)
    }

    /// Discards the current document.
    pub fn new_packet(&mut self) {
        debug!("new empty document");
        self.document = None;
    }

    fn replace(&mut self, data: PacketData, source: DocumentSource) -> &Packet {
        &self.document.insert(Document { data, source }).data.packet
    }

    /// Loads the first packet of a capture file.
    pub async fn load_from_capture(&mut self, capture: &[u8]) -> ClientResult<&Packet> {
        let data = self.client.decode_capture(capture).await?;
        info!(protocols = data.packet.len(), "loaded packet from capture");
        Ok(self.replace(data, DocumentSource::Capture))
    }

    /// Loads a JSON packet description and builds it.
    pub async fn load_from_json(&mut self, text: &str) -> ClientResult<&Packet> {
        let description = parse_description(text)?;
        let data = self.client.build(&description).await?;
        Ok(self.replace(data, DocumentSource::Description))
    }

    /// Encodes the current packet as capture bytes.
    ///
    /// Uses the frame bytes the service last computed, rebuilding first if
    /// none are known.
    pub async fn save_to_capture(&self) -> ClientResult<Vec<u8>> {
        let document = self
            .document
            .as_ref()
            .filter(|d| !d.data.packet.is_empty())
            .ok_or_else(|| ClientError::invalid_edit("no packet to save"))?;

        let frame = match &document.data.bytes {
            Some(bytes) => bytes.clone(),
            None => self
                .client
                .build_packet(&document.data.packet)
                .await?
                .bytes
                .ok_or_else(|| ClientError::invalid_edit("service returned no frame bytes"))?,
        };
        self.client.encode_capture(&frame).await
    }

    /// Serializes the current packet as a JSON description.
    pub fn save_to_json(&self) -> ClientResult<String> {
        let packet = self.current_packet().cloned().unwrap_or_default();
        serde_json::to_string_pretty(&to_wire(&packet))
            .map_err(|e| ClientError::invalid_edit(format!("failed to serialize packet: {e}")))
    }

    /// Sets one field of the current packet and lets the service recompute
    /// dependent values.
    pub async fn set_field_value(
        &mut self,
        protocol_index: usize,
        field_id: &str,
        value: FieldValue,
    ) -> ClientResult<&Packet> {
        let mut edited = self
            .current_packet()
            .cloned()
            .ok_or_else(|| ClientError::invalid_edit("no packet loaded"))?;
        let protocol = edited.protocol_mut(protocol_index).ok_or_else(|| {
            ClientError::invalid_edit(format!("no protocol at index {protocol_index}"))
        })?;
        protocol.set_field(field_id, value);
        self.apply(edited).await
    }

    /// Appends a protocol layer with default field values.
    pub async fn append_protocol(&mut self, protocol_id: &str) -> ClientResult<&Packet> {
        let mut edited = self.current_packet().cloned().unwrap_or_default();
        edited.push(Protocol::new(protocol_id));
        let data = self.client.build_packet(&edited).await?;
        Ok(self.replace(data, DocumentSource::Edited))
    }

    /// Removes the outermost-last protocol layer.
    ///
    /// Returns the removed layer, or `None` if there was nothing to remove.
    pub async fn remove_last_protocol(&mut self) -> ClientResult<Option<Protocol>> {
        let Some(mut edited) = self.current_packet().cloned() else {
            return Ok(None);
        };
        let removed = edited.pop();
        if edited.is_empty() {
            self.document = None;
        } else {
            let data = self.client.build_packet(&edited).await?;
            self.replace(data, DocumentSource::Edited);
        }
        Ok(removed)
    }

    /// Reconstructs from raw bytes when they are known, otherwise rebuilds.
    async fn apply(&mut self, edited: Packet) -> ClientResult<&Packet> {
        let raw = self.document.as_ref().and_then(|d| d.data.bytes.clone());
        let data = match raw {
            Some(raw) => self
                .client
                .reconstruct(&raw, &edited)
                .await?
                .ok_or_else(|| ClientError::invalid_edit("service declined to reconstruct"))?,
            None => self.client.build_packet(&edited).await?,
        };
        Ok(self.replace(data, DocumentSource::Edited))
    }

    /// Lists user template names.
    pub fn template_names(&self) -> ClientResult<Vec<String>> {
        Ok(self.templates.list()?)
    }

    /// Loads a user template and builds it.
    pub async fn load_template(&mut self, name: &str) -> ClientResult<&Packet> {
        let packet = self.templates.load(name)?;
        let data = self.client.build_packet(&packet).await?;
        Ok(self.replace(data, DocumentSource::Template(name.to_string())))
    }

    /// Loads one of the service's predefined templates and builds it.
    pub async fn load_service_template(&mut self, name: &str) -> ClientResult<&Packet> {
        let description = self.client.fetch_template(name).await?;
        let data = self.client.build(&description).await?;
        Ok(self.replace(data, DocumentSource::Template(name.to_string())))
    }

    /// Saves the current packet as a user template and notifies
    /// subscribers.
    pub fn save_as_template(&self, name: &str) -> ClientResult<PathBuf> {
        let packet = self.current_packet().cloned().unwrap_or_default();
        let path = self.templates.save(name, &packet)?;
        self.templates_changed.send_modify(|generation| *generation += 1);
        info!(name = %name, "template saved");
        Ok(path)
    }

    /// Subscribes to template list changes.
    ///
    /// The value is a generation counter; any change means the list should
    /// be re-read.
    pub fn subscribe_templates(&self) -> watch::Receiver<u64> {
        self.templates_changed.subscribe()
    }
}
