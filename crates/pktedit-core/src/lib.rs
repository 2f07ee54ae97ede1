//! Core types: packet model, wire translation, templates, tracing

pub mod model;
pub mod template;
pub mod tracing;
pub mod wire;

pub use model::{Field, FieldValue, Packet, Protocol};
pub use template::{TEMPLATE_EXTENSION, TemplateError, TemplateStore};
pub use crate::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
pub use wire::{PacketData, TranslationError, TranslationResult, from_wire, to_wire};
