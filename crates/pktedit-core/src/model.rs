//! In-memory packet model.
//!
//! A [`Packet`] is an ordered stack of [`Protocol`] layers, each holding an
//! ordered list of [`Field`]s. Layer order is the service's order
//! (outermost first, e.g. `Ether`, `IP`, `TCP`) and is never rearranged.

use std::fmt;

/// A field value as typed on the wire.
///
/// Strings and integers are kept apart so that a value decoded as `"80"`
/// is never re-encoded as `80`, or vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    /// JSON string value.
    Str(String),
    /// JSON integer value.
    Int(i64),
}

impl FieldValue {
    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    /// Returns the integer value, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Str(_) => None,
            Self::Int(n) => Some(*n),
        }
    }

    /// Returns true for string values.
    pub fn is_str(&self) -> bool {
        matches!(self, Self::Str(_))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// A named field inside a protocol layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field identifier, e.g. `dport`.
    pub id: String,
    /// Field value.
    pub value: FieldValue,
}

impl Field {
    /// Creates a new field.
    pub fn new(id: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

/// One protocol layer of a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    /// Protocol identifier, e.g. `IP`. Opaque to this crate.
    pub id: String,
    /// Fields in declaration order.
    pub fields: Vec<Field>,
}

impl Protocol {
    /// Creates a protocol layer with no fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field, builder style.
    #[must_use]
    pub fn with_field(mut self, id: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push(Field::new(id, value));
        self
    }

    /// Looks up a field by id.
    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Sets a field value, appending the field if it is not present.
    ///
    /// Returns the previous value.
    pub fn set_field(
        &mut self,
        id: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        let id = id.into();
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.id == id) {
            Some(field) => Some(std::mem::replace(&mut field.value, value)),
            None => {
                self.fields.push(Field { id, value });
                None
            }
        }
    }
}

/// A packet: an ordered stack of protocol layers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    /// Protocol layers in wire order.
    pub protocols: Vec<Protocol>,
}

impl Packet {
    /// Creates an empty packet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a packet from layers.
    pub fn from_protocols(protocols: Vec<Protocol>) -> Self {
        Self { protocols }
    }

    /// Appends a layer, builder style.
    #[must_use]
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocols.push(protocol);
        self
    }

    /// Returns true if the packet has no layers.
    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }

    /// Returns the number of layers.
    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    /// Returns the layer at `index`.
    pub fn protocol(&self, index: usize) -> Option<&Protocol> {
        self.protocols.get(index)
    }

    /// Returns the layer at `index` mutably.
    pub fn protocol_mut(&mut self, index: usize) -> Option<&mut Protocol> {
        self.protocols.get_mut(index)
    }

    /// Appends a layer.
    pub fn push(&mut self, protocol: Protocol) {
        self.protocols.push(protocol);
    }

    /// Removes and returns the last layer.
    pub fn pop(&mut self) -> Option<Protocol> {
        self.protocols.pop()
    }
}
