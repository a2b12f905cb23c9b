use crate::protocol::{InternalType, SensorType, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node id of the gateway itself.
pub const GATEWAY_NODE_ID: u8 = 0;
/// Broadcast address; also the id used by nodes that have none yet.
pub const BROADCAST_ID: u8 = 255;
/// Child id used for node-level (rather than sensor-level) messages.
pub const NODE_SENSOR_ID: u8 = 255;
/// Payload limit of the serial protocol.
pub const MAX_PAYLOAD_LEN: usize = 25;

/// Protocol command carried in the third field of a frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Presentation,
    Set,
    Request,
    Internal,
    Stream,
}

impl MessageType {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(MessageType::Presentation),
            1 => Some(MessageType::Set),
            2 => Some(MessageType::Request),
            3 => Some(MessageType::Internal),
            4 => Some(MessageType::Stream),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            MessageType::Presentation => 0,
            MessageType::Set => 1,
            MessageType::Request => 2,
            MessageType::Internal => 3,
            MessageType::Stream => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Presentation => "presentation",
            MessageType::Set => "set",
            MessageType::Request => "request",
            MessageType::Internal => "internal",
            MessageType::Stream => "stream",
        }
    }
}

/// One decoded serial frame.
///
/// `sub_type` is kept as the raw wire integer because its meaning depends on
/// `kind`; use the typed accessors to interpret it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub node_id: u8,
    pub sensor_id: u8,
    pub kind: MessageType,
    pub ack: bool,
    pub sub_type: u8,
    pub payload: String,
}

impl Message {
    pub fn new(
        node_id: u8,
        sensor_id: u8,
        kind: MessageType,
        sub_type: u8,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            node_id,
            sensor_id,
            kind,
            ack: false,
            sub_type,
            payload: payload.into(),
        }
    }

    pub fn set(node_id: u8, sensor_id: u8, value_type: ValueType, payload: impl Into<String>) -> Self {
        Self::new(node_id, sensor_id, MessageType::Set, value_type.into(), payload)
    }

    pub fn internal(node_id: u8, internal_type: InternalType, payload: impl Into<String>) -> Self {
        Self::new(
            node_id,
            NODE_SENSOR_ID,
            MessageType::Internal,
            internal_type.into(),
            payload,
        )
    }

    pub fn with_ack(mut self, ack: bool) -> Self {
        self.ack = ack;
        self
    }

    pub fn sensor_type(&self) -> Option<SensorType> {
        match self.kind {
            MessageType::Presentation => SensorType::from_u8(self.sub_type),
            _ => None,
        }
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match self.kind {
            MessageType::Set | MessageType::Request => ValueType::from_u8(self.sub_type),
            _ => None,
        }
    }

    pub fn internal_type(&self) -> Option<InternalType> {
        match self.kind {
            MessageType::Internal => InternalType::from_u8(self.sub_type),
            _ => None,
        }
    }

    /// Mnemonic of the sub-type for this message kind, or the raw number.
    pub fn sub_type_name(&self) -> String {
        let name = match self.kind {
            MessageType::Presentation => self.sensor_type().map(|t| t.name()),
            MessageType::Set | MessageType::Request => self.value_type().map(|t| t.name()),
            MessageType::Internal => self.internal_type().map(|t| t.name()),
            MessageType::Stream => None,
        };
        name.map(str::to_string)
            .unwrap_or_else(|| self.sub_type.to_string())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{};{};{}",
            self.node_id,
            self.sensor_id,
            self.kind.code(),
            u8::from(self.ack),
            self.sub_type,
            self.payload
        )
    }
}
