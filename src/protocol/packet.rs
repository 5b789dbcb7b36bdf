//! Packet data model.
//!
//! A [`Packet`] is the structured form of one socket.io wire message.
//! The packet type fully determines which other fields are meaningful:
//!
//! | Type | Meaningful fields |
//! |------|-------------------|
//! | `Disconnect`, `Connect` | `endpoint` |
//! | `Heartbeat`, `Noop` | none |
//! | `Message`, `JsonMessage` | `endpoint`, `id`/`ack`, `data` |
//! | `Event` | `endpoint`, `id`/`ack`, `name`, `args` |
//! | `Ack` | `data` (ack id + optional args) |
//! | `Error` | `endpoint`, `data` (reason + optional advice) |

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, json};

use crate::error::{Error, Result};

// ============================================================================
// PacketType
// ============================================================================

/// The nine socket.io packet types.
///
/// The wire encoding is a single leading digit, `0` through `8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// `0` - close the socket or a single namespace.
    Disconnect,
    /// `1` - open the socket or a single namespace.
    Connect,
    /// `2` - bidirectional liveness check.
    Heartbeat,
    /// `3` - plain text message.
    Message,
    /// `4` - message whose payload is a JSON document.
    JsonMessage,
    /// `5` - named event with a JSON argument list.
    Event,
    /// `6` - acknowledgement of an earlier packet.
    Ack,
    /// `7` - server-reported error.
    Error,
    /// `8` - no-op, ignored by both ends.
    Noop,
}

impl PacketType {
    /// Parses a packet type from its wire digit.
    #[inline]
    #[must_use]
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Self::Disconnect),
            1 => Some(Self::Connect),
            2 => Some(Self::Heartbeat),
            3 => Some(Self::Message),
            4 => Some(Self::JsonMessage),
            5 => Some(Self::Event),
            6 => Some(Self::Ack),
            7 => Some(Self::Error),
            8 => Some(Self::Noop),
            _ => None,
        }
    }

    /// Returns the wire digit for this type.
    #[inline]
    #[must_use]
    pub fn digit(self) -> u8 {
        match self {
            Self::Disconnect => 0,
            Self::Connect => 1,
            Self::Heartbeat => 2,
            Self::Message => 3,
            Self::JsonMessage => 4,
            Self::Event => 5,
            Self::Ack => 6,
            Self::Error => 7,
            Self::Noop => 8,
        }
    }

    /// Returns the protocol name of this type.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Disconnect => "disconnect",
            Self::Connect => "connect",
            Self::Heartbeat => "heartbeat",
            Self::Message => "message",
            Self::JsonMessage => "json",
            Self::Event => "event",
            Self::Ack => "ack",
            Self::Error => "error",
            Self::Noop => "noop",
        }
    }
}

// ============================================================================
// AckMode
// ============================================================================

/// How an outgoing packet relates to acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// No acknowledgement involved.
    #[default]
    None,
    /// Packet carries an id and expects a bare ack (wire: plain `id`).
    Plain,
    /// Packet carries an id and expects ack data back (wire: `id+`).
    WithData,
}

// ============================================================================
// Packet
// ============================================================================

/// One structured socket.io packet.
///
/// Produced by the codec on decode and consumed by it on encode. For every
/// field its type defines, `decode(encode(p)) == p`.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Packet type; determines which other fields are meaningful.
    pub packet_type: PacketType,

    /// Namespace path; empty string = default namespace.
    pub endpoint: String,

    /// Ack correlation id (string of digits), if any.
    pub id: Option<String>,

    /// Ack relationship of this packet.
    pub ack: AckMode,

    /// Event name (event packets only).
    pub name: Option<String>,

    /// Event arguments (event packets only).
    pub args: Vec<Value>,

    /// Raw payload; interpretation depends on `packet_type`.
    pub data: String,
}

impl Packet {
    /// Creates an empty packet of the given type.
    #[must_use]
    pub fn new(packet_type: PacketType) -> Self {
        Self {
            packet_type,
            endpoint: String::new(),
            id: None,
            ack: AckMode::None,
            name: None,
            args: Vec::new(),
            data: String::new(),
        }
    }

    /// Creates a plain text message packet.
    #[must_use]
    pub fn message(text: impl Into<String>) -> Self {
        let mut packet = Self::new(PacketType::Message);
        packet.data = text.into();
        packet
    }

    /// Creates a JSON message packet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the value cannot be serialized.
    pub fn json_message(value: &Value) -> Result<Self> {
        let mut packet = Self::new(PacketType::JsonMessage);
        packet.data = serde_json::to_string(value)?;
        Ok(packet)
    }

    /// Creates an event packet with a name and argument list.
    #[must_use]
    pub fn event(name: impl Into<String>, args: Vec<Value>) -> Self {
        let mut packet = Self::new(PacketType::Event);
        packet.name = Some(name.into());
        packet.args = args;
        packet
    }

    /// Creates an acknowledgement reply for the given ack id.
    ///
    /// The args are included only when non-empty, matching the
    /// `ackId ['+' argsJson]` payload grammar.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the args cannot be serialized.
    pub fn ack_reply(ack_id: &str, args: &[Value]) -> Result<Self> {
        let mut packet = Self::new(PacketType::Ack);
        packet.data = if args.is_empty() {
            ack_id.to_string()
        } else {
            let encoded = serde_json::to_string(args)?;
            format!("{ack_id}+{encoded}")
        };
        Ok(packet)
    }

    /// Creates a connect packet for an endpoint.
    #[must_use]
    pub fn connect(endpoint: impl Into<String>) -> Self {
        Self::new(PacketType::Connect).with_endpoint(endpoint)
    }

    /// Creates a disconnect packet for an endpoint.
    #[must_use]
    pub fn disconnect(endpoint: impl Into<String>) -> Self {
        Self::new(PacketType::Disconnect).with_endpoint(endpoint)
    }

    /// Creates a heartbeat packet.
    #[must_use]
    pub fn heartbeat() -> Self {
        Self::new(PacketType::Heartbeat)
    }

    /// Tags this packet with a namespace endpoint.
    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Tags this packet with an ack id requesting a data reply.
    #[inline]
    #[must_use]
    pub fn with_ack_request(mut self, ack_id: impl Into<String>) -> Self {
        self.id = Some(ack_id.into());
        self.ack = AckMode::WithData;
        self
    }

    /// Returns the payload parsed as JSON.
    ///
    /// For event packets this is the `{"name": ..., "args": [...]}`
    /// document; for JSON messages it is the payload itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload is not valid JSON.
    pub fn data_as_json(&self) -> Result<Value> {
        if self.packet_type == PacketType::Event {
            return Ok(json!({
                "name": self.name.clone().unwrap_or_default(),
                "args": self.args,
            }));
        }
        Ok(serde_json::from_str(&self.data)?)
    }

    /// Parses the ack payload of an ack packet.
    ///
    /// Returns the referenced ack id and the decoded argument list
    /// (empty when the ack carried no data).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPacket`] if the payload does not follow
    /// the `ackId ['+' argsJson]` grammar.
    pub fn ack_payload(&self) -> Result<(String, Vec<Value>)> {
        let (ack_id, rest) = match self.data.find('+') {
            Some(pos) => (&self.data[..pos], &self.data[pos + 1..]),
            None => (self.data.as_str(), ""),
        };

        if ack_id.is_empty() || !ack_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_packet(format!(
                "ack payload has no ack id: {:?}",
                self.data
            )));
        }

        let args = if rest.is_empty() {
            Vec::new()
        } else {
            match serde_json::from_str::<Value>(rest) {
                Ok(Value::Array(args)) => args,
                Ok(other) => vec![other],
                Err(e) => {
                    return Err(Error::invalid_packet(format!("ack args not JSON: {e}")));
                }
            }
        };

        Ok((ack_id.to_string(), args))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_digit_round_trip() {
        for digit in 0..=8 {
            let ty = PacketType::from_digit(digit).expect("valid digit");
            assert_eq!(ty.digit(), digit);
        }
        assert_eq!(PacketType::from_digit(9), None);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(PacketType::Disconnect.name(), "disconnect");
        assert_eq!(PacketType::JsonMessage.name(), "json");
        assert_eq!(PacketType::Noop.name(), "noop");
    }

    #[test]
    fn test_message_constructor() {
        let packet = Packet::message("hello");
        assert_eq!(packet.packet_type, PacketType::Message);
        assert_eq!(packet.data, "hello");
        assert_eq!(packet.ack, AckMode::None);
        assert!(packet.id.is_none());
    }

    #[test]
    fn test_event_with_ack_request() {
        let packet = Packet::event("chat", vec![json!("hi")]).with_ack_request("12");
        assert_eq!(packet.id.as_deref(), Some("12"));
        assert_eq!(packet.ack, AckMode::WithData);
        assert_eq!(packet.name.as_deref(), Some("chat"));
    }

    #[test]
    fn test_ack_reply_without_args() {
        let packet = Packet::ack_reply("7", &[]).expect("encode");
        assert_eq!(packet.data, "7");
    }

    #[test]
    fn test_ack_reply_with_args() {
        let packet = Packet::ack_reply("7", &[json!("ok")]).expect("encode");
        assert_eq!(packet.data, r#"7+["ok"]"#);
    }

    #[test]
    fn test_ack_payload_round_trip() {
        let packet = Packet::ack_reply("42", &[json!(1), json!("two")]).expect("encode");
        let (ack_id, args) = packet.ack_payload().expect("parse");
        assert_eq!(ack_id, "42");
        assert_eq!(args, vec![json!(1), json!("two")]);
    }

    #[test]
    fn test_ack_payload_rejects_garbage() {
        let mut packet = Packet::new(PacketType::Ack);
        packet.data = "+[]".to_string();
        assert!(packet.ack_payload().is_err());

        packet.data = "abc".to_string();
        assert!(packet.ack_payload().is_err());
    }

    #[test]
    fn test_data_as_json_for_event() {
        let packet = Packet::event("chat", vec![json!("hi")]);
        let value = packet.data_as_json().expect("json");
        assert_eq!(value["name"], "chat");
        assert_eq!(value["args"][0], "hi");
    }

    #[test]
    fn test_data_as_json_for_json_message() {
        let packet = Packet::json_message(&json!({"k": 1})).expect("encode");
        let value = packet.data_as_json().expect("json");
        assert_eq!(value["k"], 1);
    }
}
