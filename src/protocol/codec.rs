//! Versioned packet codec.
//!
//! Converts between [`Packet`] and its wire-format string for either
//! protocol generation. The generation is fixed once per connect attempt
//! and carried as a tagged variant, so both framings stay independently
//! testable.
//!
//! # Wire format
//!
//! A single packet is framed as:
//!
//! ```text
//! <typeDigit> ':' <id> ['+'] ':' <endpoint> [':' <data>]
//! ```
//!
//! The data segment is present exactly for the types that define a
//! payload (message, json, event, ack, error). Generation 1.x adds a
//! length-prefixed envelope for multi-packet polling bodies:
//!
//! ```text
//! <len> '+' <packet>    (repeated)
//! ```
//!
//! where `len` counts characters of the packet text. A body is treated
//! as an envelope iff it starts with `<digits>+`; a bare packet always
//! starts with `<digit>:`, so the two cannot collide.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};

use super::packet::{AckMode, Packet, PacketType};

// ============================================================================
// Constants
// ============================================================================

/// Field grammar for a single packet of either generation.
static PACKET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d):(\d+)?(\+)?:([^:]*)(?::([\s\S]*))?$").expect("packet regex")
});

/// Envelope detection: `<digits>+` prefix.
static BATCH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\+").expect("batch regex"));

// ============================================================================
// ProtocolVersion
// ============================================================================

/// The two supported wire protocol generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    /// Generation 0 (socket.io 0.9.x): colon framing only.
    #[default]
    V09,
    /// Generation 1.x: colon framing plus the batched polling envelope.
    V10,
}

impl ProtocolVersion {
    /// Returns the protocol path segment used in transport URLs.
    #[inline]
    #[must_use]
    pub fn path_segment(self) -> &'static str {
        // Both generations use "1" in the well-known resource path.
        "1"
    }

    /// Returns `true` if this generation batches polling bodies.
    #[inline]
    #[must_use]
    pub fn supports_batching(self) -> bool {
        matches!(self, Self::V10)
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Packet codec for one protocol generation.
///
/// Encoding is the exact inverse of decoding for every field the packet
/// type defines.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    version: ProtocolVersion,
}

impl Codec {
    /// Creates a codec for the given generation.
    #[inline]
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }

    /// Returns the generation this codec speaks.
    #[inline]
    #[must_use]
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encodes a packet into its wire-format string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if an event payload cannot be serialized.
    pub fn encode(&self, packet: &Packet) -> Result<String> {
        let id_part = match (&packet.id, packet.ack) {
            (Some(id), AckMode::WithData) => format!("{id}+"),
            (Some(id), _) => id.clone(),
            (None, _) => String::new(),
        };

        let mut encoded = format!(
            "{}:{}:{}",
            packet.packet_type.digit(),
            id_part,
            packet.endpoint
        );

        if let Some(data) = self.encode_payload(packet)? {
            encoded.push(':');
            encoded.push_str(&data);
        }

        Ok(encoded)
    }

    /// Builds the data segment, or `None` for payload-less types.
    fn encode_payload(&self, packet: &Packet) -> Result<Option<String>> {
        match packet.packet_type {
            PacketType::Event => {
                // Field order is part of the wire contract.
                let name = serde_json::to_string(packet.name.as_deref().unwrap_or_default())?;
                let args = serde_json::to_string(&packet.args)?;
                Ok(Some(format!(r#"{{"name":{name},"args":{args}}}"#)))
            }
            PacketType::Message
            | PacketType::JsonMessage
            | PacketType::Ack
            | PacketType::Error => Ok(Some(packet.data.clone())),
            PacketType::Disconnect
            | PacketType::Connect
            | PacketType::Heartbeat
            | PacketType::Noop => Ok(None),
        }
    }

    /// Frames pre-encoded packets into polling request bodies.
    ///
    /// A generation with batch framing packs everything into a single
    /// enveloped body. Generation 0 has no framing that could split a
    /// combined body again, so every packet gets a body of its own.
    #[must_use]
    pub fn encode_batch(&self, packets: &[String]) -> Vec<String> {
        if packets.len() <= 1 || !self.version.supports_batching() {
            return packets.to_vec();
        }
        let mut body = String::new();
        for packet in packets {
            body.push_str(&packet.chars().count().to_string());
            body.push('+');
            body.push_str(packet);
        }
        vec![body]
    }

    // ========================================================================
    // Decoding
    // ========================================================================

    /// Decodes one wire-format string into a packet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPacket`] for an unknown type digit or a
    /// string violating the field grammar. Callers surface this through
    /// the error delegate and drop the packet.
    pub fn decode(&self, text: &str) -> Result<Packet> {
        let captures = PACKET_RE
            .captures(text)
            .ok_or_else(|| Error::invalid_packet(format!("unframeable packet: {text:?}")))?;

        let digit = captures[1]
            .parse::<u8>()
            .map_err(|_| Error::invalid_packet("non-numeric type digit"))?;
        let packet_type = PacketType::from_digit(digit)
            .ok_or_else(|| Error::invalid_packet(format!("unknown type digit: {digit}")))?;

        let mut packet = Packet::new(packet_type);
        packet.endpoint = captures[4].to_string();

        if let Some(id) = captures.get(2) {
            packet.id = Some(id.as_str().to_string());
            packet.ack = if captures.get(3).is_some() {
                AckMode::WithData
            } else {
                AckMode::Plain
            };
        }

        let data = captures.get(5).map(|m| m.as_str()).unwrap_or_default();
        self.decode_payload(&mut packet, data)?;

        Ok(packet)
    }

    /// Fills in the payload fields for the decoded type.
    fn decode_payload(&self, packet: &mut Packet, data: &str) -> Result<()> {
        match packet.packet_type {
            PacketType::Event => {
                let value: Value = serde_json::from_str(data)
                    .map_err(|e| Error::invalid_packet(format!("event payload not JSON: {e}")))?;
                let name = value
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::invalid_packet("event payload missing name"))?;
                packet.name = Some(name.to_string());
                packet.args = match value.get("args") {
                    Some(Value::Array(args)) => args.clone(),
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => vec![other.clone()],
                };
            }
            PacketType::Message
            | PacketType::JsonMessage
            | PacketType::Ack
            | PacketType::Error => {
                packet.data = data.to_string();
            }
            PacketType::Disconnect
            | PacketType::Connect
            | PacketType::Heartbeat
            | PacketType::Noop => {}
        }
        Ok(())
    }

    /// Splits one polling body into individual packet strings.
    ///
    /// Bodies without the envelope prefix are returned whole.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPacket`] for a truncated or malformed
    /// envelope.
    pub fn decode_batch(&self, body: &str) -> Result<Vec<String>> {
        if !BATCH_RE.is_match(body) {
            return Ok(vec![body.to_string()]);
        }

        let mut packets = Vec::new();
        let chars: Vec<char> = body.chars().collect();
        let mut pos = 0;

        while pos < chars.len() {
            let digits_start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos == digits_start || pos >= chars.len() || chars[pos] != '+' {
                return Err(Error::invalid_packet("malformed batch envelope"));
            }
            let len: usize = chars[digits_start..pos]
                .iter()
                .collect::<String>()
                .parse()
                .map_err(|_| Error::invalid_packet("batch length overflow"))?;
            pos += 1;

            if pos + len > chars.len() {
                return Err(Error::invalid_packet("truncated batch payload"));
            }
            packets.push(chars[pos..pos + len].iter().collect());
            pos += len;
        }

        Ok(packets)
    }
}

// ============================================================================
// Tests
// ============================================================================
