//! socket.io wire protocol.
//!
//! This module defines the structured packet model, the versioned codec
//! that frames and unframes packets, and the handshake exchange that
//! opens a session.
//!
//! # Protocol Overview
//!
//! | Piece | Direction | Purpose |
//! |-------|-----------|---------|
//! | Handshake | Client → Server (HTTP) | Session id, timeouts, transports |
//! | `Packet` | Both | One framed protocol message |
//! | `Codec` | Both | Wire text ⇄ `Packet`, per generation |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `packet` | Packet types and constructors |
//! | `codec` | Versioned encode/decode and batch framing |
//! | `handshake` | Handshake client and `SessionInfo` |

// ============================================================================
// Submodules
// ============================================================================

/// Versioned packet encode/decode.
pub mod codec;

/// Handshake client and session info.
pub mod handshake;

/// Packet data model.
pub mod packet;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{Codec, ProtocolVersion};
pub use handshake::{HandshakeClient, SessionInfo};
pub use packet::{AckMode, Packet, PacketType};
