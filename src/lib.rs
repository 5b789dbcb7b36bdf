//! socket.io client - Real-time protocol engine for socket.io servers.
//!
//! This library implements the client side of the socket.io real-time
//! protocol: handshake negotiation, the versioned wire codec, transport
//! selection (WebSocket with XHR-polling fallback), heartbeat
//! supervision, acknowledgements, and namespace multiplexing over a
//! single physical connection.
//!
//! # Architecture
//!
//! One [`SocketClient`] owns one connection:
//!
//! - **Handshake**: an HTTP GET negotiates the session id, heartbeat
//!   interval, and the transports the server supports
//! - **Transport**: WebSocket when both sides support it, XHR polling
//!   otherwise; both feed one event channel
//! - **Driver task**: a single `select!` loop routes inbound packets,
//!   outbound commands, and the heartbeat deadline
//!
//! Events reach the application through the [`SocketDelegate`] trait;
//! there are no reconnect attempts, the caller decides when to dial
//! again.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use socketio_client::{ConnectionConfig, NoopDelegate, Result, SocketClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ConnectionConfig::builder()
//!         .host("localhost")
//!         .port(3000)
//!         .build()?;
//!     let client = SocketClient::new(config, Arc::new(NoopDelegate));
//!
//!     client.connect().await?;
//!     client.send_event(
//!         "chat",
//!         vec![json!("hello")],
//!         Some(Box::new(|reply| println!("server replied: {reply}"))),
//!     )?;
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`SocketClient`], configuration, delegates, acks, namespaces |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Handshake client and the versioned packet codec |
//! | [`transport`] | WebSocket and XHR-polling transports |

// ============================================================================
// Modules
// ============================================================================

/// Connection state machine, configuration, and callback surface.
///
/// Use [`ConnectionConfig::builder()`] to describe the endpoint and
/// [`SocketClient::new`] to create a client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Handshake and wire protocol.
///
/// [`Codec`] encodes and decodes packets for both supported protocol
/// generations; [`HandshakeClient`] performs session negotiation.
pub mod protocol;

/// Transport layer.
///
/// The [`Transport`](transport::Transport) trait plus the WebSocket and
/// XHR-polling implementations and the selection policy.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    AckCallback, ConnectionConfig, ConnectionConfigBuilder, ConnectionState, NoopDelegate,
    SocketClient, SocketDelegate,
};

// Error types
pub use error::{Error, Result};

// Protocol types
pub use protocol::{AckMode, Codec, HandshakeClient, Packet, PacketType, ProtocolVersion, SessionInfo};
