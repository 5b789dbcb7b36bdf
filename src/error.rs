//! Error types for the socket.io client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use socketio_client::{Result, SocketClient};
//!
//! async fn example(client: &SocketClient) -> Result<()> {
//!     client.connect().await?;
//!     client.send_message("hello", None)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Handshake | [`Error::InvalidConnectionData`], [`Error::Unauthorized`], [`Error::HandshakeFailed`], [`Error::TransportsNotSupported`] |
//! | Lifecycle | [`Error::ConnectionInProgress`], [`Error::ServerDisconnect`], [`Error::HeartbeatTimeout`] |
//! | Transport | [`Error::TransportClosed`], [`Error::DataCouldNotBeSend`] |
//! | Protocol | [`Error::InvalidPacket`], [`Error::ServerError`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// Handshake response could not be parsed.
    ///
    /// Returned when the `sid:heartbeat:timeout:transports` body is
    /// malformed.
    #[error("Invalid connection data: {message}")]
    InvalidConnectionData {
        /// Description of what was malformed.
        message: String,
    },

    /// Server rejected the handshake with an authorization failure.
    ///
    /// Returned on HTTP 401/403 from the handshake endpoint.
    #[error("Handshake unauthorized (HTTP {status})")]
    Unauthorized {
        /// HTTP status code returned by the server.
        status: u16,
    },

    /// Handshake request failed.
    ///
    /// Returned when the handshake HTTP exchange itself fails.
    #[error("Handshake failed: {message}")]
    HandshakeFailed {
        /// Description of the handshake failure.
        message: String,
    },

    /// No overlap between client and server transports.
    ///
    /// Returned when none of the transports advertised by the handshake
    /// are usable by this client.
    #[error("No supported transport (server offers: {advertised})")]
    TransportsNotSupported {
        /// Comma-separated transports advertised by the server.
        advertised: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// `connect()` called while a connection attempt or session is active.
    ///
    /// Connection attempts are not reentrant; wait for `Disconnected`.
    #[error("Connection already in progress (state: {state})")]
    ConnectionInProgress {
        /// The state the connection was in.
        state: String,
    },

    /// Server sent a disconnect packet.
    #[error("Server disconnected: {endpoint}")]
    ServerDisconnect {
        /// Endpoint named by the disconnect packet (empty = whole socket).
        endpoint: String,
    },

    /// No heartbeat received within the negotiated timeout.
    ///
    /// Fatal: the state machine transitions to `Disconnected`.
    #[error("Heartbeat timeout after {timeout_ms}ms")]
    HeartbeatTimeout {
        /// Negotiated heartbeat timeout in milliseconds.
        timeout_ms: u64,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Transport closed unexpectedly.
    #[error("Transport closed: {message}")]
    TransportClosed {
        /// Description of the closure.
        message: String,
    },

    /// Data could not be handed to the transport.
    ///
    /// Returned when sending on a transport that is not ready, or for
    /// packets still queued when the connection tears down.
    #[error("Data could not be sent: {message}")]
    DataCouldNotBeSend {
        /// Description of why the send failed.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Server sent an error packet.
    ///
    /// Carries the `reason ['+' advice]` payload of the packet. Not
    /// fatal by itself; reported via the error delegate.
    #[error("Server error: {reason}{}", .advice.as_deref().map(|a| format!(" ({a})")).unwrap_or_default())]
    ServerError {
        /// Reason segment of the error payload.
        reason: String,
        /// Optional advice segment.
        advice: Option<String>,
    },

    /// Inbound packet could not be decoded.
    ///
    /// Not fatal: malformed packets are reported via the error delegate
    /// and dropped.
    #[error("Invalid packet: {message}")]
    InvalidPacket {
        /// Description of the framing violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid connection data error.
    #[inline]
    pub fn invalid_connection_data(message: impl Into<String>) -> Self {
        Self::InvalidConnectionData {
            message: message.into(),
        }
    }

    /// Creates an unauthorized error.
    #[inline]
    #[must_use]
    pub fn unauthorized(status: u16) -> Self {
        Self::Unauthorized { status }
    }

    /// Creates a handshake failed error.
    #[inline]
    pub fn handshake_failed(message: impl Into<String>) -> Self {
        Self::HandshakeFailed {
            message: message.into(),
        }
    }

    /// Creates a transports-not-supported error.
    #[inline]
    pub fn transports_not_supported(advertised: impl Into<String>) -> Self {
        Self::TransportsNotSupported {
            advertised: advertised.into(),
        }
    }

    /// Creates a connection-in-progress error.
    #[inline]
    pub fn connection_in_progress(state: impl Into<String>) -> Self {
        Self::ConnectionInProgress {
            state: state.into(),
        }
    }

    /// Creates a server disconnect error.
    #[inline]
    pub fn server_disconnect(endpoint: impl Into<String>) -> Self {
        Self::ServerDisconnect {
            endpoint: endpoint.into(),
        }
    }

    /// Creates a heartbeat timeout error.
    #[inline]
    #[must_use]
    pub fn heartbeat_timeout(timeout_ms: u64) -> Self {
        Self::HeartbeatTimeout { timeout_ms }
    }

    /// Creates a transport closed error.
    #[inline]
    pub fn transport_closed(message: impl Into<String>) -> Self {
        Self::TransportClosed {
            message: message.into(),
        }
    }

    /// Creates a data-could-not-be-sent error.
    #[inline]
    pub fn data_not_sent(message: impl Into<String>) -> Self {
        Self::DataCouldNotBeSend {
            message: message.into(),
        }
    }

    /// Creates a server error from an error packet payload.
    #[inline]
    pub fn server_error(reason: impl Into<String>, advice: Option<String>) -> Self {
        Self::ServerError {
            reason: reason.into(),
            advice,
        }
    }

    /// Creates an invalid packet error.
    #[inline]
    pub fn invalid_packet(message: impl Into<String>) -> Self {
        Self::InvalidPacket {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error aborted a handshake attempt.
    #[inline]
    #[must_use]
    pub fn is_handshake_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConnectionData { .. }
                | Self::Unauthorized { .. }
                | Self::HandshakeFailed { .. }
                | Self::TransportsNotSupported { .. }
        )
    }

    /// Returns `true` if this error is fatal to an open connection.
    ///
    /// Fatal errors force the state machine to `Disconnected`.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ServerDisconnect { .. }
                | Self::HeartbeatTimeout { .. }
                | Self::TransportClosed { .. }
        )
    }

    /// Returns `true` if this is a decode failure.
    ///
    /// Decode failures are reported and otherwise ignored; they never
    /// tear down the connection.
    #[inline]
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::InvalidPacket { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_connection_data("missing sid");
        assert_eq!(err.to_string(), "Invalid connection data: missing sid");
    }

    #[test]
    fn test_unauthorized_display() {
        let err = Error::unauthorized(403);
        assert_eq!(err.to_string(), "Handshake unauthorized (HTTP 403)");
    }

    #[test]
    fn test_is_handshake_error() {
        assert!(Error::unauthorized(401).is_handshake_error());
        assert!(Error::invalid_connection_data("x").is_handshake_error());
        assert!(Error::transports_not_supported("flashsocket").is_handshake_error());
        assert!(!Error::heartbeat_timeout(20_000).is_handshake_error());
    }

    #[test]
    fn test_is_fatal() {
        assert!(Error::heartbeat_timeout(20_000).is_fatal());
        assert!(Error::server_disconnect("").is_fatal());
        assert!(Error::transport_closed("eof").is_fatal());
        assert!(!Error::invalid_packet("bad digit").is_fatal());
        assert!(!Error::data_not_sent("not ready").is_fatal());
    }

    #[test]
    fn test_is_decode_error() {
        assert!(Error::invalid_packet("unknown type").is_decode_error());
        assert!(!Error::transport_closed("eof").is_decode_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
