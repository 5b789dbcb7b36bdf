//! Transport adapters.
//!
//! A transport carries framed packet text between client and server.
//! Two variants exist: a persistent WebSocket and an XHR-style polling
//! loop. The connection state machine picks one per connect attempt and
//! never renegotiates mid-session.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   commands    ┌──────────────────┐
//! │ ConnectionDriver │──────────────►│ Transport        │
//! │ (event loop)     │               │ (ws / polling)   │
//! │                  │◄──────────────│                  │
//! └──────────────────┘ TransportEvent└──────────────────┘
//! ```
//!
//! Inbound data and lifecycle notifications flow back through a
//! [`TransportEvent`] channel handed to the transport at construction.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | Persistent full-duplex WebSocket variant |
//! | `polling` | Successive HTTP request (XHR) variant |

// ============================================================================
// Submodules
// ============================================================================

/// XHR-polling transport.
pub mod polling;

/// WebSocket transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use polling::PollingTransport;
pub use websocket::WebSocketTransport;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::SessionInfo;

// ============================================================================
// Transport Names
// ============================================================================

/// Handshake name of the WebSocket transport.
pub const WEBSOCKET: &str = "websocket";

/// Handshake name of the polling transport.
pub const XHR_POLLING: &str = "xhr-polling";

// ============================================================================
// TransportEvent
// ============================================================================

/// Notification from a transport to the connection event loop.
#[derive(Debug)]
pub enum TransportEvent {
    /// One framed packet string arrived.
    Data(String),
    /// The transport disconnected; `None` means a clean close.
    Disconnect(Option<Error>),
    /// A non-fatal transport error.
    Error(Error),
}

/// Sending half of the transport event channel.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

// ============================================================================
// Transport Trait
// ============================================================================

/// Uniform contract implemented by both transport variants.
///
/// Inbound traffic is pushed through the [`TransportEvent`] channel the
/// transport was constructed with; the trait itself only covers the
/// outbound and lifecycle surface.
#[async_trait]
pub trait Transport: Send {
    /// Returns the handshake name of this transport.
    fn name(&self) -> &'static str;

    /// Returns `true` once the transport can carry data.
    fn is_ready(&self) -> bool;

    /// Opens the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportClosed`] (or the underlying transport
    /// error) when the transport cannot be established.
    async fn open(&mut self) -> Result<()>;

    /// Sends one framed packet string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataCouldNotBeSend`] when the transport is not
    /// ready or the write fails.
    async fn send(&mut self, data: String) -> Result<()>;

    /// Closes the transport. Idempotent.
    async fn close(&mut self);
}

// ============================================================================
// TransportKind and Selection
// ============================================================================

/// Transport variant picked for a connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Persistent full-duplex WebSocket.
    WebSocket,
    /// Successive HTTP requests (XHR polling).
    Polling,
}

impl TransportKind {
    /// Returns the handshake name of this variant.
    #[inline]
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::WebSocket => WEBSOCKET,
            Self::Polling => XHR_POLLING,
        }
    }
}

/// Selects the transport for a connect attempt.
///
/// Deterministic ordered preference: when the configuration forces
/// polling only polling is considered; otherwise WebSocket is preferred
/// whenever the handshake advertised it, with polling as the fallback.
/// Selection happens once per attempt.
///
/// # Errors
///
/// Returns [`Error::TransportsNotSupported`] when no usable transport
/// was advertised.
pub fn select_transport(session: &SessionInfo, force_polling: bool) -> Result<TransportKind> {
    // Servers advertise the polling family as either name.
    let polling_advertised = session.advertises(XHR_POLLING) || session.advertises("polling");

    if force_polling {
        return if polling_advertised {
            Ok(TransportKind::Polling)
        } else {
            Err(Error::transports_not_supported(session.transports.join(",")))
        };
    }

    if session.advertises(WEBSOCKET) {
        return Ok(TransportKind::WebSocket);
    }
    if polling_advertised {
        return Ok(TransportKind::Polling);
    }

    Err(Error::transports_not_supported(session.transports.join(",")))
}

// ============================================================================
// Tests
// ============================================================================
