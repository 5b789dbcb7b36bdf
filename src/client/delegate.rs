//! Delegate and callback types.
//!
//! The client reports everything through a [`SocketDelegate`]: one per
//! client for connection-level events, and optionally one per
//! registered namespace for packets scoped to that endpoint. All
//! methods have empty default bodies, so implementors only override
//! what they care about.
//!
//! Delegates are invoked from the connection's event loop task; keep
//! them fast and non-blocking.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::error::Error;
use crate::protocol::Packet;

// ============================================================================
// AckCallback
// ============================================================================

/// Callback resolved when a matching ack packet arrives.
///
/// Receives the first decoded argument, or the full argument list as a
/// JSON array when the connection is configured with
/// `return_all_data_from_ack`. Invoked at most once.
pub type AckCallback = Box<dyn FnOnce(Value) + Send>;

// ============================================================================
// SocketDelegate
// ============================================================================

/// Receiver for connection lifecycle and inbound packet callbacks.
#[allow(unused_variables)]
pub trait SocketDelegate: Send + Sync {
    /// The endpoint is connected (server confirmed the connect packet).
    fn on_connect(&self, endpoint: &str) {}

    /// The connection (or one namespace) disconnected.
    ///
    /// `error` is `None` for a clean, caller-initiated close.
    fn on_disconnect(&self, endpoint: &str, error: Option<&Error>) {}

    /// A plain text message packet arrived.
    fn on_message(&self, packet: &Packet) {}

    /// A JSON message packet arrived.
    fn on_json(&self, packet: &Packet) {}

    /// An event packet arrived.
    fn on_event(&self, packet: &Packet) {}

    /// A packet was handed to the transport.
    fn on_sent(&self, packet: &Packet) {}

    /// A non-fatal error occurred (decode failure, failed send, server
    /// error packet).
    fn on_error(&self, error: &Error) {}
}

// ============================================================================
// NoopDelegate
// ============================================================================

/// Delegate that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDelegate;

impl SocketDelegate for NoopDelegate {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_delegate_is_object_safe() {
        let delegate: Box<dyn SocketDelegate> = Box::new(NoopDelegate);
        delegate.on_connect("");
        delegate.on_disconnect("/chat", None);
        delegate.on_message(&Packet::message("hi"));
    }
}
