//! Handshake client and session negotiation.
//!
//! The handshake is one HTTP GET against the well-known resource path
//! (`http(s)://host:port/<resource>/1/?<query>`). The server answers
//! with a colon-separated line:
//!
//! ```text
//! sid:heartbeatTimeoutSeconds:connectionTimeoutSeconds:csv-of-transports
//! ```
//!
//! A successful parse yields [`SessionInfo`], which lives exactly as
//! long as one connection. Handshake failures abort the connect attempt
//! before any transport is opened.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tracing::debug;

use crate::client::ConnectionConfig;
use crate::error::{Error, Result};

// ============================================================================
// SessionInfo
// ============================================================================

/// Session parameters negotiated by the handshake.
///
/// Created once per successful handshake, discarded on disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Server-assigned session id.
    pub sid: String,

    /// Heartbeat timeout, or `None` when the server disables heartbeats
    /// (empty second field).
    pub heartbeat_timeout: Option<Duration>,

    /// Connection (transport open) timeout.
    pub connection_timeout: Duration,

    /// Transports the server supports, in the server's preference order.
    pub transports: Vec<String>,
}

impl SessionInfo {
    /// Parses a handshake response body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConnectionData`] if the body does not
    /// follow the `sid:hb:timeout:transports` grammar.
    pub fn parse(body: &str) -> Result<Self> {
        let body = body.trim();
        let parts: Vec<&str> = body.split(':').collect();
        if parts.len() != 4 {
            return Err(Error::invalid_connection_data(format!(
                "expected 4 colon-separated fields, got {}",
                parts.len()
            )));
        }

        let sid = parts[0];
        if sid.is_empty() {
            return Err(Error::invalid_connection_data("empty session id"));
        }

        let heartbeat_timeout = if parts[1].is_empty() {
            None
        } else {
            let seconds: u64 = parts[1].parse().map_err(|_| {
                Error::invalid_connection_data(format!("bad heartbeat timeout: {:?}", parts[1]))
            })?;
            Some(Duration::from_secs(seconds))
        };

        let connection_seconds: u64 = parts[2].parse().map_err(|_| {
            Error::invalid_connection_data(format!("bad connection timeout: {:?}", parts[2]))
        })?;

        let transports: Vec<String> = parts[3]
            .split(',')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if transports.is_empty() {
            return Err(Error::invalid_connection_data("no transports advertised"));
        }

        Ok(Self {
            sid: sid.to_string(),
            heartbeat_timeout,
            connection_timeout: Duration::from_secs(connection_seconds),
            transports,
        })
    }

    /// Returns `true` if the server advertised the named transport.
    #[inline]
    #[must_use]
    pub fn advertises(&self, transport: &str) -> bool {
        self.transports.iter().any(|t| t == transport)
    }
}

// ============================================================================
// HandshakeClient
// ============================================================================

/// Performs the initial HTTP handshake exchange.
#[derive(Debug, Clone, Default)]
pub struct HandshakeClient {
    http: reqwest::Client,
}

impl HandshakeClient {
    /// Creates a handshake client with a default HTTP client.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Performs the handshake request for the given configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthorized`] on HTTP 401/403
    /// - [`Error::HandshakeFailed`] on any other HTTP-level failure
    /// - [`Error::InvalidConnectionData`] on a malformed response body
    pub async fn perform(&self, config: &ConnectionConfig) -> Result<SessionInfo> {
        let url = config.handshake_url();
        debug!(url = %url, "Performing handshake");

        let response = self
            .http
            .get(url)
            .timeout(config.connect_timeout())
            .send()
            .await
            .map_err(|e| Error::handshake_failed(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(Error::handshake_failed(format!(
                "handshake returned HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::handshake_failed(e.to_string()))?;

        let session = SessionInfo::parse(&body)?;
        debug!(
            sid = %session.sid,
            heartbeat = ?session.heartbeat_timeout,
            transports = ?session.transports,
            "Handshake completed"
        );

        Ok(session)
    }
}

// ============================================================================
// Tests
// ============================================================================
