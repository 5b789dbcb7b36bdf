//! Connection configuration.
//!
//! [`ConnectionConfig`] captures everything a connect attempt needs:
//! host, port, TLS, query parameters, target namespace, timeouts and
//! the protocol generation. It is immutable once a connect attempt
//! starts; build one with [`ConnectionConfig::builder()`].
//!
//! # Example
//!
//! ```
//! use socketio_client::ConnectionConfig;
//!
//! # fn example() -> socketio_client::Result<()> {
//! let config = ConnectionConfig::builder()
//!     .host("chat.example.com")
//!     .port(3000)
//!     .secure(true)
//!     .namespace("/chat")
//!     .query_param("token", "s3cret")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::protocol::ProtocolVersion;

// ============================================================================
// Constants
// ============================================================================

/// Default connection timeout when none is configured.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default well-known resource path segment.
const DEFAULT_RESOURCE: &str = "socket.io";

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Immutable configuration for one connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    host: String,
    port: u16,
    secure: bool,
    resource: String,
    namespace: String,
    query: Vec<(String, String)>,
    connect_timeout: Duration,
    version: ProtocolVersion,
    force_polling: bool,
    return_all_data_from_ack: bool,
}

impl ConnectionConfig {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Returns the server host.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the server port.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns `true` if TLS (`https`/`wss`) is used.
    #[inline]
    #[must_use]
    pub fn secure(&self) -> bool {
        self.secure
    }

    /// Returns the target namespace (empty = default namespace).
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the connection timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the protocol generation for this connection.
    #[inline]
    #[must_use]
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Returns `true` if WebSocket must not be selected.
    #[inline]
    #[must_use]
    pub fn force_polling(&self) -> bool {
        self.force_polling
    }

    /// Returns `true` if ack callbacks receive the full argument list
    /// instead of only the first argument.
    #[inline]
    #[must_use]
    pub fn return_all_data_from_ack(&self) -> bool {
        self.return_all_data_from_ack
    }

    // ========================================================================
    // Endpoint URLs
    // ========================================================================

    /// Builds the handshake URL.
    #[must_use]
    pub fn handshake_url(&self) -> Url {
        let mut url = self.base_url(if self.secure { "https" } else { "http" }, "");
        if let Some(query) = self.query_string() {
            url.set_query(Some(&query));
        }
        url
    }

    /// Builds the WebSocket transport URL for a session.
    #[must_use]
    pub fn websocket_url(&self, sid: &str) -> Url {
        self.base_url(
            if self.secure { "wss" } else { "ws" },
            &format!("websocket/{sid}"),
        )
    }

    /// Builds the XHR-polling transport URL for a session.
    #[must_use]
    pub fn polling_url(&self, sid: &str) -> Url {
        self.base_url(
            if self.secure { "https" } else { "http" },
            &format!("xhr-polling/{sid}"),
        )
    }

    fn base_url(&self, scheme: &str, suffix: &str) -> Url {
        let text = format!(
            "{scheme}://{}:{}/{}/{}/{suffix}",
            self.host,
            self.port,
            self.resource,
            self.version.path_segment(),
        );
        // The components are validated at build time.
        Url::parse(&text).expect("config produces valid URLs")
    }

    fn query_string(&self) -> Option<String> {
        if self.query.is_empty() {
            return None;
        }
        let encoded: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        Some(encoded.join("&"))
    }
}

// ============================================================================
// ConnectionConfigBuilder
// ============================================================================

/// Builder for [`ConnectionConfig`].
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    secure: bool,
    resource: String,
    namespace: String,
    query: Vec<(String, String)>,
    connect_timeout: Duration,
    version: ProtocolVersion,
    force_polling: bool,
    return_all_data_from_ack: bool,
}

impl Default for ConnectionConfigBuilder {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            secure: false,
            resource: DEFAULT_RESOURCE.to_string(),
            namespace: String::new(),
            query: Vec::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            version: ProtocolVersion::default(),
            force_polling: false,
            return_all_data_from_ack: false,
        }
    }
}

impl ConnectionConfigBuilder {
    /// Sets the server host name or IP.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the server port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Enables or disables TLS.
    #[inline]
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the resource path segment (default: `socket.io`).
    #[inline]
    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Sets the target namespace endpoint (e.g. `/chat`).
    #[inline]
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Appends one query parameter to the handshake request.
    #[inline]
    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets the connection timeout (default: 10s).
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the protocol generation (default: generation 0).
    #[inline]
    #[must_use]
    pub fn version(mut self, version: ProtocolVersion) -> Self {
        self.version = version;
        self
    }

    /// Forbids WebSocket, forcing the polling transport.
    #[inline]
    #[must_use]
    pub fn force_polling(mut self, force: bool) -> Self {
        self.force_polling = force;
        self
    }

    /// Makes ack callbacks receive the full argument list.
    #[inline]
    #[must_use]
    pub fn return_all_data_from_ack(mut self, all: bool) -> Self {
        self.return_all_data_from_ack = all;
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConnectionData`] if host or port are
    /// missing, the host is not a valid URL host, or the namespace does
    /// not start with `/`.
    pub fn build(self) -> Result<ConnectionConfig> {
        let host = self
            .host
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::invalid_connection_data("host not set"))?;
        let port = self
            .port
            .ok_or_else(|| Error::invalid_connection_data("port not set"))?;

        if !self.namespace.is_empty() && !self.namespace.starts_with('/') {
            return Err(Error::invalid_connection_data(format!(
                "namespace must start with '/': {:?}",
                self.namespace
            )));
        }

        let config = ConnectionConfig {
            host,
            port,
            secure: self.secure,
            resource: self.resource,
            namespace: self.namespace,
            query: self.query,
            connect_timeout: self.connect_timeout,
            version: self.version,
            force_polling: self.force_polling,
            return_all_data_from_ack: self.return_all_data_from_ack,
        };

        // Reject hosts that cannot form a URL before any attempt starts.
        Url::parse(&format!("http://{}:{}/", config.host, config.port))
            .map_err(|e| Error::invalid_connection_data(format!("bad host: {e}")))?;

        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::builder()
            .host("localhost")
            .port(3000)
            .build()
            .expect("valid config")
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert!(!config.secure());
        assert_eq!(config.namespace(), "");
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.version(), ProtocolVersion::V09);
        assert!(!config.force_polling());
        assert!(!config.return_all_data_from_ack());
    }

    #[test]
    fn test_handshake_url() {
        let url = config().handshake_url();
        assert_eq!(url.as_str(), "http://localhost:3000/socket.io/1/");
    }

    #[test]
    fn test_handshake_url_with_query() {
        let config = ConnectionConfig::builder()
            .host("localhost")
            .port(3000)
            .query_param("token", "a b")
            .query_param("v", "2")
            .build()
            .expect("valid config");
        let url = config.handshake_url();
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/socket.io/1/?token=a%20b&v=2"
        );
    }

    #[test]
    fn test_websocket_url() {
        let url = config().websocket_url("abc123");
        assert_eq!(
            url.as_str(),
            "ws://localhost:3000/socket.io/1/websocket/abc123"
        );
    }

    #[test]
    fn test_secure_schemes() {
        let config = ConnectionConfig::builder()
            .host("example.com")
            .port(443)
            .secure(true)
            .build()
            .expect("valid config");
        assert!(config.handshake_url().as_str().starts_with("https://"));
        assert!(config.websocket_url("s").as_str().starts_with("wss://"));
        assert!(config.polling_url("s").as_str().starts_with("https://"));
    }

    #[test]
    fn test_polling_url() {
        let url = config().polling_url("abc123");
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/socket.io/1/xhr-polling/abc123"
        );
    }

    #[test]
    fn test_build_requires_host_and_port() {
        assert!(ConnectionConfig::builder().port(80).build().is_err());
        assert!(ConnectionConfig::builder().host("x").build().is_err());
        assert!(ConnectionConfig::builder().host("").port(80).build().is_err());
    }

    #[test]
    fn test_build_validates_namespace() {
        let result = ConnectionConfig::builder()
            .host("localhost")
            .port(3000)
            .namespace("chat")
            .build();
        assert!(result.is_err());
    }
}
