//! Namespace multiplexer.
//!
//! Multiple logical namespaces share one physical connection. Each
//! registered endpoint gets a [`NamespaceBinding`] holding its delegate
//! and connected flag; inbound packets are dispatched to the binding
//! whose endpoint exactly matches the packet's endpoint (empty endpoint
//! = default namespace). Packets for an unbound endpoint are dropped.
//!
//! The registry is an explicit map owned by the connection: bindings
//! are added with `register` and removed with `unregister` or at
//! connection teardown, never through weak references.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::delegate::SocketDelegate;

// ============================================================================
// NamespaceBinding
// ============================================================================

/// One registered namespace on a shared connection.
pub struct NamespaceBinding {
    delegate: Arc<dyn SocketDelegate>,
    connected: bool,
}

impl NamespaceBinding {
    /// Returns the delegate interested in this endpoint's packets.
    #[inline]
    #[must_use]
    pub fn delegate(&self) -> &Arc<dyn SocketDelegate> {
        &self.delegate
    }

    /// Returns `true` once the server confirmed this endpoint.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

// ============================================================================
// NamespaceRegistry
// ============================================================================

/// Endpoint-keyed registry of namespace bindings.
#[derive(Default)]
pub struct NamespaceRegistry {
    bindings: FxHashMap<String, NamespaceBinding>,
}

impl std::fmt::Debug for NamespaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceRegistry")
            .field("endpoints", &self.endpoints())
            .finish()
    }
}

impl NamespaceRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a delegate for an endpoint, replacing any previous
    /// binding. The binding starts pending (not connected).
    pub fn register(&mut self, endpoint: impl Into<String>, delegate: Arc<dyn SocketDelegate>) {
        self.bindings.insert(
            endpoint.into(),
            NamespaceBinding {
                delegate,
                connected: false,
            },
        );
    }

    /// Removes a binding. Returns `true` if one existed.
    pub fn unregister(&mut self, endpoint: &str) -> bool {
        self.bindings.remove(endpoint).is_some()
    }

    /// Returns `true` if the endpoint has a binding.
    #[inline]
    #[must_use]
    pub fn contains(&self, endpoint: &str) -> bool {
        self.bindings.contains_key(endpoint)
    }

    /// Returns the delegate bound to an endpoint, if any.
    #[must_use]
    pub fn delegate_for(&self, endpoint: &str) -> Option<Arc<dyn SocketDelegate>> {
        self.bindings.get(endpoint).map(|b| Arc::clone(&b.delegate))
    }

    /// Marks an endpoint connected after the server's connect echo.
    ///
    /// Returns the binding's delegate so the caller can notify it, or
    /// `None` when the endpoint is unbound.
    #[must_use]
    pub fn mark_connected(&mut self, endpoint: &str) -> Option<Arc<dyn SocketDelegate>> {
        let binding = self.bindings.get_mut(endpoint)?;
        binding.connected = true;
        Some(Arc::clone(&binding.delegate))
    }

    /// Marks an endpoint disconnected (namespace-scoped disconnect).
    ///
    /// Returns the binding's delegate, or `None` when unbound.
    #[must_use]
    pub fn mark_disconnected(&mut self, endpoint: &str) -> Option<Arc<dyn SocketDelegate>> {
        let binding = self.bindings.get_mut(endpoint)?;
        binding.connected = false;
        Some(Arc::clone(&binding.delegate))
    }

    /// Returns `true` if the endpoint is bound and connected.
    #[must_use]
    pub fn is_connected(&self, endpoint: &str) -> bool {
        self.bindings.get(endpoint).is_some_and(|b| b.connected)
    }

    /// Marks every binding disconnected (connection teardown).
    pub fn reset_all(&mut self) {
        for binding in self.bindings.values_mut() {
            binding.connected = false;
        }
    }

    /// Returns all registered endpoints.
    #[must_use]
    pub fn endpoints(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::client::delegate::NoopDelegate;

    fn registry_with(endpoints: &[&str]) -> NamespaceRegistry {
        let mut registry = NamespaceRegistry::new();
        for endpoint in endpoints {
            registry.register(*endpoint, Arc::new(NoopDelegate));
        }
        registry
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry_with(&["", "/chat"]);
        assert!(registry.contains(""));
        assert!(registry.contains("/chat"));
        assert!(registry.delegate_for("/chat").is_some());
    }

    #[test]
    fn test_unbound_endpoint_yields_nothing() {
        let registry = registry_with(&[""]);
        assert!(registry.delegate_for("/nowhere").is_none());
        assert!(!registry.contains("/nowhere"));
    }

    #[test]
    fn test_dispatch_is_exact_match() {
        let registry = registry_with(&["/chat"]);
        assert!(registry.delegate_for("/chat").is_some());
        assert!(registry.delegate_for("/chat/sub").is_none());
        assert!(registry.delegate_for("").is_none());
    }

    #[test]
    fn test_connect_lifecycle() {
        let mut registry = registry_with(&["/news"]);
        assert!(!registry.is_connected("/news"));

        assert!(registry.mark_connected("/news").is_some());
        assert!(registry.is_connected("/news"));

        assert!(registry.mark_disconnected("/news").is_some());
        assert!(!registry.is_connected("/news"));
    }

    #[test]
    fn test_mark_connected_unbound() {
        let mut registry = registry_with(&[]);
        assert!(registry.mark_connected("/ghost").is_none());
    }

    #[test]
    fn test_unregister() {
        let mut registry = registry_with(&["/chat"]);
        assert!(registry.unregister("/chat"));
        assert!(!registry.unregister("/chat"));
        assert!(!registry.contains("/chat"));
    }

    #[test]
    fn test_reset_all() {
        let mut registry = registry_with(&["", "/a", "/b"]);
        let _ = registry.mark_connected("");
        let _ = registry.mark_connected("/a");
        registry.reset_all();
        assert!(!registry.is_connected(""));
        assert!(!registry.is_connected("/a"));
    }
}
