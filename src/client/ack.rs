//! Acknowledgement registry.
//!
//! Maps outgoing ack ids to pending callbacks and resolves them when a
//! matching ack packet arrives. Ids come from a strictly increasing
//! counter and are never reused for the lifetime of a connection.
//!
//! # Policy
//!
//! Pending acks are fire-and-forget: there is no timeout and no retry.
//! A server that never answers leaves the entry pending until the
//! connection tears down, where [`AckRegistry::drain`] discards it.
//! An ack referencing an unknown id is dropped silently — the id may
//! belong to a prior, already-disconnected session.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use serde_json::Value;

use super::delegate::AckCallback;

// ============================================================================
// AckRegistry
// ============================================================================

/// Registry of pending acknowledgement callbacks.
pub struct AckRegistry {
    /// Next ack id to allocate.
    next_id: u64,
    /// Pending callbacks keyed by ack id.
    entries: FxHashMap<String, AckCallback>,
    /// Pass the full argument list instead of only the first argument.
    return_all: bool,
}

impl std::fmt::Debug for AckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckRegistry")
            .field("next_id", &self.next_id)
            .field("pending", &self.entries.len())
            .field("return_all", &self.return_all)
            .finish()
    }
}

impl AckRegistry {
    /// Creates an empty registry.
    ///
    /// When `return_all` is set, resolved callbacks receive the full
    /// decoded argument list as a JSON array.
    #[must_use]
    pub fn new(return_all: bool) -> Self {
        Self {
            next_id: 1,
            entries: FxHashMap::default(),
            return_all,
        }
    }

    /// Allocates the next ack id and stores the callback under it.
    ///
    /// The entry exists before the tagged packet reaches the codec, so
    /// an immediate server reply always finds it.
    pub fn register(&mut self, callback: AckCallback) -> String {
        let id = self.next_id.to_string();
        self.next_id += 1;
        self.entries.insert(id.clone(), callback);
        id
    }

    /// Resolves a decoded ack packet.
    ///
    /// Removes the entry and returns the callback paired with the value
    /// it should receive; the caller invokes it outside any lock.
    /// Returns `None` for unknown (or already resolved) ids.
    #[must_use]
    pub fn resolve(&mut self, ack_id: &str, args: Vec<Value>) -> Option<(AckCallback, Value)> {
        let callback = self.entries.remove(ack_id)?;
        let value = if self.return_all {
            Value::Array(args)
        } else {
            args.into_iter().next().unwrap_or(Value::Null)
        };
        Some((callback, value))
    }

    /// Removes a pending entry without invoking it.
    ///
    /// Used when the tagged packet never made it out; the server will
    /// never answer an id it has not seen. Returns `true` when an entry
    /// existed.
    pub fn unregister(&mut self, ack_id: &str) -> bool {
        self.entries.remove(ack_id).is_some()
    }

    /// Returns the number of pending entries.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Discards all pending entries, returning how many were dropped.
    pub fn drain(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }
}

// ============================================================================
// Tests
// ============================================================================
