//! Client-side connection machinery.
//!
//! Everything above the wire lives here: configuration, the delegate
//! surface, acknowledgement tracking, heartbeat supervision, namespace
//! multiplexing, and the connection state machine that ties them to a
//! transport.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Endpoint configuration and URL construction |
//! | [`delegate`] | Callback trait for connection and data events |
//! | [`ack`] | Pending acknowledgement registry |
//! | [`heartbeat`] | Server liveness deadline tracking |
//! | [`namespace`] | Per-endpoint delegate bindings |
//! | [`connection`] | [`SocketClient`] handle and its driver task |

pub mod ack;
pub mod config;
pub mod connection;
pub mod delegate;
pub mod heartbeat;
pub mod namespace;

pub use ack::AckRegistry;
pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use connection::{ConnectionState, SocketClient};
pub use delegate::{AckCallback, NoopDelegate, SocketDelegate};
pub use heartbeat::HeartbeatMonitor;
pub use namespace::NamespaceRegistry;
