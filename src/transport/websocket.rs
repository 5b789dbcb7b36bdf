//! WebSocket transport variant.
//!
//! Opens a persistent full-duplex socket to
//! `ws(s)://host:port/<resource>/1/websocket/<sid>` and forwards every
//! inbound text frame as a [`TransportEvent::Data`]. A reader task owns
//! the receive half; the send half stays with the transport for
//! outbound packets.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{EventSender, Transport, TransportEvent, WEBSOCKET};

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

// ============================================================================
// WebSocketTransport
// ============================================================================

/// Persistent WebSocket transport.
pub struct WebSocketTransport {
    url: Url,
    events: EventSender,
    writer: Option<WsWriter>,
    reader_task: Option<JoinHandle<()>>,
    ready: Arc<AtomicBool>,
}

impl WebSocketTransport {
    /// Creates an unopened WebSocket transport.
    ///
    /// Inbound frames and lifecycle notifications are pushed into
    /// `events` once [`Transport::open`] succeeds.
    #[must_use]
    pub fn new(url: Url, events: EventSender) -> Self {
        Self {
            url,
            events,
            writer: None,
            reader_task: None,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reader task: forwards inbound frames until the socket ends.
    async fn run_reader(mut reader: WsReader, events: EventSender, ready: Arc<AtomicBool>) {
        loop {
            match reader.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "WebSocket frame received");
                    if events.send(TransportEvent::Data(text.to_string())).is_err() {
                        break;
                    }
                }

                Some(Ok(Message::Close(_))) => {
                    debug!("WebSocket closed by remote");
                    ready.store(false, Ordering::SeqCst);
                    let _ = events.send(TransportEvent::Disconnect(None));
                    return;
                }

                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket read error");
                    ready.store(false, Ordering::SeqCst);
                    let _ = events.send(TransportEvent::Disconnect(Some(
                        Error::transport_closed(e.to_string()),
                    )));
                    return;
                }

                None => {
                    debug!("WebSocket stream ended");
                    ready.store(false, Ordering::SeqCst);
                    let _ = events.send(TransportEvent::Disconnect(None));
                    return;
                }

                // Ignore Binary, Ping, Pong, Frame
                _ => {}
            }
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn name(&self) -> &'static str {
        WEBSOCKET
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn open(&mut self) -> Result<()> {
        debug!(url = %self.url, "Opening WebSocket transport");

        let (stream, _response) = connect_async(self.url.as_str()).await?;
        let (writer, reader) = stream.split();

        self.writer = Some(writer);
        self.ready.store(true, Ordering::SeqCst);
        self.reader_task = Some(tokio::spawn(Self::run_reader(
            reader,
            self.events.clone(),
            Arc::clone(&self.ready),
        )));

        debug!("WebSocket transport open");
        Ok(())
    }

    async fn send(&mut self, data: String) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::data_not_sent("WebSocket transport not ready"));
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::data_not_sent("WebSocket transport not open"))?;

        trace!(len = data.len(), "Sending WebSocket frame");
        if let Err(e) = writer.send(Message::Text(data.into())).await {
            self.ready.store(false, Ordering::SeqCst);
            return Err(Error::data_not_sent(e.to_string()));
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.ready.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.take() {
            let _ = writer.send(Message::Close(None)).await;
            let _ = writer.close().await;
        }
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }

        debug!("WebSocket transport closed");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;

    fn transport() -> WebSocketTransport {
        let (tx, _rx) = mpsc::unbounded_channel();
        let url = Url::parse("ws://localhost:3000/socket.io/1/websocket/sid").expect("url");
        WebSocketTransport::new(url, tx)
    }

    #[test]
    fn test_name() {
        assert_eq!(transport().name(), "websocket");
    }

    #[test]
    fn test_not_ready_before_open() {
        assert!(!transport().is_ready());
    }

    #[tokio::test]
    async fn test_send_before_open_fails() {
        let mut transport = transport();
        let err = transport.send("2::".to_string()).await.expect_err("fail");
        assert!(matches!(err, Error::DataCouldNotBeSend { .. }));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut transport = transport();
        transport.close().await;
        transport.close().await;
        assert!(!transport.is_ready());
    }
}
