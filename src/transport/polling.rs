//! XHR-polling transport variant.
//!
//! Issues successive HTTP GET requests against
//! `http(s)://host:port/<resource>/1/xhr-polling/<sid>`; each response
//! body may carry several packets in the batch envelope, which are
//! split and emitted as individual [`TransportEvent::Data`] events.
//! Outbound packets are queued and POSTed by a writer task, batch
//! framed into one request when the generation supports it and one
//! request per packet otherwise.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::Codec;

use super::{EventSender, Transport, TransportEvent, XHR_POLLING};

// ============================================================================
// PollingTransport
// ============================================================================

/// Successive-HTTP-request (XHR) transport.
pub struct PollingTransport {
    url: Url,
    codec: Codec,
    events: EventSender,
    http: reqwest::Client,
    pending: Arc<Mutex<Vec<String>>>,
    wakeup: Arc<Notify>,
    open: Arc<AtomicBool>,
    poll_task: Option<JoinHandle<()>>,
    send_task: Option<JoinHandle<()>>,
}

impl PollingTransport {
    /// Creates an unopened polling transport.
    ///
    /// The codec is only used for the batch envelope; packet semantics
    /// stay with the connection.
    #[must_use]
    pub fn new(url: Url, codec: Codec, events: EventSender) -> Self {
        Self {
            url,
            codec,
            events,
            http: reqwest::Client::new(),
            pending: Arc::new(Mutex::new(Vec::new())),
            wakeup: Arc::new(Notify::new()),
            open: Arc::new(AtomicBool::new(false)),
            poll_task: None,
            send_task: None,
        }
    }

    /// Poll loop: one GET per cycle, each body split into packets.
    async fn run_poll_loop(
        url: Url,
        codec: Codec,
        http: reqwest::Client,
        events: EventSender,
        open: Arc<AtomicBool>,
    ) {
        while open.load(Ordering::SeqCst) {
            let response = match http.get(url.clone()).send().await {
                Ok(r) => r,
                Err(e) => {
                    if open.load(Ordering::SeqCst) {
                        warn!(error = %e, "Polling request failed");
                        let _ = events.send(TransportEvent::Disconnect(Some(
                            Error::transport_closed(e.to_string()),
                        )));
                    }
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                warn!(%status, "Polling request rejected");
                let _ = events.send(TransportEvent::Disconnect(Some(Error::transport_closed(
                    format!("poll returned HTTP {status}"),
                ))));
                return;
            }

            let body = match response.text().await {
                Ok(b) => b,
                Err(e) => {
                    let _ = events.send(TransportEvent::Error(Error::transport_closed(
                        e.to_string(),
                    )));
                    continue;
                }
            };

            if body.is_empty() {
                continue;
            }

            trace!(len = body.len(), "Poll cycle returned data");
            match codec.decode_batch(&body) {
                Ok(packets) => {
                    for packet in packets {
                        if events.send(TransportEvent::Data(packet)).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = events.send(TransportEvent::Error(e));
                }
            }
        }
    }

    /// Writer task: drains the pending queue into POST bodies.
    async fn run_send_loop(
        url: Url,
        codec: Codec,
        http: reqwest::Client,
        events: EventSender,
        pending: Arc<Mutex<Vec<String>>>,
        wakeup: Arc<Notify>,
        open: Arc<AtomicBool>,
    ) {
        loop {
            wakeup.notified().await;
            if !open.load(Ordering::SeqCst) {
                return;
            }

            let batch: Vec<String> = std::mem::take(&mut *pending.lock());
            if batch.is_empty() {
                continue;
            }

            let bodies = codec.encode_batch(&batch);
            trace!(packets = batch.len(), requests = bodies.len(), "Posting packets");

            for body in bodies {
                if let Err(e) = http.post(url.clone()).body(body).send().await {
                    warn!(error = %e, "Polling send failed");
                    let _ =
                        events.send(TransportEvent::Error(Error::data_not_sent(e.to_string())));
                }
            }
        }
    }
}

#[async_trait]
impl Transport for PollingTransport {
    fn name(&self) -> &'static str {
        XHR_POLLING
    }

    fn is_ready(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn open(&mut self) -> Result<()> {
        debug!(url = %self.url, "Opening polling transport");
        self.open.store(true, Ordering::SeqCst);

        self.poll_task = Some(tokio::spawn(Self::run_poll_loop(
            self.url.clone(),
            self.codec,
            self.http.clone(),
            self.events.clone(),
            Arc::clone(&self.open),
        )));
        self.send_task = Some(tokio::spawn(Self::run_send_loop(
            self.url.clone(),
            self.codec,
            self.http.clone(),
            self.events.clone(),
            Arc::clone(&self.pending),
            Arc::clone(&self.wakeup),
            Arc::clone(&self.open),
        )));

        Ok(())
    }

    async fn send(&mut self, data: String) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::data_not_sent("polling transport not open"));
        }

        self.pending.lock().push(data);
        self.wakeup.notify_one();
        Ok(())
    }

    async fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        self.wakeup.notify_one();

        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        if let Some(task) = self.send_task.take() {
            task.abort();
        }

        debug!("Polling transport closed");
    }
}

// ============================================================================
// Tests
// ============================================================================
