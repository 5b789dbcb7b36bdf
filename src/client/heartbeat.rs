//! Heartbeat monitor.
//!
//! Tracks liveness against the heartbeat timeout negotiated by the
//! handshake. The monitor is passive: the connection event loop selects
//! on [`HeartbeatMonitor::deadline`] and calls
//! [`HeartbeatMonitor::reset`] for every inbound heartbeat packet.
//! Protocol liveness is bidirectional — the loop also echoes a
//! heartbeat packet back for every one received.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::Instant;

// ============================================================================
// HeartbeatMonitor
// ============================================================================

/// Deadline tracker for inbound heartbeats.
///
/// A monitor built with `None` (server disabled heartbeats) never arms
/// and never expires.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl HeartbeatMonitor {
    /// Creates a monitor for the negotiated timeout.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Arms the monitor, starting a fresh deadline.
    pub fn arm(&mut self) {
        if let Some(timeout) = self.timeout {
            self.deadline = Some(Instant::now() + timeout);
        }
    }

    /// Pushes the deadline forward after an inbound heartbeat.
    #[inline]
    pub fn reset(&mut self) {
        self.arm();
    }

    /// Stops the monitor.
    #[inline]
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Returns the current deadline, if armed.
    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` while a deadline is pending.
    #[inline]
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns the configured timeout in milliseconds (0 if disabled).
    #[inline]
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout.map_or(0, |t| t.as_millis() as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_arm_sets_deadline_at_timeout() {
        let mut monitor = HeartbeatMonitor::new(Some(Duration::from_secs(20)));
        monitor.arm();

        let deadline = monitor.deadline().expect("armed");
        assert_eq!(deadline - Instant::now(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_pushes_deadline_forward() {
        let mut monitor = HeartbeatMonitor::new(Some(Duration::from_secs(20)));
        monitor.arm();
        let first = monitor.deadline().expect("armed");

        tokio::time::advance(Duration::from_secs(19)).await;
        monitor.reset();
        let second = monitor.deadline().expect("still armed");

        assert_eq!(second - first, Duration::from_secs(19));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses_without_reset() {
        let mut monitor = HeartbeatMonitor::new(Some(Duration::from_secs(20)));
        monitor.arm();

        tokio::time::advance(Duration::from_secs(21)).await;
        assert!(Instant::now() >= monitor.deadline().expect("armed"));
    }

    #[test]
    fn test_disabled_monitor_never_arms() {
        let mut monitor = HeartbeatMonitor::new(None);
        monitor.arm();
        assert!(!monitor.is_armed());
        assert_eq!(monitor.timeout_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_clears_deadline() {
        let mut monitor = HeartbeatMonitor::new(Some(Duration::from_secs(20)));
        monitor.arm();
        monitor.disarm();
        assert!(!monitor.is_armed());
    }
}
