//! Connection buffers.
//!
//! Every connection owns one [`Inbound`] queue filled by its background
//! reader and one outbound command channel drained by its background writer.
//! Both sides carry a sticky close cause: once set it never changes, so the
//! caller keeps observing the same closure on every call.
//!
//! The outbound side is a `tokio::sync::mpsc` unbounded channel on purpose:
//! when the caller drops its last connection handle the sender is dropped,
//! but the receiver still yields everything already enqueued before reporting
//! end-of-channel. That property *is* the graceful drain-then-close policy.

use std::collections::VecDeque;
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::mpsc;

// ── Inbound ──────────────────────────────────────────────────────────

struct InboundState {
    queue: VecDeque<Bytes>,
    closed: Option<String>,
}

/// Inbound unit queue, written by exactly one background reader and drained
/// by the caller.
pub struct Inbound {
    state: Mutex<InboundState>,
}

impl Inbound {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InboundState {
                queue: VecDeque::new(),
                closed: None,
            }),
        }
    }

    /// Append a received unit. Returns `false` (dropping the unit) if the
    /// queue already closed — no new data after closure.
    pub fn push(&self, unit: Bytes) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.closed.is_some() {
            return false;
        }
        state.queue.push_back(unit);
        true
    }

    /// Record the close cause. The first cause sticks.
    pub fn close(&self, cause: impl Into<String>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.closed.is_none() {
            state.closed = Some(cause.into());
        }
    }

    /// The recorded close cause, if any, without touching the queue.
    pub fn cause(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .closed
            .clone()
    }

    /// Drain everything buffered so far, in arrival order.
    ///
    /// Buffered data always wins over closure: the close cause is only
    /// reported once the queue is empty, and then on every later call.
    pub fn drain(&self) -> Result<Vec<Bytes>, String> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.queue.is_empty() {
            return Ok(state.queue.drain(..).collect());
        }
        match &state.closed {
            Some(cause) => Err(cause.clone()),
            None => Ok(Vec::new()),
        }
    }
}

impl Default for Inbound {
    fn default() -> Self {
        Self::new()
    }
}

// ── Outbound ─────────────────────────────────────────────────────────

/// A command for the background writer task.
pub enum OutboundCmd {
    /// Transmit one unit.
    Unit(Bytes),
    /// Stop immediately, discarding anything still queued behind this command.
    Abort,
}

/// Sticky outbound close cause, set by the writer when the transport fails
/// or finishes closing.
pub struct OutboundStatus {
    cause: Mutex<Option<String>>,
}

impl OutboundStatus {
    fn new() -> Self {
        Self {
            cause: Mutex::new(None),
        }
    }

    pub fn close(&self, cause: impl Into<String>) {
        let mut guard = self.cause.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(cause.into());
        }
    }

    pub fn cause(&self) -> Option<String> {
        self.cause
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Caller-side sender for the outbound queue.
pub struct OutboundSender {
    tx: mpsc::UnboundedSender<OutboundCmd>,
    status: std::sync::Arc<OutboundStatus>,
}

impl OutboundSender {
    /// Enqueue units in call order.
    ///
    /// Reports the closure cause without enqueuing anything if the writer
    /// already closed the connection.
    pub fn enqueue(&self, units: Vec<Bytes>) -> Result<(), String> {
        if let Some(cause) = self.status.cause() {
            return Err(cause);
        }
        for unit in units {
            if self.tx.send(OutboundCmd::Unit(unit)).is_err() {
                return Err(self
                    .status
                    .cause()
                    .unwrap_or_else(|| "connection closed".to_string()));
            }
        }
        Ok(())
    }

    /// Ask the writer to stop without draining. Used by the immediate-close
    /// drop policy; a no-op if the writer is already gone.
    pub fn abort(&self) {
        let _ = self.tx.send(OutboundCmd::Abort);
    }

    pub fn status(&self) -> &OutboundStatus {
        &self.status
    }
}

/// Create the outbound queue: caller-side sender, writer-side receiver, and
/// the shared status cell the writer closes with a cause.
pub fn outbound() -> (
    OutboundSender,
    mpsc::UnboundedReceiver<OutboundCmd>,
    std::sync::Arc<OutboundStatus>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let status = std::sync::Arc::new(OutboundStatus::new());
    let sender = OutboundSender {
        tx,
        status: std::sync::Arc::clone(&status),
    };
    (sender, rx, status)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Inbound ─────────────────────────────────────────────────────

    #[test]
    fn drain_returns_units_in_arrival_order() {
        let inbound = Inbound::new();
        assert!(inbound.push(Bytes::from_static(b"a")));
        assert!(inbound.push(Bytes::from_static(b"b")));
        assert!(inbound.push(Bytes::from_static(b"c")));

        let units = inbound.drain().unwrap();
        assert_eq!(units, vec![&b"a"[..], &b"b"[..], &b"c"[..]]);
    }

    #[test]
    fn drain_on_idle_open_queue_is_empty_not_closed() {
        let inbound = Inbound::new();
        assert_eq!(inbound.drain().unwrap(), Vec::<Bytes>::new());
    }

    #[test]
    fn buffered_data_drains_before_closure_is_reported() {
        let inbound = Inbound::new();
        inbound.push(Bytes::from_static(b"left"));
        inbound.push(Bytes::from_static(b"over"));
        inbound.close("connection reset");

        // Pending data first.
        let units = inbound.drain().unwrap();
        assert_eq!(units.len(), 2);

        // Then the closure, stably, forever.
        for _ in 0..5 {
            assert_eq!(inbound.drain().unwrap_err(), "connection reset");
        }
    }

    #[test]
    fn push_after_close_is_dropped() {
        let inbound = Inbound::new();
        inbound.close("connection closed by peer");
        assert!(!inbound.push(Bytes::from_static(b"stale")));
        assert_eq!(inbound.drain().unwrap_err(), "connection closed by peer");
    }

    #[test]
    fn first_close_cause_sticks() {
        let inbound = Inbound::new();
        inbound.close("first");
        inbound.close("second");
        assert_eq!(inbound.drain().unwrap_err(), "first");
    }

    // ── Outbound ────────────────────────────────────────────────────

    #[test]
    fn enqueue_preserves_call_order() {
        let (sender, mut rx, _status) = outbound();
        sender
            .enqueue(vec![Bytes::from_static(b"1"), Bytes::from_static(b"2")])
            .unwrap();
        sender.enqueue(vec![Bytes::from_static(b"3")]).unwrap();

        let mut seen = Vec::new();
        while let Ok(OutboundCmd::Unit(b)) = rx.try_recv() {
            seen.push(b);
        }
        assert_eq!(seen, vec![&b"1"[..], &b"2"[..], &b"3"[..]]);
    }

    #[test]
    fn enqueue_after_close_reports_cause_and_sends_nothing() {
        let (sender, mut rx, status) = outbound();
        status.close("tls handshake with example.test failed: eof");

        let err = sender.enqueue(vec![Bytes::from_static(b"x")]).unwrap_err();
        assert_eq!(err, "tls handshake with example.test failed: eof");
        assert!(rx.try_recv().is_err(), "nothing may be enqueued after close");
    }

    #[test]
    fn enqueue_after_receiver_gone_reports_closure() {
        let (sender, rx, _status) = outbound();
        drop(rx);
        let err = sender.enqueue(vec![Bytes::from_static(b"x")]).unwrap_err();
        assert_eq!(err, "connection closed");
    }

    #[test]
    fn receiver_drains_queued_units_after_sender_drop() {
        // The graceful-drain property: everything enqueued before the last
        // handle drop is still delivered to the writer.
        let (sender, mut rx, _status) = outbound();
        sender
            .enqueue(vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")])
            .unwrap();
        drop(sender);

        assert!(matches!(rx.blocking_recv(), Some(OutboundCmd::Unit(b)) if b == &b"a"[..]));
        assert!(matches!(rx.blocking_recv(), Some(OutboundCmd::Unit(b)) if b == &b"b"[..]));
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn outbound_status_first_cause_sticks() {
        let (_sender, _rx, status) = outbound();
        status.close("first");
        status.close("second");
        assert_eq!(status.cause().as_deref(), Some("first"));
    }
}
