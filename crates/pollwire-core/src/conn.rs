//! The generic connection handle.
//!
//! A [`Connection`] is a reference-counted, non-blocking endpoint over the
//! buffer pair from [`crate::buffer`]. The engines wire one background reader
//! (filling the inbound queue) and one background writer (draining the
//! outbound queue) around it; the caller only ever touches `read` and
//! `write`, neither of which can block.
//!
//! # Abandonment
//!
//! Dropping the last handle runs the drop policy declared at construction:
//!
//! - [`DropPolicy::GracefulDrain`] (default) — the outbound sender is
//!   dropped, the writer transmits everything still queued, then closes the
//!   transport.
//! - [`DropPolicy::CloseImmediately`] — an abort command is pushed ahead of
//!   the sender drop, so the writer stops without draining.
//!
//! The background reader holds only a [`Weak`] reference to the inbound
//! queue; once the last handle is gone, buffered-but-unread data is freed and
//! the reader exits on its next delivery attempt.

use std::sync::{Arc, Weak};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::buffer::{Inbound, OutboundCmd, OutboundSender, OutboundStatus, outbound};
use crate::error::WriteError;

/// What happens to queued outbound data when the last handle is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropPolicy {
    /// Transmit everything still queued, then close the transport.
    #[default]
    GracefulDrain,
    /// Close the transport without draining.
    CloseImmediately,
}

/// Per-unit validation applied by `write` before anything is enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitCheck {
    /// Any byte sequence is a valid unit (binary frames, raw streams).
    #[default]
    None,
    /// Units must be valid UTF-8 (WebSocket text frames).
    Utf8,
}

struct ConnInner {
    inbound: Arc<Inbound>,
    outbound: OutboundSender,
    policy: DropPolicy,
    check: UnitCheck,
}

impl Drop for ConnInner {
    fn drop(&mut self) {
        if self.policy == DropPolicy::CloseImmediately {
            self.outbound.abort();
        }
        // The outbound sender field drops next, which lets the writer finish
        // (drain for GracefulDrain, stop for CloseImmediately) and close the
        // transport. The reader's weak inbound reference dies with us.
        tracing::debug!(policy = ?self.policy, "connection released");
    }
}

/// A reference-counted, non-blocking, bidirectional endpoint.
///
/// Cloning shares the same connection; the drop policy runs when the last
/// clone is dropped.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnInner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

impl Connection {
    /// Non-blocking drain of everything received since the last read.
    ///
    /// Returns an empty list while the connection is alive but idle. Once
    /// the inbound buffer is empty and the connection has closed, every call
    /// reports the same closure cause.
    pub fn read(&self) -> Result<Vec<Bytes>, String> {
        self.inner.inbound.drain()
    }

    /// Non-blocking enqueue of one or more units for transmission.
    ///
    /// All units are validated before any is enqueued; a validation failure
    /// enqueues nothing. If the connection is closed the closure cause is
    /// returned immediately, also without enqueuing.
    pub fn write<I>(&self, units: I) -> Result<(), WriteError>
    where
        I: IntoIterator<Item = Bytes>,
    {
        let units: Vec<Bytes> = units.into_iter().collect();

        if self.inner.check == UnitCheck::Utf8 {
            for (index, unit) in units.iter().enumerate() {
                if std::str::from_utf8(unit).is_err() {
                    return Err(WriteError::InvalidUtf8 { index });
                }
            }
        }

        self.inner.outbound.enqueue(units).map_err(WriteError::Closed)
    }

    /// The sticky closure cause, if the connection has closed in either
    /// direction. Inbound closure (peer/transport) wins over writer-side.
    pub fn close_cause(&self) -> Option<String> {
        self.inner
            .inbound
            .cause()
            .or_else(|| self.inner.outbound.status().cause())
    }
}

/// Writer-/reader-side ends of a freshly created connection, handed to the
/// engine that wires the transport tasks.
pub(crate) struct ConnParts {
    /// Weak inbound reference for the background reader. Upgrade failure
    /// means the caller abandoned the connection.
    pub inbound: Weak<Inbound>,
    /// Command stream for the background writer.
    pub rx: mpsc::UnboundedReceiver<OutboundCmd>,
    /// Close-cause cell the writer settles when it stops.
    pub status: Arc<OutboundStatus>,
}

/// Create a connection handle plus the background-task ends.
pub(crate) fn connection(policy: DropPolicy, check: UnitCheck) -> (Connection, ConnParts) {
    let inbound = Arc::new(Inbound::new());
    let weak = Arc::downgrade(&inbound);
    let (sender, rx, status) = outbound();
    let conn = Connection {
        inner: Arc::new(ConnInner {
            inbound,
            outbound: sender,
            policy,
            check,
        }),
    };
    (
        conn,
        ConnParts {
            inbound: weak,
            rx,
            status,
        },
    )
}
