//! One authenticated participant's socket, as seen by the rest of the
//! server.
//!
//! Other tasks never touch the socket itself. They enqueue serialized
//! frames on a bounded outbox that the connection's writer drains.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rollcall_core::{ConnectionId, Identity};
use tokio::sync::mpsc;

/// A connected, authenticated participant.
pub struct ClientConnection {
    /// Server-assigned id, sent to the client in `CONNECTED`.
    pub id: ConnectionId,
    /// Verified at handshake; fixed for the life of the socket.
    pub identity: Identity,
    outbox: mpsc::Sender<Arc<String>>,
    opened: Instant,
    last_seen: Mutex<Instant>,
    dropped: AtomicU64,
}

impl ClientConnection {
    /// Wrap the sending half of a connection's outbox.
    pub fn new(id: ConnectionId, identity: Identity, outbox: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            identity,
            outbox,
            opened: now,
            last_seen: Mutex::new(now),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue a serialized frame without waiting.
    ///
    /// A full or closed outbox drops the frame and bumps [`Self::dropped`].
    pub fn enqueue(&self, frame: Arc<String>) -> bool {
        let queued = self.outbox.try_send(frame).is_ok();
        if !queued {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queued
    }

    /// Frames dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// False once the writer has gone away.
    pub fn is_open(&self) -> bool {
        !self.outbox.is_closed()
    }

    /// Record inbound traffic (any frame, including Pong).
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Whether nothing has arrived for longer than `timeout`.
    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.last_seen.lock().elapsed() > timeout
    }

    /// Time since the handshake completed.
    pub fn uptime(&self) -> Duration {
        self.opened.elapsed()
    }
}
