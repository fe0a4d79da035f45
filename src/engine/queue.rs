//! Bounded per-edge value queues with backpressure.
//!
//! Each connection gets one queue. FIFO per edge is guaranteed; capacity and
//! full-queue behavior follow the connection's backpressure configuration.
//! All blocking operations select on the run's cancellation token.

use crate::cancel::CancelToken;
use crate::pipeline::{BackpressureStrategy, DropPolicy};
use parking_lot::Mutex;
use rand::Rng;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

/// Why a send did not enqueue a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The queue was closed.
    Closed,
    /// The run was cancelled while waiting for space.
    Cancelled,
}

/// Why a receive did not return a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// The run was cancelled while waiting for a value.
    Cancelled,
}

enum Rejected {
    Closed,
    Full(Value),
}

struct Shared {
    buf: Mutex<VecDeque<Value>>,
    capacity: usize,
    strategy: BackpressureStrategy,
    drop_policy: DropPolicy,
    closed: AtomicBool,
    dropped: AtomicU64,
    readable: Notify,
    writable: Notify,
    label: String,
}

impl Shared {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.readable.notify_one();
        self.writable.notify_one();
    }
}

/// Sending half of an edge queue. Dropping it closes the queue.
pub struct EdgeSender {
    shared: Arc<Shared>,
}

/// Receiving half of an edge queue.
pub struct EdgeReceiver {
    shared: Arc<Shared>,
}

/// Creates an edge queue with the given capacity and backpressure behavior.
///
/// Capacity is clamped to at least 1.
#[must_use]
pub fn edge_queue(
    label: impl Into<String>,
    capacity: usize,
    strategy: BackpressureStrategy,
    drop_policy: DropPolicy,
) -> (EdgeSender, EdgeReceiver) {
    let shared = Arc::new(Shared {
        buf: Mutex::new(VecDeque::new()),
        capacity: capacity.max(1),
        strategy,
        drop_policy,
        closed: AtomicBool::new(false),
        dropped: AtomicU64::new(0),
        readable: Notify::new(),
        writable: Notify::new(),
        label: label.into(),
    });
    (
        EdgeSender {
            shared: shared.clone(),
        },
        EdgeReceiver { shared },
    )
}

impl EdgeSender {
    /// Sends a value.
    ///
    /// With the Block and Buffer strategies a full queue suspends the sender
    /// until space frees up or the token fires. With the Drop strategy the
    /// configured policy decides which value is discarded and the send
    /// returns immediately.
    pub async fn send(&self, value: Value, cancel: &CancelToken) -> Result<(), SendError> {
        if self.shared.strategy == BackpressureStrategy::Drop {
            return self.send_dropping(value);
        }

        let mut value = value;
        loop {
            match self.try_push(value) {
                Ok(()) => return Ok(()),
                Err(Rejected::Closed) => return Err(SendError::Closed),
                Err(Rejected::Full(v)) => value = v,
            }

            tokio::select! {
                () = cancel.cancelled() => return Err(SendError::Cancelled),
                () = self.shared.writable.notified() => {}
            }
        }
    }

    fn try_push(&self, value: Value) -> Result<(), Rejected> {
        let mut buf = self.shared.buf.lock();
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(Rejected::Closed);
        }
        if buf.len() < self.shared.capacity {
            buf.push_back(value);
            drop(buf);
            self.shared.readable.notify_one();
            return Ok(());
        }
        Err(Rejected::Full(value))
    }

    fn send_dropping(&self, value: Value) -> Result<(), SendError> {
        let mut buf = self.shared.buf.lock();
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }
        if buf.len() < self.shared.capacity {
            buf.push_back(value);
        } else {
            match self.shared.drop_policy {
                DropPolicy::DropOldest => {
                    buf.pop_front();
                    buf.push_back(value);
                }
                DropPolicy::DropNewest => {
                    // Incoming value is discarded.
                }
                DropPolicy::DropRandom => {
                    let index = rand::thread_rng().gen_range(0..buf.len());
                    buf.remove(index);
                    buf.push_back(value);
                }
            }
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                edge = %self.shared.label,
                policy = %self.shared.drop_policy,
                "value dropped due to backpressure"
            );
        }
        drop(buf);
        self.shared.readable.notify_one();
        Ok(())
    }

    /// Closes the queue explicitly.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Number of values discarded by the Drop strategy.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for EdgeSender {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl EdgeReceiver {
    /// Receives the next value in FIFO order.
    ///
    /// Returns `Ok(None)` once the queue is closed and drained.
    pub async fn recv(&mut self, cancel: &CancelToken) -> Result<Option<Value>, RecvError> {
        loop {
            {
                let mut buf = self.shared.buf.lock();
                if let Some(value) = buf.pop_front() {
                    drop(buf);
                    self.shared.writable.notify_one();
                    return Ok(Some(value));
                }
                if self.shared.closed.load(Ordering::SeqCst) {
                    return Ok(None);
                }
            }

            tokio::select! {
                () = cancel.cancelled() => return Err(RecvError::Cancelled),
                () = self.shared.readable.notified() => {}
            }
        }
    }
}

impl std::fmt::Debug for EdgeSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeSender")
            .field("edge", &self.shared.label)
            .field("capacity", &self.shared.capacity)
            .finish()
    }
}

impl std::fmt::Debug for EdgeReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeReceiver")
            .field("edge", &self.shared.label)
            .finish()
    }
}
