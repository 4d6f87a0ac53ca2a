//! Listener registry
//!
//! Tracks the sinks of all currently attached listeners, keyed by a unique
//! id. The registry is the single source of truth for fan-out targets and
//! outlives any individual playback session.
//!
//! Entries are stored in a `DashMap`, so attach/detach lock only the shard
//! holding the entry. A fan-out pass works on a snapshot and applies
//! removals after the pass.

use bytes::Bytes;
use dashmap::DashMap;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;
use uuid::Uuid;

/// Unique listener identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of offering one chunk to one sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Chunk queued for the listener
    Delivered,
    /// Listener's buffer is full; it misses this chunk but stays attached
    Skipped,
    /// Listener is gone; the entry must be pruned
    Closed,
}

/// Write side of one listener
#[derive(Debug, Clone)]
pub struct ListenerSink {
    tx: mpsc::Sender<Bytes>,
}

impl ListenerSink {
    /// Offer a chunk without waiting
    pub fn offer(&self, chunk: Bytes) -> Delivery {
        match self.tx.try_send(chunk) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Skipped,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// Read side of one listener: an independent stream of broadcast chunks
#[derive(Debug)]
pub struct ListenerStream {
    inner: ReceiverStream<Bytes>,
}

impl Stream for ListenerStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl ListenerStream {
    /// Receive the next chunk directly
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.inner.as_mut().recv().await
    }

    /// Next chunk if one is already buffered
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.inner.as_mut().try_recv().ok()
    }
}

/// Registry of attached listeners
///
/// Thread-safe for concurrent access from connection handlers and the
/// broadcast pump.
#[derive(Debug)]
pub struct ClientRegistry {
    sinks: DashMap<ListenerId, ListenerSink>,
    /// Per-listener channel capacity, in chunks
    buffer_chunks: usize,
}

impl ClientRegistry {
    /// Create an empty registry
    ///
    /// # Arguments
    ///
    /// * `buffer_chunks` - Chunks a listener may fall behind before it starts
    ///   missing chunks (clamped to at least 1)
    pub fn new(buffer_chunks: usize) -> Self {
        Self {
            sinks: DashMap::new(),
            buffer_chunks: buffer_chunks.max(1),
        }
    }

    /// Attach a new listener
    ///
    /// Returns its fresh id and the stream it reads broadcast chunks from.
    pub fn attach(&self) -> (ListenerId, ListenerStream) {
        let id = ListenerId::new();
        let (tx, rx) = mpsc::channel(self.buffer_chunks);

        self.sinks.insert(id, ListenerSink { tx });
        debug!("Attached listener {}", id);

        (
            id,
            ListenerStream {
                inner: ReceiverStream::new(rx),
            },
        )
    }

    /// Remove a listener; unknown ids are a no-op
    ///
    /// Returns true if an entry was removed.
    pub fn detach(&self, id: ListenerId) -> bool {
        let removed = self.sinks.remove(&id).is_some();
        if removed {
            debug!("Detached listener {}", id);
        }
        removed
    }

    /// Stable snapshot of the live entries
    pub fn snapshot(&self) -> Vec<(ListenerId, ListenerSink)> {
        self.sinks
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Apply `f` to every live `(id, sink)` pair
    ///
    /// `f` runs over a snapshot, so the registry may be mutated from inside it
    /// or concurrently. Entries for which `f` reports [`Delivery::Closed`] are
    /// removed once the pass completes. Returns the removed ids.
    pub fn for_each<F>(&self, mut f: F) -> Vec<ListenerId>
    where
        F: FnMut(ListenerId, &ListenerSink) -> Delivery,
    {
        let mut closed = Vec::new();
        for (id, sink) in self.snapshot() {
            if f(id, &sink) == Delivery::Closed {
                closed.push(id);
            }
        }

        closed.retain(|id| self.detach(*id));
        closed
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.sinks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(32)
    }
}
