//! Broadcast fan-out stage
//!
//! Pulls chunks from the active [`ThrottledSource`] and offers each one to
//! every listener in the [`ClientRegistry`] before pulling the next. Closed
//! listeners are pruned; one departed or stalled listener never affects
//! delivery to the others. No per-listener catch-up is kept.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::registry::{ClientRegistry, Delivery, ListenerId};
use crate::throttle::ThrottledSource;

/// Counts for one fan-out pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub skipped: usize,
    pub pruned: Vec<ListenerId>,
}

/// How a pump run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEnd {
    /// Source reached end of file
    Exhausted,
    /// Source was told to stop
    Stopped,
}

/// Totals for a pump run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpOutcome {
    pub end: PumpEnd,
    pub chunks: u64,
    pub bytes: u64,
}

/// Sink-side fan-out; holds no listener state of its own
#[derive(Debug, Clone)]
pub struct BroadcastEngine {
    registry: Arc<ClientRegistry>,
}

impl BroadcastEngine {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Offer one chunk to every live listener
    pub fn fan_out(&self, chunk: &Bytes) -> FanOutReport {
        let mut report = FanOutReport::default();

        let pruned = self.registry.for_each(|id, sink| {
            let delivery = sink.offer(chunk.clone());
            match delivery {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Skipped => {
                    report.skipped += 1;
                    debug!("Listener {} is behind, chunk skipped", id);
                }
                Delivery::Closed => {}
            }
            delivery
        });

        for id in &pruned {
            warn!("Listener {} closed, removed from broadcast", id);
        }
        report.pruned = pruned;
        report
    }

    /// Drive `source` to completion, fanning out every chunk
    ///
    /// `on_prune` is called for each listener removed because its sink closed.
    pub async fn pump<F>(&self, source: &mut ThrottledSource, mut on_prune: F) -> Result<PumpOutcome>
    where
        F: FnMut(ListenerId) + Send,
    {
        let mut chunks = 0u64;
        let mut bytes = 0u64;

        while let Some(chunk) = source.next_chunk().await? {
            chunks += 1;
            bytes += chunk.len() as u64;

            let report = self.fan_out(&chunk);
            report.pruned.iter().copied().for_each(&mut on_prune);
        }

        let end = if source.is_stopped() {
            PumpEnd::Stopped
        } else {
            PumpEnd::Exhausted
        };

        Ok(PumpOutcome { end, chunks, bytes })
    }
}
