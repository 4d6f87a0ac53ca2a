//! Playback session
//!
//! One end-to-end play cycle: open throttled source at a probed bitrate →
//! pump through the broadcast engine on a background task → stop control.
//!
//! Opening is split from starting so a caller can find out whether the song
//! is playable before it disturbs whatever is currently on air.

use chrono::{DateTime, Utc};
use radio_common::events::{EventBus, RadioEvent, StopReason};
use radio_common::time;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::broadcast::{BroadcastEngine, PumpEnd, PumpOutcome};
use crate::error::{Error, Result};
use crate::throttle::ThrottledSource;

/// Pacing parameters shared by every session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    /// Probed bitrate → byte rate divisor (8 for bits → bytes)
    pub bitrate_divisor: u64,
    /// Paced chunks per second
    pub chunks_per_second: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            bitrate_divisor: 8,
            chunks_per_second: 10,
        }
    }
}

/// A song whose source is open but not yet pumping
#[derive(Debug)]
pub struct PreparedSession {
    song_path: PathBuf,
    bitrate: u64,
    source: ThrottledSource,
    cancel: CancellationToken,
}

impl PreparedSession {
    /// Publish `StreamStarted` and spawn the pump task
    pub fn start(self, engine: BroadcastEngine, events: EventBus) -> PlaybackSession {
        let Self {
            song_path,
            bitrate,
            mut source,
            cancel,
        } = self;

        let id = Uuid::new_v4();
        let bytes_per_second = source.bytes_per_second();
        info!(
            "Starting session {} with {} ({} bits/s, {} bytes/s)",
            id,
            song_path.display(),
            bitrate,
            bytes_per_second
        );
        events.publish(RadioEvent::StreamStarted {
            session_id: id,
            song: song_path.display().to_string(),
            bitrate,
            bytes_per_second,
            timestamp: time::now(),
        });

        let pump_cancel = cancel.clone();
        let pump = tokio::spawn(async move {
            let registry = Arc::clone(engine.registry());
            let prune_events = events.clone();
            let result = engine
                .pump(&mut source, |listener_id| {
                    prune_events.publish(RadioEvent::ListenerDetached {
                        listener_id: listener_id.as_uuid(),
                        listeners: registry.len(),
                        timestamp: time::now(),
                    });
                })
                .await;

            match result {
                Ok(outcome) => {
                    // Explicit stops are reported by whoever cancelled
                    if outcome.end == PumpEnd::Exhausted {
                        info!("Session {} reached end of file after {} bytes", id, outcome.bytes);
                        events.publish(RadioEvent::StreamStopped {
                            session_id: id,
                            reason: StopReason::Exhausted,
                            bytes_sent: outcome.bytes,
                            timestamp: time::now(),
                        });
                    }
                    Some(outcome)
                }
                Err(e) => {
                    error!("Session {} source failed: {}", id, e);
                    pump_cancel.cancel();
                    events.publish(RadioEvent::StreamStopped {
                        session_id: id,
                        reason: StopReason::Failed,
                        bytes_sent: source.bytes_emitted(),
                        timestamp: time::now(),
                    });
                    None
                }
            }
        });

        PlaybackSession {
            id,
            song_path,
            bitrate,
            bytes_per_second,
            started_at: time::now(),
            cancel,
            pump,
        }
    }
}

/// An active (or just finished) playback of one song
#[derive(Debug)]
pub struct PlaybackSession {
    id: Uuid,
    song_path: PathBuf,
    bitrate: u64,
    bytes_per_second: u64,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    pump: JoinHandle<Option<PumpOutcome>>,
}

impl PlaybackSession {
    /// Open `song_path` for playback at `bitrate` bits/s
    ///
    /// Nothing is published and no task is spawned until
    /// [`PreparedSession::start`]. A song that cannot be opened is an error.
    pub async fn prepare(
        song_path: &Path,
        bitrate: u64,
        pacing: PacingConfig,
    ) -> Result<PreparedSession> {
        if pacing.bitrate_divisor == 0 {
            return Err(Error::Session("bitrate divisor must be non-zero".into()));
        }
        let bytes_per_second = bitrate / pacing.bitrate_divisor;

        let cancel = CancellationToken::new();
        let source = ThrottledSource::open(
            song_path,
            bytes_per_second,
            pacing.chunks_per_second,
            cancel.clone(),
        )
        .await?;

        Ok(PreparedSession {
            song_path: song_path.to_path_buf(),
            bitrate,
            source,
            cancel,
        })
    }

    /// Signal the source to halt and wait for the pump to wind down
    ///
    /// Returns the pump totals when it ended cleanly.
    pub async fn stop(self) -> Option<PumpOutcome> {
        self.cancel.cancel();
        match self.pump.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Session {} pump task ended abnormally: {}", self.id, e);
                None
            }
        }
    }

    /// True while the pump is still running and no stop was requested
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.pump.is_finished()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn song_path(&self) -> &Path {
        &self.song_path
    }

    pub fn bitrate(&self) -> u64 {
        self.bitrate
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.bytes_per_second
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
