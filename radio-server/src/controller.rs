//! Session controller
//!
//! The single process-wide coordination point for playback. Owns at most one
//! [`PlaybackSession`] and the shared [`ClientRegistry`].
//!
//! States: `Idle` (no session) and `Streaming` (one active session).
//! - `start` from either state stops any existing session, then starts a new
//!   one. Starting while streaming replaces the current song.
//! - `stop` while streaming halts the source; while idle it is a no-op.
//! - End of file returns the controller to `Idle` on its own.
//!
//! The bitrate probe runs before the state lock is taken, so `stop` and
//! `status` answer while a start is still probing. Commands take effect in
//! arrival order: a start that is overtaken by a later command while probing
//! is abandoned.
//!
//! One instance lives for the whole process and is shared through
//! `Arc<SessionController>` by the HTTP layer.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use radio_common::events::{EventBus, RadioEvent, StopReason};
use radio_common::time;
use radio_common::RadioConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use crate::broadcast::BroadcastEngine;
use crate::command::{Command, CommandResponse};
use crate::error::{Error, Result};
use crate::probe::{BitrateProbe, SoxProbe};
use crate::registry::{ClientRegistry, ListenerId, ListenerStream};
use crate::session::{PacingConfig, PlaybackSession};

/// Controller settings taken from configuration
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub default_song: PathBuf,
    pub pacing: PacingConfig,
    pub listener_buffer_chunks: usize,
}

impl From<&RadioConfig> for StreamSettings {
    fn from(config: &RadioConfig) -> Self {
        Self {
            default_song: config.default_song.clone(),
            pacing: PacingConfig {
                bitrate_divisor: config.bitrate_divisor,
                chunks_per_second: config.chunks_per_second,
            },
            listener_buffer_chunks: config.listener_buffer_chunks,
        }
    }
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamState {
    Idle,
    Streaming,
}

/// Snapshot of the controller for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    pub state: StreamState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_per_second: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub listeners: usize,
}

/// Process-wide playback coordinator
pub struct SessionController {
    registry: Arc<ClientRegistry>,
    probe: Arc<dyn BitrateProbe>,
    settings: StreamSettings,
    events: EventBus,
    /// Held across a whole start/stop so transitions never interleave
    current: Mutex<Option<PlaybackSession>>,
    /// Bumped by every start and stop; orders commands around the probe
    commands: AtomicU64,
}

impl SessionController {
    pub fn new(settings: StreamSettings, probe: Arc<dyn BitrateProbe>, events: EventBus) -> Self {
        let registry = Arc::new(ClientRegistry::new(settings.listener_buffer_chunks));
        Self {
            registry,
            probe,
            settings,
            events,
            current: Mutex::new(None),
            commands: AtomicU64::new(0),
        }
    }

    /// Build a controller wired to the `sox` probe from configuration
    pub fn from_config(config: &RadioConfig, events: EventBus) -> Self {
        let probe = SoxProbe::new(
            config.probe_command.clone(),
            config.fallback_bitrate,
            config.probe_timeout(),
        );
        Self::new(StreamSettings::from(config), Arc::new(probe), events)
    }

    /// Dispatch a textual command
    ///
    /// Never fails: start errors are logged, unknown text is reported as
    /// `not found`.
    pub async fn handle_command(&self, text: &str) -> CommandResponse {
        info!("command received: {}", text);

        match Command::classify(text) {
            Command::Start => {
                match self.start().await {
                    Ok(_) => {}
                    Err(Error::Superseded) => info!("start abandoned, a later command won"),
                    Err(e) => error!("Failed to start streaming: {}", e),
                }
                CommandResponse::ok()
            }
            Command::Stop => {
                self.stop().await;
                CommandResponse::ok()
            }
            Command::Unknown => CommandResponse::not_found(),
        }
    }

    /// Start the default song, replacing any active session
    pub async fn start(&self) -> Result<Uuid> {
        let song = self.settings.default_song.clone();
        self.start_song(&song).await
    }

    /// Start `song`, replacing any active session
    ///
    /// The previous session is only reported as `Replaced` once the new song
    /// has opened; if it fails to open, the previous one ends as `Stopped`.
    pub async fn start_song(&self, song: &Path) -> Result<Uuid> {
        let ticket = self.commands.fetch_add(1, Ordering::SeqCst) + 1;
        let bitrate = self.probe.probe(song).await;

        let mut current = self.current.lock().await;
        if self.commands.load(Ordering::SeqCst) != ticket {
            return Err(Error::Superseded);
        }

        info!("starting with {}", song.display());
        let prepared = match PlaybackSession::prepare(song, bitrate, self.settings.pacing).await {
            Ok(prepared) => prepared,
            Err(e) => {
                if let Some(previous) = current.take() {
                    self.end_session(previous, StopReason::Stopped).await;
                }
                return Err(e);
            }
        };

        if let Some(previous) = current.take() {
            self.end_session(previous, StopReason::Replaced).await;
        }

        let session = prepared.start(
            BroadcastEngine::new(Arc::clone(&self.registry)),
            self.events.clone(),
        );
        let id = session.id();
        *current = Some(session);
        Ok(id)
    }

    /// Stop the active session; returns false when already idle
    pub async fn stop(&self) -> bool {
        self.commands.fetch_add(1, Ordering::SeqCst);
        let mut current = self.current.lock().await;
        match current.take() {
            Some(session) if session.is_active() => {
                self.end_session(session, StopReason::Stopped).await;
                true
            }
            // Finished on its own; dropping it completes the transition
            Some(_) | None => false,
        }
    }

    async fn end_session(&self, session: PlaybackSession, reason: StopReason) {
        if !session.is_active() {
            return;
        }
        let id = session.id();
        info!("stopping session {} ({})", id, reason);

        let bytes_sent = session.stop().await.map(|o| o.bytes).unwrap_or_default();
        self.events.publish(RadioEvent::StreamStopped {
            session_id: id,
            reason,
            bytes_sent,
            timestamp: time::now(),
        });
    }

    /// Current state; a session whose source hit EOF counts as idle
    pub async fn state(&self) -> StreamState {
        self.status().await.state
    }

    pub async fn status(&self) -> StreamStatus {
        let mut current = self.current.lock().await;
        if current.as_ref().is_some_and(|s| !s.is_active()) {
            *current = None;
        }

        let listeners = self.registry.len();
        match current.as_ref() {
            Some(session) => StreamStatus {
                state: StreamState::Streaming,
                session_id: Some(session.id()),
                song: Some(session.song_path().display().to_string()),
                bitrate: Some(session.bitrate()),
                bytes_per_second: Some(session.bytes_per_second()),
                started_at: Some(session.started_at()),
                listeners,
            },
            None => StreamStatus {
                state: StreamState::Idle,
                session_id: None,
                song: None,
                bitrate: None,
                bytes_per_second: None,
                started_at: None,
                listeners,
            },
        }
    }

    /// Attach a new listener
    ///
    /// Dropping the returned stream is the connection-closed cleanup: it
    /// detaches the listener from the registry.
    pub fn create_client_stream(&self) -> ClientStream {
        let (id, stream) = self.registry.attach();
        let listeners = self.registry.len();
        info!("new listener {} ({} connected)", id, listeners);

        self.events.publish(RadioEvent::ListenerAttached {
            listener_id: id.as_uuid(),
            listeners,
            timestamp: time::now(),
        });

        ClientStream {
            id,
            stream,
            registry: Arc::clone(&self.registry),
            events: self.events.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

/// One listener's live byte stream, detached from the registry on drop
pub struct ClientStream {
    id: ListenerId,
    stream: ListenerStream,
    registry: Arc<ClientRegistry>,
    events: EventBus,
}

impl ClientStream {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Bytes> {
        self.stream.recv().await
    }
}

impl Stream for ClientStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}

impl Drop for ClientStream {
    fn drop(&mut self) {
        if self.registry.detach(self.id) {
            info!("closing connection of {}", self.id);
            self.events.publish(RadioEvent::ListenerDetached {
                listener_id: self.id.as_uuid(),
                listeners: self.registry.len(),
                timestamp: time::now(),
            });
        }
    }
}
