//! Event types for the radio event system
//!
//! Events are published on the [`EventBus`] by the session controller and the
//! listener lifecycle, and can be serialized for SSE transmission. They are
//! purely observational: nothing in the broadcast pipeline waits on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Why a playback session ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum StopReason {
    /// Explicit `stop` command
    Stopped,
    /// A new `start` replaced the session
    Replaced,
    /// Natural end of file
    Exhausted,
    /// The source failed mid-stream
    Failed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Stopped => write!(f, "Stopped"),
            StopReason::Replaced => write!(f, "Replaced"),
            StopReason::Exhausted => write!(f, "Exhausted"),
            StopReason::Failed => write!(f, "Failed"),
        }
    }
}

/// Radio event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RadioEvent {
    /// A playback session began pumping bytes
    StreamStarted {
        session_id: Uuid,
        /// Song file being broadcast
        song: String,
        /// Probed (or fallback) bitrate in bits/s
        bitrate: u64,
        /// Throttle rate derived from the bitrate
        bytes_per_second: u64,
        timestamp: DateTime<Utc>,
    },

    /// A playback session ended
    StreamStopped {
        session_id: Uuid,
        reason: StopReason,
        /// Total bytes released by the throttled source
        bytes_sent: u64,
        timestamp: DateTime<Utc>,
    },

    /// A listener attached to the broadcast
    ListenerAttached {
        listener_id: Uuid,
        /// Listener count after the attach
        listeners: usize,
        timestamp: DateTime<Utc>,
    },

    /// A listener detached (connection closed or sink pruned)
    ListenerDetached {
        listener_id: Uuid,
        /// Listener count after the detach
        listeners: usize,
        timestamp: DateTime<Utc>,
    },
}

impl RadioEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            RadioEvent::StreamStarted { .. } => "StreamStarted",
            RadioEvent::StreamStopped { .. } => "StreamStopped",
            RadioEvent::ListenerAttached { .. } => "ListenerAttached",
            RadioEvent::ListenerDetached { .. } => "ListenerDetached",
        }
    }
}

/// Fan-out channel for [`RadioEvent`]s
///
/// Cloning is cheap; all clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RadioEvent>,
}

impl EventBus {
    /// Create a new event bus
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events buffered per subscriber before it lags
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event; having no subscribers is fine
    pub fn publish(&self, event: RadioEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RadioEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = RadioEvent::StreamStopped {
            session_id: Uuid::nil(),
            reason: StopReason::Exhausted,
            bytes_sent: 42,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StreamStopped");
        assert_eq!(json["reason"], "Exhausted");
        assert_eq!(json["bytes_sent"], 42);
        assert_eq!(event.event_type(), "StreamStopped");
    }

    #[tokio::test]
    async fn test_bus_delivers_to_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(RadioEvent::ListenerAttached {
            listener_id: Uuid::new_v4(),
            listeners: 1,
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            RadioEvent::ListenerAttached { listeners, .. } => assert_eq!(listeners, 1),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.publish(RadioEvent::ListenerDetached {
            listener_id: Uuid::new_v4(),
            listeners: 0,
            timestamp: Utc::now(),
        });
    }
}
