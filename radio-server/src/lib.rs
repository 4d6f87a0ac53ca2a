//! # Radio Broadcast Server Library (radio-server)
//!
//! Single-source, multi-listener audio broadcast engine.
//!
//! **Purpose:** Read one song file at its real-time bitrate and fan every
//! chunk out live to all connected listeners, with HTTP control and static
//! page serving.
//!
//! **Pipeline:** probe bitrate → throttled file read → fan-out to the
//! listener registry, owned by a single process-wide session controller.

pub mod api;
pub mod broadcast;
pub mod command;
pub mod controller;
pub mod error;
pub mod files;
pub mod probe;
pub mod registry;
pub mod session;
pub mod throttle;

pub use command::{Command, CommandResponse};
pub use controller::{SessionController, StreamSettings, StreamState, StreamStatus};
pub use error::{Error, Result};
pub use registry::{ClientRegistry, ListenerId};
