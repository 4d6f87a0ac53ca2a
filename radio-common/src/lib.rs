//! # Radio Common Library
//!
//! Shared code for the radio broadcast service:
//! - Error types
//! - Configuration loading (TOML file + overrides)
//! - Event types (RadioEvent enum) and the EventBus
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use config::RadioConfig;
pub use error::{Error, Result};
pub use events::{EventBus, RadioEvent};
