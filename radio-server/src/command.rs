//! Control command classification
//!
//! Command text is matched permissively: any text containing "start"
//! (case-insensitive) is a start, otherwise any text containing "stop" is a
//! stop. "start" wins when both appear.

use serde::{Deserialize, Serialize};

/// Control command recognised by the session controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Unknown,
}

impl Command {
    /// Classify raw command text by substring match
    pub fn classify(text: &str) -> Self {
        let text = text.to_lowercase();
        if text.contains("start") {
            Command::Start
        } else if text.contains("stop") {
            Command::Stop
        } else {
            Command::Unknown
        }
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Command::classify(text)
    }
}

/// Request body for `POST /controller`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandRequest {
    pub command: String,
}

/// Structured command result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub result: String,
}

impl CommandResponse {
    pub fn ok() -> Self {
        Self {
            result: "ok".to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            result: "not found".to_string(),
        }
    }
}
