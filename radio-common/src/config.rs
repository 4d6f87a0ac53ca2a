//! Configuration loading and config file resolution
//!
//! Settings come from three layers, highest priority first:
//! 1. Command-line arguments / environment (applied via [`ConfigOverrides`])
//! 2. TOML config file
//! 3. Built-in defaults (code constants)
//!
//! A missing config file at the implicit location is not an error: the
//! service logs a warning and starts with defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "RADIO_CONFIG";

/// Broadcast service configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RadioConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root directory for static assets (home/controller pages, css, js)
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,

    /// Song played when a `start` command arrives
    #[serde(default = "default_song")]
    pub default_song: PathBuf,

    /// Bitrate (bits/s) used when the external probe fails
    #[serde(default = "default_fallback_bitrate")]
    pub fallback_bitrate: u64,

    /// Divisor converting a probed bitrate into the throttle byte rate
    #[serde(default = "default_bitrate_divisor")]
    pub bitrate_divisor: u64,

    /// Number of paced chunks released per second
    #[serde(default = "default_chunks_per_second")]
    pub chunks_per_second: u64,

    /// Per-listener channel capacity, in chunks
    #[serde(default = "default_listener_buffer_chunks")]
    pub listener_buffer_chunks: usize,

    /// External media inspector invoked as `<probe_command> --i -B <file>`
    #[serde(default = "default_probe_command")]
    pub probe_command: String,

    /// Deadline for one probe invocation, in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_song() -> PathBuf {
    PathBuf::from("audio").join("songs").join("conversation.mp3")
}

fn default_fallback_bitrate() -> u64 {
    128_000
}

fn default_bitrate_divisor() -> u64 {
    8
}

fn default_chunks_per_second() -> u64 {
    10
}

fn default_listener_buffer_chunks() -> usize {
    32
}

fn default_probe_command() -> String {
    "sox".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            public_dir: default_public_dir(),
            default_song: default_song(),
            fallback_bitrate: default_fallback_bitrate(),
            bitrate_divisor: default_bitrate_divisor(),
            chunks_per_second: default_chunks_per_second(),
            listener_buffer_chunks: default_listener_buffer_chunks(),
            probe_command: default_probe_command(),
            probe_timeout_ms: default_probe_timeout_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Values supplied on the command line (or their `env` fallbacks)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub public_dir: Option<PathBuf>,
    pub default_song: Option<PathBuf>,
}

impl RadioConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RadioConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file
    ///
    /// Missing or unparseable files are errors here; use [`RadioConfig::load`]
    /// for the graceful variant.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Resolve and load configuration
    ///
    /// An explicit path (CLI or `RADIO_CONFIG`) must exist. Without one, the
    /// platform config location is tried and defaults are used if it is absent.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_path, CONFIG_ENV_VAR) {
            ConfigSource::Explicit(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            ConfigSource::Platform(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            ConfigSource::Defaults => {
                warn!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Apply command-line overrides on top of file values
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(dir) = overrides.public_dir {
            self.public_dir = dir;
        }
        if let Some(song) = overrides.default_song {
            self.default_song = song;
        }
        self
    }

    /// Reject values the broadcast pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.bitrate_divisor == 0 {
            return Err(Error::Config("bitrate_divisor must be greater than 0".into()));
        }
        if self.chunks_per_second == 0 {
            return Err(Error::Config("chunks_per_second must be greater than 0".into()));
        }
        if self.fallback_bitrate == 0 {
            return Err(Error::Config("fallback_bitrate must be greater than 0".into()));
        }
        if self.listener_buffer_chunks == 0 {
            return Err(Error::Config("listener_buffer_chunks must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named on the command line or in the environment
    Explicit(PathBuf),
    /// Found at the platform config location
    Platform(PathBuf),
    /// Nothing found
    Defaults,
}

/// Config file resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. `<config dir>/radio/config.toml` if it exists
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> ConfigSource {
    if let Some(path) = cli_arg {
        return ConfigSource::Explicit(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return ConfigSource::Explicit(PathBuf::from(path));
        }
    }

    match platform_config_file() {
        Some(path) if path.exists() => ConfigSource::Platform(path),
        _ => ConfigSource::Defaults,
    }
}

/// Default configuration file path for the platform
fn platform_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("radio").join("config.toml"))
}
