//! Bitrate probing via an external media inspector
//!
//! The probe runs `sox --i -B <file>` (or a configured replacement) and
//! parses its textual bitrate. Probing never blocks playback: any failure is
//! logged and the configured fallback bitrate is returned instead.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error};

/// Why a probe was abandoned
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("probe wrote to stderr: {0}")]
    ErrorOutput(String),

    #[error("probe exited with {0}")]
    ExitStatus(std::process::ExitStatus),

    #[error("unparseable bitrate output: {0:?}")]
    Unparseable(String),
}

/// Source of a song's bitrate in bits per second
#[async_trait]
pub trait BitrateProbe: Send + Sync {
    /// Bitrate of the file at `path`; infallible by contract
    async fn probe(&self, path: &Path) -> u64;
}

/// Probe backed by the `sox` command line tool
#[derive(Debug, Clone)]
pub struct SoxProbe {
    program: PathBuf,
    fallback_bitrate: u64,
    timeout: Duration,
}

impl SoxProbe {
    pub fn new(program: impl Into<PathBuf>, fallback_bitrate: u64, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            fallback_bitrate,
            timeout,
        }
    }

    /// Run the inspector once, surfacing every failure
    pub async fn inspect(&self, path: &Path) -> Result<u64, ProbeError> {
        let program = self.program.display().to_string();

        let mut command = Command::new(&self.program);
        command
            .arg("--i") // info
            .arg("-B") // bitrate
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
            .map_err(|source| ProbeError::Spawn { program, source })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            return Err(ProbeError::ErrorOutput(stderr.trim().to_string()));
        }
        if !output.status.success() {
            return Err(ProbeError::ExitStatus(output.status));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_bitrate(&stdout).ok_or_else(|| ProbeError::Unparseable(stdout.trim().to_string()))
    }
}

#[async_trait]
impl BitrateProbe for SoxProbe {
    async fn probe(&self, path: &Path) -> u64 {
        match self.inspect(path).await {
            Ok(bitrate) => {
                debug!("Probed {}: {} bits/s", path.display(), bitrate);
                bitrate
            }
            Err(e) => {
                error!(
                    "Bitrate probe failed for {}: {} (using fallback {} bits/s)",
                    path.display(),
                    e,
                    self.fallback_bitrate
                );
                self.fallback_bitrate
            }
        }
    }
}

/// Probe that always answers with the same bitrate
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub u64);

#[async_trait]
impl BitrateProbe for FixedProbe {
    async fn probe(&self, _path: &Path) -> u64 {
        self.0
    }
}

/// Parse inspector output such as `128k`, `1.41M` or `64000`
///
/// `k`/`K` multiply by 1000 and `M` by 1 000 000. Zero is rejected.
pub fn parse_bitrate(raw: &str) -> Option<u64> {
    let text = raw.trim();
    let (number, multiplier) = match text.chars().last()? {
        'k' | 'K' => (&text[..text.len() - 1], 1_000f64),
        'M' => (&text[..text.len() - 1], 1_000_000f64),
        _ => (text, 1f64),
    };

    let value: f64 = number.trim().parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    let bits = (value * multiplier).round() as u64;
    (bits > 0).then_some(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kilo_suffix() {
        assert_eq!(parse_bitrate("128k"), Some(128_000));
        assert_eq!(parse_bitrate("128k\n"), Some(128_000));
        assert_eq!(parse_bitrate("  64K "), Some(64_000));
    }

    #[test]
    fn test_parse_plain_and_fractional() {
        assert_eq!(parse_bitrate("64000"), Some(64_000));
        assert_eq!(parse_bitrate("1.41M"), Some(1_410_000));
        assert_eq!(parse_bitrate("192.5k"), Some(192_500));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_bitrate(""), None);
        assert_eq!(parse_bitrate("k"), None);
        assert_eq!(parse_bitrate("0k"), None);
        assert_eq!(parse_bitrate("-128k"), None);
        assert_eq!(parse_bitrate("sox FAIL formats"), None);
    }

    #[tokio::test]
    async fn test_missing_program_yields_fallback() {
        let probe = SoxProbe::new(
            "/nonexistent/definitely-not-sox",
            128_000,
            Duration::from_secs(2),
        );

        assert!(matches!(
            probe.inspect(Path::new("song.mp3")).await,
            Err(ProbeError::Spawn { .. })
        ));
        assert_eq!(probe.probe(Path::new("song.mp3")).await, 128_000);
    }

    #[cfg(unix)]
    fn script(body: &str) -> tempfile::TempPath {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let mut file = tempfile::Builder::new()
            .prefix("fake-sox")
            .suffix(".sh")
            .tempfile()
            .unwrap();
        writeln!(file, "#!/bin/sh\n{}", body).unwrap();
        file.flush().unwrap();
        let path = file.into_temp_path();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_probe_normalizes_suffix() {
        let fake = script("echo 128k");
        let probe = SoxProbe::new(fake.to_path_buf(), 1, Duration::from_secs(5));

        assert_eq!(probe.inspect(Path::new("song.mp3")).await.unwrap(), 128_000);
        // 128000 bits/s over the conventional divisor of 8
        assert_eq!(probe.probe(Path::new("song.mp3")).await / 8, 16_000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stderr_output_abandons_probe() {
        let fake = script("echo 128k\necho 'sox FAIL formats: no handler' >&2");
        let probe = SoxProbe::new(fake.to_path_buf(), 96_000, Duration::from_secs(5));

        assert!(matches!(
            probe.inspect(Path::new("song.mp3")).await,
            Err(ProbeError::ErrorOutput(_))
        ));
        assert_eq!(probe.probe(Path::new("song.mp3")).await, 96_000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_probe_times_out() {
        let fake = script("sleep 5\necho 128k");
        let probe = SoxProbe::new(fake.to_path_buf(), 64_000, Duration::from_millis(100));

        assert!(matches!(
            probe.inspect(Path::new("song.mp3")).await,
            Err(ProbeError::Timeout(_))
        ));
        assert_eq!(probe.probe(Path::new("song.mp3")).await, 64_000);
    }
}
