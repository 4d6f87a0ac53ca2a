//! Throttled file source
//!
//! Wraps a sequential file read so bytes are released at a steady
//! `bytes_per_second`, making the whole file take roughly its real playback
//! duration to emit.
//!
//! Chunk `k` is released no earlier than `start + bytes_before_k / rate`.
//! After EOF the source waits for the last chunk's playback time before
//! reporting exhaustion. Every wait races the session's cancellation token.

use bytes::{Bytes, BytesMut};
use radio_common::time::playback_duration;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// Largest single chunk, regardless of the configured rate
const MAX_CHUNK_BYTES: usize = 64 * 1024;

/// Paced byte stream over one song file
#[derive(Debug)]
pub struct ThrottledSource {
    path: PathBuf,
    file: Option<File>,
    bytes_per_second: u64,
    chunk_size: usize,
    cancel: CancellationToken,
    started: Option<Instant>,
    bytes_emitted: u64,
}

impl ThrottledSource {
    /// Open `path` for paced reading
    ///
    /// # Arguments
    ///
    /// * `bytes_per_second` - Target release rate; 0 is clamped to 1
    /// * `chunks_per_second` - Pacing granularity; 0 is clamped to 1
    /// * `cancel` - Stop signal; cancellation ends the stream immediately
    pub async fn open(
        path: &Path,
        bytes_per_second: u64,
        chunks_per_second: u64,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let file = File::open(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::NotFound(format!("song file {}", path.display()))
            }
            _ => Error::Io(e),
        })?;

        let bytes_per_second = bytes_per_second.max(1);
        let chunk_size = (bytes_per_second / chunks_per_second.max(1))
            .clamp(1, MAX_CHUNK_BYTES as u64) as usize;

        debug!(
            "Opened {} at {} bytes/s ({} byte chunks)",
            path.display(),
            bytes_per_second,
            chunk_size
        );

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            bytes_per_second,
            chunk_size,
            cancel,
            started: None,
            bytes_emitted: 0,
        })
    }

    /// Next paced chunk, or `None` once the file is exhausted or stopped
    ///
    /// The file handle is released as soon as `None` is returned.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.cancel.is_cancelled() {
            self.close();
            return Ok(None);
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(None);
        };

        let start = *self.started.get_or_insert_with(Instant::now);

        let mut buf = BytesMut::zeroed(self.chunk_size);
        let mut filled = 0;
        while filled < buf.len() {
            let read = tokio::select! {
                _ = self.cancel.cancelled() => None,
                read = file.read(&mut buf[filled..]) => Some(read),
            };
            let Some(read) = read else {
                self.close();
                return Ok(None);
            };
            let n = read?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            // Hold exhaustion back until the last chunk's playback time passes
            let deadline = start + playback_duration(self.bytes_emitted, self.bytes_per_second);
            self.wait_until(deadline).await;
            self.close();
            return Ok(None);
        }

        let due = start + playback_duration(self.bytes_emitted, self.bytes_per_second);
        if !self.wait_until(due).await {
            self.close();
            return Ok(None);
        }

        buf.truncate(filled);
        self.bytes_emitted += filled as u64;
        Ok(Some(buf.freeze()))
    }

    /// Sleep until `deadline`; false if cancelled first
    async fn wait_until(&self, deadline: Instant) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = sleep_until(deadline) => true,
        }
    }

    /// Release the underlying file handle
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(
                "Closed {} after {} bytes",
                self.path.display(),
                self.bytes_emitted
            );
        }
    }

    /// True once the stop signal has fired
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn bytes_emitted(&self) -> u64 {
        self.bytes_emitted
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.bytes_per_second
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
