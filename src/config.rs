use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::ingest::backoff::BackoffPolicy;

/// Options recognized by the watch engine.
///
/// `watch_min_unpause` must stay below `watch_max_prefetch` so the feed does
/// not flap between paused and resumed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchOptions {
    /// Queue length above which the change feed pauses.
    pub watch_max_prefetch: usize,
    /// Queue length below which the feed resumes on a saturation edge.
    pub watch_min_unpause: usize,
    /// Per-job in-queue retry ceiling; one more failure parks the job.
    pub retry_max: u32,
    /// Base of the exponential backoff. Must exceed 1.
    pub retry_backoff_pow: f64,
    /// First-retry backoff delay in milliseconds.
    pub retry_backoff_base_ms: u64,
    /// Reaper period for parked jobs.
    pub retry_skipped_ms: u64,
    /// Refresh scanner period. `None` disables the scanner.
    pub refresh_period_ms: Option<u64>,
    /// Long-poll round length for the change feed when the queue is idle.
    pub feed_poll_ms: u64,
    /// Cadence of the upstream head-sequence gauge refresh.
    pub total_seq_refresh_ms: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            watch_max_prefetch: 100,
            watch_min_unpause: 10,
            retry_max: 5,
            retry_backoff_pow: 2.0,
            retry_backoff_base_ms: 1_000,
            retry_skipped_ms: 60 * 60 * 1_000,
            refresh_period_ms: Some(2 * 60 * 1_000),
            feed_poll_ms: 1_000,
            total_seq_refresh_ms: 5_000,
        }
    }
}

impl WatchOptions {
    /// Loads options from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let payload = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.to_path_buf(),
            source,
        })?;
        let options: Self =
            serde_json::from_str(&payload).map_err(|source| ConfigError::Parse {
                path: path_ref.to_path_buf(),
                source,
            })?;
        options.validate()?;
        Ok(options)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch_min_unpause == 0 {
            return Err(ConfigError::Invalid(
                "watch_min_unpause must be positive".into(),
            ));
        }
        if self.watch_min_unpause >= self.watch_max_prefetch {
            return Err(ConfigError::Invalid(format!(
                "watch_min_unpause ({}) must be below watch_max_prefetch ({})",
                self.watch_min_unpause, self.watch_max_prefetch
            )));
        }
        if self.retry_backoff_pow <= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry_backoff_pow ({}) must exceed 1",
                self.retry_backoff_pow
            )));
        }
        if self.retry_skipped_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry_skipped_ms must be positive".into(),
            ));
        }
        if self.refresh_period_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "refresh_period_ms must be positive when set".into(),
            ));
        }
        if self.feed_poll_ms == 0 || self.total_seq_refresh_ms == 0 {
            return Err(ConfigError::Invalid(
                "feed_poll_ms and total_seq_refresh_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Backoff policy derived from the retry options.
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.retry_backoff_base_ms),
            self.retry_backoff_pow,
        )
    }
}

/// Errors surfaced while loading or validating watch options.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read watch options {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse watch options {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid watch options: {0}")]
    Invalid(String),
}
