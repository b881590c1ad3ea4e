use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::feed::change::ChangeDescriptor;
use crate::feed::job::Job;
use crate::ingest::queue::JobQueue;
use crate::observability::logging::{JsonLineLogger, LogLevel};
use crate::observability::telemetry::{ErrorReport, ErrorSink, WatchTelemetry};

/// Subscription parameters for the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOptions {
    pub since: i64,
    pub batch_size: u32,
    pub include_docs: bool,
}

impl FeedOptions {
    /// Watcher subscription: resume after `since`, one change per round,
    /// documents excluded so the fetch always sees the latest revision.
    pub fn resume_from(since: i64) -> Self {
        Self {
            since,
            batch_size: 1,
            include_docs: false,
        }
    }
}

/// Errors surfaced by the change feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("change feed request failed: {0}")]
    Transport(String),
    #[error("change feed decode failed: {0}")]
    Decode(String),
}

/// Contract exposed by the registry change feed: a long-polled stream of
/// change descriptors in ascending sequence order, resumable from any
/// previously delivered sequence. Heartbeats arrive as empty-id descriptors.
pub trait ChangeFeed {
    fn start(&mut self, options: FeedOptions) -> Result<(), FeedError>;

    /// Returns the next change, waiting up to `max_wait` for one to appear.
    fn poll(&mut self, max_wait: Duration) -> Result<Option<ChangeDescriptor>, FeedError>;

    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
}

/// Drives the upstream subscription: translates events into jobs, records
/// feed recency per package, and enforces the prefetch watermarks.
///
/// Transport-level reconnection belongs to the feed implementation; poll
/// errors here are reported and the driver keeps going.
pub struct FeedDriver {
    feed: Box<dyn ChangeFeed>,
    max_prefetch: usize,
    min_unpause: usize,
    paused: bool,
    started: bool,
}

impl FeedDriver {
    pub fn new(feed: Box<dyn ChangeFeed>, max_prefetch: usize, min_unpause: usize) -> Self {
        Self {
            feed,
            max_prefetch,
            min_unpause,
            paused: false,
            started: false,
        }
    }

    /// Starts the subscription after the checkpointed sequence.
    pub fn start(&mut self, since: i64) -> Result<(), FeedError> {
        self.feed.start(FeedOptions::resume_from(since))?;
        self.started = true;
        self.paused = false;
        Ok(())
    }

    /// Pulls ready events into the queue. The first poll waits up to
    /// `max_wait`; subsequent polls in the same pump only take what is
    /// immediately available. Stops early when the prefetch watermark pauses
    /// the feed, so at most one event crosses the boundary after pause.
    #[allow(clippy::too_many_arguments)]
    pub fn pump(
        &mut self,
        mut max_wait: Duration,
        now_ms: u64,
        queue: &mut JobQueue,
        last_seen: &mut HashMap<String, u64>,
        telemetry: &mut WatchTelemetry,
        errors: &mut dyn ErrorSink,
        logger: &mut JsonLineLogger,
    ) -> usize {
        if !self.started || self.paused {
            return 0;
        }
        let mut pushed = 0;
        loop {
            let change = match self.feed.poll(max_wait) {
                Ok(Some(change)) => change,
                Ok(None) => break,
                Err(err) => {
                    telemetry.incr_feed_errors();
                    errors.report(ErrorReport {
                        package_id: String::new(),
                        seq: 0,
                        attempt: 0,
                        message: err.to_string(),
                    });
                    logger
                        .log(
                            now_ms,
                            LogLevel::Warn,
                            "feed",
                            &format!("change feed poll failed: {err}"),
                        )
                        .ok();
                    break;
                }
            };
            max_wait = Duration::ZERO;
            if change.is_heartbeat() {
                telemetry.incr_heartbeats();
                logger
                    .log(now_ms, LogLevel::Debug, "feed", "heartbeat dropped")
                    .ok();
                continue;
            }
            last_seen.insert(change.id.clone(), now_ms);
            match queue.push(Job::live(change)) {
                Ok(()) => pushed += 1,
                Err(err) => {
                    logger
                        .log(
                            now_ms,
                            LogLevel::Warn,
                            "feed",
                            &format!("live change rejected at queue entry: {err}"),
                        )
                        .ok();
                    continue;
                }
            }
            if queue.len() > self.max_prefetch {
                self.feed.pause();
                self.paused = true;
                telemetry.set_feed_paused(true);
                logger
                    .log(
                        now_ms,
                        LogLevel::Info,
                        "feed",
                        &format!(
                            "queue length {} above prefetch watermark {}, feed paused",
                            queue.len(),
                            self.max_prefetch
                        ),
                    )
                    .ok();
                break;
            }
        }
        pushed
    }

    /// Called on a queue saturation edge; resumes the feed when the queue has
    /// drained below the unpause watermark.
    pub fn on_saturation_released(
        &mut self,
        queue_len: usize,
        now_ms: u64,
        telemetry: &mut WatchTelemetry,
        logger: &mut JsonLineLogger,
    ) {
        if !self.started || !self.paused || queue_len >= self.min_unpause {
            return;
        }
        self.feed.resume();
        self.paused = false;
        telemetry.set_feed_paused(false);
        logger
            .log(
                now_ms,
                LogLevel::Info,
                "feed",
                &format!(
                    "queue length {queue_len} below unpause watermark {}, feed resumed",
                    self.min_unpause
                ),
            )
            .ok();
    }

    /// Stops the subscription. Idempotent.
    pub fn stop(&mut self) {
        if self.started {
            self.feed.stop();
            self.started = false;
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}
