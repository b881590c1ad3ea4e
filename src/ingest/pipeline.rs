use thiserror::Error;

use crate::clock::Clock;
use crate::feed::job::Job;
use crate::index::client::{RecordFormatter, SearchIndex};
use crate::ingest::backoff::BackoffPolicy;
use crate::observability::logging::{JsonLineLogger, LogLevel};
use crate::observability::telemetry::WatchTelemetry;
use crate::registry::{DocFetch, Registry};

/// Why a change completed without touching the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Heartbeat,
    NoRevisions,
    NotIndexable,
}

/// Successful pipeline outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Indexed,
    Skipped(SkipReason),
}

/// Failure classification for a single processing attempt.
///
/// `Deleted` covers both an explicit deletion flag on the change and a
/// document that vanished between feed emission and fetch; the worker
/// handles both through the same delete-and-succeed path. The remaining
/// kinds are transient and re-enter the queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("document deleted upstream")]
    Deleted,
    #[error("document fetch failed: {0}")]
    Fetch(String),
    #[error("index upsert failed: {0}")]
    Index(String),
}

/// Processes one change: fetch the document at its winning revision, format
/// it, and upsert the record.
pub struct ChangeProcessor {
    formatter: Box<dyn RecordFormatter>,
    backoff: BackoffPolicy,
}

impl ChangeProcessor {
    pub fn new(formatter: Box<dyn RecordFormatter>, backoff: BackoffPolicy) -> Self {
        Self { formatter, backoff }
    }

    /// Runs the pipeline for one job. Retry attempts back off before doing
    /// any work. Exactly one upsert happens on the success path; none on a
    /// skip.
    pub fn process(
        &mut self,
        job: &Job,
        registry: &mut dyn Registry,
        index: &mut dyn SearchIndex,
        clock: &mut dyn Clock,
        telemetry: &mut WatchTelemetry,
        logger: &mut JsonLineLogger,
    ) -> Result<ProcessOutcome, ProcessError> {
        telemetry.incr_packages();
        let change = &job.change;
        if change.is_heartbeat() {
            logger
                .log(
                    clock.now_ms(),
                    LogLevel::Error,
                    "pipeline",
                    "heartbeat change reached the pipeline, dropped",
                )
                .ok();
            return Ok(ProcessOutcome::Skipped(SkipReason::Heartbeat));
        }
        if job.retry > 0 {
            clock.sleep(self.backoff.delay_for(job.retry));
        }
        if change.deleted {
            return Err(ProcessError::Deleted);
        }
        let Some(rev) = change.first_rev() else {
            logger
                .log_package(
                    clock.now_ms(),
                    LogLevel::Info,
                    "pipeline",
                    &change.id,
                    change.seq,
                    "change carries no revisions, nothing to do",
                )
                .ok();
            return Ok(ProcessOutcome::Skipped(SkipReason::NoRevisions));
        };
        let fetched = registry
            .fetch_doc(&change.id, rev)
            .map_err(|err| ProcessError::Fetch(err.to_string()))?;
        let doc = match fetched {
            DocFetch::Doc(doc) => doc,
            DocFetch::Missing { error } => {
                logger
                    .log_package(
                        clock.now_ms(),
                        LogLevel::Info,
                        "pipeline",
                        &change.id,
                        change.seq,
                        &format!("document gone at fetch ({error}), treated as deletion"),
                    )
                    .ok();
                return Err(ProcessError::Deleted);
            }
        };
        let Some(record) = self.formatter.format(&doc) else {
            return Ok(ProcessOutcome::Skipped(SkipReason::NotIndexable));
        };
        index
            .upsert(&record)
            .map_err(|err| ProcessError::Index(err.to_string()))?;
        Ok(ProcessOutcome::Indexed)
    }
}
