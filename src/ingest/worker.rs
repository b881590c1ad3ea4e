use crate::clock::Clock;
use crate::feed::job::Job;
use crate::index::client::{LostIndex, LostRecord, SearchIndex};
use crate::ingest::parked::ParkedSet;
use crate::ingest::pipeline::{ChangeProcessor, ProcessError, ProcessOutcome};
use crate::ingest::queue::JobQueue;
use crate::observability::logging::{JsonLineLogger, LogLevel};
use crate::observability::telemetry::{ErrorReport, ErrorSink, WatchTelemetry};
use crate::registry::Registry;
use crate::state::checkpoint::{Checkpointer, SeqAdvance};
use crate::state::store::StateStore;

/// How a job left the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobDisposition {
    Completed,
    Retried,
    Parked,
}

/// Collaborators borrowed by the worker for the duration of one job.
pub struct WorkerDeps<'a, S: StateStore> {
    pub registry: &'a mut dyn Registry,
    pub index: &'a mut dyn SearchIndex,
    pub lost: &'a mut dyn LostIndex,
    pub checkpointer: &'a mut Checkpointer<S>,
    pub queue: &'a mut JobQueue,
    pub parked: &'a mut ParkedSet,
    pub clock: &'a mut dyn Clock,
    pub telemetry: &'a mut WatchTelemetry,
    pub errors: &'a mut dyn ErrorSink,
    pub logger: &'a mut JsonLineLogger,
}

/// Consumer wrapper around the pipeline, applied to every dequeued job.
///
/// A fresh change erases any parked entry for its id. The checkpoint only
/// advances for first-attempt live jobs: retries and synthetic jobs run with
/// `ignore_seq` in effect so an interleaved earlier attempt can never move
/// the low-water mark backwards or past unfinished work.
pub struct JobWorker {
    processor: ChangeProcessor,
    retry_max: u32,
}

impl JobWorker {
    pub fn new(processor: ChangeProcessor, retry_max: u32) -> Self {
        Self {
            processor,
            retry_max,
        }
    }

    /// Handles one job end to end: process, classify, and either complete,
    /// requeue at the front, or park.
    pub fn handle<S: StateStore>(&mut self, job: Job, deps: &mut WorkerDeps<'_, S>) -> JobDisposition {
        let package = job.package_id().to_string();
        let seq = job.seq();
        let started_ms = deps.clock.now_ms();
        if deps.parked.remove(&package).is_some() {
            deps.logger
                .log_package(
                    started_ms,
                    LogLevel::Debug,
                    "worker",
                    &package,
                    seq,
                    "parked entry superseded by fresh change",
                )
                .ok();
        }
        let ignore_seq = job.ignore_seq || job.retry > 0;
        let result = self.processor.process(
            &job,
            deps.registry,
            deps.index,
            deps.clock,
            deps.telemetry,
            deps.logger,
        );
        let disposition = match result {
            Ok(outcome) => {
                match outcome {
                    ProcessOutcome::Indexed => deps.telemetry.incr_upserts(),
                    ProcessOutcome::Skipped(_) => deps.telemetry.incr_skips(),
                }
                self.advance_checkpoint(ignore_seq, seq, deps);
                JobDisposition::Completed
            }
            Err(ProcessError::Deleted) => match deps.index.delete(&package) {
                Ok(()) => {
                    deps.telemetry.incr_deletes();
                    self.advance_checkpoint(ignore_seq, seq, deps);
                    JobDisposition::Completed
                }
                Err(err) => {
                    self.retry_or_park(job, format!("index delete failed: {err}"), deps)
                }
            },
            Err(err) => self.retry_or_park(job, err.to_string(), deps),
        };
        if !ignore_seq {
            deps.telemetry.record_progress(seq);
        }
        let finished_ms = deps.clock.now_ms();
        deps.telemetry
            .record_handler_duration(finished_ms.saturating_sub(started_ms));
        disposition
    }

    fn advance_checkpoint<S: StateStore>(
        &self,
        ignore_seq: bool,
        seq: i64,
        deps: &mut WorkerDeps<'_, S>,
    ) {
        if ignore_seq {
            return;
        }
        let now_ms = deps.clock.now_ms();
        match deps.checkpointer.save_seq(seq) {
            Ok(SeqAdvance::Advanced) => {}
            Ok(SeqAdvance::Ignored) => {
                deps.logger
                    .log(
                        now_ms,
                        LogLevel::Debug,
                        "checkpoint",
                        &format!("sequence {seq} does not advance the checkpoint, ignored"),
                    )
                    .ok();
            }
            Err(err) => {
                deps.logger
                    .log(
                        now_ms,
                        LogLevel::Error,
                        "checkpoint",
                        &format!("checkpoint write failed: {err}"),
                    )
                    .ok();
            }
        }
    }

    fn retry_or_park<S: StateStore>(
        &mut self,
        mut job: Job,
        message: String,
        deps: &mut WorkerDeps<'_, S>,
    ) -> JobDisposition {
        job.retry += 1;
        deps.telemetry.incr_retries();
        deps.errors.report(ErrorReport {
            package_id: job.package_id().to_string(),
            seq: job.seq(),
            attempt: job.retry,
            message: message.clone(),
        });
        let now_ms = deps.clock.now_ms();
        if job.retry <= self.retry_max {
            deps.logger
                .log_package(
                    now_ms,
                    LogLevel::Warn,
                    "worker",
                    job.package_id(),
                    job.seq(),
                    &format!("attempt {} failed, requeued at front: {message}", job.retry),
                )
                .ok();
            deps.queue.unshift(job).ok();
            return JobDisposition::Retried;
        }
        deps.logger
            .log_package(
                now_ms,
                LogLevel::Error,
                "worker",
                job.package_id(),
                job.seq(),
                &format!("retries exhausted, parked: {message}"),
            )
            .ok();
        let record = LostRecord {
            object_id: job.package_id().to_string(),
            seq: job.seq(),
            rev: job.change.first_rev().map(str::to_string),
            failed_at_ms: now_ms,
            reason: message,
        };
        match deps.lost.upsert(&record) {
            Ok(()) => deps.telemetry.incr_lost(),
            Err(err) => {
                deps.logger
                    .log_package(
                        now_ms,
                        LogLevel::Warn,
                        "worker",
                        &record.object_id,
                        record.seq,
                        &format!("lost index write failed: {err}"),
                    )
                    .ok();
            }
        }
        deps.parked.insert(job);
        JobDisposition::Parked
    }
}
