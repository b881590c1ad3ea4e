use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::clock::{Clock, PeriodTimer};
use crate::config::{ConfigError, WatchOptions};
use crate::feed::driver::{ChangeFeed, FeedDriver, FeedError};
use crate::index::client::{LostIndex, RecordFormatter, SearchIndex};
use crate::ingest::parked::{ParkedSet, Reaper};
use crate::ingest::pipeline::ChangeProcessor;
use crate::ingest::queue::JobQueue;
use crate::ingest::refresh::RefreshScanner;
use crate::ingest::worker::{JobWorker, WorkerDeps};
use crate::observability::logging::{JsonLineLogger, LogLevel};
use crate::observability::telemetry::{ErrorSink, WatchTelemetry};
use crate::registry::Registry;
use crate::state::checkpoint::Checkpointer;
use crate::state::store::{StateError, StateStore, STAGE_WATCH};

/// Unrecoverable setup failures surfaced by `run`. Per-job failures never
/// reach the caller.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("change feed start failed: {0}")]
    Feed(#[from] FeedError),
}

/// Shared flag used to request a cooperative shutdown from another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// What one engine turn accomplished.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TurnReport {
    pub pumped: usize,
    pub processed: usize,
    pub reaped: usize,
    pub refreshed: usize,
}

/// External collaborators handed to the engine at construction.
pub struct WatchDeps {
    pub feed: Box<dyn ChangeFeed>,
    pub registry: Box<dyn Registry>,
    pub index: Box<dyn SearchIndex>,
    pub lost: Box<dyn LostIndex>,
    pub formatter: Box<dyn RecordFormatter>,
    pub store: Box<dyn StateStore>,
    pub errors: Box<dyn ErrorSink>,
    pub clock: Box<dyn Clock>,
}

/// Lifecycle controller for the watch pipeline.
///
/// Owns the queue, parked set, feed-recency map, feed handle, and timers.
/// All mutation happens on the engine's single logical execution context:
/// `run` drives `turn` with the system clock, and every turn polls the
/// timers, pumps the feed, and steps the queue by at most one job.
pub struct WatchEngine {
    options: WatchOptions,
    queue: JobQueue,
    parked: ParkedSet,
    last_seen: HashMap<String, u64>,
    driver: FeedDriver,
    worker: JobWorker,
    reaper: Reaper,
    refresh: Option<RefreshScanner>,
    total_seq_timer: PeriodTimer,
    registry: Box<dyn Registry>,
    index: Box<dyn SearchIndex>,
    lost: Box<dyn LostIndex>,
    checkpointer: Checkpointer<Box<dyn StateStore>>,
    telemetry: WatchTelemetry,
    errors: Box<dyn ErrorSink>,
    logger: JsonLineLogger,
    clock: Box<dyn Clock>,
    stop: StopHandle,
    stopped: bool,
}

impl WatchEngine {
    /// Wires the engine. Reads the stored state once and validates options.
    pub fn new(options: WatchOptions, deps: WatchDeps) -> Result<Self, WatchError> {
        options.validate()?;
        let checkpointer = Checkpointer::open(deps.store)?;
        let queue = JobQueue::new(options.watch_min_unpause);
        let driver = FeedDriver::new(
            deps.feed,
            options.watch_max_prefetch,
            options.watch_min_unpause,
        );
        let processor = ChangeProcessor::new(deps.formatter, options.backoff());
        let worker = JobWorker::new(processor, options.retry_max);
        let reaper = Reaper::new(options.retry_skipped_ms);
        let refresh = options.refresh_period_ms.map(RefreshScanner::new);
        let total_seq_timer = PeriodTimer::new(options.total_seq_refresh_ms);
        Ok(Self {
            options,
            queue,
            parked: ParkedSet::new(),
            last_seen: HashMap::new(),
            driver,
            worker,
            reaper,
            refresh,
            total_seq_timer,
            registry: deps.registry,
            index: deps.index,
            lost: deps.lost,
            checkpointer,
            telemetry: WatchTelemetry::default(),
            errors: deps.errors,
            logger: JsonLineLogger::default(),
            clock: deps.clock,
            stop: StopHandle::new(),
            stopped: false,
        })
    }

    /// Handle for requesting a stop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn telemetry(&self) -> &WatchTelemetry {
        &self.telemetry
    }

    pub fn logger_mut(&mut self) -> &mut JsonLineLogger {
        &mut self.logger
    }

    /// Current persisted low-water mark.
    pub fn checkpoint_seq(&self) -> i64 {
        self.checkpointer.seq()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_running(&self) -> usize {
        self.queue.running()
    }

    pub fn is_parked(&self, package_id: &str) -> bool {
        self.parked.contains(package_id)
    }

    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }

    /// Persists the watch stage and starts the subscription after the
    /// checkpointed sequence.
    pub fn start(&mut self) -> Result<(), WatchError> {
        self.checkpointer.save_stage(STAGE_WATCH)?;
        let since = self.checkpointer.seq();
        self.driver.start(since)?;
        let now_ms = self.clock.now_ms();
        self.logger
            .log(
                now_ms,
                LogLevel::Info,
                "watch",
                &format!("watching from sequence {since}"),
            )
            .ok();
        Ok(())
    }

    /// Runs until a stop is requested, then drains and stops. Only setup
    /// failures surface; everything after the subscription starts is
    /// handled inside the turn loop.
    pub fn run(&mut self) -> Result<(), WatchError> {
        self.start()?;
        while !self.stop.is_requested() {
            let now_ms = self.clock.now_ms();
            let feed_errors_before = self.telemetry.feed_errors_total();
            self.turn(now_ms);
            if self.telemetry.feed_errors_total() > feed_errors_before && self.queue.is_drained() {
                self.clock
                    .sleep(Duration::from_millis(self.options.feed_poll_ms));
            }
        }
        self.stop();
        Ok(())
    }

    /// Executes one scheduling round: timer polls, one feed pump, one queue
    /// step. Deterministic given the injected timestamp, which is how the
    /// tests drive the engine.
    pub fn turn(&mut self, now_ms: u64) -> TurnReport {
        let mut report = TurnReport::default();
        if self.total_seq_timer.poll(now_ms) {
            match self.registry.info() {
                Ok(info) => self.telemetry.set_total_sequence(info.update_seq),
                Err(err) => {
                    self.logger
                        .log(
                            now_ms,
                            LogLevel::Debug,
                            "watch",
                            &format!("registry info refresh failed: {err}"),
                        )
                        .ok();
                }
            }
        }
        for job in self.reaper.poll(now_ms, &mut self.parked) {
            self.logger
                .log_package(
                    now_ms,
                    LogLevel::Info,
                    "reaper",
                    job.package_id(),
                    job.seq(),
                    "parked job re-enqueued",
                )
                .ok();
            self.queue.unshift(job).ok();
            report.reaped += 1;
        }
        if let Some(scanner) = self.refresh.as_mut() {
            for job in scanner.poll(now_ms, self.index.as_mut(), &self.last_seen, &mut self.logger)
            {
                self.queue.unshift(job).ok();
                report.refreshed += 1;
            }
        }
        let max_wait = if self.queue.is_drained() {
            Duration::from_millis(self.options.feed_poll_ms)
        } else {
            Duration::ZERO
        };
        report.pumped = self.driver.pump(
            max_wait,
            now_ms,
            &mut self.queue,
            &mut self.last_seen,
            &mut self.telemetry,
            self.errors.as_mut(),
            &mut self.logger,
        );
        report.processed = self.step_queue();
        self.telemetry.set_queue_depth(self.queue.len());
        self.telemetry.set_parked(self.parked.len());
        if self.queue.poll_saturation_edge() {
            self.driver.on_saturation_released(
                self.queue.len(),
                now_ms,
                &mut self.telemetry,
                &mut self.logger,
            );
        }
        report
    }

    /// Stops the feed, drains the queue, and releases the subscription.
    /// Idempotent; never raises. Queued jobs run to completion, retrying and
    /// parking as usual; no new live events are accepted.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.stop.request_stop();
        self.driver.stop();
        while !self.queue.is_drained() {
            if self.step_queue() == 0 {
                break;
            }
        }
        self.telemetry.set_queue_depth(self.queue.len());
        self.telemetry.set_parked(self.parked.len());
        let now_ms = self.clock.now_ms();
        self.logger
            .log(now_ms, LogLevel::Info, "watch", "watch engine stopped")
            .ok();
    }

    fn step_queue(&mut self) -> usize {
        let Some(job) = self.queue.take_next() else {
            return 0;
        };
        let mut deps = WorkerDeps {
            registry: self.registry.as_mut(),
            index: self.index.as_mut(),
            lost: self.lost.as_mut(),
            checkpointer: &mut self.checkpointer,
            queue: &mut self.queue,
            parked: &mut self.parked,
            clock: self.clock.as_mut(),
            telemetry: &mut self.telemetry,
            errors: self.errors.as_mut(),
            logger: &mut self.logger,
        };
        self.worker.handle(job, &mut deps);
        self.queue.finish();
        1
    }
}
