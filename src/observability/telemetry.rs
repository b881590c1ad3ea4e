/// Counters, gauges, and timings accumulated by the watch engine and
/// rendered as Prometheus exposition text.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchTelemetry {
    packages_total: u64,
    heartbeats_total: u64,
    upserts_total: u64,
    deletes_total: u64,
    skips_total: u64,
    retries_total: u64,
    lost_total: u64,
    feed_errors_total: u64,
    feed_pauses_total: u64,
    feed_resumes_total: u64,
    feed_paused: bool,
    queue_depth: usize,
    parked: usize,
    last_processed_seq: i64,
    total_sequence: i64,
    handler_runs_total: u64,
    handler_duration_ms_total: u64,
    handler_duration_ms_last: u64,
}

impl WatchTelemetry {
    /// Counts every change handed to the pipeline, heartbeats included.
    pub fn incr_packages(&mut self) {
        self.packages_total += 1;
    }

    pub fn incr_heartbeats(&mut self) {
        self.heartbeats_total += 1;
    }

    pub fn incr_upserts(&mut self) {
        self.upserts_total += 1;
    }

    pub fn incr_deletes(&mut self) {
        self.deletes_total += 1;
    }

    pub fn incr_skips(&mut self) {
        self.skips_total += 1;
    }

    pub fn incr_retries(&mut self) {
        self.retries_total += 1;
    }

    pub fn incr_lost(&mut self) {
        self.lost_total += 1;
    }

    pub fn incr_feed_errors(&mut self) {
        self.feed_errors_total += 1;
    }

    /// Records a feed pause/resume transition.
    pub fn set_feed_paused(&mut self, paused: bool) {
        if paused && !self.feed_paused {
            self.feed_pauses_total += 1;
        }
        if !paused && self.feed_paused {
            self.feed_resumes_total += 1;
        }
        self.feed_paused = paused;
    }

    pub fn set_queue_depth(&mut self, depth: usize) {
        self.queue_depth = depth;
    }

    pub fn set_parked(&mut self, parked: usize) {
        self.parked = parked;
    }

    /// Progress gauge: sequence of the last completed non-ignored job.
    pub fn record_progress(&mut self, seq: i64) {
        self.last_processed_seq = seq;
    }

    /// Best-effort upstream head, refreshed on a timer.
    pub fn set_total_sequence(&mut self, seq: i64) {
        self.total_sequence = seq;
    }

    pub fn record_handler_duration(&mut self, duration_ms: u64) {
        self.handler_runs_total += 1;
        self.handler_duration_ms_total = self.handler_duration_ms_total.saturating_add(duration_ms);
        self.handler_duration_ms_last = duration_ms;
    }

    pub fn packages_total(&self) -> u64 {
        self.packages_total
    }

    pub fn heartbeats_total(&self) -> u64 {
        self.heartbeats_total
    }

    pub fn upserts_total(&self) -> u64 {
        self.upserts_total
    }

    pub fn deletes_total(&self) -> u64 {
        self.deletes_total
    }

    pub fn skips_total(&self) -> u64 {
        self.skips_total
    }

    pub fn retries_total(&self) -> u64 {
        self.retries_total
    }

    pub fn lost_total(&self) -> u64 {
        self.lost_total
    }

    pub fn feed_errors_total(&self) -> u64 {
        self.feed_errors_total
    }

    pub fn feed_paused(&self) -> bool {
        self.feed_paused
    }

    pub fn feed_pauses_total(&self) -> u64 {
        self.feed_pauses_total
    }

    pub fn feed_resumes_total(&self) -> u64 {
        self.feed_resumes_total
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }

    pub fn parked(&self) -> usize {
        self.parked
    }

    pub fn last_processed_seq(&self) -> i64 {
        self.last_processed_seq
    }

    pub fn total_sequence(&self) -> i64 {
        self.total_sequence
    }

    pub fn handler_runs_total(&self) -> u64 {
        self.handler_runs_total
    }

    /// Renders the current values as Prometheus exposition text.
    pub fn render_metrics(&self) -> String {
        format!(
            "mirador_packages_total {}\n\
             mirador_heartbeats_total {}\n\
             mirador_upserts_total {}\n\
             mirador_deletes_total {}\n\
             mirador_skips_total {}\n\
             mirador_retries_total {}\n\
             mirador_lost_total {}\n\
             mirador_feed_errors_total {}\n\
             mirador_feed_pauses_total {}\n\
             mirador_feed_resumes_total {}\n\
             mirador_feed_paused {}\n\
             mirador_queue_depth {}\n\
             mirador_parked {}\n\
             mirador_last_processed_seq {}\n\
             mirador_total_sequence {}\n\
             mirador_handler_runs_total {}\n\
             mirador_handler_duration_ms_total {}\n\
             mirador_handler_duration_ms_last {}\n",
            self.packages_total,
            self.heartbeats_total,
            self.upserts_total,
            self.deletes_total,
            self.skips_total,
            self.retries_total,
            self.lost_total,
            self.feed_errors_total,
            self.feed_pauses_total,
            self.feed_resumes_total,
            u8::from(self.feed_paused),
            self.queue_depth,
            self.parked,
            self.last_processed_seq,
            self.total_sequence,
            self.handler_runs_total,
            self.handler_duration_ms_total,
            self.handler_duration_ms_last,
        )
    }
}

/// One failed processing attempt, as delivered to the error sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub package_id: String,
    pub seq: i64,
    pub attempt: u32,
    pub message: String,
}

/// External error reporter. Every failed attempt is reported here, in
/// addition to the retry/park bookkeeping the worker performs itself.
pub trait ErrorSink {
    fn report(&mut self, report: ErrorReport);
}

/// Error sink that writes reports to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrErrorSink;

impl ErrorSink for StderrErrorSink {
    fn report(&mut self, report: ErrorReport) {
        eprintln!(
            "error package={} seq={} attempt={}: {}",
            report.package_id, report.seq, report.attempt, report.message
        );
    }
}
