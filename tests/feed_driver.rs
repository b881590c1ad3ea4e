use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use mirador::{
    ChangeDescriptor, ChangeFeed, ErrorReport, ErrorSink, FeedDriver, FeedError, FeedOptions,
    JobQueue, JsonLineLogger, WatchTelemetry,
};

#[derive(Default)]
struct FeedControl {
    started: Option<FeedOptions>,
    pauses: u32,
    resumes: u32,
    stopped: u32,
}

#[derive(Clone, Default)]
struct ScriptedFeed {
    events: Rc<RefCell<VecDeque<Result<ChangeDescriptor, String>>>>,
    control: Rc<RefCell<FeedControl>>,
}

impl ScriptedFeed {
    fn emit(&self, change: ChangeDescriptor) {
        self.events.borrow_mut().push_back(Ok(change));
    }

    fn fail(&self, message: &str) {
        self.events.borrow_mut().push_back(Err(message.to_string()));
    }

    fn control(&self) -> Rc<RefCell<FeedControl>> {
        self.control.clone()
    }
}

impl ChangeFeed for ScriptedFeed {
    fn start(&mut self, options: FeedOptions) -> Result<(), FeedError> {
        self.control.borrow_mut().started = Some(options);
        Ok(())
    }

    fn poll(&mut self, _max_wait: Duration) -> Result<Option<ChangeDescriptor>, FeedError> {
        match self.events.borrow_mut().pop_front() {
            None => Ok(None),
            Some(Ok(change)) => Ok(Some(change)),
            Some(Err(message)) => Err(FeedError::Transport(message)),
        }
    }

    fn pause(&mut self) {
        self.control.borrow_mut().pauses += 1;
    }

    fn resume(&mut self) {
        self.control.borrow_mut().resumes += 1;
    }

    fn stop(&mut self) {
        self.control.borrow_mut().stopped += 1;
    }
}

#[derive(Clone, Default)]
struct RecordingErrors {
    reports: Rc<RefCell<Vec<ErrorReport>>>,
}

impl ErrorSink for RecordingErrors {
    fn report(&mut self, report: ErrorReport) {
        self.reports.borrow_mut().push(report);
    }
}

struct Harness {
    driver: FeedDriver,
    feed: ScriptedFeed,
    queue: JobQueue,
    last_seen: HashMap<String, u64>,
    telemetry: WatchTelemetry,
    errors: RecordingErrors,
    logger: JsonLineLogger,
}

impl Harness {
    fn new(max_prefetch: usize, min_unpause: usize) -> Self {
        let feed = ScriptedFeed::default();
        let driver = FeedDriver::new(Box::new(feed.clone()), max_prefetch, min_unpause);
        Self {
            driver,
            feed,
            queue: JobQueue::new(min_unpause),
            last_seen: HashMap::new(),
            telemetry: WatchTelemetry::default(),
            errors: RecordingErrors::default(),
            logger: JsonLineLogger::default(),
        }
    }

    fn pump(&mut self, now_ms: u64) -> usize {
        self.driver.pump(
            Duration::ZERO,
            now_ms,
            &mut self.queue,
            &mut self.last_seen,
            &mut self.telemetry,
            &mut self.errors,
            &mut self.logger,
        )
    }
}

#[test]
fn start_subscribes_with_batch_size_one_and_no_docs() {
    let mut harness = Harness::new(10, 2);
    harness.driver.start(37).expect("start succeeds");
    let control = harness.feed.control();
    let options = control.borrow().started.expect("subscription started");
    assert_eq!(options.since, 37);
    assert_eq!(options.batch_size, 1);
    assert!(!options.include_docs);
}

#[test]
fn live_events_become_jobs_and_record_feed_recency() {
    let mut harness = Harness::new(10, 2);
    harness.driver.start(0).expect("start succeeds");
    harness.feed.emit(ChangeDescriptor::new("a", 1).with_rev("r"));
    harness.feed.emit(ChangeDescriptor::new("b", 2).with_rev("r"));
    let pushed = harness.pump(123);
    assert_eq!(pushed, 2);
    assert_eq!(harness.queue.len(), 2);
    assert_eq!(harness.last_seen.get("a"), Some(&123));
    assert_eq!(harness.last_seen.get("b"), Some(&123));
}

#[test]
fn heartbeats_are_dropped_before_the_queue() {
    let mut harness = Harness::new(10, 2);
    harness.driver.start(0).expect("start succeeds");
    harness.feed.emit(ChangeDescriptor::new("", 5));
    harness.feed.emit(ChangeDescriptor::new("a", 6).with_rev("r"));
    let pushed = harness.pump(0);
    assert_eq!(pushed, 1);
    assert_eq!(harness.telemetry.heartbeats_total(), 1);
    assert!(!harness.last_seen.contains_key(""));
}

#[test]
fn pauses_once_queue_exceeds_prefetch_watermark() {
    let mut harness = Harness::new(3, 1);
    harness.driver.start(0).expect("start succeeds");
    for seq in 1..=10 {
        harness
            .feed
            .emit(ChangeDescriptor::new(format!("pkg-{seq}"), seq).with_rev("r"));
    }
    let pushed = harness.pump(0);
    assert_eq!(pushed, 4, "pump stops after crossing the watermark");
    assert!(harness.driver.is_paused());
    assert_eq!(harness.feed.control().borrow().pauses, 1);
    assert!(harness.telemetry.feed_paused());

    // Paused driver pulls nothing even though events remain.
    assert_eq!(harness.pump(10), 0);
    assert_eq!(harness.queue.len(), 4);
}

#[test]
fn resumes_only_below_the_unpause_watermark() {
    let mut harness = Harness::new(3, 2);
    harness.driver.start(0).expect("start succeeds");
    for seq in 1..=5 {
        harness
            .feed
            .emit(ChangeDescriptor::new(format!("pkg-{seq}"), seq).with_rev("r"));
    }
    harness.pump(0);
    assert!(harness.driver.is_paused());

    harness
        .driver
        .on_saturation_released(3, 0, &mut harness.telemetry, &mut harness.logger);
    assert!(
        harness.driver.is_paused(),
        "length 3 is not below the watermark"
    );
    harness
        .driver
        .on_saturation_released(1, 0, &mut harness.telemetry, &mut harness.logger);
    assert!(!harness.driver.is_paused());
    assert_eq!(harness.feed.control().borrow().resumes, 1);
    assert!(!harness.telemetry.feed_paused());
}

#[test]
fn poll_errors_report_and_leave_the_driver_alive() {
    let mut harness = Harness::new(10, 2);
    harness.driver.start(0).expect("start succeeds");
    harness.feed.fail("socket closed");
    assert_eq!(harness.pump(0), 0);
    assert_eq!(harness.telemetry.feed_errors_total(), 1);
    assert_eq!(harness.errors.reports.borrow().len(), 1);
    assert!(harness.driver.is_started());

    harness.feed.emit(ChangeDescriptor::new("a", 1).with_rev("r"));
    assert_eq!(harness.pump(10), 1, "next pump keeps pulling");
}

#[test]
fn stop_is_idempotent() {
    let mut harness = Harness::new(10, 2);
    harness.driver.start(0).expect("start succeeds");
    harness.driver.stop();
    harness.driver.stop();
    assert_eq!(harness.feed.control().borrow().stopped, 1);
    assert!(!harness.driver.is_started());
    assert_eq!(harness.pump(0), 0, "stopped driver pulls nothing");
}
