use std::collections::VecDeque;
use thiserror::Error;

use crate::feed::job::Job;

/// Error returned when a job is rejected at queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("job with empty package id rejected at queue entry")]
    EmptyPackageId,
}

/// Single-consumer FIFO backing the ordered worker.
///
/// Exactly one job is in flight at any instant: `take_next` marks it running
/// and `finish` releases it. `unshift` prepends, so retries and
/// reaper/refresh injections preempt newly arrived live changes. The queue
/// tracks a saturation threshold and reports the edge where the length drops
/// from at-or-above the threshold to below it; the feed driver uses that
/// edge to relax backpressure.
#[derive(Debug, Default)]
pub struct JobQueue {
    items: VecDeque<Job>,
    running: bool,
    saturation_threshold: usize,
    above: bool,
    released_edge: bool,
}

impl JobQueue {
    /// Builds a queue with the provided saturation threshold.
    pub fn new(saturation_threshold: usize) -> Self {
        Self {
            items: VecDeque::new(),
            running: false,
            saturation_threshold,
            above: false,
            released_edge: false,
        }
    }

    /// Appends a job.
    pub fn push(&mut self, job: Job) -> Result<(), QueueError> {
        Self::admit(&job)?;
        self.items.push_back(job);
        self.track_saturation();
        Ok(())
    }

    /// Prepends a job ahead of every queued live change.
    pub fn unshift(&mut self, job: Job) -> Result<(), QueueError> {
        Self::admit(&job)?;
        self.items.push_front(job);
        self.track_saturation();
        Ok(())
    }

    /// Number of queued jobs, excluding the one in flight.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of jobs in flight: 0 or 1.
    pub fn running(&self) -> usize {
        usize::from(self.running)
    }

    /// Whether the queue is empty with nothing in flight.
    pub fn is_drained(&self) -> bool {
        self.items.is_empty() && !self.running
    }

    /// Takes the next job and marks it in flight. Returns `None` while a job
    /// is already running or the queue is empty.
    pub fn take_next(&mut self) -> Option<Job> {
        if self.running {
            return None;
        }
        let job = self.items.pop_front()?;
        self.running = true;
        self.track_saturation();
        Some(job)
    }

    /// Releases the in-flight slot.
    pub fn finish(&mut self) {
        self.running = false;
    }

    /// Reports (once) that the length crossed from at-or-above the
    /// saturation threshold to below it since the last poll.
    pub fn poll_saturation_edge(&mut self) -> bool {
        std::mem::take(&mut self.released_edge)
    }

    fn admit(job: &Job) -> Result<(), QueueError> {
        if job.package_id().is_empty() {
            return Err(QueueError::EmptyPackageId);
        }
        Ok(())
    }

    fn track_saturation(&mut self) {
        let above = self.items.len() >= self.saturation_threshold;
        if self.above && !above {
            self.released_edge = true;
        }
        self.above = above;
    }
}
