use std::collections::HashMap;

use crate::clock::PeriodTimer;
use crate::feed::job::Job;

/// In-memory set of jobs that exhausted their in-queue retries, keyed by
/// package id with at most one entry per id. The set is volatile: it does
/// not survive a restart.
#[derive(Debug, Default)]
pub struct ParkedSet {
    jobs: HashMap<String, Job>,
}

impl ParkedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a job under its package id, replacing any stale entry.
    pub fn insert(&mut self, job: Job) -> Option<Job> {
        self.jobs.insert(job.package_id().to_string(), job)
    }

    /// Erases the entry for a package; called when a fresher change for the
    /// same id is dequeued.
    pub fn remove(&mut self, package_id: &str) -> Option<Job> {
        self.jobs.remove(package_id)
    }

    pub fn contains(&self, package_id: &str) -> bool {
        self.jobs.contains_key(package_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Snapshots and clears the set. Jobs come out ordered by sequence then
    /// id so re-injection is deterministic.
    pub fn drain(&mut self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.drain().map(|(_, job)| job).collect();
        jobs.sort_by(|a, b| {
            a.seq()
                .cmp(&b.seq())
                .then_with(|| a.change.id.cmp(&b.change.id))
        });
        jobs
    }
}

/// Periodic reaper that moves parked jobs back into the queue.
///
/// Reaped jobs re-enter with `retry = 0` and `ignore_seq = true`: a parked
/// job's sequence predates the current checkpoint. The reaper is polled from
/// the engine turn, so runs never overlap.
#[derive(Debug)]
pub struct Reaper {
    timer: PeriodTimer,
}

impl Reaper {
    pub fn new(period_ms: u64) -> Self {
        Self {
            timer: PeriodTimer::new(period_ms),
        }
    }

    /// Polls the reaper; when due, drains the parked set into re-entry jobs.
    pub fn poll(&mut self, now_ms: u64, parked: &mut ParkedSet) -> Vec<Job> {
        if !self.timer.poll(now_ms) || parked.is_empty() {
            return Vec::new();
        }
        parked.drain().into_iter().map(Job::reaped).collect()
    }
}
