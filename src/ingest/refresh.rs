use std::collections::HashMap;

use crate::clock::PeriodTimer;
use crate::feed::job::Job;
use crate::index::client::{FacetCount, SearchIndex, SearchQuery, EXPIRES_AT_FACET};
use crate::observability::logging::{JsonLineLogger, LogLevel};

/// Records fetched from the oldest expiry bucket per scan.
pub const REFRESH_BUCKET_LIMIT: usize = 20;

/// Periodic scanner that rediscovers stale records in the index itself.
///
/// The scan reads facet statistics over the per-record expiry bucket, and
/// when the oldest bucket has passed, re-enqueues its records as synthetic
/// changes. Facet values are parsed as integer epochs before comparison, so
/// mixed-width epoch strings cannot reorder buckets. Best-effort: every
/// failure logs and returns, the timer keeps ticking.
pub struct RefreshScanner {
    timer: PeriodTimer,
    bucket_limit: usize,
}

impl RefreshScanner {
    pub fn new(period_ms: u64) -> Self {
        Self {
            timer: PeriodTimer::new(period_ms),
            bucket_limit: REFRESH_BUCKET_LIMIT,
        }
    }

    /// Polls the scanner; when due, returns synthetic jobs for stale records.
    /// Records whose package saw a live feed event after the record was last
    /// modified are skipped: fresher data is already in flight or applied.
    pub fn poll(
        &mut self,
        now_ms: u64,
        index: &mut dyn SearchIndex,
        last_seen: &HashMap<String, u64>,
        logger: &mut JsonLineLogger,
    ) -> Vec<Job> {
        if !self.timer.poll(now_ms) {
            return Vec::new();
        }
        let stats = match index.search(&SearchQuery::facet_stats(EXPIRES_AT_FACET)) {
            Ok(outcome) => outcome,
            Err(err) => {
                logger
                    .log(
                        now_ms,
                        LogLevel::Warn,
                        "refresh",
                        &format!("expiry facet query failed: {err}"),
                    )
                    .ok();
                return Vec::new();
            }
        };
        let Some(bucket) = oldest_bucket(stats.facets.get(EXPIRES_AT_FACET)) else {
            return Vec::new();
        };
        if bucket.epoch_ms > now_ms as i64 {
            return Vec::new();
        }
        let hits = match index.search(&SearchQuery::bucket(
            EXPIRES_AT_FACET,
            &bucket.value,
            self.bucket_limit,
        )) {
            Ok(outcome) => outcome.hits,
            Err(err) => {
                logger
                    .log(
                        now_ms,
                        LogLevel::Warn,
                        "refresh",
                        &format!("expiry bucket fetch failed: {err}"),
                    )
                    .ok();
                return Vec::new();
            }
        };
        let mut jobs = Vec::new();
        for hit in hits {
            let Some(rev) = hit.rev else {
                continue;
            };
            if let Some(seen_ms) = last_seen.get(&hit.object_id) {
                if i128::from(*seen_ms) > i128::from(hit.modified) {
                    continue;
                }
            }
            jobs.push(Job::refresh(hit.object_id, rev));
        }
        if !jobs.is_empty() {
            logger
                .log(
                    now_ms,
                    LogLevel::Info,
                    "refresh",
                    &format!(
                        "expiry bucket {} re-enqueues {} record(s)",
                        bucket.value,
                        jobs.len()
                    ),
                )
                .ok();
        }
        jobs
    }
}

struct ExpiryBucket {
    value: String,
    epoch_ms: i64,
}

fn oldest_bucket(facets: Option<&Vec<FacetCount>>) -> Option<ExpiryBucket> {
    facets?
        .iter()
        .filter_map(|facet| {
            facet
                .value
                .parse::<i64>()
                .ok()
                .map(|epoch_ms| ExpiryBucket {
                    value: facet.value.clone(),
                    epoch_ms,
                })
        })
        .min_by_key(|bucket| bucket.epoch_ms)
}
