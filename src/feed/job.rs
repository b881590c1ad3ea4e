use crate::feed::change::ChangeDescriptor;

/// Unit of work flowing through the ordered worker: a change descriptor plus
/// retry metadata.
///
/// `ignore_seq` marks jobs whose successful completion must not advance the
/// persisted checkpoint: synthetic refresh jobs, reaped jobs, and every retry
/// attempt (an earlier attempt of a newer change may already have advanced
/// it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub change: ChangeDescriptor,
    pub retry: u32,
    pub ignore_seq: bool,
}

impl Job {
    /// Wraps a live feed event.
    pub fn live(change: ChangeDescriptor) -> Self {
        Self {
            change,
            retry: 0,
            ignore_seq: false,
        }
    }

    /// Builds a synthetic refresh job for a record rediscovered in the index.
    pub fn refresh(id: impl Into<String>, rev: impl Into<String>) -> Self {
        Self {
            change: ChangeDescriptor::synthetic(id, rev),
            retry: 0,
            ignore_seq: true,
        }
    }

    /// Rebuilds a parked job for re-entry through the reaper. The retry count
    /// resets and the stale sequence is never checkpointed again.
    pub fn reaped(parked: Job) -> Self {
        Self {
            change: parked.change,
            retry: 0,
            ignore_seq: true,
        }
    }

    /// Package identifier the job belongs to. Parked-set lookups key on this.
    pub fn package_id(&self) -> &str {
        &self.change.id
    }

    /// Sequence carried by the wrapped change.
    pub fn seq(&self) -> i64 {
        self.change.seq
    }
}
