use crate::state::store::{PipelineState, StateError, StatePatch, StateStore};

/// Result of a sequence write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqAdvance {
    Advanced,
    Ignored,
}

/// Sole writer of the persisted sequence.
///
/// All writes go through the single-writer engine context, so they apply in
/// submission order and each is durable before the next begins. The
/// checkpointer additionally guarantees monotonicity: a write that does not
/// strictly advance the stored sequence is a no-op, which also covers the
/// negative sentinel carried by synthetic refresh jobs.
#[derive(Debug)]
pub struct Checkpointer<S: StateStore> {
    store: S,
    current: PipelineState,
}

impl<S: StateStore> Checkpointer<S> {
    /// Opens the checkpointer, reading the stored state once.
    pub fn open(mut store: S) -> Result<Self, StateError> {
        let current = store.load()?;
        Ok(Self { store, current })
    }

    /// The last state read or written.
    pub fn state(&self) -> &PipelineState {
        &self.current
    }

    /// The current low-water mark.
    pub fn seq(&self) -> i64 {
        self.current.seq
    }

    /// Persists a stage transition.
    pub fn save_stage(&mut self, stage: &str) -> Result<(), StateError> {
        self.store.save(&StatePatch::stage(stage))?;
        self.current.stage = stage.to_string();
        Ok(())
    }

    /// Persists a new low-water mark. Non-advancing writes are ignored.
    pub fn save_seq(&mut self, seq: i64) -> Result<SeqAdvance, StateError> {
        if seq <= self.current.seq {
            return Ok(SeqAdvance::Ignored);
        }
        self.store.save(&StatePatch::seq(seq))?;
        self.current.seq = seq;
        Ok(SeqAdvance::Advanced)
    }
}
