use serde::{Deserialize, Serialize};

/// Sequence value carried by synthetic changes injected by the refresh
/// scanner. Synthetic changes never advance the persisted checkpoint.
pub const SYNTHETIC_SEQ: i64 = -1;

/// Revision pointer attached to a change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRev {
    pub rev: String,
}

impl ChangeRev {
    pub fn new(rev: impl Into<String>) -> Self {
        Self { rev: rev.into() }
    }
}

/// Document-change notification delivered by the registry change feed.
///
/// An empty `id` marks a heartbeat and is dropped before it reaches the
/// queue. `changes` holds the winning revision first; only `changes[0]` is
/// consulted when fetching the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDescriptor {
    #[serde(default)]
    pub id: String,
    pub seq: i64,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub changes: Vec<ChangeRev>,
}

impl ChangeDescriptor {
    /// Builds a live change for the given package and sequence.
    pub fn new(id: impl Into<String>, seq: i64) -> Self {
        Self {
            id: id.into(),
            seq,
            deleted: false,
            changes: Vec::new(),
        }
    }

    /// Builds a synthetic change injected by the refresh scanner.
    pub fn synthetic(id: impl Into<String>, rev: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            seq: SYNTHETIC_SEQ,
            deleted: false,
            changes: vec![ChangeRev::new(rev)],
        }
    }

    /// Attaches a revision pointer.
    pub fn with_rev(mut self, rev: impl Into<String>) -> Self {
        self.changes.push(ChangeRev::new(rev));
        self
    }

    /// Marks the change as a deletion.
    pub fn with_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// Heartbeats are discriminated by an empty id, not by any
    /// transport-level marker.
    pub fn is_heartbeat(&self) -> bool {
        self.id.is_empty()
    }

    /// Whether the change was injected by the refresh scanner.
    pub fn is_synthetic(&self) -> bool {
        self.seq == SYNTHETIC_SEQ
    }

    /// The winning revision, when one is attached.
    pub fn first_rev(&self) -> Option<&str> {
        self.changes.first().map(|change| change.rev.as_str())
    }
}
