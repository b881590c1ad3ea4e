use serde_json::Value;
use thiserror::Error;

/// Raw registry document fetched at a specific revision.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub rev: Option<String>,
    pub body: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, rev: Option<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            rev,
            body,
        }
    }
}

/// Outcome of a document lookup. A lookup failure is detected by a populated
/// `error` field with no document id in the response payload and means the
/// document is gone upstream, which is distinct from a transport failure.
#[derive(Debug, Clone, PartialEq)]
pub enum DocFetch {
    Doc(Document),
    Missing { error: String },
}

/// Registry head metadata, used only for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryInfo {
    pub update_seq: i64,
}

/// Errors surfaced by the registry client.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Transport(String),
    #[error("registry response decode failed: {0}")]
    Decode(String),
}

/// Contract exposed by the upstream registry beyond the change feed:
/// revision-pinned document fetch plus the info endpoint.
pub trait Registry {
    /// Fetches the document at the given revision.
    fn fetch_doc(&mut self, id: &str, rev: &str) -> Result<DocFetch, RegistryError>;

    /// Reads the registry head sequence.
    fn info(&mut self) -> Result<RegistryInfo, RegistryError>;
}
