use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Stage recorded while the watcher is live.
pub const STAGE_WATCH: &str = "watch";

/// Persisted pipeline state. `seq` is the exclusive low-water mark: every
/// change with a sequence at or below it has been durably applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub seq: i64,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            stage: String::new(),
            seq: 0,
        }
    }
}

/// Partial state write. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,
}

impl StatePatch {
    pub fn stage(stage: impl Into<String>) -> Self {
        Self {
            stage: Some(stage.into()),
            seq: None,
        }
    }

    pub fn seq(seq: i64) -> Self {
        Self {
            stage: None,
            seq: Some(seq),
        }
    }
}

/// Errors surfaced while reading or writing the state blob.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read pipeline state {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse pipeline state {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("state store rejected write: {0}")]
    Store(String),
}

/// Contract exposed by the external state store: read the whole blob, apply a
/// partial write. Each `save` call completes durably before it returns.
pub trait StateStore {
    fn load(&mut self) -> Result<PipelineState, StateError>;
    fn save(&mut self, patch: &StatePatch) -> Result<(), StateError>;
}

impl<S: StateStore + ?Sized> StateStore for Box<S> {
    fn load(&mut self) -> Result<PipelineState, StateError> {
        (**self).load()
    }

    fn save(&mut self, patch: &StatePatch) -> Result<(), StateError> {
        (**self).save(patch)
    }
}

/// State store persisting the blob as a JSON file. A missing file reads as
/// the default state so a fresh deployment starts from sequence zero.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<PipelineState, StateError> {
        let payload = match fs::read_to_string(&self.path) {
            Ok(payload) => payload,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PipelineState::default());
            }
            Err(source) => {
                return Err(StateError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&payload).map_err(|source| StateError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl StateStore for FileStateStore {
    fn load(&mut self) -> Result<PipelineState, StateError> {
        self.read()
    }

    fn save(&mut self, patch: &StatePatch) -> Result<(), StateError> {
        let mut state = self.read()?;
        if let Some(stage) = &patch.stage {
            state.stage = stage.clone();
        }
        if let Some(seq) = patch.seq {
            state.seq = seq;
        }
        let payload = serde_json::to_vec_pretty(&state).map_err(|source| StateError::Parse {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, payload).map_err(|source| StateError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
