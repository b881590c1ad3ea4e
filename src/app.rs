use anyhow::{Context, Result};
use std::env;

use crate::clock::SystemClock;
use crate::config::WatchOptions;
use crate::feed::transport::{HttpChangeFeed, HttpRegistry};
use crate::index::client::{DryRunIndex, IdentityFormatter};
use crate::observability::telemetry::StderrErrorSink;
use crate::state::store::FileStateStore;
use crate::watch::{WatchDeps, WatchEngine};

/// Application entrypoint. Wires the file-backed state store, the HTTP
/// registry transports, and a dry-run index, then watches until the process
/// is terminated. `MIRADOR_REGISTRY` names the upstream registry;
/// `MIRADOR_CONFIG` and `MIRADOR_STATE` override the options file and state
/// file paths.
pub fn run() -> Result<()> {
    let registry_url = env::var("MIRADOR_REGISTRY")
        .context("MIRADOR_REGISTRY must point at the upstream registry")?;
    let options = match env::var("MIRADOR_CONFIG") {
        Ok(path) => WatchOptions::load_from_file(path)?,
        Err(_) => WatchOptions::default(),
    };
    let state_path = env::var("MIRADOR_STATE").unwrap_or_else(|_| "mirador-state.json".into());
    let deps = WatchDeps {
        feed: Box::new(HttpChangeFeed::new(registry_url.as_str())?),
        registry: Box::new(HttpRegistry::new(registry_url.as_str())?),
        index: Box::new(DryRunIndex::default()),
        lost: Box::new(DryRunIndex::default()),
        formatter: Box::new(IdentityFormatter),
        store: Box::new(FileStateStore::new(state_path)),
        errors: Box::new(StderrErrorSink),
        clock: Box::new(SystemClock),
    };
    let mut engine = WatchEngine::new(options, deps)?;
    engine.run()?;
    Ok(())
}
