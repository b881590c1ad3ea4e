//! Mirador watches a package registry's change feed and mirrors every
//! document mutation into a downstream search index, checkpointing the last
//! durably applied sequence so the pipeline resumes where it left off.

pub mod feed {
    pub mod change;
    pub mod driver;
    pub mod job;
    pub mod transport;

    pub use change::*;
    pub use driver::*;
    pub use job::*;
    pub use transport::*;
}

pub mod ingest {
    pub mod backoff;
    pub mod parked;
    pub mod pipeline;
    pub mod queue;
    pub mod refresh;
    pub mod worker;

    pub use backoff::*;
    pub use parked::*;
    pub use pipeline::*;
    pub use queue::*;
    pub use refresh::*;
    pub use worker::*;
}

pub mod index {
    pub mod client;

    pub use client::*;
}

pub mod observability {
    pub mod logging;
    pub mod telemetry;

    pub use logging::*;
    pub use telemetry::*;
}

pub mod state {
    pub mod checkpoint;
    pub mod store;

    pub use checkpoint::*;
    pub use store::*;
}

pub mod app;
pub mod clock;
pub mod config;
pub mod registry;
pub mod watch;

pub use clock::{Clock, PeriodTimer, SystemClock};
pub use config::{ConfigError, WatchOptions};
pub use feed::{
    ChangeDescriptor, ChangeFeed, ChangeRev, FeedDriver, FeedError, FeedOptions, HttpChangeFeed,
    HttpRegistry, Job, SYNTHETIC_SEQ,
};
pub use index::{
    DryRunIndex, FacetCount, FacetValueSort, IdentityFormatter, IndexError, LostIndex, LostRecord,
    RecordFormatter, SearchHit, SearchIndex, SearchInternal, SearchOutcome, SearchQuery,
    SearchRecord, EXPIRES_AT_FACET, IDENTITY_RECORD_TTL_MS,
};
pub use ingest::{
    BackoffPolicy, ChangeProcessor, JobDisposition, JobQueue, JobWorker, ParkedSet, ProcessError,
    ProcessOutcome, QueueError, Reaper, RefreshScanner, SkipReason, WorkerDeps,
    REFRESH_BUCKET_LIMIT,
};
pub use observability::{
    ErrorReport, ErrorSink, JsonLineLogger, LogFile, LogLevel, LogRotationPolicy, LoggingError,
    StderrErrorSink, WatchTelemetry,
};
pub use registry::{DocFetch, Document, Registry, RegistryError, RegistryInfo};
pub use state::{
    Checkpointer, FileStateStore, PipelineState, SeqAdvance, StateError, StatePatch, StateStore,
    STAGE_WATCH,
};
pub use watch::{StopHandle, TurnReport, WatchDeps, WatchEngine, WatchError};
