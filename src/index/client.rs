use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::registry::Document;

/// Facet carrying each record's expiry bucket, queried by the refresh
/// scanner. Values are stringified epoch milliseconds.
pub const EXPIRES_AT_FACET: &str = "_searchInternal.expiresAt";

/// Internal metadata block stored alongside every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchInternal {
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

/// Indexable record produced by the formatter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRecord {
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub modified: i64,
    #[serde(rename = "_searchInternal")]
    pub internal: SearchInternal,
    #[serde(flatten)]
    pub body: Value,
}

impl SearchRecord {
    pub fn new(object_id: impl Into<String>, modified: i64, expires_at: i64) -> Self {
        Self {
            object_id: object_id.into(),
            rev: None,
            modified,
            internal: SearchInternal { expires_at },
            body: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }
}

/// Sort order applied to facet values in search responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetValueSort {
    Alpha,
    Count,
}

/// Search request shape consumed by the index client.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub facets: Vec<String>,
    pub facet_filters: Vec<String>,
    pub hits_per_page: usize,
    pub sort_facet_values_by: FacetValueSort,
}

impl SearchQuery {
    /// Query returning only facet statistics for the given facet.
    pub fn facet_stats(facet: impl Into<String>) -> Self {
        Self {
            query: String::new(),
            facets: vec![facet.into()],
            facet_filters: Vec::new(),
            hits_per_page: 0,
            sort_facet_values_by: FacetValueSort::Alpha,
        }
    }

    /// Query returning up to `hits_per_page` records inside one facet bucket.
    pub fn bucket(facet: &str, value: &str, hits_per_page: usize) -> Self {
        Self {
            query: String::new(),
            facets: Vec::new(),
            facet_filters: vec![format!("{facet}:{value}")],
            hits_per_page,
            sort_facet_values_by: FacetValueSort::Alpha,
        }
    }
}

/// One facet value with its record count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetCount {
    pub value: String,
    pub count: u64,
}

/// Record projection returned by searches; only the fields the watcher
/// consults are surfaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub object_id: String,
    pub rev: Option<String>,
    pub modified: i64,
}

/// Search response: facet statistics keyed by facet name, plus hits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub facets: BTreeMap<String, Vec<FacetCount>>,
    pub hits: Vec<SearchHit>,
}

/// Error surfaced by index operations.
#[derive(Debug, Clone, Error)]
#[error("index request failed: {message}")]
pub struct IndexError {
    message: String,
}

impl IndexError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Contract exposed by the downstream search index.
pub trait SearchIndex {
    fn upsert(&mut self, record: &SearchRecord) -> Result<(), IndexError>;
    fn delete(&mut self, object_id: &str) -> Result<(), IndexError>;
    fn search(&mut self, query: &SearchQuery) -> Result<SearchOutcome, IndexError>;
}

/// Forensic record written when a job exhausts its retries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LostRecord {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub seq: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub failed_at_ms: u64,
    pub reason: String,
}

/// Side index holding lost records. Writes are best-effort and never retried
/// so an unhealthy side index cannot block the pipeline.
pub trait LostIndex {
    fn upsert(&mut self, record: &LostRecord) -> Result<(), IndexError>;
}

/// Pure document-to-record projection. Returning `None` marks the document
/// as not indexable under current rules.
pub trait RecordFormatter {
    fn format(&self, doc: &Document) -> Option<SearchRecord>;
}

/// Expiry horizon granted by the identity formatter (30 days).
pub const IDENTITY_RECORD_TTL_MS: i64 = 30 * 24 * 60 * 60 * 1_000;

/// Minimal formatter projecting the raw document into a record: id,
/// revision, `time.modified` epoch, and an expiry derived from it. Serves as
/// the default until a richer formatter is bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFormatter;

impl RecordFormatter for IdentityFormatter {
    fn format(&self, doc: &Document) -> Option<SearchRecord> {
        if doc.id.is_empty() {
            return None;
        }
        let modified = doc
            .body
            .pointer("/time/modified")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let mut record = SearchRecord::new(&doc.id, modified, modified + IDENTITY_RECORD_TTL_MS);
        if let Some(rev) = &doc.rev {
            record = record.with_rev(rev.clone());
        }
        if doc.body.is_object() {
            record = record.with_body(doc.body.clone());
        }
        Some(record)
    }
}

/// Index client that counts operations instead of applying them, used to run
/// the pipeline without a search backend.
#[derive(Debug, Default, Clone)]
pub struct DryRunIndex {
    upserts: u64,
    deletes: u64,
    lost: u64,
}

impl DryRunIndex {
    pub fn upserts(&self) -> u64 {
        self.upserts
    }

    pub fn deletes(&self) -> u64 {
        self.deletes
    }

    pub fn lost(&self) -> u64 {
        self.lost
    }
}

impl SearchIndex for DryRunIndex {
    fn upsert(&mut self, _record: &SearchRecord) -> Result<(), IndexError> {
        self.upserts += 1;
        Ok(())
    }

    fn delete(&mut self, _object_id: &str) -> Result<(), IndexError> {
        self.deletes += 1;
        Ok(())
    }

    fn search(&mut self, _query: &SearchQuery) -> Result<SearchOutcome, IndexError> {
        Ok(SearchOutcome::default())
    }
}

impl LostIndex for DryRunIndex {
    fn upsert(&mut self, _record: &LostRecord) -> Result<(), IndexError> {
        self.lost += 1;
        Ok(())
    }
}
