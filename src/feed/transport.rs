use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::feed::change::ChangeDescriptor;
use crate::feed::driver::{ChangeFeed, FeedError, FeedOptions};
use crate::registry::{DocFetch, Document, Registry, RegistryError, RegistryInfo};

const CHANGES_PATH: &str = "/_changes";
const LONGPOLL_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);
const REGISTRY_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking HTTP transport consuming the registry's long-polled change feed.
///
/// Each poll issues one long-poll round carrying the current cursor, so the
/// subscription is resumable from any delivered sequence and survives
/// transport errors without losing its position.
#[derive(Debug)]
pub struct HttpChangeFeed {
    client: Client,
    endpoint: String,
    cursor: i64,
    options: Option<FeedOptions>,
    paused: bool,
    active: bool,
}

impl HttpChangeFeed {
    /// Creates a transport targeting the provided registry base endpoint.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, FeedError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(FeedError::Transport("feed endpoint must not be empty".into()));
        }
        let client = Client::builder()
            .build()
            .map_err(|err| FeedError::Transport(format!("http client build failed: {err}")))?;
        Ok(Self {
            client,
            endpoint,
            cursor: 0,
            options: None,
            paused: false,
            active: false,
        })
    }

    fn changes_url(&self) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), CHANGES_PATH)
    }
}

impl ChangeFeed for HttpChangeFeed {
    fn start(&mut self, options: FeedOptions) -> Result<(), FeedError> {
        self.cursor = options.since;
        self.options = Some(options);
        self.active = true;
        self.paused = false;
        Ok(())
    }

    fn poll(&mut self, max_wait: Duration) -> Result<Option<ChangeDescriptor>, FeedError> {
        if !self.active || self.paused {
            return Ok(None);
        }
        let Some(options) = self.options else {
            return Ok(None);
        };
        let response = self
            .client
            .get(self.changes_url())
            .query(&[
                ("feed", "longpoll".to_string()),
                ("since", self.cursor.to_string()),
                ("limit", options.batch_size.to_string()),
                ("include_docs", options.include_docs.to_string()),
                ("timeout", max_wait.as_millis().to_string()),
            ])
            .timeout(max_wait + LONGPOLL_TIMEOUT_MARGIN)
            .send()
            .map_err(|err| FeedError::Transport(format!("changes request failed: {err}")))?;
        if !response.status().is_success() {
            return Err(FeedError::Transport(format!(
                "changes request returned status {}",
                response.status()
            )));
        }
        let batch: WireChangeBatch = response
            .json()
            .map_err(|err| FeedError::Decode(err.to_string()))?;
        let Some(change) = batch.results.into_iter().next() else {
            if let Some(last_seq) = batch.last_seq {
                self.cursor = last_seq;
            }
            return Ok(None);
        };
        if !change.is_synthetic() {
            self.cursor = change.seq;
        }
        Ok(Some(change))
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn stop(&mut self) {
        self.active = false;
    }
}

#[derive(Debug, Deserialize)]
struct WireChangeBatch {
    #[serde(default)]
    results: Vec<ChangeDescriptor>,
    #[serde(default)]
    last_seq: Option<i64>,
}

/// Blocking HTTP client for the registry's document and info endpoints.
#[derive(Debug)]
pub struct HttpRegistry {
    client: Client,
    endpoint: String,
}

impl HttpRegistry {
    /// Creates a client targeting the provided registry base endpoint.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, RegistryError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(RegistryError::Transport(
                "registry endpoint must not be empty".into(),
            ));
        }
        let client = Client::builder()
            .timeout(REGISTRY_REQUEST_TIMEOUT)
            .build()
            .map_err(|err| RegistryError::Transport(format!("http client build failed: {err}")))?;
        Ok(Self { client, endpoint })
    }

    fn doc_url(&self, id: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            id.replace('/', "%2F")
        )
    }
}

impl Registry for HttpRegistry {
    fn fetch_doc(&mut self, id: &str, rev: &str) -> Result<DocFetch, RegistryError> {
        let response = self
            .client
            .get(self.doc_url(id))
            .query(&[("rev", rev)])
            .send()
            .map_err(|err| RegistryError::Transport(format!("document request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::Transport(format!(
                "document request returned status {status}"
            )));
        }
        let payload: Value = response
            .json()
            .map_err(|err| RegistryError::Decode(err.to_string()))?;
        let doc_id = payload
            .get("_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let error = payload
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string);
        match (doc_id, error) {
            (Some(doc_id), _) => {
                let rev = payload
                    .get("_rev")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Ok(DocFetch::Doc(Document::new(doc_id, rev, payload)))
            }
            (None, Some(error)) => Ok(DocFetch::Missing { error }),
            (None, None) => Err(RegistryError::Decode(
                "document payload carries neither _id nor error".into(),
            )),
        }
    }

    fn info(&mut self) -> Result<RegistryInfo, RegistryError> {
        let response = self
            .client
            .get(self.endpoint.trim_end_matches('/'))
            .send()
            .map_err(|err| RegistryError::Transport(format!("info request failed: {err}")))?;
        if !response.status().is_success() {
            return Err(RegistryError::Transport(format!(
                "info request returned status {}",
                response.status()
            )));
        }
        let wire: WireInfo = response
            .json()
            .map_err(|err| RegistryError::Decode(err.to_string()))?;
        Ok(RegistryInfo {
            update_seq: wire.update_seq,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireInfo {
    update_seq: i64,
}
