//! Remote routing-table sources.
//!
//! # Responsibilities
//! - Fetch the raw name → address map from a remote endpoint
//! - Cap the body size to protect memory
//! - Bound every fetch with a timeout

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

/// Path appended to the configured base URL.
pub const ROUTING_TABLE_PATH: &str = "routing_table";

/// Error raised by a single sync attempt.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("unable to fetch routing table: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("routing table source answered with status {0}")]
    Status(u16),
    #[error("routing table body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("unable to parse routing table: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SyncError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Fetch(_) | SyncError::Status(_) | SyncError::BodyTooLarge { .. } => {
                "fetch_error"
            }
            SyncError::Parse(_) => "parse_error",
        }
    }
}

/// Somewhere a routing table can be fetched from.
#[async_trait]
pub trait TableSource: Send + Sync + std::fmt::Debug {
    /// Fetch the raw, unvalidated table.
    async fn fetch(&self) -> Result<HashMap<String, String>, SyncError>;
}

/// Error building an [`HttpTableSource`].
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("invalid routing table source URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unable to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Fetches `<base>/routing_table` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTableSource {
    client: reqwest::Client,
    endpoint: Url,
    max_body_bytes: usize,
}

impl HttpTableSource {
    pub fn new(base: &str, timeout: Duration, max_body_bytes: usize) -> Result<Self, SourceError> {
        let endpoint = table_endpoint(base)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            max_body_bytes,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Resolve the table endpoint under `base`.
pub fn table_endpoint(base: &str) -> Result<Url, SourceError> {
    let invalid = |reason: String| SourceError::InvalidUrl {
        url: base.to_string(),
        reason,
    };
    let url = Url::parse(&format!("{}/{}", base.trim_end_matches('/'), ROUTING_TABLE_PATH))
        .map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

#[async_trait]
impl TableSource for HttpTableSource {
    async fn fetch(&self) -> Result<HashMap<String, String>, SyncError> {
        let mut response = self.client.get(self.endpoint.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }

        if let Some(len) = response.content_length() {
            if len > self.max_body_bytes as u64 {
                return Err(SyncError::BodyTooLarge {
                    limit: self.max_body_bytes,
                });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(SyncError::BodyTooLarge {
                    limit: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(serde_json::from_slice(&body)?)
    }
}
