//! Data resolution: inline record, fetched record, or no record at all

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::DataSourceConfig;
use crate::error::{GatewayError, Result};
use crate::gateway::request::{DataRef, InboundRequest};

/// Failures talking to the record data source (mapped to 502)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamFetchError {
    /// Data source answered with a non-2xx status
    #[error("Status {status}: {status_text}")]
    Status {
        status: u16,
        status_text: String,
        url: String,
    },

    /// Data source answered 2xx with a body that is not JSON
    #[error("record is not valid JSON: {0}")]
    Parse(String),

    /// Connection, timeout or body read failure
    #[error("failed to reach data source: {0}")]
    Transport(String),

    #[error("cannot build record URL: {0}")]
    InvalidUrl(String),
}

/// Where the record attached to a request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    Inline,
    Fetched,
    None,
}

/// Record context for one request, produced once and never mutated
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedContext {
    pub data: Option<Value>,
    pub source: ContextSource,
}

impl ResolvedContext {
    pub fn none() -> Self {
        Self {
            data: None,
            source: ContextSource::None,
        }
    }
}

/// External service returning a domain record by reference
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self, reference: &DataRef) -> std::result::Result<Value, UpstreamFetchError>;
}

/// Resolve the record for a validated request
///
/// Inline data wins over a reference; at most one fetch is issued.
pub async fn resolve(
    inbound: &InboundRequest,
    source: &dyn DataSource,
) -> std::result::Result<ResolvedContext, UpstreamFetchError> {
    if let Some(data) = &inbound.inline_data {
        return Ok(ResolvedContext {
            data: Some(Value::Object(data.clone())),
            source: ContextSource::Inline,
        });
    }

    if let Some(reference) = &inbound.data_ref {
        let data = source.fetch(reference).await?;
        return Ok(ResolvedContext {
            data: Some(data),
            source: ContextSource::Fetched,
        });
    }

    Ok(ResolvedContext::none())
}

/// HTTP data source: `GET {base_url}/{namespace?}/{segments...}`
///
/// Every reference segment is percent-encoded as a single path segment.
/// Bare references are placed under the default namespace; compound
/// references already carry their namespace.
#[derive(Debug, Clone)]
pub struct HttpDataSource {
    client: Client,
    base_url: Url,
    default_namespace: String,
}

impl HttpDataSource {
    pub fn new(client: Client, config: &DataSourceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            GatewayError::Config(format!(
                "Invalid data source base URL '{}': {e}",
                config.base_url
            ))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Config(format!(
                "Data source base URL '{}' cannot have path segments",
                config.base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            default_namespace: config.default_namespace.trim().trim_matches('/').to_string(),
        })
    }

    pub fn record_url(&self, reference: &DataRef) -> std::result::Result<Url, UpstreamFetchError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                UpstreamFetchError::InvalidUrl(format!("base URL {} is not a base", self.base_url))
            })?;
            segments.pop_if_empty();
            if !reference.is_compound() && !self.default_namespace.is_empty() {
                segments.push(&self.default_namespace);
            }
            segments.extend(reference.segments());
        }
        Ok(url)
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch(&self, reference: &DataRef) -> std::result::Result<Value, UpstreamFetchError> {
        let url = self.record_url(reference)?;
        debug!("Fetching record from: {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| UpstreamFetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                error_type = "upstream_fetch",
                status = status.as_u16(),
                url = %url,
                body_length = body.len(),
                "Record fetch failed"
            );
            return Err(UpstreamFetchError::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
                url: url.to_string(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamFetchError::Transport(e.to_string()))?;
        let record: Value = serde_json::from_slice(&bytes)
            .map_err(|e| UpstreamFetchError::Parse(e.to_string()))?;

        debug!(
            "Record fetched: {}",
            record
                .get("recipeName")
                .or_else(|| record.get("name"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unnamed")
        );

        Ok(record)
    }
}
