//! HTTP client for a search provider.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::domain::SearchRequest;

use super::SearchTransport;
use super::decoder::ByteStream;
use super::error::TransportError;
use super::types::{SearchResponse, WireSearchResponse};

/// Default base URL: the companion server on its default port.
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5001";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Configuration for the search client.
#[derive(Debug, Clone)]
pub struct SearchClientConfig {
    /// Base URL of the provider
    pub base_url: String,
    /// Request timeout in seconds. Streams are exempt once headers arrive.
    pub timeout_secs: u64,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
}

impl SearchClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }
}

impl Default for SearchClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// Search provider HTTP client.
///
/// A semaphore bounds the number of requests in flight; a streaming search
/// holds its permit until the stream is dropped.
#[derive(Debug, Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    semaphore: Arc<Semaphore>,
}

impl SearchClient {
    pub fn new(config: SearchClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Provider health, as opaque JSON.
    pub async fn health(&self) -> Result<serde_json::Value, TransportError> {
        self.get_json("/api/health").await
    }

    /// Destinations the provider serves, as opaque JSON.
    pub async fn destinations(&self) -> Result<serde_json::Value, TransportError> {
        self.get_json("/api/destinations").await
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, TransportError> {
        let _permit = self.permit().await?;
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).timeout(self.timeout).send().await?;
        let body = Self::success_body(response).await?;
        serde_json::from_str(&body).map_err(|e| TransportError::Json {
            message: e.to_string(),
            body: Some(body.chars().take(500).collect()),
        })
    }

    async fn permit(&self) -> Result<tokio::sync::OwnedSemaphorePermit, TransportError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Unavailable("client semaphore closed".to_string()))
    }

    async fn success_body(response: reqwest::Response) -> Result<String, TransportError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::from_status(status.as_u16(), &body));
        }
        Ok(body)
    }
}

impl SearchTransport for SearchClient {
    async fn open_stream(&self, request: &SearchRequest) -> Result<ByteStream, TransportError> {
        let permit = self.permit().await?;
        let url = format!("{}/api/search/stream", self.base_url);
        debug!(%url, key = %request.cache_key(), "opening search stream");

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::from_status(status.as_u16(), &body));
        }

        let stream = response.bytes_stream().map(move |chunk| {
            // Held for the life of the stream
            let _ = &permit;
            chunk.map(|bytes| bytes.to_vec()).map_err(TransportError::from)
        });
        Ok(stream.boxed())
    }

    async fn fetch_once(&self, request: &SearchRequest) -> Result<SearchResponse, TransportError> {
        let _permit = self.permit().await?;
        let url = format!("{}/api/search", self.base_url);
        debug!(%url, key = %request.cache_key(), "searching");

        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;
        let body = Self::success_body(response).await?;

        let wire: WireSearchResponse =
            serde_json::from_str(&body).map_err(|e| TransportError::Json {
                message: e.to_string(),
                body: Some(body.chars().take(500).collect()),
            })?;
        Ok(wire.into())
    }
}
