//! reqwest-backed hot-list source
//!
//! Issues plain GET requests against the configured JSON endpoints, maps HTTP
//! statuses and client failures onto [`SourceError`], and decodes the body as
//! JSON. Rate limiting, retries and timeouts per endpoint class are applied by
//! the orchestrator, not here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE, REFERER};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::config::SourceConfig;
use super::HotListSource;
use crate::errors::{SourceError, SourceResult};

/// HTTP implementation of [`HotListSource`]
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    config: SourceConfig,
}

impl HttpSource {
    /// Creates a new source, building its HTTP client from `config`
    pub fn new(config: SourceConfig) -> SourceResult<Self> {
        let client = config.build_http_client()?;
        Ok(Self { client, config })
    }

    /// Creates a source around an existing client
    pub fn with_client(client: Client, config: SourceConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn get_json(&self, url: &str) -> SourceResult<Value> {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(REFERER, self.config.hot_list_page_url.as_str());
        if let Some(cookie) = &self.config.cookie {
            request = request.header(COOKIE, cookie.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_request_error(e, self.config.request_timeout))?;

        let status = response.status().as_u16();
        if let Some(error) = SourceError::from_status(status) {
            warn!("Request to {} failed with HTTP {}", url, status);
            return Err(error);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| map_request_error(e, self.config.request_timeout))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(SourceError::Decode {
                reason: "empty response body".to_string(),
            });
        }

        let value = serde_json::from_slice(&body).map_err(|e| SourceError::Decode {
            reason: format!("invalid JSON: {}", e),
        })?;
        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(value)
    }
}

#[async_trait]
impl HotListSource for HttpSource {
    async fn fetch_hot_list_raw(&self) -> SourceResult<Value> {
        self.get_json(&self.config.hot_list_api_url).await
    }

    async fn fetch_item_detail_raw(&self, id: &str) -> SourceResult<Value> {
        let url = self.config.detail_url(id);
        self.get_json(&url).await
    }
}

/// Map a reqwest failure onto the source taxonomy
pub(crate) fn map_request_error(error: reqwest::Error, timeout: Duration) -> SourceError {
    if error.is_timeout() {
        return SourceError::Timeout {
            seconds: timeout.as_secs(),
        };
    }
    if let Some(mapped) = error
        .status()
        .and_then(|status| SourceError::from_status(status.as_u16()))
    {
        return mapped;
    }
    if error.is_decode() {
        return SourceError::Decode {
            reason: error.to_string(),
        };
    }
    SourceError::transport(error.to_string())
}
