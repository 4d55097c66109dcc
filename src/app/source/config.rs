//! Upstream endpoint and HTTP client configuration

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::constants::{endpoints, http, limits};
use crate::errors::{SourceError, SourceResult};

/// Configuration for the upstream endpoints and the HTTP client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// JSON endpoint returning the hot list
    pub hot_list_api_url: String,
    /// JSON endpoint for item details; `{id}` is substituted
    pub detail_api_url_template: String,
    /// Human-facing hot-list page, sent as referer
    pub hot_list_page_url: String,
    /// Session cookie, if the upstream requires one
    pub cookie: Option<String>,
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Upper bound for a single request as enforced by the client
    pub request_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            hot_list_api_url: endpoints::HOT_LIST_API_URL.to_string(),
            detail_api_url_template: endpoints::DETAIL_API_URL_TEMPLATE.to_string(),
            hot_list_page_url: endpoints::HOT_LIST_PAGE_URL.to_string(),
            cookie: None,
            user_agent: http::USER_AGENT.to_string(),
            connect_timeout: http::CONNECT_TIMEOUT,
            request_timeout: limits::HOT_LIST_TIMEOUT,
        }
    }
}

impl SourceConfig {
    /// Detail endpoint for `id`
    pub fn detail_url(&self, id: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
        self.detail_api_url_template.replace("{id}", &encoded)
    }

    /// Builds the HTTP client with the specified configuration
    pub fn build_http_client(&self) -> SourceResult<Client> {
        Client::builder()
            .cookie_store(true)
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.as_str())
            .pool_idle_timeout(http::POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(http::POOL_MAX_PER_HOST)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| SourceError::transport(format!("failed to build HTTP client: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_url_substitution() {
        let config = SourceConfig {
            detail_api_url_template: "https://api.example.com/detail?id={id}".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.detail_url("123"),
            "https://api.example.com/detail?id=123"
        );
        assert_eq!(
            config.detail_url("a&b"),
            "https://api.example.com/detail?id=a%26b"
        );
    }

    #[test]
    fn test_http_client_creation() {
        let config = SourceConfig::default();
        assert!(config.build_http_client().is_ok());
    }
}
