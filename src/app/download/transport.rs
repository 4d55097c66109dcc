//! Media transport collaborator
//!
//! The manager opens each task through a [`MediaTransport`] and streams the
//! returned body to disk. [`HttpTransport`] is the reqwest implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use url::Url;

use super::task::DownloadTask;
use crate::app::source::http::map_request_error;
use crate::app::source::SourceConfig;
use crate::errors::{DownloadError, SourceError, SourceResult, TransferResult};

/// Body of a media response, chunk by chunk
pub type ByteStream = BoxStream<'static, Result<Bytes, SourceError>>;

/// Opened media response
pub struct MediaResponse {
    /// Length announced by the server, if any
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl MediaResponse {
    pub fn new(content_length: Option<u64>, body: ByteStream) -> Self {
        Self {
            content_length,
            body,
        }
    }

    /// Response whose body is the given chunks, in order
    pub fn from_chunks(
        content_length: Option<u64>,
        chunks: Vec<Result<Bytes, SourceError>>,
    ) -> Self {
        Self::new(content_length, futures::stream::iter(chunks).boxed())
    }
}

impl std::fmt::Debug for MediaResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Opens media for a download task
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Issue the request described by `task`
    ///
    /// Non-success statuses must be reported as errors; the returned body
    /// is the payload only.
    async fn open(&self, task: &DownloadTask) -> TransferResult<MediaResponse>;
}

/// reqwest-backed [`MediaTransport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Build a dedicated client from the source settings with a download timeout
    pub fn from_source_config(source: &SourceConfig, timeout: Duration) -> SourceResult<Self> {
        let config = SourceConfig {
            request_timeout: timeout,
            ..source.clone()
        };
        Ok(Self::new(config.build_http_client()?, timeout))
    }
}

#[async_trait]
impl MediaTransport for HttpTransport {
    async fn open(&self, task: &DownloadTask) -> TransferResult<MediaResponse> {
        let url = Url::parse(&task.source_url).map_err(|e| DownloadError::InvalidUrl {
            url: task.source_url.clone(),
            error: e.to_string(),
        })?;

        let mut request = self.client.get(url);
        for (name, value) in &task.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let timeout = self.timeout;
        let response = request
            .send()
            .await
            .map_err(|e| map_request_error(e, timeout))?;

        if let Some(error) = SourceError::from_status(response.status().as_u16()) {
            return Err(error.into());
        }

        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| map_request_error(e, timeout)))
            .boxed();

        Ok(MediaResponse::new(content_length, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::{http_response, spawn_http_server};

    fn transport() -> HttpTransport {
        HttpTransport::from_source_config(&SourceConfig::default(), Duration::from_secs(5)).unwrap()
    }

    async fn collect(body: ByteStream) -> Result<Vec<u8>, SourceError> {
        let chunks: Vec<_> = body.collect().await;
        let mut bytes = Vec::new();
        for chunk in chunks {
            bytes.extend_from_slice(&chunk?);
        }
        Ok(bytes)
    }

    #[tokio::test]
    async fn test_open_streams_body_and_forwards_headers() {
        let server =
            spawn_http_server(vec![http_response(200, "video/mp4", b"0123456789")]).await;
        let task = DownloadTask::new(format!("{}/clip.mp4", server.base_url), "clip.mp4")
            .with_header("Referer", "https://example.com/video/1");

        let response = transport().open(&task).await.unwrap();
        assert_eq!(response.content_length, Some(10));
        assert_eq!(collect(response.body).await.unwrap(), b"0123456789");

        let requests = server.requests().await;
        assert!(requests[0]
            .to_lowercase()
            .contains("referer: https://example.com/video/1"));
    }

    #[tokio::test]
    async fn test_open_maps_status() {
        let server = spawn_http_server(vec![http_response(403, "text/plain", b"no")]).await;
        let task = DownloadTask::new(format!("{}/clip.mp4", server.base_url), "clip.mp4");

        let error = transport().open(&task).await.unwrap_err();
        assert_eq!(
            error,
            DownloadError::Source(SourceError::ClientError { status: 403 })
        );
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let task = DownloadTask::new("not a url", "clip.mp4");
        let error = transport().open(&task).await.unwrap_err();
        assert!(matches!(error, DownloadError::InvalidUrl { .. }));
    }
}
