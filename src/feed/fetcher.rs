use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Default ceiling for a whole fetch, body included.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Default response body limit (10MB).
pub const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024;

/// Errors that can occur while retrieving a feed document.
///
/// A fetch is a single attempt; none of these are retried here. The next
/// scheduled ingestion cycle is the retry.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, body stream)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The request did not complete within the configured bound
    #[error("Request timed out")]
    Timeout,
    /// Response status other than 200 OK
    #[error("HTTP error: status {0}")]
    BadStatus(u16),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Source of raw feed documents.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Retrieve the full body of the document at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetches feeds over HTTP with a bounded time and size per attempt.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration, max_bytes: usize) -> Self {
        Self {
            client,
            timeout,
            max_bytes,
        }
    }

    /// Build a fetcher with its own client identified by `user_agent`.
    pub fn with_user_agent(
        user_agent: &str,
        timeout: Duration,
        max_bytes: usize,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .pool_idle_timeout(Duration::from_secs(30)) // Close idle connections promptly
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;
        Ok(Self::new(client, timeout, max_bytes))
    }

    async fn fetch_unbounded(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(FetchError::BadStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, self.max_bytes).await
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tracing::debug!(url = %url, "Fetching feed");

        let result = tokio::time::timeout(self.timeout, self.fetch_unbounded(url))
            .await
            .map_err(|_| FetchError::Timeout)
            .and_then(|inner| inner);

        match &result {
            Ok(bytes) => tracing::debug!(url = %url, bytes = bytes.len(), "Fetched feed"),
            Err(e) => tracing::warn!(url = %url, error = %e, "Feed fetch failed"),
        }

        result
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if declared_length_exceeds(len, limit) {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

/// Compared in `u64` so a large header cannot wrap on 32-bit targets.
fn declared_length_exceeds(content_length: u64, limit: usize) -> bool {
    content_length > limit as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Test</title></channel></rss>"#;

    fn fetcher(timeout: Duration, max_bytes: usize) -> HttpFetcher {
        HttpFetcher::new(reqwest::Client::new(), timeout, max_bytes)
    }

    #[tokio::test]
    async fn test_fetch_success_returns_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .expect(1)
            .mount(&mock_server)
            .await;

        let body = fetcher(DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_FEED_SIZE)
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(body, VALID_RSS.as_bytes());
    }

    #[tokio::test]
    async fn test_fetch_404_is_bad_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let result = fetcher(DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_FEED_SIZE)
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await;
        match result {
            Err(FetchError::BadStatus(404)) => {}
            other => panic!("Expected BadStatus(404), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_500_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = fetcher(DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_FEED_SIZE)
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::BadStatus(500))));
    }

    #[tokio::test]
    async fn test_fetch_non_ok_success_status_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let result = fetcher(DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_FEED_SIZE)
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::BadStatus(204))));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let result = fetcher(Duration::from_millis(100), DEFAULT_MAX_FEED_SIZE)
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_fetch_body_over_limit() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
            .mount(&mock_server)
            .await;

        let result = fetcher(DEFAULT_FETCH_TIMEOUT, 1024)
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::ResponseTooLarge)));
    }

    #[test]
    fn test_declared_length_beyond_u32_exceeds_limit() {
        // 4 GiB + 16 would wrap to 16 if narrowed to a 32-bit usize
        assert!(declared_length_exceeds((1u64 << 32) + 16, 16));
        assert!(declared_length_exceeds(u64::MAX, DEFAULT_MAX_FEED_SIZE));
        assert!(!declared_length_exceeds(16, 16));
        assert!(!declared_length_exceeds(0, 0));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_network_error() {
        // Port 9 (discard) is almost never listening locally
        let result = fetcher(DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_FEED_SIZE)
            .fetch("http://127.0.0.1:9/feed")
            .await;
        assert!(matches!(result, Err(FetchError::Network(_))));
    }
}
