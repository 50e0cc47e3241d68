use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::{NfoError, Result};
use crate::schema_loader::SchemaFetcher;

/// Configuration for the HTTP schema fetcher
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Bound on each request, in seconds
    pub timeout_seconds: u64,
    /// Extra attempts after the first failure
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Cap on the exponential backoff delay in milliseconds
    pub max_retry_delay_ms: u64,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            retry_attempts: 0,
            retry_delay_ms: 500,
            max_retry_delay_ms: 5000,
            user_agent: format!("nfo-standard/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Async HTTP client for downloading remote schemas
pub struct AsyncHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl AsyncHttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    /// Download a schema, retrying transient failures with exponential backoff
    pub async fn download_schema(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get_response_with_retry(url).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn get_response_with_retry(&self, url: &str) -> Result<Response> {
        let mut attempt = 0;

        loop {
            let error = match self.make_request(url).await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let error = NfoError::HttpStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                    };
                    // 4xx will not improve on retry
                    if !status.is_server_error() {
                        return Err(error);
                    }
                    error
                }
                Err(error) if Self::is_retryable_error(&error) => error,
                Err(error) => return Err(error),
            };

            if attempt >= self.config.retry_attempts {
                return Err(error);
            }
            warn!("Schema download failed ({}), retrying {}", error, url);
            self.wait_before_retry(attempt).await;
            attempt += 1;
        }
    }

    /// Single request bounded by the configured timeout
    async fn make_request(&self, url: &str) -> Result<Response> {
        debug!("GET {}", url);
        timeout(
            Duration::from_secs(self.config.timeout_seconds),
            self.client.get(url).send(),
        )
        .await
        .map_err(|_| NfoError::Timeout {
            url: url.to_string(),
            timeout_seconds: self.config.timeout_seconds,
        })?
        .map_err(NfoError::from)
    }

    async fn wait_before_retry(&self, attempt: u32) {
        let delay_ms = self
            .config
            .retry_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        sleep(Duration::from_millis(delay_ms.min(self.config.max_retry_delay_ms))).await;
    }

    fn is_retryable_error(error: &NfoError) -> bool {
        match error {
            NfoError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            NfoError::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Online fetcher: http(s) URLs are downloaded, anything else is read as a
/// local path (with an optional `file://` prefix).
#[async_trait]
impl SchemaFetcher for AsyncHttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if is_remote(url) {
            return self.download_schema(url).await;
        }
        let path = url.strip_prefix("file://").unwrap_or(url);
        Ok(tokio::fs::read(path).await?)
    }
}

pub fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_bounds_the_wait() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout_seconds, 10);
        assert_eq!(config.retry_attempts, 0);
        assert!(config.user_agent.starts_with("nfo-standard/"));
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://xsd.nfostandard.com/main.xsd"));
        assert!(is_remote("http://x/s.xsd"));
        assert!(!is_remote("schemas/main.xsd"));
        assert!(!is_remote("file:///tmp/main.xsd"));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(AsyncHttpClient::is_retryable_error(&NfoError::Timeout {
            url: "http://x".to_string(),
            timeout_seconds: 1,
        }));
        assert!(!AsyncHttpClient::is_retryable_error(&NfoError::HttpStatus {
            url: "http://x".to_string(),
            status: 404,
        }));
    }

    #[tokio::test]
    async fn test_fetch_reads_local_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("main.xsd");
        std::fs::write(&path, "<xs:schema/>").unwrap();

        let client = AsyncHttpClient::new(HttpClientConfig::default()).unwrap();
        let plain = client.fetch(path.to_str().unwrap()).await.unwrap();
        let prefixed = client
            .fetch(&format!("file://{}", path.display()))
            .await
            .unwrap();

        assert_eq!(plain, b"<xs:schema/>");
        assert_eq!(prefixed, plain);
    }

    #[tokio::test]
    async fn test_unreachable_host_fails() {
        let client = AsyncHttpClient::new(HttpClientConfig {
            timeout_seconds: 2,
            ..HttpClientConfig::default()
        })
        .unwrap();

        let err = client.fetch("http://127.0.0.1:9/main.xsd").await.unwrap_err();
        assert_eq!(err.code(), "SchemaLoadError");
    }
}
