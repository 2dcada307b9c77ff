//! HTTP fetcher implementation
//!
//! This module handles all network reads for the pipeline, including:
//! - Building the shared HTTP client
//! - GET requests with an explicit per-request timeout
//! - Bounded retries with exponential backoff
//! - Classifying exhausted retries as transient or permanent

use crate::config::{HttpConfig, ScraperConfig};
use crate::{FetchError, FetchResult};
use reqwest::Client;
use std::time::Duration;

/// Retry and timeout settings for a fetch
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    /// Timeout applied to each individual attempt
    pub timeout: Duration,

    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub backoff_base: Duration,
}

impl FetchPolicy {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from_config(&ScraperConfig::default())
    }
}

/// Builds an HTTP client with proper configuration
///
/// One client is built per run and shared by every worker so connections
/// are pooled.
///
/// # Arguments
///
/// * `config` - The HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Returns the delay to wait after `failed_attempts` consecutive failures
///
/// The schedule doubles from `base`: 1x after the first failure, 2x after the
/// second, 4x after the third.
pub fn backoff_delay(base: Duration, failed_attempts: u32) -> Duration {
    let exponent = failed_attempts.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent)
}

/// Shared fetch client
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: FetchPolicy,
}

/// Outcome of a single attempt
enum Attempt {
    Body(Vec<u8>),
    Status(u16),
    Network(String),
}

impl Fetcher {
    pub fn new(client: Client, policy: FetchPolicy) -> Self {
        Self { client, policy }
    }

    /// Builds a fetcher from configuration
    pub fn from_config(http: &HttpConfig, scraper: &ScraperConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(http)?;
        Ok(Self::new(client, FetchPolicy::from_config(scraper)))
    }

    /// The underlying HTTP client, for callers that need their own requests
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetches a URL and returns the raw body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Network error or timeout | Retry after backoff |
    /// | Non-2xx status | Retry after backoff |
    /// | Retries exhausted, last status 4xx | `FetchError::Permanent` |
    /// | Retries exhausted, otherwise | `FetchError::Transient` |
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to fetch
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<u8>)` - Body of the first successful response
    /// * `Err(FetchError)` - Every attempt failed
    pub async fn fetch(&self, url: &str) -> FetchResult<Vec<u8>> {
        if url::Url::parse(url).is_err() {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            });
        }

        let mut last_status: Option<u16> = None;
        let mut last_message = String::new();

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                let delay = backoff_delay(self.policy.backoff_base, attempt - 1);
                tracing::debug!("Retrying {} in {:?} (attempt {})", url, delay, attempt);
                tokio::time::sleep(delay).await;
            }

            match self.attempt(url).await {
                Attempt::Body(body) => return Ok(body),
                Attempt::Status(status) => {
                    tracing::debug!("HTTP {} from {} (attempt {})", status, url, attempt);
                    last_status = Some(status);
                    last_message = format!("HTTP {}", status);
                }
                Attempt::Network(message) => {
                    tracing::debug!("Network error for {} (attempt {}): {}", url, attempt, message);
                    last_status = None;
                    last_message = message;
                }
            }
        }

        let attempts = self.policy.max_attempts;
        Err(match last_status {
            Some(status) if (400..500).contains(&status) => FetchError::Permanent {
                url: url.to_string(),
                status,
                attempts,
            },
            _ => FetchError::Transient {
                url: url.to_string(),
                attempts,
                message: last_message,
            },
        })
    }

    /// Fetches a URL and decodes the body as text
    pub async fn fetch_text(&self, url: &str) -> FetchResult<String> {
        let body = self.fetch(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn attempt(&self, url: &str) -> Attempt {
        let response = match self
            .client
            .get(url)
            .timeout(self.policy.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::Network(describe_error(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            return Attempt::Status(status.as_u16());
        }

        match response.bytes().await {
            Ok(bytes) => Attempt::Body(bytes.to_vec()),
            Err(e) => Attempt::Network(describe_error(&e)),
        }
    }
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&HttpConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(1000);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_is_non_decreasing() {
        let base = Duration::from_millis(250);
        let delays: Vec<_> = (1..=6).map(|n| backoff_delay(base, n)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_policy_from_config() {
        let config = ScraperConfig {
            max_attempts: 0,
            ..ScraperConfig::default()
        };
        let policy = FetchPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_without_request() {
        let fetcher = Fetcher::from_config(&HttpConfig::default(), &ScraperConfig::default())
            .unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert!(!err.is_transient());
    }
}
