//! Feed HTTP Client - Shared Upstream REST Client
//!
//! Wraps reqwest with a request timeout, a bounded connection pool, and a
//! concurrency semaphore shared by all venue adapters. Maps transport and
//! status failures into the `FeedError` taxonomy; adapters never touch
//! reqwest errors directly.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::ports::FeedError;

/// Configuration for the shared feed HTTP client.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
  /// Per-request timeout. Keeps a hung upstream from stalling a chunk.
  pub timeout: Duration,
  /// Maximum concurrent in-flight requests across all adapters.
  pub max_concurrent: usize,
  /// User-Agent header sent upstream.
  pub user_agent: String,
}

impl Default for FeedClientConfig {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(8),
      max_concurrent: 16,
      user_agent: format!("quotefeed/{}", env!("CARGO_PKG_VERSION")),
    }
  }
}

/// Shared HTTP client for upstream quote providers.
pub struct FeedClient {
  /// Underlying HTTP client.
  http: Client,
  /// Concurrency limiter.
  semaphore: Arc<Semaphore>,
}

impl FeedClient {
  /// Build the shared client.
  pub fn new(config: &FeedClientConfig) -> Result<Self, FeedError> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .user_agent(config.user_agent.clone())
      .build()
      .map_err(|e| FeedError::Transport {
        message: format!("failed to build HTTP client: {e}"),
        timed_out: false,
      })?;

    Ok(Self {
      http,
      semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
    })
  }

  /// Execute a GET request and decode the body as JSON.
  ///
  /// With `no_cache` set, cache-defeating headers force every call to hit
  /// the network — required where the endpoint is the sole source of
  /// truth for "now".
  pub async fn get_json(
    &self,
    url: &str,
    no_cache: bool,
  ) -> Result<serde_json::Value, FeedError> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .map_err(|_| FeedError::Transport {
        message: "client shut down".to_string(),
        timed_out: false,
      })?;

    let mut request = self.http.get(url).header(header::ACCEPT, "application/json");
    if no_cache {
      request = request
        .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(header::PRAGMA, "no-cache");
    }

    let response = request.send().await.map_err(|e| FeedError::Transport {
      message: e.to_string(),
      timed_out: e.is_timeout(),
    })?;

    let status = response.status();
    if !status.is_success() {
      return Err(FeedError::Upstream {
        status: status.as_u16(),
        rate_limited: status == StatusCode::TOO_MANY_REQUESTS,
      });
    }

    let value = response
      .json::<serde_json::Value>()
      .await
      .map_err(|e| FeedError::Malformed(format!("JSON decode failed: {e}")))?;

    debug!(url, status = status.as_u16(), "upstream GET ok");
    Ok(value)
  }
}
