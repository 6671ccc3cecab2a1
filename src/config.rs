//! Client configuration: credential, endpoint, timeouts and the transport
//! retry policy.

use std::env;
use std::time::Duration;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "TRIPO_API_KEY";
/// Environment variable overriding the API base URL.
pub const API_URL_ENV: &str = "TRIPO_API_URL";

pub const DEFAULT_API_URL: &str = "https://api.tripo3d.ai/";

/// Exponential backoff for transient transport failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on the delay between attempts.
    pub max_backoff: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate the next backoff delay, clamped to `max_backoff`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next_ms = (current.as_millis() as f64 * self.multiplier) as u64;
        Duration::from_millis(next_ms).min(self.max_backoff)
    }
}

/// Settings for one client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Falls back to `TRIPO_API_KEY` when `None`.
    pub api_key: Option<String>,
    pub base_url: String,
    /// Upper bound on a single HTTP exchange, body included.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Configuration with an explicit API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Reads `TRIPO_API_KEY` and `TRIPO_API_URL` from the process environment.
    pub fn from_env() -> Self {
        let mut config = Self {
            api_key: env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()),
            ..Self::default()
        };
        if let Ok(url) = env::var(API_URL_ENV) {
            if !url.is_empty() {
                config.base_url = url;
            }
        }
        config
    }

    /// Like [`ClientConfig::from_env`], after loading a `.env` file if one exists.
    pub fn from_dotenv() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The explicit key if set, otherwise `TRIPO_API_KEY`.
    pub(crate) fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }
}
