//! Runtime configuration parsed from environment variables.
//!
//! Every knob has a default; unparseable values fall back to the default
//! rather than failing startup. Only the bind address is validated because
//! the server cannot start without it.

use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";

/// Same-origin request timeout.
pub const DEFAULT_INTERNAL_TIMEOUT_MS: u64 = 10_000;
/// Third-party request timeout.
pub const DEFAULT_EXTERNAL_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// HTTP statuses that trigger a retry on the internal client.
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bind address {addr}: {reason}")]
    InvalidBindAddr { addr: String, reason: String },
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// SERVER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl ServerConfig {
    /// Build from environment variables.
    ///
    /// - `BIND_ADDR`: default `0.0.0.0`
    /// - `PORT`: default 3000
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_owned()),
            port: env_parse("PORT", DEFAULT_PORT),
        }
    }

    /// # Errors
    ///
    /// Returns an error if `bind_addr` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidBindAddr {
                addr: self.bind_addr.clone(),
                reason: e.to_string(),
            })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: DEFAULT_BIND_ADDR.to_owned(), port: DEFAULT_PORT }
    }
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

/// Retry policy for transient failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub retryable_statuses: Vec<u16>,
}

impl RetryPolicy {
    /// No retries at all; used by the external client.
    #[must_use]
    pub fn disabled() -> Self {
        Self { max_retries: 0, base_delay: Duration::ZERO, retryable_statuses: Vec::new() }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            retryable_statuses: RETRYABLE_STATUS_CODES.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    /// Same-origin client settings with the given base URL.
    #[must_use]
    pub fn internal(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            timeout: Duration::from_millis(DEFAULT_INTERNAL_TIMEOUT_MS),
            retry: RetryPolicy::default(),
        }
    }

    /// Third-party client settings: longer timeout, no retry.
    #[must_use]
    pub fn external(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            timeout: Duration::from_millis(DEFAULT_EXTERNAL_TIMEOUT_MS),
            retry: RetryPolicy::disabled(),
        }
    }

    /// Build internal client settings from environment variables.
    ///
    /// - `QPMATRIX_BASE_URL`: default `http://127.0.0.1:3000`
    /// - `QPMATRIX_HTTP_TIMEOUT_MS`: default 10000
    /// - `QPMATRIX_HTTP_MAX_RETRIES`: default 3
    /// - `QPMATRIX_HTTP_RETRY_DELAY_MS`: default 1000
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("QPMATRIX_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let mut config = Self::internal(base_url);
        config.timeout = Duration::from_millis(env_parse("QPMATRIX_HTTP_TIMEOUT_MS", DEFAULT_INTERNAL_TIMEOUT_MS));
        config.retry.max_retries = env_parse("QPMATRIX_HTTP_MAX_RETRIES", DEFAULT_MAX_RETRIES);
        config.retry.base_delay =
            Duration::from_millis(env_parse("QPMATRIX_HTTP_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS));
        config
    }

    /// Replace the base URL, keeping timeout and retry settings.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    /// External client settings from `QPMATRIX_EXTERNAL_TIMEOUT_MS`.
    #[must_use]
    pub fn external_from_env(base_url: impl Into<String>) -> Self {
        let mut config = Self::external(base_url);
        config.timeout =
            Duration::from_millis(env_parse("QPMATRIX_EXTERNAL_TIMEOUT_MS", DEFAULT_EXTERNAL_TIMEOUT_MS));
        config
    }
}

/// Bearer token for external APIs, from `QPMATRIX_API_TOKEN`.
#[must_use]
pub fn api_token_from_env() -> Option<String> {
    std::env::var("QPMATRIX_API_TOKEN")
        .ok()
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
