//! Stream Client Settings
//!
//! Configuration types for the tick stream client, loaded from environment
//! variables.

use std::time::Duration;

use url::Url;

use crate::infrastructure::delivery::{DEFAULT_ERROR_CAPACITY, DEFAULT_TICK_CAPACITY};
use crate::infrastructure::tiqs::reconnect::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};

/// Default Tiqs streaming endpoint.
pub const DEFAULT_STREAM_URL: &str = "wss://wss.tiqs.trading";

/// Tiqs session credentials.
///
/// The token is an already-authenticated session token obtained out of band.
#[derive(Clone)]
pub struct Credentials {
    app_id: String,
    token: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(app_id: String, token: String) -> Self {
        Self { app_id, token }
    }

    /// Get the application id.
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Get the session token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &"[REDACTED]")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    /// Base WebSocket URL, without credentials.
    pub url: String,
    /// Fixed delay between dial attempts.
    pub retry_delay: Duration,
    /// Dial attempts per connect.
    pub max_retries: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Delivery queue capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// Capacity of the tick queue.
    pub tick_capacity: usize,
    /// Capacity of the error queue.
    pub error_capacity: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            tick_capacity: DEFAULT_TICK_CAPACITY,
            error_capacity: DEFAULT_ERROR_CAPACITY,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Session credentials.
    pub credentials: Credentials,
    /// Connection settings.
    pub stream: StreamSettings,
    /// Delivery queue capacities.
    pub queues: QueueSettings,
    /// Prometheus listener port (0 = disabled).
    pub metrics_port: u16,
}

impl StreamConfig {
    /// Create configuration with default settings.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            stream: StreamSettings::default(),
            queues: QueueSettings::default(),
            metrics_port: 0,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// empty, or if a queue capacity is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Optional values that fail to parse fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Same as [`StreamConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_id = required(&lookup, "TIQS_APP_ID")?;
        let token = required(&lookup, "TIQS_TOKEN")?;

        let defaults = StreamSettings::default();
        let stream = StreamSettings {
            url: lookup("TIQS_STREAM_URL")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.url),
            retry_delay: parse_or(&lookup, "TIQS_RETRY_DELAY_MS")
                .map_or(defaults.retry_delay, Duration::from_millis),
            max_retries: parse_or(&lookup, "TIQS_MAX_RETRIES").unwrap_or(defaults.max_retries),
        };

        let defaults = QueueSettings::default();
        let queues = QueueSettings {
            tick_capacity: parse_or(&lookup, "TIQS_TICK_QUEUE_CAPACITY")
                .unwrap_or(defaults.tick_capacity),
            error_capacity: parse_or(&lookup, "TIQS_ERROR_QUEUE_CAPACITY")
                .unwrap_or(defaults.error_capacity),
        };

        if queues.tick_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("TIQS_TICK_QUEUE_CAPACITY".to_string()));
        }
        if queues.error_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("TIQS_ERROR_QUEUE_CAPACITY".to_string()));
        }

        Ok(Self {
            credentials: Credentials::new(app_id, token),
            stream,
            queues,
            metrics_port: parse_or(&lookup, "TIQS_METRICS_PORT").unwrap_or(0),
        })
    }

    /// Build the authenticated stream URL (`<base>?appId=..&token=..`).
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` if the base URL cannot be parsed.
    pub fn stream_url(&self) -> Result<String, ConfigError> {
        let mut url = Url::parse(&self.stream.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {e}", self.stream.url)))?;

        url.query_pairs_mut()
            .append_pair("appId", self.credentials.app_id())
            .append_pair("token", self.credentials.token());

        Ok(url.into())
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Stream URL cannot be parsed.
    #[error("invalid stream URL: {0}")]
    InvalidUrl(String),
    /// Queue capacity is zero.
    #[error("{0} must be greater than zero")]
    ZeroCapacity(String),
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_or<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}
