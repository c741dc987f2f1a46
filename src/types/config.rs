//! Configuration structures.
//!
//! Configuration is assembled from command-line flags and environment
//! variables by the binary; library users build it directly.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::errors::{Error, Result};

/// Global client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Feed connection configuration.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Match session configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Reject configurations that cannot drive a session.
    pub fn validate(&self) -> Result<()> {
        if self.feed.endpoint.trim().is_empty() {
            return Err(Error::validation("feed endpoint must not be empty"));
        }
        if self.feed.poll_interval.is_zero() {
            return Err(Error::validation("poll interval must be greater than zero"));
        }
        if self.session.period_count == 0 {
            return Err(Error::validation("period count must be at least 1"));
        }
        Ok(())
    }
}

/// How raw events reach the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// Server-Sent Events stream.
    Push,
    /// Cursor-based polling.
    #[default]
    Pull,
}

impl std::str::FromStr for FeedMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "push" | "sse" => Ok(FeedMode::Push),
            "pull" | "poll" => Ok(FeedMode::Pull),
            other => Err(Error::validation(format!(
                "unknown feed mode {other:?} (expected push or pull)"
            ))),
        }
    }
}

/// Feed connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Endpoint URL for the event stream or the polling resource.
    pub endpoint: String,

    /// Delivery mode.
    pub mode: FeedMode,

    /// Fixed re-poll interval (pull mode only).
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Per-request timeout for polling fetches and the push connect.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            mode: FeedMode::Pull,
            poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("matchstream/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Match session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of periods after which the session is finished.
    pub period_count: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { period_count: 2 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
