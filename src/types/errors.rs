//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the feed client.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// A raw event payload could not be decoded into its typed form.
    #[error("decode error: {0}")]
    Decode(String),

    /// Time normalization requested before any period started.
    #[error("no period started: cannot normalize time for {0}")]
    PeriodNotStarted(String),

    /// A response header was missing or malformed.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// A fetch did not complete within the configured request timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// HTTP transport errors (connect, status, body).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Convenience constructors
impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn period_not_started(event_name: impl Into<String>) -> Self {
        Self::PeriodNotStarted(event_name.into())
    }

    pub fn invalid_header(msg: impl Into<String>) -> Self {
        Self::InvalidHeader(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Whether the error came from the network or the response body rather
    /// than from the event content.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::Timeout(_) | Error::InvalidHeader(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::period_not_started("Shot").to_string(),
            "no period started: cannot normalize time for Shot"
        );
        assert_eq!(
            Error::decode("missing field `time`").to_string(),
            "decode error: missing field `time`"
        );
    }

    #[test]
    fn test_transport_classification() {
        assert!(Error::timeout("fetch").is_transport());
        assert!(Error::invalid_header("date").is_transport());
        assert!(!Error::decode("x").is_transport());
        assert!(!Error::period_not_started("Goal").is_transport());
    }
}
