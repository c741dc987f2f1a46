//! Raw event transports.
//!
//! A [`Transport`] delivers raw, loosely-typed feed events to handlers
//! registered by event name. Two implementations exist:
//!
//! - [`PushTransport`]: a Server-Sent Events stream, events delivered as they arrive.
//! - [`PullTransport`]: cursor-based polling on a fixed interval, with
//!   timestamps corrected from the server's `Date`/`Age` headers.
//!
//! ```text
//!   feed ──► Transport ──► Delivery{data, timestamp} ──► handlers (by name, in order)
//! ```

pub mod pull;
pub mod push;
pub mod sse;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::types::{EventId, FeedConfig, FeedMode, Result};

pub use pull::{FeedResponse, Fetcher, HttpFetcher, PullOptions, PullTransport, WireEvent};
pub use push::PushTransport;

/// Handler invoked for each raw event of a subscribed name.
pub type RawHandler = Arc<dyn Fn(&Delivery) + Send + Sync>;

/// Payload of a raw event as seen by handlers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryData {
    #[serde(default)]
    pub event_attributes: Map<String, Value>,
    #[serde(default, alias = "occuredOn")]
    pub occurred_on: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One raw event handed to a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Feed id, when the transport knows it.
    pub event_id: Option<EventId>,
    pub event_name: String,
    pub data: DeliveryData,
    /// Server-corrected wall-clock time (pull) or receipt time (push).
    pub timestamp: DateTime<Utc>,
}

/// Shared contract of the push and pull transports.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Register `handler` for raw events named `event_name`.
    ///
    /// May be called several times per name; handlers fire in registration
    /// order and are not de-duplicated.
    fn subscribe(&self, event_name: &str, handler: RawHandler);

    /// Terminate future delivery. Calling it again is a no-op.
    fn stop(&self);

    fn is_stopped(&self) -> bool;

    /// Begin delivery on the current tokio runtime.
    ///
    /// Only the first call starts a driver; later calls return a task that
    /// fails with [`Error::Validation`](crate::Error::Validation).
    ///
    /// Subscribe before starting: events that arrive with no registered
    /// handler are dropped. The returned task finishes once the transport is
    /// stopped (or, for push, when the stream ends or fails to connect).
    fn start(&self) -> JoinHandle<Result<()>>;
}

/// Source of wall-clock time, injectable for tests.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// One-shot start and stop flags shared by a transport and its background task.
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    started: AtomicBool,
    stopped: AtomicBool,
    token: CancellationToken,
}

impl StopSignal {
    /// Returns true only for the first call.
    pub(crate) fn begin(&self) -> bool {
        !self.started.swap(true, Ordering::SeqCst)
    }

    /// Returns true only for the call that actually stopped.
    pub(crate) fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Build the transport selected by `config.mode`.
pub fn from_config(config: &FeedConfig) -> Result<Arc<dyn Transport>> {
    let transport: Arc<dyn Transport> = match config.mode {
        FeedMode::Push => Arc::new(PushTransport::from_config(config)?),
        FeedMode::Pull => Arc::new(PullTransport::from_config(config)?),
    };
    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_signal_reports_first_stop_only() {
        let signal = StopSignal::default();
        assert!(!signal.is_stopped());
        assert!(signal.stop());
        assert!(!signal.stop());
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_stop_signal_begins_once() {
        let signal = StopSignal::default();
        assert!(signal.begin());
        assert!(!signal.begin());
        assert!(!signal.is_stopped());
    }

    #[test]
    fn test_delivery_data_accepts_legacy_spelling() {
        let data: DeliveryData = serde_json::from_value(serde_json::json!({
            "eventAttributes": {"period": 1},
            "occuredOn": "2024-05-01T12:00:00Z",
        }))
        .unwrap();
        assert_eq!(data.occurred_on.as_deref(), Some("2024-05-01T12:00:00Z"));
        assert_eq!(data.event_attributes["period"], 1);
        assert!(data.description.is_none());
    }

    #[test]
    fn test_from_config_selects_mode() {
        let mut config = FeedConfig {
            endpoint: "http://127.0.0.1:9/events".to_string(),
            ..FeedConfig::default()
        };
        let pull = from_config(&config).unwrap();
        assert!(format!("{pull:?}").starts_with("PullTransport"));

        config.mode = FeedMode::Push;
        let push = from_config(&config).unwrap();
        assert!(format!("{push:?}").starts_with("PushTransport"));
    }
}
