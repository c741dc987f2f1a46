//! Cursor-based polling transport.
//!
//! Protocol, once immediately on start and then every `interval`:
//!   1. GET the endpoint, adding `last-event-id=<cursor>` once a cursor exists.
//!   2. Base time = `Date` header, plus `Age` seconds when a cache served the
//!      response. Every event in the batch carries that one timestamp.
//!   3. Dispatch each event in order to its handlers and advance the cursor to
//!      its id, whether or not anything was subscribed to that name.
//!
//! Fetches are serialized: ticks that elapse while a slow fetch is pending
//! are delayed instead of issuing an overlapping request, so batches are
//! always applied in the order they were requested.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::{HeaderName, AGE, DATE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

use super::{Clock, Delivery, DeliveryData, RawHandler, StopSignal, SystemClock, Transport};
use crate::bus::FanoutRegistry;
use crate::types::{Error, EventId, FeedConfig, Result};

/// Query parameter carrying the resumption cursor.
pub const CURSOR_PARAM: &str = "last-event-id";

/// One event as it appears in a polling response body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireEvent {
    pub event_id: EventId,
    pub event_name: String,
    #[serde(default)]
    pub event_attributes: Map<String, Value>,
    #[serde(default, alias = "occured_on")]
    pub occurred_on: Option<String>,
}

/// Decoded polling response: clock headers plus the ordered event batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedResponse {
    pub date: Option<String>,
    pub age: Option<String>,
    pub events: Vec<WireEvent>,
}

/// Performs one polling request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch events strictly after `cursor` (all events when `None`).
    async fn fetch(&self, cursor: Option<EventId>) -> Result<FeedResponse>;
}

/// `reqwest`-backed fetcher for a JSON polling endpoint.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    endpoint: String,
}

impl HttpFetcher {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::new(client, config.endpoint.clone()))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, cursor: Option<EventId>) -> Result<FeedResponse> {
        let mut request = self.client.get(&self.endpoint);
        if let Some(cursor) = &cursor {
            request = request.query(&[(CURSOR_PARAM, cursor.as_str())]);
        }

        let response = request.send().await?.error_for_status()?;
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let date = header(DATE);
        let age = header(AGE);
        let events = response.json::<Vec<WireEvent>>().await?;

        Ok(FeedResponse { date, age, events })
    }
}

/// Compute the batch timestamp from the `Date` and `Age` headers.
///
/// A missing or unparseable `Date` is an error; a malformed `Age` is ignored.
pub fn server_timestamp(date: Option<&str>, age: Option<&str>) -> Result<DateTime<Utc>> {
    let date = date.ok_or_else(|| Error::invalid_header("Date header missing"))?;
    let base = DateTime::parse_from_rfc2822(date.trim())
        .map_err(|e| Error::invalid_header(format!("Date header {date:?}: {e}")))?
        .with_timezone(&Utc);

    let age_secs = age
        .and_then(|a| a.trim().parse::<i64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(0);

    Ok(base + ChronoDuration::seconds(age_secs))
}

/// Polling cadence and request bound.
#[derive(Debug, Clone, Copy)]
pub struct PullOptions {
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl Default for PullOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl PullOptions {
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::validation("poll interval must be greater than zero"));
        }
        Ok(())
    }
}

impl From<&FeedConfig> for PullOptions {
    fn from(config: &FeedConfig) -> Self {
        Self {
            interval: config.poll_interval,
            request_timeout: config.request_timeout,
        }
    }
}

/// Polling transport with a monotonic resumption cursor.
#[derive(Clone)]
pub struct PullTransport {
    shared: Arc<PullShared>,
}

struct PullShared {
    fetcher: Arc<dyn Fetcher>,
    options: PullOptions,
    clock: Arc<dyn Clock>,
    handlers: RwLock<FanoutRegistry<String, RawHandler>>,
    cursor: Mutex<Option<EventId>>,
    stop: StopSignal,
}

impl PullTransport {
    pub fn new(fetcher: Arc<dyn Fetcher>, options: PullOptions) -> Self {
        Self::with_clock(fetcher, options, Arc::new(SystemClock))
    }

    /// The clock is only consulted to log drift against the server time.
    pub fn with_clock(fetcher: Arc<dyn Fetcher>, options: PullOptions, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(PullShared {
                fetcher,
                options,
                clock,
                handlers: RwLock::new(FanoutRegistry::new()),
                cursor: Mutex::new(None),
                stop: StopSignal::default(),
            }),
        }
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        let options = PullOptions::from(config);
        options.validate()?;
        let fetcher = HttpFetcher::from_config(config)?;
        Ok(Self::new(Arc::new(fetcher), options))
    }

    /// Id of the last event processed, if any.
    pub fn cursor(&self) -> Option<EventId> {
        self.shared.current_cursor()
    }

    /// Run one fetch-and-dispatch cycle; returns the number of events processed.
    pub async fn poll_once(&self) -> Result<usize> {
        self.shared.poll_once().await
    }

    /// Dispatch an already-fetched batch as if it were a polling response.
    ///
    /// The whole batch is dispatched even if a handler stops the transport;
    /// stopping only prevents further fetches.
    pub fn process_batch(&self, events: Vec<WireEvent>, timestamp: DateTime<Utc>) -> usize {
        self.shared.process_batch(events, timestamp)
    }
}

impl PullShared {
    fn current_cursor(&self) -> Option<EventId> {
        self.cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn poll_once(&self) -> Result<usize> {
        let cursor = self.current_cursor();
        let response = timeout(self.options.request_timeout, self.fetcher.fetch(cursor.clone()))
            .await
            .map_err(|_| {
                Error::timeout(format!(
                    "fetch did not complete within {:?}",
                    self.options.request_timeout
                ))
            })??;

        let timestamp = server_timestamp(response.date.as_deref(), response.age.as_deref())?;
        let drift = timestamp - self.clock.now();
        tracing::trace!("server_clock_drift_ms={}", drift.num_milliseconds());

        let processed = self.process_batch(response.events, timestamp);
        tracing::debug!(
            "pull_batch_processed: events={}, requested_after={:?}, cursor={:?}",
            processed,
            cursor.as_ref().map(EventId::as_str),
            self.current_cursor().as_ref().map(EventId::as_str),
        );
        Ok(processed)
    }

    async fn run(self: Arc<Self>) -> Result<()> {
        self.options.validate()?;
        let mut ticker = interval(self.options.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("pull_transport_started: interval={:?}", self.options.interval);

        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                _ = ticker.tick() => {}
            }
            // Not raced against stop: an in-flight fetch runs to completion.
            if let Err(e) = self.poll_once().await {
                tracing::warn!("pull_cycle_failed: {}", e);
            }
        }
        Ok(())
    }

    fn process_batch(&self, events: Vec<WireEvent>, timestamp: DateTime<Utc>) -> usize {
        let count = events.len();
        for event in events {
            let handlers = self
                .handlers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .handlers_for(event.event_name.as_str());

            if handlers.is_empty() {
                tracing::trace!("no handler for event {}", event.event_name);
            } else {
                let delivery = Delivery {
                    event_id: Some(event.event_id.clone()),
                    event_name: event.event_name,
                    data: DeliveryData {
                        event_attributes: event.event_attributes,
                        occurred_on: event.occurred_on,
                        description: None,
                    },
                    timestamp,
                };
                for handler in &handlers {
                    handler(&delivery);
                }
            }

            *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = Some(event.event_id);
        }
        count
    }
}

impl Transport for PullTransport {
    fn subscribe(&self, event_name: &str, handler: RawHandler) {
        self.shared
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(event_name.to_string(), handler);
    }

    fn stop(&self) {
        if self.shared.stop.stop() {
            tracing::info!(
                "pull_transport_stopped: cursor={:?}",
                self.shared.current_cursor().as_ref().map(EventId::as_str)
            );
        }
    }

    fn is_stopped(&self) -> bool {
        self.shared.stop.is_stopped()
    }

    fn start(&self) -> JoinHandle<Result<()>> {
        if !self.shared.stop.begin() {
            return tokio::spawn(async { Err(Error::validation("pull transport already started")) });
        }
        tokio::spawn(self.shared.clone().run())
    }
}

impl fmt::Debug for PullTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PullTransport")
            .field("options", &self.shared.options)
            .field("cursor", &self.shared.current_cursor())
            .field("stopped", &self.shared.stop.is_stopped())
            .finish()
    }
}
