//! Server-Sent Events push transport.
//!
//! Opens one streaming GET against the endpoint and hands every named event
//! to its handlers in stream order. Each message's `data` is the JSON
//! document `{eventAttributes, occurredOn, description}`; some producers
//! double-encode it as a JSON string, which is unwrapped.
//!
//! There is no resumption cursor here and no reconnect: when the stream ends
//! the transport's task finishes.

use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::task::JoinHandle;

use super::sse::{SseMessage, SseParser};
use super::{Clock, Delivery, DeliveryData, RawHandler, StopSignal, SystemClock, Transport};
use crate::bus::FanoutRegistry;
use crate::types::{Error, EventId, FeedConfig, Result};

/// Push transport over a Server-Sent Events stream.
#[derive(Clone)]
pub struct PushTransport {
    shared: Arc<PushShared>,
}

struct PushShared {
    client: Client,
    endpoint: String,
    clock: Arc<dyn Clock>,
    handlers: RwLock<FanoutRegistry<String, RawHandler>>,
    stop: StopSignal,
}

impl PushTransport {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self::with_clock(client, endpoint, Arc::new(SystemClock))
    }

    /// Deliveries are stamped with `clock.now()` at receipt.
    pub fn with_clock(client: Client, endpoint: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(PushShared {
                client,
                endpoint: endpoint.into(),
                clock,
                handlers: RwLock::new(FanoutRegistry::new()),
                stop: StopSignal::default(),
            }),
        }
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        // No total timeout: the stream is meant to stay open.
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self::new(client, config.endpoint.clone()))
    }

    /// Deliver one parsed SSE message; returns how many handlers ran.
    pub fn dispatch(&self, message: &SseMessage) -> Result<usize> {
        self.shared.dispatch(message)
    }
}

impl PushShared {
    fn dispatch(&self, message: &SseMessage) -> Result<usize> {
        if self.stop.is_stopped() {
            return Ok(0);
        }

        let name = message.event_type();
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers_for(name);
        if handlers.is_empty() {
            tracing::trace!("no handler for event {}", name);
            return Ok(0);
        }

        let delivery = Delivery {
            event_id: message
                .id
                .clone()
                .and_then(|id| EventId::from_string(id).ok()),
            event_name: name.to_string(),
            data: decode_data(&message.data)?,
            timestamp: self.clock.now(),
        };
        for handler in &handlers {
            handler(&delivery);
        }
        Ok(handlers.len())
    }

    fn dispatch_all(&self, messages: Vec<SseMessage>) {
        for message in messages {
            if let Err(e) = self.dispatch(&message) {
                tracing::warn!(
                    "push_event_dropped: event={}, error={}",
                    message.event_type(),
                    e
                );
            }
        }
    }

    async fn run(self: Arc<Self>) -> Result<()> {
        let request = self
            .client
            .get(&self.endpoint)
            .header(ACCEPT, "text/event-stream");

        let response = tokio::select! {
            biased;
            _ = self.stop.cancelled() => return Ok(()),
            response = request.send() => response?.error_for_status()?,
        };
        tracing::info!("push_transport_connected: endpoint={}", self.endpoint);

        let mut body = response.bytes_stream();
        let mut parser = SseParser::new();
        loop {
            // Dropping `body` on stop closes the connection.
            let chunk = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                chunk = body.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => self.dispatch_all(parser.feed(&bytes)),
                Some(Err(e)) => return Err(e.into()),
                None => {
                    self.dispatch_all(parser.finish());
                    tracing::info!("push_stream_ended: endpoint={}", self.endpoint);
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Decode an SSE `data` field, unwrapping a JSON-string-encoded document.
fn decode_data(raw: &str) -> Result<DeliveryData> {
    match serde_json::from_str::<Value>(raw)? {
        Value::String(inner) => Ok(serde_json::from_str(&inner)?),
        value => Ok(serde_json::from_value(value)?),
    }
}

impl Transport for PushTransport {
    fn subscribe(&self, event_name: &str, handler: RawHandler) {
        self.shared
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(event_name.to_string(), handler);
    }

    fn stop(&self) {
        if self.shared.stop.stop() {
            tracing::info!("push_transport_stopped: endpoint={}", self.shared.endpoint);
        }
    }

    fn is_stopped(&self) -> bool {
        self.shared.stop.is_stopped()
    }

    fn start(&self) -> JoinHandle<Result<()>> {
        if !self.shared.stop.begin() {
            return tokio::spawn(async { Err(Error::validation("push transport already started")) });
        }
        tokio::spawn(self.shared.clone().run())
    }
}

impl fmt::Debug for PushTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushTransport")
            .field("endpoint", &self.shared.endpoint)
            .field("stopped", &self.shared.stop.is_stopped())
            .finish()
    }
}
