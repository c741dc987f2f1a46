//! Event translator: raw transport deliveries → enriched match events.
//!
//! The translator subscribes to every raw name it understands on one
//! [`Transport`], keeps the match timeline, and re-emits [`MatchEvent`]s to
//! local subscribers registered with [`EventTranslator::on`].
//!
//! ```text
//!   Transport ──Delivery──► translate_raw_event ──FeedEvent──► TimelineState::apply
//!                                                                   │
//!   subscribers ◄──(MatchEvent, timestamp)── trigger (in order) ◄───┘
//! ```
//!
//! When an `endPeriod` for the final period has been emitted, the translator
//! stops its transport; that is the only way a session ends on its own.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use crate::bus::FanoutRegistry;
use crate::events::{translate_raw_event, EventKind, MatchEvent, RAW_EVENT_NAMES};
use crate::timeline::{CurrentState, TimelineState};
use crate::transport::{Delivery, Transport};
use crate::types::Result;

/// Callback receiving an emitted event and the transport timestamp.
pub type Subscriber = Arc<dyn Fn(&MatchEvent, DateTime<Utc>) + Send + Sync>;

/// Stateful translator bound to one transport.
#[derive(Clone)]
pub struct EventTranslator {
    inner: Arc<TranslatorInner>,
}

struct TranslatorInner {
    transport: Arc<dyn Transport>,
    period_count: u32,
    state: Mutex<TimelineState>,
    subscribers: RwLock<FanoutRegistry<EventKind, Subscriber>>,
}

impl EventTranslator {
    /// Subscribe to `transport` and track a session of `period_count` periods.
    ///
    /// Transport handlers hold only a weak reference, so dropping every
    /// clone of the translator turns further deliveries into no-ops.
    pub fn new(transport: Arc<dyn Transport>, period_count: u32) -> Self {
        let inner = Arc::new(TranslatorInner {
            transport,
            period_count,
            state: Mutex::new(TimelineState::new()),
            subscribers: RwLock::new(FanoutRegistry::new()),
        });

        for name in RAW_EVENT_NAMES {
            let weak: Weak<TranslatorInner> = Arc::downgrade(&inner);
            inner.transport.subscribe(
                name,
                Arc::new(move |delivery: &Delivery| {
                    if let Some(inner) = weak.upgrade() {
                        inner.handle(name, delivery);
                    }
                }),
            );
        }

        Self { inner }
    }

    /// Register `callback` for `kind`. Callbacks fire in registration order.
    pub fn on<F>(&self, kind: EventKind, callback: F)
    where
        F: Fn(&MatchEvent, DateTime<Utc>) + Send + Sync + 'static,
    {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(kind, Arc::new(callback));
    }

    /// Register `callback` by application event name (`"shot"`, `"endPeriod"`, ...).
    pub fn on_name<F>(&self, event_name: &str, callback: F) -> Result<()>
    where
        F: Fn(&MatchEvent, DateTime<Utc>) + Send + Sync + 'static,
    {
        let kind = event_name.parse()?;
        self.on(kind, callback);
        Ok(())
    }

    /// Snapshot of the current period and possession.
    pub fn current_state(&self) -> CurrentState {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current_state()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub fn period_count(&self) -> u32 {
        self.inner.period_count
    }

    /// Feed one delivery as if the transport had produced it under `raw_name`.
    pub fn handle(&self, raw_name: &str, delivery: &Delivery) {
        self.inner.handle(raw_name, delivery);
    }
}

impl TranslatorInner {
    fn handle(&self, raw_name: &str, delivery: &Delivery) {
        let event = match translate_raw_event(raw_name, &delivery.data) {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::trace!("raw event {} not translated", raw_name);
                return;
            }
            Err(e) => {
                tracing::warn!(
                    "raw_event_rejected: name={}, id={:?}, error={}",
                    raw_name,
                    delivery.event_id.as_ref().map(|id| id.as_str()),
                    e
                );
                return;
            }
        };

        // Lock released before any subscriber runs.
        let emitted = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match state.apply(event) {
                Ok(emitted) => emitted,
                Err(e) => {
                    tracing::error!(
                        "timeline_fault: name={}, id={:?}, error={}",
                        raw_name,
                        delivery.event_id.as_ref().map(|id| id.as_str()),
                        e
                    );
                    return;
                }
            }
        };

        let mut finished = false;
        for event in &emitted {
            self.trigger(event, delivery.timestamp);
            if let MatchEvent::EndPeriod(boundary) = event {
                finished |= boundary.period == self.period_count;
            }
        }

        if finished {
            tracing::info!("session_finished: periods={}", self.period_count);
            self.transport.stop();
        }
    }

    fn trigger(&self, event: &MatchEvent, timestamp: DateTime<Utc>) {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers_for(&event.kind());
        for subscriber in &subscribers {
            subscriber(event, timestamp);
        }
    }
}

impl fmt::Debug for EventTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTranslator")
            .field("transport", &self.inner.transport)
            .field("period_count", &self.inner.period_count)
            .field("state", &self.current_state())
            .finish()
    }
}
