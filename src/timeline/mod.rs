//! Match timeline state machine.
//!
//! [`TimelineState`] owns the current period and the possession stack and
//! turns each typed [`FeedEvent`] into the ordered list of [`MatchEvent`]s to
//! emit. It performs no I/O and never calls back into subscribers, so the
//! translator can apply an event under its lock and dispatch afterwards.
//!
//! An event is applied atomically: if it fails (time normalization before any
//! period started), the state is left untouched and nothing is emitted.

pub mod possession;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::events::{
    FeedEvent, MatchEvent, Observation, ObservationRemoved, PeriodBoundary, Possession,
    PossessionEnd, RelativeTime,
};
use crate::types::{Error, Result};

pub use possession::PossessionStack;

/// Offset subtracted from a possession start to close the previous one, so
/// the close strictly precedes the open taken from the same instant.
pub const TIE_BREAK_EPSILON: f64 = 0.0001;

/// Keys owned by the enriched payloads; raw attributes may not shadow them.
const OBSERVATION_KEYS: [&str; 4] = ["time", "id", "description", "possession"];
const POSSESSION_KEYS: [&str; 3] = ["id", "startTime", "endTime"];

/// The period currently in play.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub index: u32,
    /// Absolute feed time at which the period started.
    pub start_time: f64,
    pub occurred_on: Option<String>,
}

/// Snapshot of the derived timeline state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurrentState {
    pub period: Option<Period>,
    pub possession: Option<Possession>,
}

#[derive(Debug, Default)]
pub struct TimelineState {
    period: Option<Period>,
    possessions: PossessionStack,
    // Set once an EndPeriod has closed the top entry; cleared when the top changes.
    top_closed: bool,
}

impl TimelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn period(&self) -> Option<&Period> {
        self.period.as_ref()
    }

    pub fn possession(&self) -> Option<&Possession> {
        self.possessions.top()
    }

    pub fn possessions(&self) -> &PossessionStack {
        &self.possessions
    }

    pub fn current_state(&self) -> CurrentState {
        CurrentState {
            period: self.period.clone(),
            possession: self.possessions.top().cloned(),
        }
    }

    /// Express absolute feed time `time` relative to the current period.
    pub fn relative_time(&self, time: f64) -> Option<RelativeTime> {
        self.period.as_ref().map(|period| RelativeTime {
            time: time - period.start_time,
            period: period.index,
        })
    }

    fn require_relative_time(&self, time: f64, event_name: &str) -> Result<RelativeTime> {
        self.relative_time(time)
            .ok_or_else(|| Error::period_not_started(event_name))
    }

    /// The possession still open, if any.
    fn open_possession(&self) -> Option<&Possession> {
        if self.top_closed {
            return None;
        }
        self.possessions.top()
    }

    /// Apply one feed event and return what to emit, in order.
    pub fn apply(&mut self, event: FeedEvent) -> Result<Vec<MatchEvent>> {
        let name = event.raw_name();
        match event {
            FeedEvent::StartPeriod {
                period,
                time,
                occurred_on,
            } => {
                self.period = Some(Period {
                    index: period,
                    start_time: time,
                    occurred_on: occurred_on.clone(),
                });
                Ok(vec![MatchEvent::StartPeriod(PeriodBoundary {
                    period,
                    occurred_on,
                })])
            }

            FeedEvent::EndPeriod {
                period,
                time,
                occurred_on,
            } => {
                let mut emitted = Vec::with_capacity(2);
                if let Some(open) = self.open_possession() {
                    let end_time = match time {
                        Some(t) => Some(self.require_relative_time(t, name)?),
                        None => None,
                    };
                    emitted.push(MatchEvent::EndPossession(PossessionEnd {
                        end_time,
                        possession: open.clone(),
                    }));
                    self.top_closed = true;
                }
                emitted.push(MatchEvent::EndPeriod(PeriodBoundary {
                    period,
                    occurred_on,
                }));
                Ok(emitted)
            }

            FeedEvent::SportingEventCreated(created) => {
                Ok(vec![MatchEvent::SportingEventCreated(created)])
            }

            FeedEvent::StartPossession {
                id,
                time,
                mut attributes,
            } => {
                let start_time = self.require_relative_time(time, name)?;
                let mut emitted = Vec::with_capacity(2);
                if let Some(open) = self.open_possession() {
                    let end_time = self.require_relative_time(time - TIE_BREAK_EPSILON, name)?;
                    emitted.push(MatchEvent::EndPossession(PossessionEnd {
                        end_time: Some(end_time),
                        possession: open.clone(),
                    }));
                }

                strip_keys(&mut attributes, &POSSESSION_KEYS);
                let possession = Possession {
                    id,
                    start_time,
                    attributes,
                };
                self.possessions.push(possession.clone());
                self.top_closed = false;
                emitted.push(MatchEvent::StartPossession(possession));
                Ok(emitted)
            }

            FeedEvent::ObservationRemoved { id } => {
                if self.possessions.pop_if_top(&id).is_some() {
                    self.top_closed = false;
                    tracing::debug!(
                        "possession_retracted: id={}, remaining={}",
                        id,
                        self.possessions.len()
                    );
                }
                Ok(vec![MatchEvent::ObservationRemoved(ObservationRemoved { id })])
            }

            FeedEvent::Observation {
                kind,
                id,
                time,
                description,
                mut attributes,
            } => {
                let time = self.require_relative_time(time, name)?;
                strip_keys(&mut attributes, &OBSERVATION_KEYS);
                Ok(vec![MatchEvent::Observation(Observation {
                    kind,
                    time,
                    id,
                    description,
                    attributes,
                    possession: self.possessions.top().cloned(),
                })])
            }
        }
    }
}

fn strip_keys(attributes: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        attributes.remove(*key);
    }
}
