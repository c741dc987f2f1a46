//! Application-facing match events.
//!
//! The translator emits [`MatchEvent`]s to subscribers registered per
//! [`EventKind`]. Every payload serializes to the camelCase attribute shape
//! downstream consumers expect (`startTime`, `endTime`, `homeTeam`, ...).

pub mod translation;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::types::{Error, ObservationId};

pub use translation::{translate_raw_event, FeedEvent, RAW_EVENT_NAMES};

/// A time offset from the start of a period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeTime {
    pub time: f64,
    pub period: u32,
}

/// An entry of the possession stack, as emitted to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Possession {
    pub id: ObservationId,
    pub start_time: RelativeTime,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Payload of `startPeriod` / `endPeriod`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodBoundary {
    pub period: u32,
    pub occurred_on: Option<String>,
}

/// Payload of `sportingEventCreated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SportingEvent {
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub home_team: Value,
    #[serde(default)]
    pub away_team: Value,
    #[serde(default)]
    pub scheduled_at: Value,
}

/// Payload of `endPossession`.
///
/// `end_time` is `None` when a period ended without a closing time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PossessionEnd {
    pub end_time: Option<RelativeTime>,
    #[serde(flatten)]
    pub possession: Possession,
}

/// Payload of `observationRemoved`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRemoved {
    pub id: ObservationId,
}

/// Match observations re-emitted without touching timeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationKind {
    Shot,
    Goal,
    BallLoss,
    Substitution,
    GoalCorrection,
    PenaltyGiven,
}

impl ObservationKind {
    pub const ALL: [ObservationKind; 6] = [
        ObservationKind::Shot,
        ObservationKind::Goal,
        ObservationKind::BallLoss,
        ObservationKind::Substitution,
        ObservationKind::GoalCorrection,
        ObservationKind::PenaltyGiven,
    ];

    /// Name of the raw feed event.
    pub fn raw_name(self) -> &'static str {
        match self {
            ObservationKind::Shot => "Shot",
            ObservationKind::Goal => "Goal",
            ObservationKind::BallLoss => "BallLoss",
            ObservationKind::Substitution => "Substitution",
            ObservationKind::GoalCorrection => "GoalCorrection",
            ObservationKind::PenaltyGiven => "PenaltyGiven",
        }
    }

    /// Raw attribute key holding the event-specific attributes.
    pub fn attributes_key(self) -> &'static str {
        match self {
            ObservationKind::Shot => "shotAttributes",
            ObservationKind::Goal => "goalAttributes",
            ObservationKind::BallLoss => "ballLossAttributes",
            ObservationKind::Substitution => "substitutionAttributes",
            ObservationKind::GoalCorrection => "goalCorrectionAttributes",
            ObservationKind::PenaltyGiven => "penaltyGivenAttributes",
        }
    }

    pub fn event_kind(self) -> EventKind {
        match self {
            ObservationKind::Shot => EventKind::Shot,
            ObservationKind::Goal => EventKind::Goal,
            ObservationKind::BallLoss => EventKind::BallLoss,
            ObservationKind::Substitution => EventKind::Substitution,
            ObservationKind::GoalCorrection => EventKind::GoalCorrection,
            ObservationKind::PenaltyGiven => EventKind::PenaltyGiven,
        }
    }

    pub fn from_raw_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.raw_name() == name)
    }
}

/// Payload of the observation events (`shot`, `goal`, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    #[serde(skip)]
    pub kind: ObservationKind,
    pub time: RelativeTime,
    pub id: ObservationId,
    pub description: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    pub possession: Option<Possession>,
}

/// Application event names subscribers register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Shot,
    Goal,
    BallLoss,
    Substitution,
    GoalCorrection,
    PenaltyGiven,
    StartPossession,
    EndPossession,
    StartPeriod,
    EndPeriod,
    SportingEventCreated,
    ObservationRemoved,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::Shot,
        EventKind::Goal,
        EventKind::BallLoss,
        EventKind::Substitution,
        EventKind::GoalCorrection,
        EventKind::PenaltyGiven,
        EventKind::StartPossession,
        EventKind::EndPossession,
        EventKind::StartPeriod,
        EventKind::EndPeriod,
        EventKind::SportingEventCreated,
        EventKind::ObservationRemoved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Shot => "shot",
            EventKind::Goal => "goal",
            EventKind::BallLoss => "ballLoss",
            EventKind::Substitution => "substitution",
            EventKind::GoalCorrection => "goalCorrection",
            EventKind::PenaltyGiven => "penaltyGiven",
            EventKind::StartPossession => "startPossession",
            EventKind::EndPossession => "endPossession",
            EventKind::StartPeriod => "startPeriod",
            EventKind::EndPeriod => "endPeriod",
            EventKind::SportingEventCreated => "sportingEventCreated",
            EventKind::ObservationRemoved => "observationRemoved",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::validation(format!("unknown event name: {s}")))
    }
}

/// An enriched event emitted by the translator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MatchEvent {
    StartPeriod(PeriodBoundary),
    EndPeriod(PeriodBoundary),
    SportingEventCreated(SportingEvent),
    StartPossession(Possession),
    EndPossession(PossessionEnd),
    ObservationRemoved(ObservationRemoved),
    Observation(Observation),
}

impl MatchEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MatchEvent::StartPeriod(_) => EventKind::StartPeriod,
            MatchEvent::EndPeriod(_) => EventKind::EndPeriod,
            MatchEvent::SportingEventCreated(_) => EventKind::SportingEventCreated,
            MatchEvent::StartPossession(_) => EventKind::StartPossession,
            MatchEvent::EndPossession(_) => EventKind::EndPossession,
            MatchEvent::ObservationRemoved(_) => EventKind::ObservationRemoved,
            MatchEvent::Observation(observation) => observation.kind.event_kind(),
        }
    }

    /// Attribute map as delivered to the application boundary.
    pub fn attributes(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
