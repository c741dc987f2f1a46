//! Raw feed event decoding: loosely-typed delivery payloads → [`FeedEvent`].
//!
//! Pure deterministic mapping. Each raw name the translator understands has
//! one payload shape, decoded with serde instead of ad-hoc field access:
//!
//!   StartPeriod          {period, time}
//!   EndPeriod            {period, time?}
//!   SportingEventCreated {name, homeTeam, awayTeam, scheduledAt}
//!   StartPossession      {id, time, startPossessionAttributes}
//!   ObservationRemoved   {id}
//!   Shot, Goal, ...      {id, time, description?, <kind>Attributes}
//!   (all others)         → None (not translated)

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{ObservationKind, SportingEvent};
use crate::transport::DeliveryData;
use crate::types::{Error, ObservationId, Result};

/// Raw event names the translator subscribes to, in subscription order.
pub const RAW_EVENT_NAMES: [&str; 11] = [
    "Shot",
    "Goal",
    "BallLoss",
    "Substitution",
    "GoalCorrection",
    "PenaltyGiven",
    "StartPossession",
    "SportingEventCreated",
    "EndPeriod",
    "StartPeriod",
    "ObservationRemoved",
];

/// Typed form of a raw feed event.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    StartPeriod {
        period: u32,
        time: f64,
        occurred_on: Option<String>,
    },
    EndPeriod {
        period: u32,
        time: Option<f64>,
        occurred_on: Option<String>,
    },
    SportingEventCreated(SportingEvent),
    StartPossession {
        id: ObservationId,
        time: f64,
        attributes: Map<String, Value>,
    },
    ObservationRemoved {
        id: ObservationId,
    },
    Observation {
        kind: ObservationKind,
        id: ObservationId,
        time: f64,
        description: Option<String>,
        attributes: Map<String, Value>,
    },
}

impl FeedEvent {
    /// Raw feed name this event was decoded from.
    pub fn raw_name(&self) -> &'static str {
        match self {
            FeedEvent::StartPeriod { .. } => "StartPeriod",
            FeedEvent::EndPeriod { .. } => "EndPeriod",
            FeedEvent::SportingEventCreated(_) => "SportingEventCreated",
            FeedEvent::StartPossession { .. } => "StartPossession",
            FeedEvent::ObservationRemoved { .. } => "ObservationRemoved",
            FeedEvent::Observation { kind, .. } => kind.raw_name(),
        }
    }
}

/// Period index, sent either as a number or as a numeric string.
fn period_index<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Number(u32),
        Text(String),
    }

    match Wire::deserialize(deserializer)? {
        Wire::Number(n) => Ok(n),
        Wire::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid period {s:?}"))),
    }
}

#[derive(Deserialize)]
struct PeriodPayload {
    #[serde(deserialize_with = "period_index")]
    period: u32,
    #[serde(default)]
    time: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPossessionPayload {
    id: ObservationId,
    time: f64,
    #[serde(default)]
    start_possession_attributes: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct RemovalPayload {
    id: ObservationId,
}

#[derive(Deserialize)]
struct ObservationPayload {
    id: ObservationId,
    time: f64,
    #[serde(default)]
    description: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

fn decode<T: for<'de> Deserialize<'de>>(name: &str, attributes: &Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(attributes.clone()))
        .map_err(|e| Error::decode(format!("{name}: {e}")))
}

/// Decode a raw delivery into a [`FeedEvent`].
///
/// Returns `Ok(None)` for names that are not translated and `Err` for a
/// known name whose payload is malformed.
pub fn translate_raw_event(name: &str, data: &DeliveryData) -> Result<Option<FeedEvent>> {
    let attributes = &data.event_attributes;
    let occurred_on = data.occurred_on.clone();

    let event = match name {
        "StartPeriod" => {
            let payload: PeriodPayload = decode(name, attributes)?;
            let time = payload
                .time
                .ok_or_else(|| Error::decode("StartPeriod: missing field `time`"))?;
            FeedEvent::StartPeriod {
                period: payload.period,
                time,
                occurred_on,
            }
        }

        "EndPeriod" => {
            let payload: PeriodPayload = decode(name, attributes)?;
            FeedEvent::EndPeriod {
                period: payload.period,
                time: payload.time,
                occurred_on,
            }
        }

        "SportingEventCreated" => FeedEvent::SportingEventCreated(decode(name, attributes)?),

        "StartPossession" => {
            let payload: StartPossessionPayload = decode(name, attributes)?;
            FeedEvent::StartPossession {
                id: payload.id,
                time: payload.time,
                attributes: payload.start_possession_attributes.unwrap_or_default(),
            }
        }

        "ObservationRemoved" => {
            let payload: RemovalPayload = decode(name, attributes)?;
            FeedEvent::ObservationRemoved { id: payload.id }
        }

        _ => match ObservationKind::from_raw_name(name) {
            Some(kind) => {
                let mut payload: ObservationPayload = decode(name, attributes)?;
                let attributes = match payload.rest.remove(kind.attributes_key()) {
                    Some(Value::Object(map)) => map,
                    Some(Value::Null) | None => Map::new(),
                    Some(other) => {
                        return Err(Error::decode(format!(
                            "{name}: {} must be an object, got {other}",
                            kind.attributes_key()
                        )))
                    }
                };
                FeedEvent::Observation {
                    kind,
                    id: payload.id,
                    time: payload.time,
                    description: payload.description.or_else(|| data.description.clone()),
                    attributes,
                }
            }
            // Not part of the match timeline
            None => return Ok(None),
        },
    };

    Ok(Some(event))
}
