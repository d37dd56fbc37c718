use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::recognition::domain::encoding::PersonId;
use crate::shared::clock::Timestamp;

/// A confirmed-present person, handed to the sink once per cycle at most.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub person_id: PersonId,
    pub timestamp: Timestamp,
    /// Local calendar date the sink deduplicates on.
    pub date: NaiveDate,
    pub confidence: f64,
}

impl AttendanceEvent {
    pub fn new(person_id: PersonId, timestamp: Timestamp, confidence: f64) -> Self {
        Self {
            person_id,
            timestamp,
            date: timestamp.date_naive(),
            confidence,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationKind {
    HandRaised,
}

impl ParticipationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationKind::HandRaised => "hand_raised",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticipationEvent {
    pub person_id: PersonId,
    pub timestamp: Timestamp,
    pub date: NaiveDate,
    pub confidence: f64,
    pub kind: ParticipationKind,
}

impl ParticipationEvent {
    pub fn new(
        person_id: PersonId,
        timestamp: Timestamp,
        confidence: f64,
        kind: ParticipationKind,
    ) -> Self {
        Self {
            person_id,
            timestamp,
            date: timestamp.date_naive(),
            confidence,
            kind,
        }
    }
}

/// Sink verdict on an attendance event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttendanceOutcome {
    Accepted,
    /// The person already has attendance for that date.
    Duplicate,
}
