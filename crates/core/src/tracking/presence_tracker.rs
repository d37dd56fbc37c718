use std::collections::HashMap;
use std::time::Duration;

use crate::recognition::domain::encoding::PersonId;
use crate::shared::clock::{to_time_delta, Timestamp};

/// Result of observing a matched person.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    /// Matched, but not for long enough yet.
    Seen,
    /// Matched continuously for at least the dwell time.
    Confirmed,
}

#[derive(Clone, Copy, Debug)]
struct Sighting {
    first_seen: Timestamp,
    last_seen: Timestamp,
}

/// Debounces face matches: a person is confirmed only after being matched
/// for the dwell time.
///
/// Entries survive short gaps (a missed detection cycle does not reset the
/// timer) and are dropped by [`PresenceTracker::gc`] once the person has
/// been unseen for more than twice the dwell time.
pub struct PresenceTracker {
    dwell: chrono::Duration,
    sightings: HashMap<PersonId, Sighting>,
}

impl PresenceTracker {
    pub fn new(dwell: Duration) -> Self {
        Self {
            dwell: to_time_delta(dwell),
            sightings: HashMap::new(),
        }
    }

    pub fn observe(&mut self, person_id: PersonId, now: Timestamp) -> Presence {
        let sighting = self.sightings.entry(person_id).or_insert(Sighting {
            first_seen: now,
            last_seen: now,
        });
        sighting.last_seen = now;
        if now - sighting.first_seen >= self.dwell {
            Presence::Confirmed
        } else {
            Presence::Seen
        }
    }

    /// Whether the person is currently confirmed, without recording a sighting.
    pub fn is_confirmed(&self, person_id: PersonId, now: Timestamp) -> bool {
        self.sightings
            .get(&person_id)
            .is_some_and(|s| now - s.first_seen >= self.dwell)
    }

    /// Evicts persons unseen for longer than twice the dwell time.
    /// Returns how many entries were removed.
    pub fn gc(&mut self, now: Timestamp) -> usize {
        let horizon = self.dwell * 2;
        let before = self.sightings.len();
        self.sightings.retain(|_, s| now - s.last_seen <= horizon);
        before - self.sightings.len()
    }

    pub fn tracked(&self) -> usize {
        self.sightings.len()
    }
}
