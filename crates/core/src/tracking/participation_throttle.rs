use std::collections::HashMap;
use std::time::Duration;

use crate::recognition::domain::encoding::PersonId;
use crate::shared::clock::{to_time_delta, Timestamp};

/// Per-person cooldown on participation events.
pub struct ParticipationThrottle {
    cooldown: chrono::Duration,
    last_accepted: HashMap<PersonId, Timestamp>,
}

impl ParticipationThrottle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: to_time_delta(cooldown),
            last_accepted: HashMap::new(),
        }
    }

    /// Accepts (and records `now`) unless the person's previous accepted
    /// event is less than the cooldown ago.
    pub fn try_accept(&mut self, person_id: PersonId, now: Timestamp) -> bool {
        if let Some(last) = self.last_accepted.get(&person_id) {
            if now - *last < self.cooldown {
                return false;
            }
        }
        self.last_accepted.insert(person_id, now);
        true
    }

    /// Forgets entries whose cooldown has expired; they would be accepted
    /// anyway. Returns how many were removed.
    pub fn gc(&mut self, now: Timestamp) -> usize {
        let cooldown = self.cooldown;
        let before = self.last_accepted.len();
        self.last_accepted.retain(|_, last| now - *last < cooldown);
        before - self.last_accepted.len()
    }

    pub fn tracked(&self) -> usize {
        self.last_accepted.len()
    }
}
