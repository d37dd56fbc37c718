use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::events::domain::event_sink::EventSink;
use crate::events::domain::events::{AttendanceEvent, AttendanceOutcome, ParticipationEvent};
use crate::recognition::domain::encoding::PersonId;

#[derive(Default)]
struct Recorded {
    attended: HashSet<(PersonId, NaiveDate)>,
    attendance: Vec<AttendanceEvent>,
    participation: Vec<ParticipationEvent>,
}

/// In-memory sink. Clones share the same records, so a host can keep a
/// handle for inspection while the pipeline owns another.
#[derive(Clone, Default)]
pub struct MemoryEventSink {
    inner: Arc<Mutex<Recorded>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attendance_events(&self) -> Vec<AttendanceEvent> {
        self.lock().attendance.clone()
    }

    pub fn participation_events(&self) -> Vec<ParticipationEvent> {
        self.lock().participation.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventSink for MemoryEventSink {
    fn attendance(
        &mut self,
        event: &AttendanceEvent,
    ) -> Result<AttendanceOutcome, Box<dyn std::error::Error>> {
        let mut recorded = self.lock();
        if !recorded.attended.insert((event.person_id, event.date)) {
            return Ok(AttendanceOutcome::Duplicate);
        }
        recorded.attendance.push(event.clone());
        Ok(AttendanceOutcome::Accepted)
    }

    fn participation(
        &mut self,
        event: &ParticipationEvent,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.lock().participation.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::domain::events::ParticipationKind;
    use chrono::{Local, TimeZone};

    #[test]
    fn test_attendance_once_per_person_per_date() {
        let mut sink = MemoryEventSink::new();
        let morning = Local.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap();
        let noon = Local.with_ymd_and_hms(2024, 9, 2, 12, 0, 0).unwrap();
        let next_day = Local.with_ymd_and_hms(2024, 9, 3, 8, 0, 0).unwrap();

        assert_eq!(
            sink.attendance(&AttendanceEvent::new(1, morning, 0.7)).unwrap(),
            AttendanceOutcome::Accepted
        );
        assert_eq!(
            sink.attendance(&AttendanceEvent::new(1, noon, 0.9)).unwrap(),
            AttendanceOutcome::Duplicate
        );
        assert_eq!(
            sink.attendance(&AttendanceEvent::new(2, noon, 0.9)).unwrap(),
            AttendanceOutcome::Accepted
        );
        assert_eq!(
            sink.attendance(&AttendanceEvent::new(1, next_day, 0.8)).unwrap(),
            AttendanceOutcome::Accepted
        );
        assert_eq!(sink.attendance_events().len(), 3);
    }

    #[test]
    fn test_clones_share_records() {
        let observer = MemoryEventSink::new();
        let mut sink = observer.clone();
        let ts = Local.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap();
        sink.participation(&ParticipationEvent::new(3, ts, 0.5, ParticipationKind::HandRaised))
            .unwrap();
        assert_eq!(observer.participation_events().len(), 1);
    }
}
