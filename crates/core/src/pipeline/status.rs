use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::recognition::domain::encoding::PersonId;

/// Snapshot reported by the control surface.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Status {
    pub running: bool,
    /// Distinct people with attendance recorded today.
    pub attendance_today: usize,
    /// Participation events accepted by the sink today. One person raising a
    /// hand twice, outside the cooldown, counts twice; this is not a count of
    /// distinct participants.
    pub participation_today: usize,
    /// Faces found in the latest detection cycle.
    pub faces_visible: usize,
    /// Raised hands found in the latest detection cycle.
    pub hands_raised: usize,
}

/// Per-calendar-day bookkeeping of what the sink has recorded.
///
/// Everything resets the first time a timestamp from a new date is seen.
#[derive(Debug, Default)]
pub struct DailyTally {
    date: Option<NaiveDate>,
    attended: HashSet<PersonId>,
    participation: usize,
}

impl DailyTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves to `date`, clearing counts if it differs from the current day.
    /// Returns true when a reset happened.
    pub fn roll_over(&mut self, date: NaiveDate) -> bool {
        if self.date == Some(date) {
            return false;
        }
        let had_day = self.date.is_some();
        self.date = Some(date);
        self.attended.clear();
        self.participation = 0;
        had_day
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Marks a person as recorded for today (accepted or already present in
    /// the sink).
    pub fn record_attendance(&mut self, person_id: PersonId) {
        self.attended.insert(person_id);
    }

    pub fn has_attended(&self, person_id: PersonId) -> bool {
        self.attended.contains(&person_id)
    }

    /// Counts one accepted participation event.
    pub fn record_participation(&mut self) {
        self.participation += 1;
    }

    pub fn attendance_count(&self) -> usize {
        self.attended.len()
    }

    pub fn participation_count(&self) -> usize {
        self.participation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, day).unwrap()
    }

    #[test]
    fn test_counts_within_a_day() {
        let mut tally = DailyTally::new();
        assert!(!tally.roll_over(date(4)));
        tally.record_attendance(1);
        tally.record_attendance(1);
        tally.record_attendance(2);
        tally.record_participation();
        assert!(!tally.roll_over(date(4)));
        assert_eq!(tally.attendance_count(), 2);
        assert_eq!(tally.participation_count(), 1);
        assert!(tally.has_attended(1));
    }

    #[test]
    fn test_participation_counts_events_not_people() {
        let mut tally = DailyTally::new();
        tally.roll_over(date(4));
        tally.record_attendance(1);
        tally.record_participation();
        tally.record_participation();
        assert_eq!(tally.attendance_count(), 1);
        assert_eq!(tally.participation_count(), 2);
    }

    #[test]
    fn test_new_date_resets() {
        let mut tally = DailyTally::new();
        tally.roll_over(date(4));
        tally.record_attendance(1);
        tally.record_participation();

        assert!(tally.roll_over(date(5)));
        assert_eq!(tally.date(), Some(date(5)));
        assert_eq!(tally.attendance_count(), 0);
        assert_eq!(tally.participation_count(), 0);
        assert!(!tally.has_attended(1));
    }

    #[test]
    fn test_status_serializes_field_names() {
        let status = Status {
            running: true,
            attendance_today: 3,
            participation_today: 1,
            faces_visible: 2,
            hands_raised: 0,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["running"], true);
        assert_eq!(json["attendance_today"], 3);
        assert_eq!(json["hands_raised"], 0);
    }
}
