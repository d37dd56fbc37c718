use super::events::{AttendanceEvent, AttendanceOutcome, ParticipationEvent};

/// External system of record for attendance and participation.
///
/// The sink owns idempotency: at most one accepted attendance per person
/// per calendar date. Participation is fire-and-forget. Failures are
/// reported but the pipeline never retries within a cycle.
pub trait EventSink: Send {
    fn attendance(
        &mut self,
        event: &AttendanceEvent,
    ) -> Result<AttendanceOutcome, Box<dyn std::error::Error>>;

    fn participation(
        &mut self,
        event: &ParticipationEvent,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
