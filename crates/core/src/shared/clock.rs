use chrono::{DateTime, Local};

/// Wall-clock instant used for every event and debounce decision.
pub type Timestamp = DateTime<Local>;

/// Source of the current time, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Local::now()
    }
}

/// Converts a configured duration, saturating values chrono cannot hold.
pub fn to_time_delta(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
