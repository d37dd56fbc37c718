pub mod participation_throttle;
pub mod presence_tracker;
