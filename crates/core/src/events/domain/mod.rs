pub mod event_sink;
pub mod events;
