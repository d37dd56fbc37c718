pub mod events;
pub mod gesture;
pub mod pipeline;
pub mod recognition;
pub mod shared;
pub mod tracking;
pub mod video;
