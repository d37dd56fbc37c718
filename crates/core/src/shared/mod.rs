pub mod clock;
pub mod constants;
pub mod face_box;
pub mod frame;
pub mod letterbox;
pub mod model_resolver;
pub mod settings;
pub mod snapshot_slot;
pub mod video_metadata;
