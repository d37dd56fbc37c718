pub mod ffmpeg_camera_source;
pub mod jpeg_encoder;
