use crate::shared::frame::Frame;
use crate::shared::video_metadata::{CaptureHint, VideoMetadata};

/// A live or recorded stream of RGB frames.
///
/// The source location (device, file, URL) is fixed at construction; `open`
/// only negotiates geometry. Implementations adapt to whatever the device
/// actually delivers and report it in the returned [`VideoMetadata`].
pub trait FrameSource: Send {
    fn open(&mut self, hint: &CaptureHint) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Next frame, or `None` at end of stream.
    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Frees the device. Safe to call repeatedly or before `open`.
    fn release(&mut self);
}
