/// Resolution and frame rate requested from a capture device.
///
/// Devices are free to deliver something else; callers read the actual
/// values from [`VideoMetadata`] after opening.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureHint {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// What an opened frame source actually delivers.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    pub source: String,
}

impl VideoMetadata {
    /// True when the delivered geometry differs from what was requested.
    pub fn differs_from(&self, hint: &CaptureHint) -> bool {
        self.width != hint.width || self.height != hint.height
    }
}
