use crate::shared::frame::Frame;
use crate::shared::video_metadata::{CaptureHint, VideoMetadata};
use crate::video::domain::frame_source::FrameSource;

/// Captures frames via ffmpeg-next (libavdevice + libavcodec).
///
/// With an input format (`v4l2`, `avfoundation`, `dshow`) the source is a
/// capture device and the hint is passed as `video_size`/`framerate`.
/// Without one, the source is opened as a file or URL and the hint is
/// ignored. Each decoded frame is converted to RGB24.
pub struct FfmpegCameraSource {
    source: String,
    input_format: Option<String>,
    state: Option<OpenStream>,
}

struct OpenStream {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    /// Created on the first decoded frame; some devices only report their
    /// pixel format once streaming.
    scaler: Option<Scaler>,
    video_stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

struct Scaler {
    context: ffmpeg_next::software::scaling::Context,
    format: ffmpeg_next::format::Pixel,
    width: u32,
    height: u32,
}

// Safety: FfmpegCameraSource is owned by a single worker thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCameraSource {}

impl FfmpegCameraSource {
    pub fn new(source: impl Into<String>, input_format: Option<String>) -> Self {
        Self {
            source: source.into(),
            input_format,
            state: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    fn open_input(
        &self,
        hint: &CaptureHint,
    ) -> Result<ffmpeg_next::format::context::Input, Box<dyn std::error::Error>> {
        let Some(format_name) = self.input_format.as_deref() else {
            return Ok(ffmpeg_next::format::input(&self.source)?);
        };

        ffmpeg_next::device::register_all();
        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == format_name)
            .ok_or_else(|| format!("Capture input format '{format_name}' is not available"))?;

        let mut options = ffmpeg_next::Dictionary::new();
        options.set("video_size", &format!("{}x{}", hint.width, hint.height));
        options.set("framerate", &hint.fps.to_string());

        match ffmpeg_next::format::open_with(&self.source, &format, options)? {
            ffmpeg_next::format::context::Context::Input(ictx) => Ok(ictx),
            ffmpeg_next::format::context::Context::Output(_) => {
                Err(format!("'{}' did not open as an input", self.source).into())
            }
        }
    }
}

impl FrameSource for FfmpegCameraSource {
    fn open(&mut self, hint: &CaptureHint) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        self.release();
        ffmpeg_next::init()?;

        let ictx = self.open_input(hint)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source: self.source.clone(),
        };

        log::info!(
            "Opened {} at {}x{} @ {:.1} fps ({})",
            metadata.source,
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.codec
        );
        if self.input_format.is_some() && metadata.differs_from(hint) {
            log::warn!(
                "Requested {}x{}, device delivers {}x{}",
                hint.width,
                hint.height,
                metadata.width,
                metadata.height
            );
        }

        self.state = Some(OpenStream {
            ictx,
            decoder,
            scaler: None,
            video_stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
        });
        Ok(metadata)
    }

    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let Some(stream) = self.state.as_mut() else {
            return Err("FfmpegCameraSource: not opened".into());
        };
        stream.next_frame()
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("Released {}", self.source);
        }
    }
}

impl Drop for FfmpegCameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

impl OpenStream {
    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if self.done {
            return Ok(None);
        }

        if let Some(frame) = self.try_receive()? {
            return Ok(Some(frame));
        }

        if self.flushing {
            self.done = true;
            return Ok(None);
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(frame) = self.try_receive()? {
                    return Ok(Some(frame));
                }
                self.done = true;
                return Ok(None);
            };

            if stream.index() != self.video_stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let (width, height, format) = (decoded.width(), decoded.height(), decoded.format());
        let stale = self
            .scaler
            .as_ref()
            .map_or(true, |s| s.width != width || s.height != height || s.format != format);
        if stale {
            let context = ffmpeg_next::software::scaling::Context::get(
                format,
                width,
                height,
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )?;
            self.scaler = Some(Scaler {
                context,
                format,
                width,
                height,
            });
        }
        let scaler = self.scaler.as_mut().ok_or("Scaler not initialised")?;

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.context.run(&decoded, &mut rgb_frame)?;

        let pixels = extract_rgb_pixels(&rgb_frame, width, height);
        let frame = Frame::new(pixels, width, height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
