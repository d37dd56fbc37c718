use super::frame::Frame;

/// Memory order a model expects for its image input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputLayout {
    /// `[1, 3, H, W]`
    Nchw,
    /// `[1, H, W, 3]`
    Nhwc,
}

/// A frame (or a square region of it) resized into a square model input
/// with aspect ratio preserved.
pub struct Letterbox {
    /// NCHW float32 tensor, values in [0, 1].
    pub tensor: ndarray::Array4<f32>,
    pub scale: f64,
    pub pad_x: u32,
    pub pad_y: u32,
    /// Frame position of the sampled region's top-left corner.
    pub origin_x: f64,
    pub origin_y: f64,
}

impl Letterbox {
    /// Maps a point in model input space back to frame pixel space.
    pub fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale + self.origin_x,
            (y - self.pad_y as f64) / self.scale + self.origin_y,
        )
    }

    /// The tensor in the layout the model wants.
    pub fn input_tensor(&self, layout: InputLayout) -> ndarray::Array4<f32> {
        match layout {
            InputLayout::Nchw => self.tensor.clone(),
            InputLayout::Nhwc => self
                .tensor
                .view()
                .permuted_axes([0, 2, 3, 1])
                .as_standard_layout()
                .into_owned(),
        }
    }
}

/// Letterbox-resize a frame to `target_size` × `target_size`, filling the
/// border with `pad_value`. Nearest-neighbour sampling.
pub fn letterbox(frame: &Frame, target_size: u32, pad_value: f32) -> Letterbox {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let mut tensor = ndarray::Array4::<f32>::from_elem(
        (1, 3, target_size as usize, target_size as usize),
        pad_value,
    );

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    Letterbox {
        tensor,
        scale,
        pad_x,
        pad_y,
        origin_x: 0.0,
        origin_y: 0.0,
    }
}

/// Samples the square `side` × `side` frame region whose top-left corner is
/// (`x0`, `y0`) into a `target_size` input. Parts of the region outside the
/// frame are filled with `pad_value`.
pub fn crop_square(
    frame: &Frame,
    x0: f64,
    y0: f64,
    side: f64,
    target_size: u32,
    pad_value: f32,
) -> Letterbox {
    let t = target_size as usize;
    let scale = target_size as f64 / side.max(1.0);
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, t, t), pad_value);

    let src = frame.as_ndarray();
    let src_h = frame.height() as f64;
    let src_w = frame.width() as f64;

    for y in 0..t {
        let sy = y0 + (y as f64 + 0.5) / scale;
        if sy < 0.0 || sy >= src_h {
            continue;
        }
        for x in 0..t {
            let sx = x0 + (x as f64 + 0.5) / scale;
            if sx < 0.0 || sx >= src_w {
                continue;
            }
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[sy as usize, sx as usize, c]] as f32 / 255.0;
            }
        }
    }

    Letterbox {
        tensor,
        scale,
        pad_x: 0,
        pad_y: 0,
        origin_x: x0,
        origin_y: y0,
    }
}
