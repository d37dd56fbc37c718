use ndarray::ArrayView3;

/// A captured camera frame: contiguous RGB bytes in row-major order.
///
/// Pixel format conversion happens inside the frame source; everything
/// downstream works on packed RGB24.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Position of this frame in capture order, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Writes `color` at (x, y). Coordinates outside the frame are ignored,
    /// so overlays can be drawn partly off-screen.
    pub fn put_pixel(&mut self, x: i32, y: i32, color: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let channels = self.channels as usize;
        let offset = (y as usize * self.width as usize + x as usize) * channels;
        let n = channels.min(3);
        self.data[offset..offset + n].copy_from_slice(&color[..n]);
    }

    /// Returns the RGB value at (x, y), or `None` outside the frame.
    pub fn pixel(&self, x: i32, y: i32) -> Option<[u8; 3]> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 || self.channels < 3
        {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * self.channels as usize;
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3, 0);
    }

    #[test]
    fn test_as_ndarray_is_height_width_channels() {
        let mut data = vec![0u8; 24]; // 2 rows x 4 cols
        data[(4 + 1) * 3] = 200; // row=1, col=1, R
        let frame = Frame::new(data, 4, 2, 3, 0);
        let arr = frame.as_ndarray();
        assert_eq!(arr.shape(), &[2, 4, 3]);
        assert_eq!(arr[[1, 1, 0]], 200);
    }

    #[test]
    fn test_put_pixel_and_read_back() {
        let mut frame = Frame::new(vec![0u8; 3 * 3 * 3], 3, 3, 3, 0);
        frame.put_pixel(2, 1, [10, 20, 30]);
        assert_eq!(frame.pixel(2, 1), Some([10, 20, 30]));
        assert_eq!(frame.pixel(0, 0), Some([0, 0, 0]));
    }

    #[test]
    fn test_put_pixel_outside_frame_is_ignored() {
        let mut frame = Frame::new(vec![7u8; 2 * 2 * 3], 2, 2, 3, 0);
        frame.put_pixel(-1, 0, [255, 255, 255]);
        frame.put_pixel(0, 2, [255, 255, 255]);
        assert!(frame.data().iter().all(|&b| b == 7));
        assert_eq!(frame.pixel(5, 5), None);
    }

    #[test]
    fn test_clone_is_independent() {
        let frame = Frame::new(vec![100u8; 12], 2, 2, 3, 0);
        let mut cloned = frame.clone();
        cloned.put_pixel(0, 0, [0, 0, 0]);
        assert_eq!(frame.pixel(0, 0), Some([100, 100, 100]));
    }
}
