/// Axis-aligned face bounding box in frame pixel space.
///
/// Stored in (top, right, bottom, left) order, the convention the identity
/// tooling writes. `right`/`bottom` are exclusive edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceBox {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Builds a box from `[x1, y1, x2, y2]` corners, clamped to the frame.
    pub fn from_corners(corners: [f64; 4], frame_w: u32, frame_h: u32) -> Self {
        let clamp_x = |v: f64| (v.round() as i32).clamp(0, frame_w as i32);
        let clamp_y = |v: f64| (v.round() as i32).clamp(0, frame_h as i32);
        Self {
            top: clamp_y(corners[1]),
            right: clamp_x(corners[2]),
            bottom: clamp_y(corners[3]),
            left: clamp_x(corners[0]),
        }
    }

    pub fn width(&self) -> i32 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Integer center, matching how hand positions are reported.
    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }
}

/// Euclidean distance between two pixel points.
pub fn pixel_distance(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = (a.0 - b.0) as f64;
    let dy = (a.1 - b.1) as f64;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_center_of_box() {
        let b = FaceBox::new(100, 300, 200, 100);
        assert_eq!(b.center(), (200, 150));
    }

    #[test]
    fn test_dimensions() {
        let b = FaceBox::new(10, 60, 40, 20);
        assert_eq!(b.width(), 40);
        assert_eq!(b.height(), 30);
        assert!(!b.is_empty());
    }

    #[test]
    fn test_inverted_box_is_empty() {
        let b = FaceBox::new(50, 10, 20, 40);
        assert_eq!(b.width(), 0);
        assert!(b.is_empty());
    }

    #[test]
    fn test_from_corners_clamps_to_frame() {
        let b = FaceBox::from_corners([-15.0, -3.0, 700.2, 90.6], 640, 480);
        assert_eq!(b, FaceBox::new(0, 640, 91, 0));
    }

    #[rstest]
    #[case::same_point((5, 5), (5, 5), 0.0)]
    #[case::horizontal((0, 0), (250, 0), 250.0)]
    #[case::three_four_five((0, 0), (3, 4), 5.0)]
    fn test_pixel_distance(#[case] a: (i32, i32), #[case] b: (i32, i32), #[case] expected: f64) {
        assert_relative_eq!(pixel_distance(a, b), expected);
    }
}
