/// Number of points in the hand model.
pub const HAND_LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const INDEX_BASE: usize = 5;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_TIP: usize = 12;
pub const RING_TIP: usize = 16;
pub const PINKY_BASE: usize = 17;

/// Fingertips must sit this far above the wrist (normalised units) to
/// count as up.
const FINGER_UP_MARGIN: f64 = 0.05;

/// Hand height must exceed this fraction of palm width to be vertical.
const VERTICAL_RATIO: f64 = 0.7;

/// A single landmark in normalised image coordinates (0-1, y grows down).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The 21 landmarks of one detected hand.
#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    points: [Landmark; HAND_LANDMARK_COUNT],
}

impl HandLandmarks {
    pub fn new(points: [Landmark; HAND_LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    /// Builds from a slice, `None` unless it holds exactly 21 points.
    pub fn from_slice(points: &[Landmark]) -> Option<Self> {
        let points: [Landmark; HAND_LANDMARK_COUNT] = points.try_into().ok()?;
        Some(Self { points })
    }

    pub fn points(&self) -> &[Landmark; HAND_LANDMARK_COUNT] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Landmark {
        self.points[index]
    }

    /// At least two of index, middle and ring fingers above the wrist, and
    /// the hand held more vertical than horizontal.
    pub fn is_raised(&self) -> bool {
        let wrist = self.points[WRIST];
        let fingers_up = [INDEX_TIP, MIDDLE_TIP, RING_TIP]
            .iter()
            .filter(|&&tip| self.points[tip].y < wrist.y - FINGER_UP_MARGIN)
            .count();

        let hand_height = (wrist.y - self.points[MIDDLE_TIP].y).abs();
        let hand_width = (self.points[INDEX_BASE].x - self.points[PINKY_BASE].x).abs();
        let vertical = hand_height > VERTICAL_RATIO * hand_width;

        fingers_up >= 2 && vertical
    }

    /// Mean of all landmarks scaled to pixel space (truncated).
    pub fn center(&self, width: u32, height: u32) -> (i32, i32) {
        let n = HAND_LANDMARK_COUNT as f64;
        let mean_x = self.points.iter().map(|p| p.x).sum::<f64>() / n;
        let mean_y = self.points.iter().map(|p| p.y).sum::<f64>() / n;
        (
            (mean_x * width as f64) as i32,
            (mean_y * height as f64) as i32,
        )
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_open_palm_up_is_raised() {
        assert!(raised_hand(0.5).is_raised());
    }

    #[test]
    fn test_flat_hand_is_not_raised() {
        assert!(!lowered_hand(0.5).is_raised());
    }

    #[test]
    fn test_one_finger_up_is_not_raised() {
        let mut points = *raised_hand(0.5).points();
        points[MIDDLE_TIP].y = 0.78;
        points[RING_TIP].y = 0.8;
        assert!(!HandLandmarks::new(points).is_raised());
    }

    #[test]
    fn test_fingers_within_margin_do_not_count() {
        let mut points = *raised_hand(0.5).points();
        points[INDEX_TIP].y = 0.76;
        points[MIDDLE_TIP].y = 0.76;
        points[RING_TIP].y = 0.76;
        assert!(!HandLandmarks::new(points).is_raised());
    }

    #[test]
    fn test_horizontal_hand_is_not_raised() {
        // Fingers up but the palm is much wider than the hand is tall.
        let mut points = *raised_hand(0.5).points();
        points[INDEX_BASE].x = 0.2;
        points[PINKY_BASE].x = 0.8;
        assert!(!HandLandmarks::new(points).is_raised());
    }

    #[test]
    fn test_center_is_mean_in_pixels() {
        let hand = HandLandmarks::new([Landmark::new(0.25, 0.5); HAND_LANDMARK_COUNT]);
        assert_eq!(hand.center(640, 480), (160, 240));
    }

    #[test]
    fn test_from_slice_requires_21_points() {
        assert!(HandLandmarks::from_slice(&[Landmark::default(); 20]).is_none());
        assert!(HandLandmarks::from_slice(&[Landmark::default(); 21]).is_some());
    }
}
