use crate::shared::frame::Frame;

use super::hand_landmarks::HandLandmarks;

/// Domain interface for hand landmark regression.
///
/// Returns one [`HandLandmarks`] per detected hand, an empty `Vec` when no
/// hand is visible.
pub trait HandLandmarkDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandLandmarks>, Box<dyn std::error::Error>>;
}

/// Detector used when no hand model is configured. Never sees a hand.
pub struct NoHandLandmarks;

impl HandLandmarkDetector for NoHandLandmarks {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<HandLandmarks>, Box<dyn std::error::Error>> {
        Ok(Vec::new())
    }
}
