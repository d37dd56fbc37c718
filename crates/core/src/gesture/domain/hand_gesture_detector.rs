use crate::shared::frame::Frame;

use super::hand_landmark_detector::HandLandmarkDetector;
use super::hand_landmarks::HandLandmarks;

/// One hand seen during a detection cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct HandObservation {
    pub landmarks: HandLandmarks,
    pub raised: bool,
    /// Mean landmark position in frame pixels.
    pub center: (i32, i32),
}

/// Classifies every hand the landmark model finds as raised or lowered.
pub struct HandGestureDetector {
    landmarker: Box<dyn HandLandmarkDetector>,
}

impl HandGestureDetector {
    pub fn new(landmarker: Box<dyn HandLandmarkDetector>) -> Self {
        Self { landmarker }
    }

    /// Model errors are returned so the caller can keep its previous
    /// overlay; callers treat them as "no hands this cycle".
    pub fn detect(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<HandObservation>, Box<dyn std::error::Error>> {
        let hands = self.landmarker.detect(frame)?;
        Ok(hands
            .into_iter()
            .map(|landmarks| {
                let raised = landmarks.is_raised();
                let center = landmarks.center(frame.width(), frame.height());
                if raised {
                    log::debug!("Raised hand at {center:?}");
                }
                HandObservation {
                    landmarks,
                    raised,
                    center,
                }
            })
            .collect())
    }
}
