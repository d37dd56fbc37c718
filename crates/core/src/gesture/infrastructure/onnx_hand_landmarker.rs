//! Two-stage hand landmarking using ONNX Runtime via `ort`.
//!
//! A BlazePalm detector finds every hand in the frame; each hand region is
//! cropped square and passed to a MediaPipe-style landmark model, which
//! returns 21 × 3 coordinates in crop pixels and a hand-presence score.
//! Points are mapped back to normalised frame coordinates.

use std::path::Path;

use crate::gesture::domain::hand_landmark_detector::HandLandmarkDetector;
use crate::gesture::domain::hand_landmarks::{HandLandmarks, Landmark, HAND_LANDMARK_COUNT};
use crate::gesture::infrastructure::model_input::input_spec;
use crate::gesture::infrastructure::onnx_palm_detector::{HandRoi, OnnxPalmDetector};
use crate::shared::frame::Frame;
use crate::shared::letterbox::{crop_square, InputLayout, Letterbox};

const DEFAULT_INPUT_SIZE: u32 = 224;

/// Minimum hand-presence score to report a hand.
pub const DEFAULT_PRESENCE_THRESHOLD: f64 = 0.5;

const LANDMARK_VALUES: usize = HAND_LANDMARK_COUNT * 3;

pub struct OnnxHandLandmarker {
    palms: OnnxPalmDetector,
    session: ort::session::Session,
    layout: InputLayout,
    input_size: u32,
    presence_threshold: f64,
}

impl OnnxHandLandmarker {
    pub fn new(
        palms: OnnxPalmDetector,
        landmark_model: &Path,
        presence_threshold: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .commit_from_file(landmark_model)?;
        let (layout, input_size) = input_spec(&session, DEFAULT_INPUT_SIZE);

        log::info!("Hand landmark model loaded ({input_size}x{input_size} {layout:?})");
        Ok(Self {
            palms,
            session,
            layout,
            input_size,
            presence_threshold,
        })
    }

    /// Runs the landmark model on one crop: `(coordinates, presence score)`.
    fn infer(&mut self, crop: &Letterbox) -> Result<(Vec<f32>, f32), Box<dyn std::error::Error>> {
        let input_value = ort::value::Tensor::from_array(crop.input_tensor(self.layout))?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        let mut coords: Option<Vec<f32>> = None;
        let mut score: Option<f32> = None;
        for (_, value) in outputs.iter() {
            let array = value.try_extract_array::<f32>()?;
            let data: Vec<f32> = array.iter().copied().collect();
            if data.len() >= LANDMARK_VALUES && coords.is_none() {
                coords = Some(data);
            } else if data.len() == 1 && score.is_none() {
                score = Some(data[0]);
            }
        }

        let coords = coords.ok_or("Hand model produced no landmark output")?;
        let score = score.ok_or("Hand model produced no presence score")?;
        Ok((coords, score))
    }
}

impl HandLandmarkDetector for OnnxHandLandmarker {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandLandmarks>, Box<dyn std::error::Error>> {
        let rois = self.palms.detect(frame)?;
        let input_size = self.input_size;
        let threshold = self.presence_threshold;
        collect_hands(frame, &rois, input_size, threshold, |crop| self.infer(crop))
    }
}

/// Crops every hand region, runs `infer` on it and keeps the hands whose
/// presence score clears `threshold`.
fn collect_hands<F>(
    frame: &Frame,
    rois: &[HandRoi],
    input_size: u32,
    threshold: f64,
    mut infer: F,
) -> Result<Vec<HandLandmarks>, Box<dyn std::error::Error>>
where
    F: FnMut(&Letterbox) -> Result<(Vec<f32>, f32), Box<dyn std::error::Error>>,
{
    let mut hands = Vec::with_capacity(rois.len());
    for roi in rois {
        let crop = crop_square(frame, roi.x0, roi.y0, roi.side, input_size, 0.0);
        let (coords, score) = infer(&crop)?;
        let presence = presence_probability(score) as f64;
        if presence < threshold {
            let (cx, cy) = roi.center();
            log::debug!(
                "Dropping hand near ({cx:.0}, {cy:.0}): palm {:.2}, presence {presence:.2}",
                roi.score
            );
            continue;
        }
        if let Some(hand) = to_landmarks(&coords, &crop, frame.width(), frame.height()) {
            hands.push(hand);
        }
    }
    Ok(hands)
}

/// Some exports emit a raw logit instead of a probability.
fn presence_probability(score: f32) -> f32 {
    if (0.0..=1.0).contains(&score) {
        score
    } else {
        1.0 / (1.0 + (-score).exp())
    }
}

/// Converts `[x, y, z] × 21` in crop pixels to normalised frame coordinates.
fn to_landmarks(coords: &[f32], crop: &Letterbox, width: u32, height: u32) -> Option<HandLandmarks> {
    if coords.len() < LANDMARK_VALUES {
        return None;
    }
    let points: Vec<Landmark> = coords
        .chunks_exact(3)
        .take(HAND_LANDMARK_COUNT)
        .map(|xyz| {
            let (x, y) = crop.to_frame(xyz[0] as f64, xyz[1] as f64);
            Landmark::new(x / width as f64, y / height as f64)
        })
        .collect();
    HandLandmarks::from_slice(&points)
}
