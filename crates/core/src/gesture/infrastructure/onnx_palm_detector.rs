//! BlazePalm palm detector using ONNX Runtime via `ort`.
//!
//! SSD-style: one box regression and one score per anchor. Each regression
//! row is `[cx, cy, w, h, 7 × (x, y) keypoints]` relative to its anchor, in
//! input pixels. Keypoint 0 is the wrist and keypoint 2 the base of the
//! middle finger; together they say which way the fingers point.

use std::path::Path;

use crate::gesture::infrastructure::model_input::input_spec;
use crate::shared::frame::Frame;
use crate::shared::letterbox::{letterbox, InputLayout, Letterbox};

const DEFAULT_INPUT_SIZE: u32 = 192;

/// Default palm score threshold.
pub const DEFAULT_PALM_CONFIDENCE: f64 = 0.5;

const NMS_IOU_THRESH: f64 = 0.3;

/// (stride, anchors per cell). Layers sharing a stride are merged.
const ANCHOR_LAYERS: [(u32, usize); 2] = [(8, 2), (16, 6)];

const WRIST: usize = 0;
const MIDDLE_BASE: usize = 2;
const KEYPOINTS: usize = 7;
const ROW_VALUES: usize = 4 + KEYPOINTS * 2;

/// The palm box is grown by this factor so the crop holds the whole hand.
const ROI_SCALE: f64 = 2.6;
/// The crop is moved this many box heights toward the fingers.
const ROI_SHIFT: f64 = 0.5;

/// Square frame region around one detected hand, in frame pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandRoi {
    pub x0: f64,
    pub y0: f64,
    pub side: f64,
    pub score: f64,
}

impl HandRoi {
    pub fn center(&self) -> (f64, f64) {
        (self.x0 + self.side / 2.0, self.y0 + self.side / 2.0)
    }
}

pub struct OnnxPalmDetector {
    session: ort::session::Session,
    layout: InputLayout,
    input_size: u32,
    anchors: Vec<[f32; 2]>,
    confidence: f64,
    max_palms: usize,
}

impl OnnxPalmDetector {
    pub fn new(
        model_path: &Path,
        confidence: f64,
        max_palms: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;
        let (layout, input_size) = input_spec(&session, DEFAULT_INPUT_SIZE);
        let anchors = generate_anchors(input_size);
        log::info!(
            "Palm detector loaded ({input_size}x{input_size} {layout:?}, {} anchors)",
            anchors.len()
        );
        Ok(Self {
            session,
            layout,
            input_size,
            anchors,
            confidence,
            max_palms,
        })
    }

    /// Hand regions in frame pixels, best score first.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<HandRoi>, Box<dyn std::error::Error>> {
        let lb = letterbox(frame, self.input_size, 0.0);
        let input_value = ort::value::Tensor::from_array(lb.input_tensor(self.layout))?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        let n = self.anchors.len();
        let mut regressors: Option<Vec<f32>> = None;
        let mut scores: Option<Vec<f32>> = None;
        for (_, value) in outputs.iter() {
            let array = value.try_extract_array::<f32>()?;
            let data: Vec<f32> = array.iter().copied().collect();
            if data.len() == n * ROW_VALUES {
                regressors = Some(data);
            } else if data.len() == n {
                scores = Some(data);
            }
        }
        let regressors = regressors.ok_or_else(|| {
            format!("Palm model has no [{n}, {ROW_VALUES}] regression output")
        })?;
        let scores = scores.ok_or_else(|| format!("Palm model has no [{n}, 1] score output"))?;

        let mut palms = decode_palms(
            &regressors,
            &scores,
            &self.anchors,
            self.input_size,
            &lb,
            self.confidence,
        );
        let mut kept = nms(&mut palms, NMS_IOU_THRESH);
        kept.truncate(self.max_palms);
        Ok(kept.iter().map(hand_roi).collect())
    }
}

/// Anchor centers, normalised to [0, 1], in the model's output order.
fn generate_anchors(input_size: u32) -> Vec<[f32; 2]> {
    let mut anchors = Vec::new();
    for &(stride, per_cell) in &ANCHOR_LAYERS {
        let grid = (input_size / stride).max(1) as usize;
        for y in 0..grid {
            for x in 0..grid {
                let cx = (x as f32 + 0.5) / grid as f32;
                let cy = (y as f32 + 0.5) / grid as f32;
                for _ in 0..per_cell {
                    anchors.push([cx, cy]);
                }
            }
        }
    }
    anchors
}

/// A decoded palm box with the two keypoints the crop needs, in frame pixels.
#[derive(Clone, Debug, PartialEq)]
struct PalmDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    score: f64,
    wrist: (f64, f64),
    middle_base: (f64, f64),
}

fn decode_palms(
    regressors: &[f32],
    scores: &[f32],
    anchors: &[[f32; 2]],
    input_size: u32,
    lb: &Letterbox,
    threshold: f64,
) -> Vec<PalmDetection> {
    let size = input_size as f64;
    let mut palms = Vec::new();

    for (i, (&raw_score, anchor)) in scores.iter().zip(anchors).enumerate() {
        let score = sigmoid(raw_score) as f64;
        if score < threshold {
            continue;
        }
        let Some(row) = regressors.get(i * ROW_VALUES..(i + 1) * ROW_VALUES) else {
            break;
        };
        let ax = anchor[0] as f64 * size;
        let ay = anchor[1] as f64 * size;
        let point = |k: usize| lb.to_frame(ax + row[4 + k * 2] as f64, ay + row[5 + k * 2] as f64);

        let (cx, cy) = lb.to_frame(ax + row[0] as f64, ay + row[1] as f64);
        let w = row[2] as f64 / lb.scale;
        let h = row[3] as f64 / lb.scale;
        palms.push(PalmDetection {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
            score,
            wrist: point(WRIST),
            middle_base: point(MIDDLE_BASE),
        });
    }
    palms
}

/// Grows a palm box into a square crop shifted toward the fingers.
fn hand_roi(palm: &PalmDetection) -> HandRoi {
    let w = palm.x2 - palm.x1;
    let h = palm.y2 - palm.y1;
    let dx = palm.middle_base.0 - palm.wrist.0;
    let dy = palm.middle_base.1 - palm.wrist.1;
    let len = (dx * dx + dy * dy).sqrt();
    // Without usable keypoints assume an upright hand.
    let (ux, uy) = if len > f64::EPSILON {
        (dx / len, dy / len)
    } else {
        (0.0, -1.0)
    };

    let cx = (palm.x1 + palm.x2) / 2.0 + ux * h * ROI_SHIFT;
    let cy = (palm.y1 + palm.y2) / 2.0 + uy * h * ROI_SHIFT;
    let side = w.max(h) * ROI_SCALE;
    HandRoi {
        x0: cx - side / 2.0,
        y0: cy - side / 2.0,
        side,
        score: palm.score,
    }
}

fn nms(dets: &mut [PalmDetection], iou_thresh: f64) -> Vec<PalmDetection> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<PalmDetection> = Vec::new();
    for det in dets.iter() {
        if keep.iter().all(|k| bbox_iou(k, det) <= iou_thresh) {
            keep.push(det.clone());
        }
    }
    keep
}

fn bbox_iou(a: &PalmDetection, b: &PalmDetection) -> f64 {
    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = inter_w * inter_h;
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
