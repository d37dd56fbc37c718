//! Face localisation and identity embedding using ONNX Runtime via `ort`.
//!
//! Two models run back to back: a YOLO face detector (letterbox input,
//! confidence filter, NMS) and an ArcFace embedding network applied to each
//! face crop. Embeddings are L2-normalised and then scaled by
//! [`EMBEDDING_SCALE`], which puts a Euclidean distance of 0.6 at cosine
//! similarity 0.4, the usual ArcFace same-identity cut. That keeps the 0.6
//! default tolerance and the `1 − distance` confidence meaningful for this
//! model.

use std::path::Path;

use crate::recognition::domain::face_encoder::{EncodedFace, FaceEncoder};
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;
use crate::shared::letterbox::letterbox;

/// Fallback detector input resolution when the model shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 640;

const NMS_IOU_THRESH: f64 = 0.45;

const EMBEDDING_INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

/// Norm of an emitted embedding. For scaled vectors `d² = 0.3 · (2 − 2·cos)`,
/// so `d = 0.6` exactly when `cos = 0.4`.
pub const EMBEDDING_SCALE: f64 = 0.547_722_557_505_166_1; // sqrt(0.3)

/// Crops are widened by this fraction of the box size on each side so the
/// embedding network sees the whole face outline.
const CROP_MARGIN: f64 = 0.1;

pub struct OnnxFaceEncoder {
    detector: ort::session::Session,
    embedder: ort::session::Session,
    confidence: f64,
    max_faces: usize,
    input_size: u32,
}

impl OnnxFaceEncoder {
    pub fn new(
        detector_path: &Path,
        embedding_path: &Path,
        confidence: f64,
        max_faces: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let detector = ort::session::Session::builder()?.commit_from_file(detector_path)?;
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let embedder = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(embedding_path)?;

        // NCHW: [1, 3, H, W]
        let input_size = detector
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            detector,
            embedder,
            confidence,
            max_faces,
            input_size,
        })
    }

    fn locate(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>> {
        // YOLO pads with 114/255 gray.
        let lb = letterbox(frame, self.input_size, 114.0 / 255.0);
        let (scale, pad_x, pad_y) = (lb.scale, lb.pad_x, lb.pad_y);
        let input_value = ort::value::Tensor::from_array(lb.tensor)?;
        let outputs = self.detector.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("Face detector produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let mut dets = parse_detections(data, &shape, self.confidence, scale, pad_x, pad_y)?;
        let mut kept = nms(&mut dets, NMS_IOU_THRESH);
        kept.truncate(self.max_faces);
        Ok(kept)
    }

    fn embed(&mut self, frame: &Frame, face_box: &FaceBox) -> Result<Vec<f64>, Box<dyn std::error::Error>> {
        let tensor = crop_tensor(frame, face_box);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.embedder.run(ort::inputs![input_value])?;
        let embedding = outputs[0].try_extract_array::<f32>()?;
        let slice = embedding.as_slice().ok_or("Cannot get embedding slice")?;

        Ok(to_identity_space(slice))
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode_faces(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<EncodedFace>, Box<dyn std::error::Error>> {
        let detections = self.locate(frame)?;
        let mut faces = Vec::with_capacity(detections.len());
        for det in detections {
            let face_box =
                FaceBox::from_corners([det.x1, det.y1, det.x2, det.y2], frame.width(), frame.height());
            if face_box.is_empty() {
                continue;
            }
            let encoding = self.embed(frame, &face_box)?;
            faces.push(EncodedFace { face_box, encoding });
        }
        Ok(faces)
    }
}

// ---------------------------------------------------------------------------
// Detection post-processing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
}

/// Parses YOLO output rows `[cx, cy, w, h, conf, ...]` into frame-space boxes.
///
/// Accepts both `[1, features, detections]` and `[1, detections, features]`.
fn parse_detections(
    data: &[f32],
    shape: &[usize],
    min_confidence: f64,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected face detector output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_dets * num_feats {
        return Err(format!("Face detector output too small for shape {shape:?}").into());
    }

    let value = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    let mut dets = Vec::new();
    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < min_confidence {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        dets.push(RawDetection {
            x1: ((cx - w / 2.0) - pad_x as f64) / scale,
            y1: ((cy - h / 2.0) - pad_y as f64) / scale,
            x2: ((cx + w / 2.0) - pad_x as f64) / scale,
            y2: ((cy + h / 2.0) - pad_y as f64) / scale,
            confidence: conf,
        });
    }
    Ok(dets)
}

/// Greedy NMS: highest confidence first, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in dets.iter() {
        let overlaps = keep.iter().any(|k| {
            bbox_iou(
                &[k.x1, k.y1, k.x2, k.y2],
                &[det.x1, det.y1, det.x2, det.y2],
            ) > iou_thresh
        });
        if !overlaps {
            keep.push(det.clone());
        }
    }
    keep
}

/// IoU between two `[x1, y1, x2, y2]` boxes.
fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Crops the (margin-widened) face box and resizes it to the 112x112
/// normalised NCHW tensor the embedding network expects.
fn crop_tensor(frame: &Frame, face_box: &FaceBox) -> ndarray::Array4<f32> {
    let fw = frame.width() as i32;
    let fh = frame.height() as i32;
    let mx = (face_box.width() as f64 * CROP_MARGIN) as i32;
    let my = (face_box.height() as f64 * CROP_MARGIN) as i32;
    let left = (face_box.left - mx).clamp(0, fw - 1);
    let top = (face_box.top - my).clamp(0, fh - 1);
    let right = (face_box.right + mx).clamp(left + 1, fw);
    let bottom = (face_box.bottom + my).clamp(top + 1, fh);
    let crop_w = (right - left) as f64;
    let crop_h = (bottom - top) as f64;

    let src = frame.as_ndarray();
    let mut tensor =
        ndarray::Array4::<f32>::zeros((1, 3, EMBEDDING_INPUT_SIZE, EMBEDDING_INPUT_SIZE));
    let size = EMBEDDING_INPUT_SIZE as f64;

    for y in 0..EMBEDDING_INPUT_SIZE {
        let src_y = (top + ((y as f64 + 0.5) * crop_h / size) as i32).min(bottom - 1) as usize;
        for x in 0..EMBEDDING_INPUT_SIZE {
            let src_x = (left + ((x as f64 + 0.5) * crop_w / size) as i32).min(right - 1) as usize;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[src_y, src_x, c]] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }
    tensor
}

/// Raw network output → unit vector scaled by [`EMBEDDING_SCALE`].
fn to_identity_space(raw: &[f32]) -> Vec<f64> {
    let mut vector: Vec<f64> = raw.iter().map(|&v| v as f64).collect();
    l2_normalize(&mut vector);
    for x in vector.iter_mut() {
        *x *= EMBEDDING_SCALE;
    }
    vector
}

fn l2_normalize(v: &mut [f64]) {
    let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
