pub const FACE_DETECTOR_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const FACE_DETECTOR_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const FACE_EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const FACE_EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

pub const PALM_DETECTOR_MODEL_NAME: &str = "palm_detection_mediapipe_2023feb.onnx";
pub const PALM_DETECTOR_MODEL_URL: &str =
    "https://github.com/opencv/opencv_zoo/raw/main/models/palm_detection_mediapipe/palm_detection_mediapipe_2023feb.onnx";

pub const HAND_LANDMARK_MODEL_NAME: &str = "handpose_estimation_mediapipe_2023feb.onnx";
pub const HAND_LANDMARK_MODEL_URL: &str =
    "https://github.com/opencv/opencv_zoo/raw/main/models/handpose_estimation_mediapipe/handpose_estimation_mediapipe_2023feb.onnx";

/// Maximum embedding distance for a face to count as a known identity.
///
/// Embeddings are scaled ArcFace vectors (see `onnx_face_encoder`), on which
/// 0.6 is cosine similarity 0.4. Identity files enrolled with another
/// encoder need their own tolerance.
pub const DEFAULT_TOLERANCE: f64 = 0.6;

/// Run recognition on one frame out of every `DEFAULT_FRAME_SKIP`.
pub const DEFAULT_FRAME_SKIP: usize = 3;

/// Continuous-detection time before a person counts as present.
pub const DEFAULT_DWELL_SECS: f64 = 1.0;

/// Minimum gap between two participation events for the same person.
pub const DEFAULT_COOLDOWN_SECS: f64 = 30.0;

/// Hands farther than this from every face center (pixels) stay unassigned.
pub const DEFAULT_MAX_ASSOCIATION_DISTANCE: f64 = 300.0;

/// Presence/cooldown bookkeeping is pruned once per this many detection cycles.
pub const DEFAULT_GC_INTERVAL_CYCLES: usize = 30;

/// Matches at or below this confidence never produce attendance.
pub const DEFAULT_MIN_ATTENDANCE_CONFIDENCE: f64 = 0.4;

/// Faces analysed per frame; extra detections are dropped.
pub const DEFAULT_MAX_FACES: usize = 5;

/// Hands analysed per frame.
pub const DEFAULT_MAX_HANDS: usize = 2;

/// Upper bound for dwell and cooldown settings (about 31 years).
pub const MAX_DURATION_SECS: f64 = 1e9;

pub const DEFAULT_CAPTURE_WIDTH: u32 = 640;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 480;
pub const DEFAULT_CAPTURE_FPS: u32 = 30;

pub const APP_DIR_NAME: &str = "AttendCam";
