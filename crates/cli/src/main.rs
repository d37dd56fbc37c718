use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{after, never, select, tick, Receiver};

use attendcam_core::events::domain::event_sink::EventSink;
use attendcam_core::events::infrastructure::jsonl_event_sink::JsonlEventSink;
use attendcam_core::events::infrastructure::memory_event_sink::MemoryEventSink;
use attendcam_core::gesture::domain::hand_gesture_detector::HandGestureDetector;
use attendcam_core::gesture::domain::hand_landmark_detector::{
    HandLandmarkDetector, NoHandLandmarks,
};
use attendcam_core::gesture::infrastructure::onnx_hand_landmarker::{
    OnnxHandLandmarker, DEFAULT_PRESENCE_THRESHOLD,
};
use attendcam_core::gesture::infrastructure::onnx_palm_detector::{
    OnnxPalmDetector, DEFAULT_PALM_CONFIDENCE,
};
use attendcam_core::pipeline::detection_cycle::{CycleConfig, DetectionCycle};
use attendcam_core::pipeline::detection_logger::LogDetectionLogger;
use attendcam_core::pipeline::detection_loop::DetectionLoop;
use attendcam_core::pipeline::orchestrator::Orchestrator;
use attendcam_core::recognition::domain::face_matcher::FaceMatcher;
use attendcam_core::recognition::domain::face_recognizer::FaceRecognizer;
use attendcam_core::recognition::domain::known_face_set::KnownFaceSet;
use attendcam_core::recognition::infrastructure::json_identity_store::JsonIdentityStore;
use attendcam_core::recognition::infrastructure::onnx_face_encoder::OnnxFaceEncoder;
use attendcam_core::shared::clock::SystemClock;
use attendcam_core::shared::constants::{
    FACE_DETECTOR_MODEL_NAME, FACE_DETECTOR_MODEL_URL, FACE_EMBEDDING_MODEL_NAME,
    FACE_EMBEDDING_MODEL_URL, HAND_LANDMARK_MODEL_NAME, HAND_LANDMARK_MODEL_URL,
    PALM_DETECTOR_MODEL_NAME, PALM_DETECTOR_MODEL_URL,
};
use attendcam_core::shared::model_resolver;
use attendcam_core::shared::settings::Settings;
use attendcam_core::shared::video_metadata::CaptureHint;
use attendcam_core::video::infrastructure::ffmpeg_camera_source::FfmpegCameraSource;
use attendcam_core::video::infrastructure::jpeg_encoder::{write_snapshot, DEFAULT_JPEG_QUALITY};

/// Live attendance and participation detection from a camera or video file.
#[derive(Parser)]
#[command(name = "attendcam")]
struct Cli {
    /// JSON identity file: persons with their face encodings.
    #[arg(long)]
    identities: PathBuf,

    /// Append attendance/participation events to this JSON lines file.
    /// Events are only kept in memory when omitted.
    #[arg(long)]
    events: Option<PathBuf>,

    /// Settings file (defaults to the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capture device, video file or stream URL.
    #[arg(long)]
    device: Option<String>,

    /// Capture demuxer (v4l2, avfoundation, dshow). Use "none" for files.
    #[arg(long)]
    input_format: Option<String>,

    /// Requested capture width.
    #[arg(long)]
    width: Option<u32>,

    /// Requested capture height.
    #[arg(long)]
    height: Option<u32>,

    /// Requested capture frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Maximum embedding distance for a face match.
    #[arg(long)]
    tolerance: Option<f64>,

    /// Run detection every Nth frame (1 = every frame).
    #[arg(long)]
    frame_skip: Option<usize>,

    /// Palm detector ONNX model (downloaded on first use when omitted).
    #[arg(long)]
    palm_model: Option<PathBuf>,

    /// Hand landmark ONNX model (downloaded on first use when omitted).
    #[arg(long)]
    hand_model: Option<PathBuf>,

    /// Hands analysed per frame.
    #[arg(long)]
    max_hands: Option<usize>,

    /// Write the latest annotated frame to this JPEG file.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// JPEG quality for snapshots (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Write the effective settings (file plus flags) to this path and exit.
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Seconds between status reports (and snapshot writes).
    #[arg(long, default_value = "5")]
    status_interval: u64,

    /// Seconds between identity reloads (0 = never).
    #[arg(long, default_value = "0")]
    reload_interval: u64,

    /// Stop after this many seconds (runs until the stream ends otherwise).
    #[arg(long)]
    duration: Option<u64>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    if let Some(path) = &cli.save_config {
        settings.save_to(path)?;
        log::info!("Settings written to {}", path.display());
        return Ok(());
    }
    validate(&cli)?;

    let known = Arc::new(KnownFaceSet::new(Box::new(JsonIdentityStore::new(
        &cli.identities,
    ))));
    let loaded = known.reload()?;
    if loaded == 0 {
        log::warn!(
            "No active identities in {}; every face will be unknown",
            cli.identities.display()
        );
    }

    let orchestrator =
        Orchestrator::new(build_loop(&settings, &cli, known)?).with_jpeg_quality(cli.jpeg_quality);
    orchestrator.start()?;
    supervise(&orchestrator, &cli)?;

    let exit = orchestrator.stop()?;
    log::info!("Detection finished: {exit:?}");
    let status = orchestrator.status();
    log::info!(
        "Today: {} attended, {} participation events",
        status.attendance_today,
        status.participation_today
    );
    Ok(())
}

/// Polls status, writes snapshots and reloads identities until the duration
/// elapses or the worker stops on its own.
fn supervise(orchestrator: &Orchestrator, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let status_ticks = tick(Duration::from_secs(cli.status_interval.max(1)));
    let reload_ticks: Receiver<_> = if cli.reload_interval > 0 {
        tick(Duration::from_secs(cli.reload_interval))
    } else {
        never()
    };
    let deadline: Receiver<_> = match cli.duration {
        Some(secs) => after(Duration::from_secs(secs)),
        None => never(),
    };
    let liveness = tick(Duration::from_millis(200));

    loop {
        select! {
            recv(status_ticks) -> _ => {
                log::info!("Status: {}", serde_json::to_string(&orchestrator.status())?);
                if let Some(path) = &cli.snapshot {
                    save_snapshot(orchestrator, path);
                }
            }
            recv(reload_ticks) -> _ => {
                if let Err(e) = orchestrator.reload_identities() {
                    log::warn!("{e}; keeping previous identities");
                }
            }
            recv(deadline) -> _ => {
                log::info!("Duration elapsed, stopping");
                return Ok(());
            }
            recv(liveness) -> _ => {
                if !orchestrator.is_running() {
                    if let Some(path) = &cli.snapshot {
                        save_snapshot(orchestrator, path);
                    }
                    return Ok(());
                }
            }
        }
    }
}

fn save_snapshot(orchestrator: &Orchestrator, path: &Path) {
    match orchestrator.latest_frame() {
        Ok(Some(jpeg)) => {
            if let Err(e) = write_snapshot(path, &jpeg) {
                log::warn!("Failed to write snapshot {}: {e}", path.display());
            }
        }
        Ok(None) => {}
        Err(e) => log::warn!("{e}"),
    }
}

fn build_loop(
    settings: &Settings,
    cli: &Cli,
    known: Arc<KnownFaceSet>,
) -> Result<DetectionLoop, Box<dyn std::error::Error>> {
    let recognizer = FaceRecognizer::new(
        Box::new(build_face_encoder(settings)?),
        FaceMatcher::new(settings.tolerance),
        known,
    );
    let gestures = HandGestureDetector::new(build_hand_landmarker(settings));
    let cycle = DetectionCycle::new(
        recognizer,
        gestures,
        build_sink(cli)?,
        CycleConfig::from_settings(settings),
    );

    let capture = &settings.capture;
    let source = FfmpegCameraSource::new(capture.device.clone(), capture.input_format.clone());
    Ok(DetectionLoop::new(
        Box::new(source),
        cycle,
        Box::new(LogDetectionLogger::default()),
        Arc::new(SystemClock),
        CaptureHint {
            width: capture.width,
            height: capture.height,
            fps: capture.fps,
        },
        settings.frame_skip,
    ))
}

fn build_face_encoder(settings: &Settings) -> Result<OnnxFaceEncoder, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {FACE_DETECTOR_MODEL_NAME}");
    let detector_path = model_resolver::resolve(
        FACE_DETECTOR_MODEL_NAME,
        FACE_DETECTOR_MODEL_URL,
        None,
        Some(Box::new(|d, t| download_progress("face detection", d, t))),
    )?;
    log::info!("Resolving model: {FACE_EMBEDDING_MODEL_NAME}");
    let embedding_path = model_resolver::resolve(
        FACE_EMBEDDING_MODEL_NAME,
        FACE_EMBEDDING_MODEL_URL,
        None,
        Some(Box::new(|d, t| download_progress("face embedding", d, t))),
    )?;

    OnnxFaceEncoder::new(
        &detector_path,
        &embedding_path,
        settings.face_confidence,
        settings.max_faces,
    )
}

fn build_hand_landmarker(settings: &Settings) -> Box<dyn HandLandmarkDetector> {
    match load_hand_landmarker(settings) {
        Ok(landmarker) => Box::new(landmarker),
        Err(e) => {
            log::warn!("Hand raise detection disabled: {e}");
            Box::new(NoHandLandmarks)
        }
    }
}

fn load_hand_landmarker(
    settings: &Settings,
) -> Result<OnnxHandLandmarker, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {PALM_DETECTOR_MODEL_NAME}");
    let palm_path = model_resolver::resolve(
        PALM_DETECTOR_MODEL_NAME,
        PALM_DETECTOR_MODEL_URL,
        settings.palm_model.as_deref(),
        Some(Box::new(|d, t| download_progress("palm detection", d, t))),
    )?;
    log::info!("Resolving model: {HAND_LANDMARK_MODEL_NAME}");
    let landmark_path = model_resolver::resolve(
        HAND_LANDMARK_MODEL_NAME,
        HAND_LANDMARK_MODEL_URL,
        settings.hand_model.as_deref(),
        Some(Box::new(|d, t| download_progress("hand landmark", d, t))),
    )?;

    let palms = OnnxPalmDetector::new(&palm_path, DEFAULT_PALM_CONFIDENCE, settings.max_hands)?;
    OnnxHandLandmarker::new(palms, &landmark_path, DEFAULT_PRESENCE_THRESHOLD)
}

fn build_sink(cli: &Cli) -> Result<Box<dyn EventSink>, Box<dyn std::error::Error>> {
    match &cli.events {
        Some(path) => {
            let sink = JsonlEventSink::open(path)?;
            log::info!("Recording events to {}", sink.path().display());
            Ok(Box::new(sink))
        }
        None => {
            log::info!("No --events file given; events are kept in memory only");
            Ok(Box::new(MemoryEventSink::new()))
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    let capture = &mut settings.capture;
    if let Some(device) = &cli.device {
        capture.device = device.clone();
    }
    if let Some(format) = &cli.input_format {
        capture.input_format = (format != "none").then(|| format.clone());
    }
    if let Some(width) = cli.width {
        capture.width = width;
    }
    if let Some(height) = cli.height {
        capture.height = height;
    }
    if let Some(fps) = cli.fps {
        capture.fps = fps;
    }
    if let Some(tolerance) = cli.tolerance {
        settings.tolerance = tolerance;
    }
    if let Some(frame_skip) = cli.frame_skip {
        settings.frame_skip = frame_skip;
    }
    if let Some(palm_model) = &cli.palm_model {
        settings.palm_model = Some(palm_model.clone());
    }
    if let Some(hand_model) = &cli.hand_model {
        settings.hand_model = Some(hand_model.clone());
    }
    if let Some(max_hands) = cli.max_hands {
        settings.max_hands = max_hands;
    }

    settings.validate()?;
    Ok(settings)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.identities.exists() {
        return Err(format!("Identity file not found: {}", cli.identities.display()).into());
    }
    for (label, path) in [("Palm", &cli.palm_model), ("Hand", &cli.hand_model)] {
        if let Some(path) = path {
            if !path.exists() {
                return Err(format!("{label} model not found: {}", path.display()).into());
            }
        }
    }
    if cli.duration == Some(0) {
        return Err("Duration must be at least one second".into());
    }
    Ok(())
}

fn download_progress(label: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {label} model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {label} model... {downloaded} bytes");
    }
}
