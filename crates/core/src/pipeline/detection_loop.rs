use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::pipeline::detection_cycle::{CycleReport, DetectionCycle};
use crate::pipeline::detection_logger::DetectionLogger;
use crate::pipeline::frame_annotator::FrameAnnotator;
use crate::pipeline::status::Status;
use crate::recognition::domain::known_face_set::KnownFaceSet;
use crate::shared::clock::Clock;
use crate::shared::frame::Frame;
use crate::shared::snapshot_slot::SnapshotSlot;
use crate::shared::video_metadata::CaptureHint;
use crate::video::domain::frame_source::FrameSource;

/// State shared between the detection worker and any number of readers.
///
/// The worker is the only writer of the snapshot and the status counts.
#[derive(Default)]
pub struct LoopState {
    active: AtomicBool,
    snapshot: SnapshotSlot<Frame>,
    status: Mutex<Status>,
}

impl LoopState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Latest annotated frame.
    pub fn snapshot(&self) -> &SnapshotSlot<Frame> {
        &self.snapshot
    }

    pub fn status(&self) -> Status {
        let mut status = self.lock_status().clone();
        status.running = self.is_active();
        status
    }

    fn lock_status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Why [`DetectionLoop::run`] returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopExit {
    Stopped,
    EndOfStream,
    OpenFailed(String),
    ReadFailed(String),
}

/// The capture/detect/publish loop run by the detection worker.
///
/// Every frame is annotated with the most recent overlay and published;
/// detection only runs on every `frame_skip`-th frame.
pub struct DetectionLoop {
    source: Box<dyn FrameSource>,
    cycle: DetectionCycle,
    annotator: FrameAnnotator,
    logger: Box<dyn DetectionLogger>,
    clock: Arc<dyn Clock>,
    hint: CaptureHint,
    frame_skip: usize,
}

impl DetectionLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        cycle: DetectionCycle,
        logger: Box<dyn DetectionLogger>,
        clock: Arc<dyn Clock>,
        hint: CaptureHint,
        frame_skip: usize,
    ) -> Self {
        Self {
            source,
            cycle,
            annotator: FrameAnnotator::new(),
            logger,
            clock,
            hint,
            frame_skip: frame_skip.max(1),
        }
    }

    pub fn known_faces(&self) -> &Arc<KnownFaceSet> {
        self.cycle.known_faces()
    }

    pub fn cycle(&self) -> &DetectionCycle {
        &self.cycle
    }

    /// Runs until `state` is deactivated, the stream ends, or the source
    /// fails. The source is released and `state` deactivated on every exit.
    pub fn run(&mut self, state: &LoopState) -> LoopExit {
        let exit = self.capture(state);
        self.source.release();
        state.set_active(false);
        match &exit {
            LoopExit::Stopped => log::info!("Detection stopped"),
            LoopExit::EndOfStream => log::info!("Frame source reached end of stream"),
            LoopExit::OpenFailed(e) => log::error!("Failed to open frame source: {e}"),
            LoopExit::ReadFailed(e) => log::error!("Frame source failed: {e}"),
        }
        self.logger.summary();
        exit
    }

    fn capture(&mut self, state: &LoopState) -> LoopExit {
        if let Err(e) = self.source.open(&self.hint) {
            return LoopExit::OpenFailed(e.to_string());
        }

        let mut frame_count: usize = 0;
        while state.is_active() {
            let frame = match self.source.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => return LoopExit::EndOfStream,
                Err(e) => return LoopExit::ReadFailed(e.to_string()),
            };
            frame_count += 1;
            let annotated = self.process_frame(frame, frame_count, state);
            state.snapshot.publish(annotated);
        }
        LoopExit::Stopped
    }

    /// Runs detection if `frame_count` is due, then draws the current
    /// overlay onto the frame.
    fn process_frame(&mut self, mut frame: Frame, frame_count: usize, state: &LoopState) -> Frame {
        self.logger.frame(frame.index());

        if frame_count % self.frame_skip == 0 {
            let now = self.clock.now();
            let report = self.cycle.process(&frame, now, self.logger.as_mut());
            self.publish_status(&report, state);
        }

        let t = Instant::now();
        self.annotator.annotate(&mut frame, self.cycle.overlay());
        self.logger
            .timing("annotate", t.elapsed().as_secs_f64() * 1000.0);
        frame
    }

    fn publish_status(&self, report: &CycleReport, state: &LoopState) {
        let tally = self.cycle.tally();
        let mut status = state.lock_status();
        status.attendance_today = tally.attendance_count();
        status.participation_today = tally.participation_count();
        if !report.face_model_failed {
            status.faces_visible = report.faces.len();
        }
        if !report.hand_model_failed {
            status.hands_raised = report.hands_raised();
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use chrono::{Local, TimeZone};

    use crate::shared::clock::{Clock, Timestamp};
    use crate::shared::frame::Frame;
    use crate::shared::video_metadata::{CaptureHint, VideoMetadata};
    use crate::video::domain::frame_source::FrameSource;

    /// Counters a test can inspect after the source has moved into a loop.
    #[derive(Clone, Default)]
    pub struct SourceCounters {
        pub opened: Arc<Mutex<usize>>,
        pub released: Arc<Mutex<usize>>,
        pub reads: Arc<Mutex<usize>>,
    }

    impl SourceCounters {
        pub fn opened(&self) -> usize {
            *self.opened.lock().unwrap()
        }

        pub fn released(&self) -> usize {
            *self.released.lock().unwrap()
        }

        pub fn reads(&self) -> usize {
            *self.reads.lock().unwrap()
        }
    }

    /// Serves `limit` blank frames (or forever with `None`), optionally
    /// failing to open or failing mid-stream.
    pub struct FakeSource {
        pub limit: Option<usize>,
        pub fail_open: bool,
        pub fail_at: Option<usize>,
        pub delay: std::time::Duration,
        pub counters: SourceCounters,
        served: usize,
        open: bool,
    }

    impl FakeSource {
        pub fn new(limit: Option<usize>, counters: SourceCounters) -> Self {
            Self {
                limit,
                fail_open: false,
                fail_at: None,
                delay: std::time::Duration::ZERO,
                counters,
                served: 0,
                open: false,
            }
        }
    }

    impl FrameSource for FakeSource {
        fn open(&mut self, hint: &CaptureHint) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            *self.counters.opened.lock().unwrap() += 1;
            if self.fail_open {
                return Err("device busy".into());
            }
            self.open = true;
            self.served = 0;
            Ok(VideoMetadata {
                width: hint.width,
                height: hint.height,
                fps: hint.fps as f64,
                codec: "fake".to_string(),
                source: "fake".to_string(),
            })
        }

        fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
            if !self.open {
                return Err("not opened".into());
            }
            *self.counters.reads.lock().unwrap() += 1;
            if self.fail_at == Some(self.served) {
                return Err("cable unplugged".into());
            }
            if self.limit.is_some_and(|n| self.served >= n) {
                return Ok(None);
            }
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            let frame = Frame::new(vec![0u8; 64 * 48 * 3], 64, 48, 3, self.served);
            self.served += 1;
            Ok(Some(frame))
        }

        fn release(&mut self) {
            if self.open {
                *self.counters.released.lock().unwrap() += 1;
            }
            self.open = false;
        }
    }

    /// Clock that advances by `step_ms` on every reading.
    pub struct SteppingClock {
        now: Mutex<Timestamp>,
        step_ms: i64,
    }

    impl SteppingClock {
        pub fn new(step_ms: i64) -> Self {
            Self {
                now: Mutex::new(Local.with_ymd_and_hms(2024, 9, 2, 9, 0, 0).unwrap()),
                step_ms,
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> Timestamp {
            let mut now = self.now.lock().unwrap();
            let current = *now;
            *now = current + chrono::Duration::milliseconds(self.step_ms);
            current
        }
    }
}
