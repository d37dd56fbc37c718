use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::events::domain::event_sink::EventSink;
use crate::events::domain::events::{
    AttendanceEvent, AttendanceOutcome, ParticipationEvent, ParticipationKind,
};
use crate::gesture::domain::associator::{Association, Associator};
use crate::gesture::domain::hand_gesture_detector::{HandGestureDetector, HandObservation};
use crate::pipeline::detection_logger::DetectionLogger;
use crate::pipeline::frame_annotator::{AnnotatedFace, FaceState, Overlay};
use crate::pipeline::status::DailyTally;
use crate::recognition::domain::encoding::PersonId;
use crate::recognition::domain::face_recognizer::{DetectionResult, FaceRecognizer};
use crate::recognition::domain::known_face_set::KnownFaceSet;
use crate::shared::clock::Timestamp;
use crate::shared::frame::Frame;
use crate::shared::settings::Settings;
use crate::tracking::participation_throttle::ParticipationThrottle;
use crate::tracking::presence_tracker::{Presence, PresenceTracker};

/// Thresholds for one [`DetectionCycle`], usually taken from [`Settings`].
#[derive(Clone, Debug)]
pub struct CycleConfig {
    pub dwell: std::time::Duration,
    pub cooldown: std::time::Duration,
    pub max_association_distance: f64,
    /// Attendance is only attempted for matches strictly above this.
    pub min_attendance_confidence: f64,
    /// Presence and cooldown bookkeeping is pruned every this many cycles.
    pub gc_interval_cycles: usize,
}

impl CycleConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            dwell: settings.dwell(),
            cooldown: settings.cooldown(),
            max_association_distance: settings.max_association_distance,
            min_attendance_confidence: settings.min_attendance_confidence,
            gc_interval_cycles: settings.gc_interval_cycles,
        }
    }
}

/// Everything one detection cycle saw and emitted.
#[derive(Clone, Debug, Default)]
pub struct CycleReport {
    pub faces: Vec<DetectionResult>,
    pub hands: Vec<HandObservation>,
    pub associations: Vec<Association>,
    pub attendance_accepted: Vec<PersonId>,
    pub participation_accepted: Vec<PersonId>,
    pub face_model_failed: bool,
    pub hand_model_failed: bool,
}

impl CycleReport {
    pub fn hands_raised(&self) -> usize {
        self.hands.iter().filter(|h| h.raised).count()
    }
}

/// One pass of recognition, gesture detection, association, debounce and
/// event emission over a single frame.
///
/// Owns all per-person state; nothing here is shared across threads except
/// the known face set inside the recognizer.
pub struct DetectionCycle {
    recognizer: FaceRecognizer,
    gestures: HandGestureDetector,
    associator: Associator,
    presence: PresenceTracker,
    throttle: ParticipationThrottle,
    sink: Box<dyn EventSink>,
    min_attendance_confidence: f64,
    gc_interval_cycles: usize,
    cycles: usize,
    tally: DailyTally,
    overlay: Overlay,
}

impl DetectionCycle {
    pub fn new(
        recognizer: FaceRecognizer,
        gestures: HandGestureDetector,
        sink: Box<dyn EventSink>,
        config: CycleConfig,
    ) -> Self {
        Self {
            recognizer,
            gestures,
            associator: Associator::new(config.max_association_distance),
            presence: PresenceTracker::new(config.dwell),
            throttle: ParticipationThrottle::new(config.cooldown),
            sink,
            min_attendance_confidence: config.min_attendance_confidence,
            gc_interval_cycles: config.gc_interval_cycles.max(1),
            cycles: 0,
            tally: DailyTally::new(),
            overlay: Overlay::default(),
        }
    }

    pub fn known_faces(&self) -> &Arc<KnownFaceSet> {
        self.recognizer.known_faces()
    }

    /// Drawing instructions from the most recent cycle.
    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn tally(&self) -> &DailyTally {
        &self.tally
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }

    pub fn process(
        &mut self,
        frame: &Frame,
        now: Timestamp,
        logger: &mut dyn DetectionLogger,
    ) -> CycleReport {
        if self.tally.roll_over(now.date_naive()) {
            logger.info(&format!("New day {}, daily counts reset", now.date_naive()));
        }
        let mut report = CycleReport::default();

        let t = Instant::now();
        match self.recognizer.recognize(frame) {
            Ok(faces) => report.faces = faces,
            Err(e) => {
                log::warn!("Face model failed on frame {}: {e}", frame.index());
                report.face_model_failed = true;
            }
        }
        logger.timing("faces", t.elapsed().as_secs_f64() * 1000.0);

        let t = Instant::now();
        match self.gestures.detect(frame) {
            Ok(hands) => report.hands = hands,
            Err(e) => {
                log::warn!("Hand model failed on frame {}: {e}", frame.index());
                report.hand_model_failed = true;
            }
        }
        logger.timing("hands", t.elapsed().as_secs_f64() * 1000.0);

        let t = Instant::now();
        report.associations = self.associator.associate(&report.hands, &report.faces);
        logger.timing("associate", t.elapsed().as_secs_f64() * 1000.0);

        report.attendance_accepted = self.emit_attendance(&report.faces, now);
        report.participation_accepted = self.emit_participation(&report.associations, now);

        self.cycles += 1;
        if self.cycles % self.gc_interval_cycles == 0 {
            let evicted = self.presence.gc(now);
            let expired = self.throttle.gc(now);
            if evicted + expired > 0 {
                log::debug!("Pruned {evicted} presence and {expired} cooldown entries");
            }
        }

        self.update_overlay(&report, now);
        logger.metric("faces_visible", report.faces.len() as f64);
        logger.metric("hands_raised", report.hands_raised() as f64);
        report
    }

    fn emit_attendance(&mut self, faces: &[DetectionResult], now: Timestamp) -> Vec<PersonId> {
        let mut attempted = HashSet::new();
        let mut accepted = Vec::new();

        for face in faces {
            let Some(person_id) = face.person_id else {
                continue;
            };
            if self.presence.observe(person_id, now) != Presence::Confirmed {
                continue;
            }
            if face.confidence <= self.min_attendance_confidence
                || self.tally.has_attended(person_id)
                || !attempted.insert(person_id)
            {
                continue;
            }

            let name = face.name.as_deref().unwrap_or("?");
            let event = AttendanceEvent::new(person_id, now, face.confidence);
            match self.sink.attendance(&event) {
                Ok(AttendanceOutcome::Accepted) => {
                    log::info!(
                        "Attendance: {name} (#{person_id}) at {} ({:.2})",
                        now.format("%H:%M:%S"),
                        face.confidence
                    );
                    self.tally.record_attendance(person_id);
                    accepted.push(person_id);
                }
                Ok(AttendanceOutcome::Duplicate) => {
                    log::debug!("Attendance for {name} (#{person_id}) already recorded today");
                    self.tally.record_attendance(person_id);
                }
                Err(e) => log::warn!("Event sink rejected attendance for #{person_id}: {e}"),
            }
        }
        accepted
    }

    fn emit_participation(&mut self, associations: &[Association], now: Timestamp) -> Vec<PersonId> {
        let mut accepted = Vec::new();

        for association in associations {
            let person_id = association.person_id;
            if !self.presence.is_confirmed(person_id, now) {
                continue;
            }
            if !self.throttle.try_accept(person_id, now) {
                log::debug!("Participation for #{person_id} still in cooldown");
                continue;
            }

            let event = ParticipationEvent::new(
                person_id,
                now,
                association.confidence,
                ParticipationKind::HandRaised,
            );
            match self.sink.participation(&event) {
                Ok(()) => {
                    log::info!(
                        "Participation ({}): {} (#{person_id}) at {}",
                        event.kind.as_str(),
                        association.name.as_deref().unwrap_or("?"),
                        now.format("%H:%M:%S")
                    );
                    self.tally.record_participation();
                    accepted.push(person_id);
                }
                Err(e) => log::warn!("Event sink rejected participation for #{person_id}: {e}"),
            }
        }
        accepted
    }

    /// A failed model keeps its part of the previous overlay on screen.
    fn update_overlay(&mut self, report: &CycleReport, now: Timestamp) {
        if !report.face_model_failed {
            self.overlay.faces = report
                .faces
                .iter()
                .map(|face| AnnotatedFace {
                    face_box: face.face_box,
                    state: self.face_state(face, now),
                    confidence: face.display_confidence(),
                })
                .collect();
        }
        if !report.hand_model_failed {
            self.overlay.raised_hands = report
                .hands
                .iter()
                .filter(|h| h.raised)
                .map(|h| h.center)
                .collect();
        }
    }

    fn face_state(&self, face: &DetectionResult, now: Timestamp) -> FaceState {
        match face.person_id {
            None => FaceState::Unknown,
            Some(id) if self.tally.has_attended(id) => FaceState::Attended,
            Some(id) if self.presence.is_confirmed(id, now) => FaceState::Confirmed,
            Some(_) => FaceState::Seen,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::events::infrastructure::memory_event_sink::MemoryEventSink;
    use crate::gesture::domain::hand_landmarks::fixtures::raised_hand;
    use crate::gesture::domain::hand_landmarks::HandLandmarks;
    use crate::pipeline::detection_logger::NullDetectionLogger;
    use crate::recognition::domain::encoding::Encoding;
    use crate::recognition::domain::face_encoder::EncodedFace;
    use crate::recognition::domain::face_matcher::FaceMatcher;
    use crate::shared::face_box::FaceBox;
    use chrono::{Local, TimeZone};
    use std::time::Duration;

    struct FailingSink;

    impl EventSink for FailingSink {
        fn attendance(
            &mut self,
            _event: &AttendanceEvent,
        ) -> Result<AttendanceOutcome, Box<dyn std::error::Error>> {
            Err("database unavailable".into())
        }

        fn participation(
            &mut self,
            _event: &ParticipationEvent,
        ) -> Result<(), Box<dyn std::error::Error>> {
            Err("database unavailable".into())
        }
    }

    struct Harness {
        cycle: DetectionCycle,
        encoder: ScriptedEncoder,
        hands: ScriptedHands,
        sink: MemoryEventSink,
    }

    impl Harness {
        fn new() -> Self {
            Self::build(0.6, None)
        }

        fn build(tolerance: f64, sink: Option<Box<dyn EventSink>>) -> Self {
            let known = KnownFaceSet::new(Box::new(FixedStore(vec![
                Encoding::new(1, "Ana", vec![1.0, 0.0]),
                Encoding::new(2, "Ben", vec![0.0, 1.0]),
            ])));
            known.reload().unwrap();

            let encoder = ScriptedEncoder::default();
            let hands = ScriptedHands::default();
            let memory = MemoryEventSink::new();
            let recognizer = FaceRecognizer::new(
                Box::new(encoder.clone()),
                FaceMatcher::new(tolerance),
                Arc::new(known),
            );
            let cycle = DetectionCycle::new(
                recognizer,
                HandGestureDetector::new(Box::new(hands.clone())),
                sink.unwrap_or_else(|| Box::new(memory.clone())),
                CycleConfig {
                    dwell: Duration::from_secs(1),
                    cooldown: Duration::from_secs(30),
                    max_association_distance: 300.0,
                    min_attendance_confidence: 0.4,
                    gc_interval_cycles: 30,
                },
            );
            Self {
                cycle,
                encoder,
                hands,
                sink: memory,
            }
        }

        fn run(&mut self, at: Timestamp) -> CycleReport {
            self.cycle.process(&frame(), at, &mut NullDetectionLogger)
        }
    }

    fn frame() -> Frame {
        Frame::new(vec![0u8; 640 * 480 * 3], 640, 480, 3, 0)
    }

    fn t(day: u32, millis: i64) -> Timestamp {
        Local.with_ymd_and_hms(2024, 9, day, 9, 0, 0).unwrap() + chrono::Duration::milliseconds(millis)
    }

    /// Face of person 1 ("Ana") centred at (200, 200) matching at `distance`.
    fn ana(distance: f64) -> EncodedFace {
        EncodedFace {
            face_box: FaceBox::new(150, 250, 250, 150),
            encoding: vec![1.0 - distance, 0.0],
        }
    }

    /// Open palm whose landmark mean lands near pixel (200, 320).
    fn hand_near_ana() -> HandLandmarks {
        raised_hand(200.0 / 640.0)
    }

    #[test]
    fn test_attendance_after_dwell() {
        let mut h = Harness::new();
        h.encoder.set(Ok(vec![ana(0.1)]));

        assert!(h.run(t(2, 0)).attendance_accepted.is_empty());
        assert!(h.run(t(2, 500)).attendance_accepted.is_empty());
        assert_eq!(h.run(t(2, 1200)).attendance_accepted, vec![1]);

        let events = h.sink.attendance_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].person_id, 1);
        assert!((events[0].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_attendance_once_per_day_then_again_next_day() {
        let mut h = Harness::new();
        h.encoder.set(Ok(vec![ana(0.1)]));

        h.run(t(2, 0));
        h.run(t(2, 1200));
        h.run(t(2, 1500));
        h.run(t(2, 2000));
        assert_eq!(h.sink.attendance_events().len(), 1);
        assert_eq!(h.cycle.tally().attendance_count(), 1);

        // Next morning: the person is still tracked, so confirmation holds.
        h.run(t(3, 0));
        assert_eq!(h.cycle.tally().attendance_count(), 1);
        assert_eq!(h.sink.attendance_events().len(), 2);
    }

    #[test]
    fn test_match_at_or_below_confidence_floor_does_not_attend() {
        // A loose tolerance lets a distance-0.7 face match with confidence 0.3.
        let mut h = Harness::build(0.8, None);
        h.encoder.set(Ok(vec![ana(0.7)]));
        h.run(t(2, 0));
        let report = h.run(t(2, 1500));
        assert_eq!(report.faces[0].person_id, Some(1));
        assert!(report.faces[0].confidence < 0.4);
        assert!(report.attendance_accepted.is_empty());
        assert!(h.sink.attendance_events().is_empty());
    }

    #[test]
    fn test_unknown_faces_never_emit() {
        let mut h = Harness::new();
        h.encoder.set(Ok(vec![EncodedFace {
            face_box: FaceBox::new(0, 50, 50, 0),
            encoding: vec![-1.0, -1.0],
        }]));
        h.run(t(2, 0));
        let report = h.run(t(2, 5000));
        assert!(!report.faces[0].is_known());
        assert!(h.sink.attendance_events().is_empty());
        assert_eq!(h.cycle.overlay().faces[0].state, FaceState::Unknown);
    }

    #[test]
    fn test_participation_requires_confirmation_and_cooldown() {
        let mut h = Harness::new();
        h.encoder.set(Ok(vec![ana(0.1)]));
        h.hands.set(Ok(vec![hand_near_ana()]));

        let first = h.run(t(2, 0));
        assert_eq!(first.associations.len(), 1);
        assert!(first.participation_accepted.is_empty());

        assert_eq!(h.run(t(2, 1200)).participation_accepted, vec![1]);
        assert!(h.run(t(2, 11_200)).participation_accepted.is_empty());
        assert_eq!(h.run(t(2, 32_200)).participation_accepted, vec![1]);

        let events = h.sink.participation_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ParticipationKind::HandRaised);
        assert!(events[0].confidence > 0.0 && events[0].confidence <= 1.0);
        assert_eq!(h.cycle.tally().participation_count(), 2);
    }

    #[test]
    fn test_hand_model_error_still_emits_attendance() {
        let mut h = Harness::new();
        h.encoder.set(Ok(vec![ana(0.1)]));
        h.run(t(2, 0));

        h.hands.set(Err("hand session crashed".to_string()));
        let report = h.run(t(2, 1200));
        assert!(report.hand_model_failed);
        assert!(report.hands.is_empty());
        assert_eq!(report.attendance_accepted, vec![1]);
    }

    #[test]
    fn test_face_model_error_keeps_previous_overlay() {
        let mut h = Harness::new();
        h.encoder.set(Ok(vec![ana(0.1)]));
        h.hands.set(Ok(vec![hand_near_ana()]));
        h.run(t(2, 0));
        let before = h.cycle.overlay().clone();
        assert_eq!(before.faces.len(), 1);

        h.encoder.set(Err("face session crashed".to_string()));
        h.hands.set(Ok(vec![]));
        let report = h.run(t(2, 1200));
        assert!(report.face_model_failed);
        assert!(report.faces.is_empty());
        assert!(report.attendance_accepted.is_empty());
        assert_eq!(h.cycle.overlay().faces, before.faces);
        assert!(h.cycle.overlay().raised_hands.is_empty());
    }

    #[test]
    fn test_sink_failure_is_retried_next_cycle() {
        let mut h = Harness::build(0.6, Some(Box::new(FailingSink)));
        h.encoder.set(Ok(vec![ana(0.1)]));
        h.run(t(2, 0));
        assert!(h.run(t(2, 1200)).attendance_accepted.is_empty());
        assert_eq!(h.cycle.tally().attendance_count(), 0);
        // Still not attended, so the next cycle tries again (and fails again).
        assert!(h.run(t(2, 1500)).attendance_accepted.is_empty());
    }

    #[test]
    fn test_overlay_states_follow_attendance_path() {
        let mut h = Harness::new();
        h.encoder.set(Ok(vec![ana(0.1)]));

        h.run(t(2, 0));
        assert_eq!(h.cycle.overlay().faces[0].state, FaceState::Seen);
        h.run(t(2, 1200));
        assert_eq!(h.cycle.overlay().faces[0].state, FaceState::Attended);
    }

    #[test]
    fn test_gc_runs_on_interval() {
        let mut h = Harness::new();
        h.encoder.set(Ok(vec![ana(0.1)]));
        h.run(t(2, 0));

        // Person leaves; 29 empty cycles later the 30th cycle prunes them.
        h.encoder.set(Ok(vec![]));
        for i in 1..30 {
            h.run(t(2, 5000 + i));
        }
        assert_eq!(h.cycle.cycles(), 30);

        // Back again: dwell restarts.
        h.encoder.set(Ok(vec![ana(0.1)]));
        assert!(h.run(t(2, 6000)).attendance_accepted.is_empty());
        assert_eq!(h.run(t(2, 7100)).attendance_accepted, vec![1]);
    }
}
