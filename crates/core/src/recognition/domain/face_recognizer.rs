use std::sync::Arc;

use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

use super::encoding::PersonId;
use super::face_encoder::FaceEncoder;
use super::face_matcher::FaceMatcher;
use super::known_face_set::KnownFaceSet;

/// One face seen during a detection cycle.
///
/// Replaced wholesale every cycle; never updated in place.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    pub face_box: FaceBox,
    pub person_id: Option<PersonId>,
    pub name: Option<String>,
    pub confidence: f64,
}

impl DetectionResult {
    pub fn is_known(&self) -> bool {
        self.person_id.is_some()
    }

    /// Confidence clamped to [0, 1] for display.
    pub fn display_confidence(&self) -> f64 {
        self.confidence.clamp(0.0, 1.0)
    }
}

/// Locates faces with a [`FaceEncoder`] and names them with a
/// [`FaceMatcher`] against the current [`KnownFaceSet`].
pub struct FaceRecognizer {
    encoder: Box<dyn FaceEncoder>,
    matcher: FaceMatcher,
    known: Arc<KnownFaceSet>,
}

impl FaceRecognizer {
    pub fn new(encoder: Box<dyn FaceEncoder>, matcher: FaceMatcher, known: Arc<KnownFaceSet>) -> Self {
        Self {
            encoder,
            matcher,
            known,
        }
    }

    pub fn known_faces(&self) -> &Arc<KnownFaceSet> {
        &self.known
    }

    pub fn recognize(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<DetectionResult>, Box<dyn std::error::Error>> {
        let faces = self.encoder.encode_faces(frame)?;
        if faces.is_empty() {
            return Ok(Vec::new());
        }

        // One snapshot for the whole frame so a concurrent reload cannot
        // change identities halfway through.
        let known = self.known.encodings();
        Ok(faces
            .into_iter()
            .map(|face| {
                let m = self.matcher.match_encoding(&face.encoding, &known);
                DetectionResult {
                    face_box: face.face_box,
                    person_id: m.person_id,
                    name: m.name,
                    confidence: m.confidence,
                }
            })
            .collect())
    }
}
