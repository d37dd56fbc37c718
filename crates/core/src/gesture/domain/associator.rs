use crate::recognition::domain::encoding::PersonId;
use crate::recognition::domain::face_recognizer::DetectionResult;
use crate::shared::face_box::pixel_distance;

use super::hand_gesture_detector::HandObservation;

/// A raised hand attributed to a recognised person.
#[derive(Clone, Debug, PartialEq)]
pub struct Association {
    pub person_id: PersonId,
    pub name: Option<String>,
    pub hand_center: (i32, i32),
    /// `1 - distance / max_distance`, in (0, 1].
    pub confidence: f64,
}

/// Pairs raised hands to the nearest recognised face.
///
/// Only faces from the same detection cycle as the hands are considered.
/// A face receives at most one hand; earlier hands claim first.
#[derive(Clone, Debug)]
pub struct Associator {
    max_distance: f64,
}

impl Associator {
    pub fn new(max_distance: f64) -> Self {
        Self { max_distance }
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    pub fn associate(&self, hands: &[HandObservation], faces: &[DetectionResult]) -> Vec<Association> {
        let mut claimed = vec![false; faces.len()];
        let mut associations = Vec::new();

        for hand in hands.iter().filter(|h| h.raised) {
            let mut best: Option<(usize, f64)> = None;
            for (i, face) in faces.iter().enumerate() {
                if claimed[i] || !face.is_known() {
                    continue;
                }
                let distance = pixel_distance(hand.center, face.face_box.center());
                if distance >= self.max_distance {
                    continue;
                }
                if best.map_or(true, |(_, d)| distance < d) {
                    best = Some((i, distance));
                }
            }

            let Some((i, distance)) = best else {
                continue;
            };
            let Some(person_id) = faces[i].person_id else {
                continue;
            };
            claimed[i] = true;
            associations.push(Association {
                person_id,
                name: faces[i].name.clone(),
                hand_center: hand.center,
                confidence: 1.0 - distance / self.max_distance,
            });
        }
        associations
    }
}
