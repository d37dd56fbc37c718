use super::encoding::{Encoding, PersonId};

/// Outcome of matching one query encoding against the known set.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceMatch {
    /// `None` means the face is unknown.
    pub person_id: Option<PersonId>,
    pub name: Option<String>,
    /// `1 - distance` for a match (may be <= 0 for loose tolerances),
    /// 0 for unknown faces.
    pub confidence: f64,
}

impl FaceMatch {
    pub fn unknown() -> Self {
        Self {
            person_id: None,
            name: None,
            confidence: 0.0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.person_id.is_some()
    }
}

/// Nearest-neighbour identity lookup under a distance tolerance.
///
/// Linear in the number of known encodings, which is fine for a classroom
/// sized set (a few dozen people).
#[derive(Clone, Debug)]
pub struct FaceMatcher {
    tolerance: f64,
}

impl FaceMatcher {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn match_encoding(&self, query: &[f64], known: &[Encoding]) -> FaceMatch {
        let mut best: Option<(&Encoding, f64)> = None;
        for candidate in known {
            let distance = candidate.distance_to(query);
            // Strict comparison keeps the first-seen encoding on ties.
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((candidate, distance));
            }
        }

        match best {
            Some((encoding, distance)) if distance < self.tolerance => FaceMatch {
                person_id: Some(encoding.person_id()),
                name: Some(encoding.name().to_string()),
                confidence: 1.0 - distance,
            },
            _ => FaceMatch::unknown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn known(id: u32, x: f64) -> Encoding {
        Encoding::new(id, format!("p{id}"), vec![x, 0.0])
    }

    #[test]
    fn test_match_within_tolerance() {
        let matcher = FaceMatcher::new(0.6);
        let result = matcher.match_encoding(&[0.0, 0.0], &[known(1, 0.55)]);
        assert_eq!(result.person_id, Some(1));
        assert_eq!(result.name.as_deref(), Some("p1"));
        assert_relative_eq!(result.confidence, 0.45, epsilon = 1e-12);
    }

    #[test]
    fn test_outside_tolerance_is_unknown() {
        let matcher = FaceMatcher::new(0.6);
        let result = matcher.match_encoding(&[0.0, 0.0], &[known(1, 0.65)]);
        assert_eq!(result, FaceMatch::unknown());
        assert!(!result.is_known());
    }

    #[test]
    fn test_exactly_at_tolerance_is_unknown() {
        let matcher = FaceMatcher::new(0.5);
        let result = matcher.match_encoding(&[0.0, 0.0], &[known(1, 0.5)]);
        assert!(!result.is_known());
    }

    #[test]
    fn test_empty_known_set_is_unknown() {
        let matcher = FaceMatcher::new(0.6);
        assert_eq!(matcher.match_encoding(&[0.1, 0.2], &[]), FaceMatch::unknown());
    }

    #[test]
    fn test_picks_global_minimum() {
        let matcher = FaceMatcher::new(0.6);
        let set = [known(1, 0.5), known(2, 0.1), known(3, 0.3)];
        let result = matcher.match_encoding(&[0.0, 0.0], &set);
        assert_eq!(result.person_id, Some(2));
        assert_relative_eq!(result.confidence, 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_ties_resolved_by_first_seen() {
        let matcher = FaceMatcher::new(0.6);
        let set = [known(4, 0.2), known(9, -0.2)];
        let result = matcher.match_encoding(&[0.0, 0.0], &set);
        assert_eq!(result.person_id, Some(4));
    }

    #[test]
    fn test_loose_tolerance_allows_non_positive_confidence() {
        let matcher = FaceMatcher::new(1.5);
        let result = matcher.match_encoding(&[0.0, 0.0], &[known(1, 1.2)]);
        assert!(result.is_known());
        assert!(result.confidence <= 0.0);
    }

    #[test]
    fn test_mismatched_dimension_never_matches() {
        let matcher = FaceMatcher::new(10.0);
        let result = matcher.match_encoding(&[0.0, 0.0, 0.0], &[known(1, 0.0)]);
        assert!(!result.is_known());
    }

    #[rstest]
    #[case(0.10, true)]
    #[case(0.59, true)]
    #[case(0.61, false)]
    #[case(0.90, false)]
    fn test_threshold_is_strict(#[case] distance: f64, #[case] matched: bool) {
        let matcher = FaceMatcher::new(0.6);
        let result = matcher.match_encoding(&[0.0, 0.0], &[known(1, distance)]);
        assert_eq!(result.is_known(), matched);
    }
}
