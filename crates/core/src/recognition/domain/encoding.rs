/// Identifier of a registered person, as assigned by the identity store.
pub type PersonId = u32;

/// One identity embedding belonging to a known person.
///
/// A person may own several encodings (one per enrolment photo).
#[derive(Clone, Debug, PartialEq)]
pub struct Encoding {
    person_id: PersonId,
    name: String,
    vector: Vec<f64>,
}

impl Encoding {
    pub fn new(person_id: PersonId, name: impl Into<String>, vector: Vec<f64>) -> Self {
        Self {
            person_id,
            name: name.into(),
            vector,
        }
    }

    pub fn person_id(&self) -> PersonId {
        self.person_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vector(&self) -> &[f64] {
        &self.vector
    }

    pub fn len(&self) -> usize {
        self.vector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }

    /// Euclidean distance to `query`.
    ///
    /// Vectors of different length are never comparable and yield infinity.
    pub fn distance_to(&self, query: &[f64]) -> f64 {
        if self.vector.len() != query.len() {
            return f64::INFINITY;
        }
        self.vector
            .iter()
            .zip(query)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance_to_self_is_zero() {
        let e = Encoding::new(1, "Ana", vec![0.1, 0.2, 0.3]);
        assert_relative_eq!(e.distance_to(&[0.1, 0.2, 0.3]), 0.0);
    }

    #[test]
    fn test_distance_three_four_five() {
        let e = Encoding::new(1, "Ana", vec![0.0, 0.0]);
        assert_relative_eq!(e.distance_to(&[0.3, 0.4]), 0.5);
    }

    #[test]
    fn test_length_mismatch_is_infinite() {
        let e = Encoding::new(1, "Ana", vec![0.0, 0.0]);
        assert!(e.distance_to(&[0.0, 0.0, 0.0]).is_infinite());
    }

    #[test]
    fn test_accessors() {
        let e = Encoding::new(7, "Luis", vec![1.0]);
        assert_eq!(e.person_id(), 7);
        assert_eq!(e.name(), "Luis");
        assert_eq!(e.len(), 1);
        assert!(!e.is_empty());
    }
}
