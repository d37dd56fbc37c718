use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recognition::domain::encoding::{Encoding, PersonId};
use crate::recognition::domain::identity_store::IdentityStore;

#[derive(Error, Debug)]
pub enum IdentityStoreError {
    #[error("failed to read identities from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse identities in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One enrolled person as stored on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub person_id: PersonId,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// A person may be enrolled with several encodings (different angles,
    /// lighting).
    #[serde(default)]
    pub encodings: Vec<Vec<f64>>,
}

fn default_active() -> bool {
    true
}

/// Identity store backed by a JSON array of [`PersonRecord`]s.
///
/// The file is re-read on every call so that edits made by an enrollment
/// tool show up on the next reload.
pub struct JsonIdentityStore {
    path: PathBuf,
}

impl JsonIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_records(&self) -> Result<Vec<PersonRecord>, IdentityStoreError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| IdentityStoreError::Read {
            path: self.path.clone(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| IdentityStoreError::Parse {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl IdentityStore for JsonIdentityStore {
    fn list_active_identities(&self) -> Result<Vec<Encoding>, Box<dyn std::error::Error>> {
        let records = self.read_records()?;
        Ok(records
            .into_iter()
            .filter(|r| r.active)
            .flat_map(|r| {
                let PersonRecord {
                    person_id,
                    name,
                    encodings,
                    ..
                } = r;
                encodings
                    .into_iter()
                    .map(move |vector| Encoding::new(person_id, name.clone(), vector))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: PersonId, name: &str, active: bool, encodings: Vec<Vec<f64>>) -> PersonRecord {
        PersonRecord {
            person_id: id,
            name: name.to_string(),
            active,
            encodings,
        }
    }

    fn store_with(tmp: &TempDir, records: &[PersonRecord]) -> JsonIdentityStore {
        let path = tmp.path().join("people.json");
        fs::write(&path, serde_json::to_string_pretty(records).unwrap()).unwrap();
        JsonIdentityStore::new(path)
    }

    #[test]
    fn test_lists_one_encoding_per_stored_vector() {
        let tmp = TempDir::new().unwrap();
        let store = store_with(
            &tmp,
            &[record(1, "Ana", true, vec![vec![0.1, 0.2], vec![0.3, 0.4]])],
        );

        let encodings = store.list_active_identities().unwrap();
        assert_eq!(encodings.len(), 2);
        assert!(encodings.iter().all(|e| e.person_id() == 1 && e.name() == "Ana"));
        assert_eq!(encodings[1].vector(), &[0.3, 0.4]);
    }

    #[test]
    fn test_inactive_people_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = store_with(
            &tmp,
            &[
                record(1, "Ana", false, vec![vec![0.1]]),
                record(2, "Ben", true, vec![vec![0.2]]),
            ],
        );

        let encodings = store.list_active_identities().unwrap();
        assert_eq!(encodings.len(), 1);
        assert_eq!(encodings[0].person_id(), 2);
    }

    #[test]
    fn test_active_defaults_to_true() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("people.json");
        fs::write(&path, r#"[{"person_id": 7, "name": "Cy", "encodings": [[1.0, 0.0]]}]"#).unwrap();

        let encodings = JsonIdentityStore::new(&path).list_active_identities().unwrap();
        assert_eq!(encodings.len(), 1);
        assert_eq!(encodings[0].person_id(), 7);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let store = JsonIdentityStore::new("/nonexistent/people.json");
        assert!(matches!(store.read_records(), Err(IdentityStoreError::Read { .. })));
        assert!(store.list_active_identities().is_err());
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("people.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonIdentityStore::new(&path);
        assert!(matches!(store.read_records(), Err(IdentityStoreError::Parse { .. })));
    }
}
