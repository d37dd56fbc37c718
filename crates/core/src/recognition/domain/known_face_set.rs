use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use super::encoding::Encoding;
use super::identity_store::IdentityStore;

/// In-memory table of known identity encodings.
///
/// Reload builds a complete new table and swaps it in; readers hold an
/// `Arc` to whichever table was current when they asked, so a match never
/// sees a table that is being rebuilt.
pub struct KnownFaceSet {
    store: Box<dyn IdentityStore>,
    current: RwLock<Arc<Vec<Encoding>>>,
}

impl KnownFaceSet {
    /// Creates an empty set. Call [`reload`](Self::reload) to populate it.
    pub fn new(store: Box<dyn IdentityStore>) -> Self {
        Self {
            store,
            current: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Replaces the whole set with the store's active identities.
    ///
    /// On failure the previous set stays in place and the error is returned
    /// for the caller to report.
    pub fn reload(&self) -> Result<usize, Box<dyn std::error::Error>> {
        let loaded: Vec<Encoding> = self
            .store
            .list_active_identities()?
            .into_iter()
            .filter(|e| !e.is_empty())
            .collect();
        let count = loaded.len();

        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(loaded);
        drop(guard);

        log::info!("Loaded {count} face encodings");
        Ok(count)
    }

    /// Stable snapshot of the encodings, in store order.
    pub fn encodings(&self) -> Arc<Vec<Encoding>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn person_count(&self) -> usize {
        self.encodings()
            .iter()
            .map(Encoding::person_id)
            .collect::<HashSet<_>>()
            .len()
    }
}
