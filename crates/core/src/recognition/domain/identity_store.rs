use super::encoding::Encoding;

/// Source of truth for registered people and their face encodings.
///
/// Only active people are returned. Called from whichever thread triggers a
/// reload, hence `Send + Sync`.
pub trait IdentityStore: Send + Sync {
    fn list_active_identities(&self) -> Result<Vec<Encoding>, Box<dyn std::error::Error>>;
}
