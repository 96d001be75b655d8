use std::sync::Arc;

/// Boxed error type carried across the collaborator seam.
///
/// Fetch, save and observe hooks report failures with whatever error type
/// suits them; the engine classifies each one into an [`EngineError`] variant.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Classified failure produced by the engine.
///
/// Collaborator errors are held behind `Arc` so states and refresh outcomes
/// stay `Clone`: outcomes fan out to every single-flight waiter and states
/// replay through a watch channel.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The remote fetch hook failed. Cached data is untouched; safe to retry
    /// with a forced refresh.
    #[error("remote fetch failed: {0}")]
    Fetch(Arc<dyn std::error::Error + Send + Sync>),

    /// The save hook failed after a successful fetch. Surfaced on the same
    /// channel as a fetch failure: no new data became durable.
    #[error("failed to persist fetched payload: {0}")]
    Save(Arc<dyn std::error::Error + Send + Sync>),

    /// The persisted-storage observe hook failed. Fatal to the current
    /// pipeline; rebinding requirements is the only recovery.
    #[error("storage observation failed: {0}")]
    Observe(Arc<dyn std::error::Error + Send + Sync>),

    /// The age store could not read or write a fetch stamp.
    #[error("age store error: {0}")]
    AgeStore(Arc<std::io::Error>),

    /// The refresh worker vanished (panicked or was torn down) before it
    /// resolved.
    #[error("refresh aborted before completion")]
    RefreshAborted,

    /// An operation that needs bound requirements was invoked without any.
    #[error("no requirements bound")]
    NoRequirementsBound,
}

impl EngineError {
    /// Classify a fetch-hook failure.
    pub fn fetch(error: SourceError) -> Self {
        Self::Fetch(Arc::from(error))
    }

    /// Classify a save-hook failure.
    pub fn save(error: SourceError) -> Self {
        Self::Save(Arc::from(error))
    }

    /// Classify an observe-hook failure.
    pub fn observe(error: SourceError) -> Self {
        Self::Observe(Arc::from(error))
    }

    /// Classify an age-store failure.
    pub fn age_store(error: std::io::Error) -> Self {
        Self::AgeStore(Arc::new(error))
    }
}

// Errors ride inside `CacheState` values; comparing by variant and rendered
// message keeps states comparable as plain data.
impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Fetch(a), Self::Fetch(b))
            | (Self::Save(a), Self::Save(b))
            | (Self::Observe(a), Self::Observe(b)) => a.to_string() == b.to_string(),
            (Self::AgeStore(a), Self::AgeStore(b)) => {
                a.kind() == b.kind() && a.to_string() == b.to_string()
            }
            (Self::RefreshAborted, Self::RefreshAborted) => true,
            (Self::NoRequirementsBound, Self::NoRequirementsBound) => true,
            _ => false,
        }
    }
}
