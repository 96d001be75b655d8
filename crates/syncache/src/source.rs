//! # Collaborator Seam
//!
//! This module defines the contract between the engine and its external
//! collaborators: the requirements value selecting a logical cache instance,
//! the stable tag derived from it, and the fetch/save/observe hooks the
//! engine orchestrates but never implements.

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::SourceError;

/// Stable key identifying one logical cache instance.
///
/// All dedup and persistence bookkeeping is keyed by tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A caller-supplied value selecting which logical cache instance an engine
/// is bound to.
pub trait CacheRequirements: Clone + Send + Sync + 'static {
    /// Derive the stable tag for this value. Must be deterministic: equal
    /// requirements produce equal tags.
    fn tag(&self) -> Tag;
}

impl CacheRequirements for String {
    fn tag(&self) -> Tag {
        Tag::new(self.clone())
    }
}

/// Storage-change notification stream returned by [`CacheSource::observe`].
///
/// The first emission is the current persisted value or its absence; every
/// subsequent emission reflects one persisted change. An `Err` item is fatal
/// to the pipeline observing it.
pub type ObserveStream<C> = BoxStream<'static, Result<Option<C>, SourceError>>;

/// External collaborator contract consumed by the engine.
///
/// Implementations own the concrete network fetch and local storage; the
/// engine only decides when to call which hook.
#[async_trait]
pub trait CacheSource: Send + Sync + 'static {
    type Requirements: CacheRequirements;
    type Payload: Send + 'static;
    type Cached: Clone + Send + Sync + 'static;

    /// Fetch a fresh payload from the remote source.
    async fn fetch(&self, requirements: &Self::Requirements)
    -> Result<Self::Payload, SourceError>;

    /// Persist a fetched payload. A successful save must cause the stream
    /// returned by [`observe`](Self::observe) to re-emit.
    async fn save(
        &self,
        payload: Self::Payload,
        requirements: &Self::Requirements,
    ) -> Result<(), SourceError>;

    /// Observe the persisted value for these requirements.
    fn observe(&self, requirements: &Self::Requirements) -> ObserveStream<Self::Cached>;

    /// Classify a persisted value as empty. Empty values surface as
    /// "fetched but empty" rather than as data.
    fn is_empty(&self, cached: &Self::Cached) -> bool;
}
