//! # Cache State
//!
//! This module defines the tagged-union state value published to observers
//! and the pure transition functions that evolve it. Transitions are total,
//! side-effect free and fully deterministic from the current state plus one
//! fact, so every reachable state is constructible and comparable as plain
//! data.

use chrono::{DateTime, Utc};

use crate::error::EngineError;

/// Observable state of one logical cache instance.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheState<T> {
    /// No requirements are currently bound.
    Unbound,
    /// Storage has never completed a successful fetch for this tag.
    NoCacheYet {
        fetching: bool,
        error: Option<EngineError>,
    },
    /// At least one successful fetch occurred. `data: None` means "fetched
    /// but empty", which is distinct from `NoCacheYet`.
    Cache {
        data: Option<T>,
        last_fetched_at: DateTime<Utc>,
        fetching: bool,
        error: Option<EngineError>,
    },
}

impl<T> Default for CacheState<T> {
    fn default() -> Self {
        Self::Unbound
    }
}

impl<T> CacheState<T> {
    /// Initial state when the tracker reports "never fetched".
    pub fn no_cache_yet() -> Self {
        Self::NoCacheYet {
            fetching: false,
            error: None,
        }
    }

    /// Initial state when the tracker reports at least one prior successful
    /// fetch. Data stays `None` until the first storage read arrives.
    pub fn cache_exists(last_fetched_at: DateTime<Utc>) -> Self {
        Self::Cache {
            data: None,
            last_fetched_at,
            fetching: false,
            error: None,
        }
    }

    /// A refresh attempt has started. Preserves data, clears any stale error.
    pub fn begin_fetch(self) -> Self {
        match self {
            Self::Unbound | Self::NoCacheYet { .. } => Self::NoCacheYet {
                fetching: true,
                error: None,
            },
            Self::Cache {
                data,
                last_fetched_at,
                ..
            } => Self::Cache {
                data,
                last_fetched_at,
                fetching: true,
                error: None,
            },
        }
    }

    /// A refresh attempt resolved successfully at `at`. Does not touch data:
    /// the subsequent storage re-read is the single source of truth for it.
    pub fn finish_fetch(self, at: DateTime<Utc>) -> Self {
        match self {
            Self::Unbound | Self::NoCacheYet { .. } => Self::Cache {
                data: None,
                last_fetched_at: at,
                fetching: false,
                error: None,
            },
            Self::Cache { data, .. } => Self::Cache {
                data,
                last_fetched_at: at,
                fetching: false,
                error: None,
            },
        }
    }

    /// An attempt failed. Resolves to a terminal idle sub-state with the
    /// error attached; existing data and fetch stamp are untouched.
    pub fn fail(self, error: EngineError) -> Self {
        match self {
            Self::Unbound | Self::NoCacheYet { .. } => Self::NoCacheYet {
                fetching: false,
                error: Some(error),
            },
            Self::Cache {
                data,
                last_fetched_at,
                ..
            } => Self::Cache {
                data,
                last_fetched_at,
                fetching: false,
                error: Some(error),
            },
        }
    }

    /// The latest storage read. Only ever determines `data`; fetch status is
    /// owned by the refresh facts above. An absence read while no fetch has
    /// ever succeeded is the identity: it carries no new fact, so a
    /// just-published first-fetch error survives it. `fetched_at_hint` is
    /// used only when this read promotes the state into `Cache` space.
    pub fn storage_read(self, data: Option<T>, fetched_at_hint: DateTime<Utc>) -> Self {
        match self {
            Self::Cache {
                last_fetched_at,
                fetching,
                ..
            } => Self::Cache {
                data,
                last_fetched_at,
                fetching,
                error: None,
            },
            Self::Unbound | Self::NoCacheYet { .. } if data.is_none() => self,
            Self::NoCacheYet { fetching, .. } => Self::Cache {
                data,
                last_fetched_at: fetched_at_hint,
                fetching,
                error: None,
            },
            Self::Unbound => Self::Cache {
                data,
                last_fetched_at: fetched_at_hint,
                fetching: false,
                error: None,
            },
        }
    }

    /// Whether a refresh is currently in flight.
    pub fn is_fetching(&self) -> bool {
        match self {
            Self::Unbound => false,
            Self::NoCacheYet { fetching, .. } | Self::Cache { fetching, .. } => *fetching,
        }
    }

    /// The error attached by the most recent failed attempt, if any.
    pub fn error(&self) -> Option<&EngineError> {
        match self {
            Self::Unbound => None,
            Self::NoCacheYet { error, .. } | Self::Cache { error, .. } => error.as_ref(),
        }
    }

    /// The latest storage-read data, if the state carries any.
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Cache { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    /// When the last successful fetch completed, if one ever did.
    pub fn last_fetched_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Cache { last_fetched_at, .. } => Some(*last_fetched_at),
            _ => None,
        }
    }

    /// Whether requirements are currently bound.
    pub fn is_bound(&self) -> bool {
        !matches!(self, Self::Unbound)
    }

    /// Whether at least one successful fetch has been recorded.
    pub fn has_cache(&self) -> bool {
        matches!(self, Self::Cache { .. })
    }
}
