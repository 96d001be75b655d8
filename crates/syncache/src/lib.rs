//! # Syncache
//!
//! A stale-while-revalidate cache synchronization engine. A bound engine
//! serves the locally persisted value to observers immediately and
//! transparently refreshes it from the remote source only when stale or
//! explicitly forced, while guaranteeing observers never silently miss a
//! transient event — a fetch starting, succeeding or failing — even though
//! all updates flow through a single replay-latest stream per logical cache
//! instance.
//!
//! ## Features
//!
//! - Pure, comparable cache states with total transition functions
//! - Single-flight refresh deduplication keyed by tag, shareable across engines
//! - Age tracking with pluggable durable stores (memory, file)
//! - Replay-latest multi-subscriber state stream with compounding updates
//! - Caller-supplied fetch/save/observe hooks; storage stays the single
//!   source of truth for data

pub mod age;
pub mod builder;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod source;
pub mod state;
pub mod stream;

pub use age::{AgeStore, CacheAgeTracker, FileAgeStore, MemoryAgeStore, StoreResult};
pub use builder::EngineConfigBuilder;
pub use config::{AgeThreshold, AgeUnit, EngineConfig};
pub use coordinator::{RefreshCoordinator, RefreshOutcome, SkipReason};
pub use engine::RepositoryEngine;
pub use error::{EngineError, SourceError};
pub use source::{CacheRequirements, CacheSource, ObserveStream, Tag};
pub use state::CacheState;
pub use stream::CacheStateStream;
