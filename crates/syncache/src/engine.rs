//! # Repository Engine
//!
//! The orchestrator binding the age tracker, the single-flight coordinator,
//! the state machine and the state stream against caller-supplied
//! fetch/save/observe hooks. This is the only component with I/O-triggering
//! side effects.
//!
//! A bound pipeline serves the persisted value immediately and revalidates
//! in the background when the cache is stale or a refresh was forced. The
//! engine never injects fetched data into the stream itself: a successful
//! refresh is persisted through the save hook, and the observe hook's
//! storage-change notification re-fires and flows back in, keeping storage
//! the single source of truth.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::age::CacheAgeTracker;
use crate::config::EngineConfig;
use crate::coordinator::{RefreshCoordinator, RefreshOutcome, SkipReason};
use crate::error::EngineError;
use crate::source::{CacheRequirements, CacheSource, Tag};
use crate::state::CacheState;
use crate::stream::CacheStateStream;

/// Stale-while-revalidate orchestrator for one logical cache instance at a
/// time.
///
/// Must be used within a Tokio runtime: binding spawns the pipeline task.
pub struct RepositoryEngine<S: CacheSource> {
    inner: Arc<EngineInner<S>>,
}

struct EngineInner<S: CacheSource> {
    source: Arc<S>,
    tracker: Arc<CacheAgeTracker>,
    coordinator: RefreshCoordinator,
    config: EngineConfig,
    states: CacheStateStream<S::Cached>,
    binding: Mutex<Option<Binding<S::Requirements>>>,
}

struct Binding<R> {
    requirements: R,
    tag: Tag,
    epoch: u64,
    shutdown: broadcast::Sender<()>,
    pipeline: JoinHandle<()>,
}

impl<S: CacheSource> RepositoryEngine<S> {
    /// Create an engine over the given collaborators. The tracker and
    /// coordinator are shared handles: every engine that must share
    /// staleness bookkeeping and refresh dedup scope receives the same ones.
    pub fn new(
        source: Arc<S>,
        tracker: Arc<CacheAgeTracker>,
        coordinator: RefreshCoordinator,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                source,
                tracker,
                coordinator,
                config,
                states: CacheStateStream::new(),
                binding: Mutex::new(None),
            }),
        }
    }

    /// Bind to `requirements`, or unbind with `None`. The previous
    /// pipeline's subscriptions are deterministically cancelled before the
    /// next one starts, so late events from the old pipeline can never reach
    /// current observers.
    pub fn set_requirements(&self, requirements: Option<S::Requirements>) {
        let mut binding = self.inner.binding.lock();
        Self::teardown(&mut binding);
        let epoch = self.inner.states.advance_epoch();

        match requirements {
            None => {
                debug!(label = self.inner.config.label.as_deref(), "requirements cleared");
                self.inner.states.publish(epoch, CacheState::Unbound);
            }
            Some(requirements) => {
                let tag = requirements.tag();
                info!(
                    tag = %tag,
                    label = self.inner.config.label.as_deref(),
                    "binding requirements"
                );
                let (shutdown, shutdown_rx) = broadcast::channel(1);
                let pipeline = tokio::spawn(EngineInner::run_pipeline(
                    Arc::clone(&self.inner),
                    requirements.clone(),
                    tag.clone(),
                    epoch,
                    shutdown_rx,
                ));
                *binding = Some(Binding {
                    requirements,
                    tag,
                    epoch,
                    shutdown,
                    pipeline,
                });
            }
        }
    }

    fn teardown(binding: &mut Option<Binding<S::Requirements>>) {
        if let Some(old) = binding.take() {
            debug!(tag = %old.tag, "tearing down pipeline");
            let _ = old.shutdown.send(());
            old.pipeline.abort();
        }
    }

    /// Subscribe as a raw watch receiver; the current state is visible
    /// immediately.
    pub fn subscribe(&self) -> watch::Receiver<CacheState<S::Cached>> {
        self.inner.states.subscribe()
    }

    /// Subscribe as a replay-latest `Stream`; the first item is the current
    /// state.
    pub fn observe(&self) -> WatchStream<CacheState<S::Cached>> {
        self.inner.states.stream()
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> CacheState<S::Cached> {
        self.inner.states.current()
    }

    /// One-shot refresh. Runs at most one single-flight refresh if `force`,
    /// a pending force flag, or staleness says it is due; otherwise returns
    /// a skip without any I/O.
    pub async fn refresh(&self, force: bool) -> RefreshOutcome {
        let (requirements, tag, epoch) = {
            let binding = self.inner.binding.lock();
            match binding.as_ref() {
                None => return RefreshOutcome::Skipped(SkipReason::NoRequirementsBound),
                Some(bound) => (bound.requirements.clone(), bound.tag.clone(), bound.epoch),
            }
        };

        if !self.inner.refresh_due(&tag, force).await {
            return RefreshOutcome::Skipped(SkipReason::NotDueYet);
        }
        EngineInner::execute_refresh(&self.inner, &requirements, &tag, epoch).await
    }

    /// Unbind and cancel the pipeline. Equivalent to
    /// `set_requirements(None)`.
    pub fn dispose(&self) {
        self.set_requirements(None);
    }
}

impl<S: CacheSource> Drop for RepositoryEngine<S> {
    fn drop(&mut self) {
        let mut binding = self.inner.binding.lock();
        Self::teardown(&mut binding);
    }
}

impl<S: CacheSource> EngineInner<S> {
    async fn run_pipeline(
        inner: Arc<Self>,
        requirements: S::Requirements,
        tag: Tag,
        epoch: u64,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                debug!(tag = %tag, "pipeline shut down");
            }
            _ = Self::bind(&inner, &requirements, &tag, epoch) => {
                debug!(tag = %tag, "pipeline finished");
            }
        }
    }

    async fn bind(inner: &Arc<Self>, requirements: &S::Requirements, tag: &Tag, epoch: u64) {
        let last = match inner.tracker.last_successful_fetch(tag).await {
            Ok(last) => last,
            Err(e) => {
                warn!(tag = %tag, error = %e, "failed to read fetch stamp; treating as never fetched");
                None
            }
        };

        match last {
            None => {
                // Nothing usable exists yet, so the very first fetch attempt
                // must resolve before storage observation starts; otherwise
                // observers would see a transient "empty" view first.
                inner
                    .states
                    .publish(epoch, CacheState::no_cache_yet().begin_fetch());
                let outcome = Self::execute_refresh(inner, requirements, tag, epoch).await;
                debug!(tag = %tag, completed = outcome.is_completed(), "first fetch resolved");
                Self::observe_storage(inner, requirements, tag, epoch).await;
            }
            Some(last_fetched_at) => {
                inner
                    .states
                    .publish(epoch, CacheState::cache_exists(last_fetched_at));
                let revalidate = async {
                    if inner.refresh_due(tag, false).await {
                        Self::execute_refresh(inner, requirements, tag, epoch).await;
                    }
                };
                tokio::join!(
                    revalidate,
                    Self::observe_storage(inner, requirements, tag, epoch)
                );
            }
        }
    }

    /// Evaluate staleness and the force flag. Both sides are consulted
    /// without short-circuit: a pending force flag is cleared on attempt.
    async fn refresh_due(&self, tag: &Tag, force: bool) -> bool {
        let stale = match self.tracker.is_stale(tag, &self.config.max_age).await {
            Ok(stale) => stale,
            Err(e) => {
                warn!(tag = %tag, error = %e, "staleness check failed; treating as stale");
                true
            }
        };
        let forced = match self.tracker.consume_force_next_fetch(tag).await {
            Ok(forced) => forced,
            Err(e) => {
                warn!(tag = %tag, error = %e, "failed to read force flag");
                false
            }
        };
        force || stale || forced
    }

    /// Run one single-flight refresh: fetch, save, stamp. The whole sequence
    /// executes inside the coordinator's dedup scope so attached callers
    /// never duplicate the save.
    async fn execute_refresh(
        inner: &Arc<Self>,
        requirements: &S::Requirements,
        tag: &Tag,
        epoch: u64,
    ) -> RefreshOutcome {
        inner.states.apply(epoch, CacheState::begin_fetch);

        let task = {
            let source = Arc::clone(&inner.source);
            let tracker = Arc::clone(&inner.tracker);
            let requirements = requirements.clone();
            let tag = tag.clone();
            move || async move {
                let payload = source
                    .fetch(&requirements)
                    .await
                    .map_err(EngineError::fetch)?;
                source
                    .save(payload, &requirements)
                    .await
                    .map_err(EngineError::save)?;
                tracker
                    .update_last_successful_fetch(&tag, Utc::now())
                    .await
                    .map_err(EngineError::age_store)?;
                Ok(())
            }
        };

        let outcome = inner.coordinator.refresh(tag, task).await;
        match &outcome {
            RefreshOutcome::Completed => {
                inner
                    .states
                    .apply(epoch, |state| state.finish_fetch(Utc::now()));
            }
            RefreshOutcome::Failed(error) => {
                warn!(tag = %tag, error = %error, "refresh failed");
                let error = error.clone();
                inner.states.apply(epoch, move |state| state.fail(error));
            }
            RefreshOutcome::Skipped(_) => {}
        }
        outcome
    }

    /// Fold persisted-storage emissions into the state stream until the
    /// collaborator stream ends or fails. An observe failure is fatal to the
    /// pipeline; the caller must rebind to recover.
    async fn observe_storage(
        inner: &Arc<Self>,
        requirements: &S::Requirements,
        tag: &Tag,
        epoch: u64,
    ) {
        let mut emissions = inner.source.observe(requirements);
        debug!(tag = %tag, "observing persisted storage");

        while let Some(emission) = emissions.next().await {
            match emission {
                Ok(cached) => {
                    let data = match cached {
                        Some(value) if inner.source.is_empty(&value) => None,
                        Some(value) => Some(value),
                        None => {
                            if !inner.states.current().has_cache() {
                                // Absence while nothing was ever fetched
                                // carries no new fact.
                                continue;
                            }
                            None
                        }
                    };

                    let fetched_at_hint = Self::fetched_at_hint(inner, tag).await;
                    let published = inner
                        .states
                        .apply(epoch, move |state| state.storage_read(data, fetched_at_hint));
                    debug!(tag = %tag, published = published, "storage emission folded in");
                }
                Err(e) => {
                    let error = EngineError::observe(e);
                    warn!(tag = %tag, error = %error, "storage observation failed; rebind to recover");
                    inner.states.apply(epoch, move |state| state.fail(error));
                    return;
                }
            }
        }

        debug!(tag = %tag, "storage observation stream ended");
    }

    /// Fetch stamp used when a storage read promotes the state into `Cache`
    /// space. Only consulted while the current state carries no stamp of its
    /// own.
    async fn fetched_at_hint(inner: &Arc<Self>, tag: &Tag) -> DateTime<Utc> {
        if inner.states.current().has_cache() {
            // Ignored by the transition; the state keeps its own stamp.
            return Utc::now();
        }
        match inner.tracker.last_successful_fetch(tag).await {
            Ok(Some(at)) => at,
            Ok(None) => Utc::now(),
            Err(e) => {
                warn!(tag = %tag, error = %e, "failed to read fetch stamp for storage read");
                Utc::now()
            }
        }
    }
}
