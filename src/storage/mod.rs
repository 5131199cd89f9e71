//! Dataset persistence with per-owner retention.
//!
//! [`DatasetStore::commit`] is the only way datasets come into existence. It:
//!
//! - aggregates the records into a [`crate::types::StatisticsSnapshot`]
//! - writes the backing upload artifact, if configured
//! - persists the dataset and all of its records as one unit
//! - applies the [`RetentionPolicy`] for the owner, evicting the oldest datasets past the cap
//!
//! Commits, deletes and retention for the same owner are serialized by a per-owner lock, so two
//! concurrent uploads can never both skip eviction. Different owners never wait on each other.

pub mod artifacts;
pub mod repository;
pub mod retention;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, info, warn};

use crate::error::{ProcessingError, ProcessingResult};
use crate::observability::{CleanupContext, CleanupReason, PipelineObserver};
use crate::processing::{aggregate, Aggregate};
use crate::types::{Dataset, DatasetId, EquipmentRecord, OwnerId, StoredDataset};

pub use artifacts::ArtifactStore;
pub use repository::{DatasetRepository, JsonFileRepository, MemoryRepository};
pub use retention::{RetentionPlan, RetentionPolicy, DEFAULT_RETENTION_LIMIT};

/// Options controlling [`DatasetStore`] behavior.
///
/// Use [`Default`] for an in-memory-only store with the standard cap of five.
#[derive(Clone, Default)]
pub struct StoreOptions {
    /// Retention cap per owner.
    pub retention: RetentionPolicy,
    /// Where backing copies of uploads are kept. `None` keeps no artifacts.
    pub artifacts: Option<ArtifactStore>,
    /// Operator channel for cleanup failures.
    pub observer: Option<Arc<dyn PipelineObserver>>,
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("retention", &self.retention)
            .field("artifacts", &self.artifacts)
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

/// Source material for a commit.
#[derive(Debug, Clone, Copy)]
pub struct CommitSource<'a> {
    /// Original filename; becomes the dataset name.
    pub filename: &'a str,
    /// Original upload bytes, kept as the backing artifact.
    pub bytes: Option<&'a [u8]>,
}

/// What a successful commit produced.
#[derive(Debug, Clone)]
pub struct Commit {
    pub dataset: Dataset,
    /// The aggregate computed for the snapshot, including the type distribution.
    pub aggregate: Aggregate,
    /// Datasets removed by retention, oldest first.
    pub evicted: Vec<DatasetId>,
}

/// Clock whose readings strictly increase, even if the wall clock stalls or steps back.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl MonotonicClock {
    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + TimeDelta::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}

/// Owns persisted datasets and enforces the retention cap on write.
pub struct DatasetStore {
    repo: Arc<dyn DatasetRepository>,
    options: StoreOptions,
    clock: MonotonicClock,
    owner_locks: Mutex<HashMap<OwnerId, Arc<Mutex<()>>>>,
}

impl fmt::Debug for DatasetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetStore")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl DatasetStore {
    pub fn new(repo: Arc<dyn DatasetRepository>, options: StoreOptions) -> Self {
        Self {
            repo,
            options,
            clock: MonotonicClock::default(),
            owner_locks: Mutex::new(HashMap::new()),
        }
    }

    /// A store backed by [`MemoryRepository`] with default options.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRepository::new()), StoreOptions::default())
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.options.retention
    }

    /// Persist a new dataset for `owner` and apply retention.
    ///
    /// Nothing is persisted unless the whole dataset is. Retention runs after the dataset is
    /// durable; failures there are logged and reported to the observer, never returned.
    pub fn commit(
        &self,
        owner: &OwnerId,
        source: CommitSource<'_>,
        records: Vec<EquipmentRecord>,
    ) -> ProcessingResult<Commit> {
        self.with_owner_lock(owner, || self.commit_locked(owner, source, records))
    }

    fn commit_locked(
        &self,
        owner: &OwnerId,
        source: CommitSource<'_>,
        records: Vec<EquipmentRecord>,
    ) -> ProcessingResult<Commit> {
        let aggregate = aggregate(&records);
        let id = self.repo.next_id()?;
        let created_at = self.clock.now();

        let source_path = match (&self.options.artifacts, source.bytes) {
            (Some(artifacts), Some(bytes)) => {
                Some(artifacts.write(owner, id, source.filename, bytes)?)
            }
            _ => None,
        };

        let dataset = Dataset {
            id,
            owner: owner.clone(),
            name: source.filename.to_owned(),
            created_at,
            source_path,
            record_count: aggregate.count,
            statistics: aggregate.snapshot,
        };

        let stored = StoredDataset {
            dataset: dataset.clone(),
            records,
        };
        if let Err(e) = self.repo.insert(stored) {
            error!(%owner, dataset = %id, error = %e, "failed to persist dataset");
            if let (Some(artifacts), Some(path)) = (&self.options.artifacts, &dataset.source_path) {
                if let Err(cleanup) = artifacts.remove(path) {
                    warn!(
                        path = %path.display(),
                        error = %cleanup,
                        "failed to remove artifact of aborted commit"
                    );
                }
            }
            return Err(e);
        }
        debug!(%owner, dataset = %id, rows = dataset.record_count, "dataset persisted");

        let evicted = self.enforce_retention(owner, &dataset);

        Ok(Commit {
            dataset,
            aggregate,
            evicted,
        })
    }

    /// Datasets for `owner`, most recent first.
    ///
    /// Waits for any in-flight commit of the same owner, so the cap always holds in the result.
    pub fn list_by_owner(&self, owner: &OwnerId) -> ProcessingResult<Vec<Dataset>> {
        self.with_owner_lock(owner, || self.repo.list_by_owner(owner))
    }

    /// Load a dataset and its records. Datasets of other owners are reported as not found.
    pub fn get(&self, owner: &OwnerId, id: DatasetId) -> ProcessingResult<StoredDataset> {
        match self.repo.get(id)? {
            Some(stored) if &stored.dataset.owner == owner => Ok(stored),
            _ => Err(ProcessingError::NotFound { id }),
        }
    }

    /// Delete a dataset, its records and its backing artifact.
    pub fn delete(&self, owner: &OwnerId, id: DatasetId) -> ProcessingResult<()> {
        self.with_owner_lock(owner, || {
            let dataset = self.get(owner, id)?.dataset;
            self.remove_dataset(&dataset, CleanupReason::Delete)?;
            info!(%owner, dataset = %id, "dataset deleted");
            Ok(())
        })
    }

    fn enforce_retention(&self, owner: &OwnerId, newest: &Dataset) -> Vec<DatasetId> {
        let existing = match self.repo.list_by_owner(owner) {
            Ok(list) => list,
            Err(e) => {
                error!(
                    %owner,
                    dataset = %newest.id,
                    error = %e,
                    "retention could not list datasets"
                );
                self.report_cleanup_failure(newest, CleanupReason::Retention, &e);
                return Vec::new();
            }
        };

        let plan = self.options.retention.plan(&existing, newest);
        let mut evicted = Vec::with_capacity(plan.evict.len());
        for old in plan.evict {
            match self.remove_dataset(old, CleanupReason::Retention) {
                Ok(()) => {
                    info!(
                        %owner,
                        dataset = %old.id,
                        created_at = %old.created_at,
                        "evicted by retention"
                    );
                    evicted.push(old.id);
                }
                Err(e) => {
                    error!(%owner, dataset = %old.id, error = %e, "retention eviction failed");
                    self.report_cleanup_failure(old, CleanupReason::Retention, &e);
                }
            }
        }
        evicted
    }

    /// Remove the entity first, then its artifact. The entity removal decides success; a leftover
    /// artifact is reported to the operator channel.
    fn remove_dataset(&self, dataset: &Dataset, reason: CleanupReason) -> ProcessingResult<()> {
        self.repo.remove(dataset.id)?;

        if let (Some(artifacts), Some(path)) = (&self.options.artifacts, &dataset.source_path) {
            if let Err(e) = artifacts.remove(path) {
                error!(
                    owner = %dataset.owner,
                    dataset = %dataset.id,
                    path = %path.display(),
                    error = %e,
                    "failed to remove backing artifact"
                );
                self.report_cleanup_failure(dataset, reason, &e);
            }
        }
        Ok(())
    }

    fn report_cleanup_failure(
        &self,
        dataset: &Dataset,
        reason: CleanupReason,
        err: &ProcessingError,
    ) {
        if let Some(obs) = &self.options.observer {
            obs.on_cleanup_failure(
                &CleanupContext {
                    owner: dataset.owner.clone(),
                    dataset: dataset.id,
                    artifact: dataset.source_path.clone(),
                    reason,
                },
                err,
            );
        }
    }

    /// Run `f` holding `owner`'s lock. The lock entry is dropped again once nobody holds it, so
    /// the map only carries owners with an operation in flight.
    fn with_owner_lock<T>(&self, owner: &OwnerId, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self.owner_locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(owner.clone()).or_default())
        };
        let out = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        drop(lock);

        let mut locks = self.owner_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(owner).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(owner);
        }
        out
    }
}
