//! The operations a transport exposes, wired over parser, store and renderer.
//!
//! Every call takes an already-authenticated [`OwnerId`]; datasets of other owners are reported as
//! [`ProcessingError::NotFound`].
//!
//! ```no_run
//! use equipment_data_processing::config::Config;
//! use equipment_data_processing::service::EquipmentService;
//! use equipment_data_processing::types::OwnerId;
//!
//! # fn main() -> Result<(), equipment_data_processing::ProcessingError> {
//! let service = EquipmentService::open(&Config::from_env()?)?;
//! let owner = OwnerId::new("alice");
//! let summary = service.upload_from_path(&owner, "plant.csv")?;
//! let pdf = service.get_report(&owner, summary.id)?;
//! println!("{} records, {} byte report", summary.record_count, pdf.len());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::{ProcessingError, ProcessingResult};
use crate::ingestion::{parse_upload, Upload};
use crate::observability::{
    CompositeObserver, FileObserver, PipelineObserver, Severity, TracingObserver, UploadContext,
    UploadStats,
};
use crate::processing::TypeDistribution;
use crate::report::ReportRenderer;
use crate::storage::{
    ArtifactStore, CommitSource, DatasetRepository, DatasetStore, JsonFileRepository,
    MemoryRepository, RetentionPolicy, StoreOptions,
};
use crate::types::{Dataset, DatasetId, DatasetListing, DatasetSummary, OwnerId, StoredDataset};

/// Upload, inspect, report on and delete an owner's equipment datasets.
pub struct EquipmentService {
    store: DatasetStore,
    renderer: ReportRenderer,
    reports_dir: PathBuf,
    observer: Arc<dyn PipelineObserver>,
    alert_at_or_above: Severity,
}

impl fmt::Debug for EquipmentService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EquipmentService")
            .field("store", &self.store)
            .field("renderer", &self.renderer)
            .field("reports_dir", &self.reports_dir)
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish_non_exhaustive()
    }
}

impl EquipmentService {
    /// File-backed service rooted at `config.data_dir`.
    pub fn open(config: &Config) -> ProcessingResult<Self> {
        Self::open_with_observer(config, None)
    }

    /// Like [`Self::open`], with an extra observer alongside the built-in ones.
    pub fn open_with_observer(
        config: &Config,
        observer: Option<Arc<dyn PipelineObserver>>,
    ) -> ProcessingResult<Self> {
        config.validate()?;
        let uploads = config.uploads_dir();
        fs::create_dir_all(&uploads)?;
        let repo = JsonFileRepository::open(config.datasets_dir())?;
        info!(data_dir = %config.data_dir.display(), "opened equipment store");
        Ok(Self::assemble(
            config,
            Arc::new(repo),
            Some(ArtifactStore::new(uploads)),
            observer,
        ))
    }

    /// In-memory service with default settings and no backing artifacts.
    pub fn in_memory() -> Self {
        Self::assemble(
            &Config::default(),
            Arc::new(MemoryRepository::new()),
            None,
            None,
        )
    }

    /// In-memory service with the given settings; uploads are not copied to disk.
    pub fn in_memory_with(
        config: &Config,
        observer: Option<Arc<dyn PipelineObserver>>,
    ) -> ProcessingResult<Self> {
        config.validate()?;
        Ok(Self::assemble(
            config,
            Arc::new(MemoryRepository::new()),
            None,
            observer,
        ))
    }

    fn assemble(
        config: &Config,
        repo: Arc<dyn DatasetRepository>,
        artifacts: Option<ArtifactStore>,
        extra: Option<Arc<dyn PipelineObserver>>,
    ) -> Self {
        let mut observers: Vec<Arc<dyn PipelineObserver>> = vec![Arc::new(TracingObserver)];
        if let Some(path) = &config.operator_log {
            observers.push(Arc::new(FileObserver::new(path)));
        }
        observers.extend(extra);
        let observer: Arc<dyn PipelineObserver> = Arc::new(CompositeObserver::new(observers));

        let store = DatasetStore::new(
            repo,
            StoreOptions {
                retention: RetentionPolicy::new(config.retention_limit),
                artifacts,
                observer: Some(Arc::clone(&observer)),
            },
        );

        Self {
            store,
            renderer: ReportRenderer::new(config.report_detail_rows),
            reports_dir: config.reports_dir(),
            observer,
            alert_at_or_above: config.alert_at_or_above,
        }
    }

    /// Validate, parse, aggregate and commit an uploaded CSV.
    ///
    /// The dataset is named after `filename`. Rows with an empty or non-numeric cell are dropped;
    /// a missing column rejects the whole upload with [`ProcessingError::Schema`].
    pub fn upload(
        &self,
        owner: &OwnerId,
        filename: &str,
        bytes: impl Into<Vec<u8>>,
    ) -> ProcessingResult<DatasetSummary> {
        self.submit(owner, &Upload::new(filename, bytes))
    }

    /// Upload a local file. The path must end in `.csv` (any case).
    pub fn upload_from_path(
        &self,
        owner: &OwnerId,
        path: impl AsRef<Path>,
    ) -> ProcessingResult<DatasetSummary> {
        let path = path.as_ref();
        match Upload::from_path(path) {
            Ok(upload) => self.submit(owner, &upload),
            Err(e) => {
                let ctx = UploadContext {
                    owner: owner.clone(),
                    filename: path.display().to_string(),
                };
                self.notify_failure(&ctx, &e);
                Err(e)
            }
        }
    }

    /// Commit an [`Upload`], notifying the observer of the outcome.
    pub fn submit(&self, owner: &OwnerId, upload: &Upload) -> ProcessingResult<DatasetSummary> {
        let ctx = UploadContext {
            owner: owner.clone(),
            filename: upload.filename.clone(),
        };

        match self.commit_upload(owner, upload) {
            Ok((summary, stats)) => {
                self.observer.on_success(&ctx, stats);
                Ok(summary)
            }
            Err(e) => {
                self.notify_failure(&ctx, &e);
                Err(e)
            }
        }
    }

    fn commit_upload(
        &self,
        owner: &OwnerId,
        upload: &Upload,
    ) -> ProcessingResult<(DatasetSummary, UploadStats)> {
        let table = parse_upload(upload)?;
        let dropped_rows = table.dropped_rows;
        let commit = self.store.commit(
            owner,
            CommitSource {
                filename: &upload.filename,
                bytes: Some(&upload.bytes),
            },
            table.records,
        )?;

        let stats = UploadStats {
            dataset: commit.dataset.id,
            rows: commit.dataset.record_count,
            dropped_rows,
            evicted: commit.evicted.len(),
        };
        let summary = summary_of(&commit.dataset, &commit.aggregate.distribution);
        Ok((summary, stats))
    }

    fn notify_failure(&self, ctx: &UploadContext, err: &ProcessingError) {
        let severity = Severity::of(err);
        self.observer.on_failure(ctx, severity, err);
        if severity >= self.alert_at_or_above {
            self.observer.on_alert(ctx, severity, err);
        }
    }

    /// The dataset and its records in stored order.
    pub fn get_dataset(&self, owner: &OwnerId, id: DatasetId) -> ProcessingResult<StoredDataset> {
        self.store.get(owner, id)
    }

    /// Stored statistics plus the type distribution recomputed from the records.
    pub fn get_summary(&self, owner: &OwnerId, id: DatasetId) -> ProcessingResult<DatasetSummary> {
        let stored = self.store.get(owner, id)?;
        let distribution = TypeDistribution::from_records(&stored.records);
        Ok(summary_of(&stored.dataset, &distribution))
    }

    /// PDF report bytes for a dataset.
    pub fn get_report(&self, owner: &OwnerId, id: DatasetId) -> ProcessingResult<Vec<u8>> {
        let stored = self.store.get(owner, id)?;
        self.renderer.render(&stored.dataset, &stored.records)
    }

    /// Render the report into the reports directory and return its path.
    pub fn export_report(&self, owner: &OwnerId, id: DatasetId) -> ProcessingResult<PathBuf> {
        let stored = self.store.get(owner, id)?;
        self.renderer
            .export(&stored.dataset, &stored.records, &self.reports_dir)
    }

    /// Remove a dataset, its records and its backing upload.
    pub fn delete_dataset(&self, owner: &OwnerId, id: DatasetId) -> ProcessingResult<()> {
        self.store.delete(owner, id)
    }

    /// The owner's datasets, most recent first.
    pub fn list_datasets(&self, owner: &OwnerId) -> ProcessingResult<Vec<DatasetListing>> {
        Ok(self
            .store
            .list_by_owner(owner)?
            .iter()
            .map(DatasetListing::from)
            .collect())
    }
}

fn summary_of(dataset: &Dataset, distribution: &TypeDistribution) -> DatasetSummary {
    DatasetSummary {
        id: dataset.id,
        name: dataset.name.clone(),
        created_at: dataset.created_at,
        record_count: dataset.record_count,
        statistics: dataset.statistics,
        type_distribution: distribution.sorted(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::EquipmentService;
    use crate::config::Config;
    use crate::error::{ErrorKind, ProcessingError};
    use crate::observability::{PipelineObserver, Severity, UploadContext, UploadStats};
    use crate::types::{DatasetId, OwnerId};

    const VALID: &str = "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
                         P-101,Pump,120.5,5.2,80\n\
                         V-201,Valve,40,2.1,60\n\
                         P-102,Pump,98,4.8,75\n";

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<String>>,
    }

    impl PipelineObserver for Recording {
        fn on_success(&self, ctx: &UploadContext, stats: UploadStats) {
            self.events
                .lock()
                .unwrap()
                .push(format!("ok {} rows={}", ctx.filename, stats.rows));
        }

        fn on_failure(&self, ctx: &UploadContext, severity: Severity, _error: &ProcessingError) {
            self.events
                .lock()
                .unwrap()
                .push(format!("fail {} {severity:?}", ctx.filename));
        }

        fn on_alert(&self, ctx: &UploadContext, severity: Severity, _error: &ProcessingError) {
            self.events
                .lock()
                .unwrap()
                .push(format!("alert {} {severity:?}", ctx.filename));
        }
    }

    #[test]
    fn upload_returns_snapshot_and_sorted_distribution() {
        let service = EquipmentService::in_memory();
        let owner = OwnerId::new("alice");
        let summary = service.upload(&owner, "plant.csv", VALID).unwrap();

        assert_eq!(summary.name, "plant.csv");
        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.type_distribution[0].category, "Pump");
        assert_eq!(summary.type_distribution[0].count, 2);
        let stats = summary.statistics.unwrap();
        assert_eq!(stats.pressure.max, 5.2);

        assert_eq!(service.get_summary(&owner, summary.id).unwrap(), summary);
        let listing = service.list_datasets(&owner).unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].id, summary.id);
    }

    #[test]
    fn observer_sees_success_and_alerts_at_threshold() {
        let recording = Arc::new(Recording::default());
        let config = Config {
            alert_at_or_above: Severity::Error,
            ..Default::default()
        };
        let observer: Arc<dyn PipelineObserver> = recording.clone();
        let service = EquipmentService::in_memory_with(&config, Some(observer)).unwrap();
        let owner = OwnerId::new("alice");

        service.upload(&owner, "good.csv", VALID).unwrap();
        let err = service
            .upload(&owner, "bad.csv", "Equipment Name,Type\nP-1,Pump\n")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);

        let events = recording.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec!["ok good.csv rows=3", "fail bad.csv Error", "alert bad.csv Error"]
        );
    }

    #[test]
    fn other_owner_gets_not_found_everywhere() {
        let service = EquipmentService::in_memory();
        let alice = OwnerId::new("alice");
        let bob = OwnerId::new("bob");
        let id = service.upload(&alice, "a.csv", VALID).unwrap().id;

        assert!(matches!(service.get_dataset(&bob, id), Err(ProcessingError::NotFound { .. })));
        assert!(matches!(service.get_summary(&bob, id), Err(ProcessingError::NotFound { .. })));
        assert!(matches!(service.get_report(&bob, id), Err(ProcessingError::NotFound { .. })));
        assert!(matches!(service.delete_dataset(&bob, id), Err(ProcessingError::NotFound { .. })));
        assert!(service.list_datasets(&bob).unwrap().is_empty());

        service.delete_dataset(&alice, id).unwrap();
        assert!(matches!(
            service.get_dataset(&alice, id),
            Err(ProcessingError::NotFound { .. })
        ));
    }

    #[test]
    fn report_of_unknown_dataset_is_not_found_not_render() {
        let service = EquipmentService::in_memory();
        let err = service
            .get_report(&OwnerId::new("alice"), DatasetId(404))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn zero_retention_is_rejected() {
        let config = Config {
            retention_limit: 0,
            ..Default::default()
        };
        let err = EquipmentService::in_memory_with(&config, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
