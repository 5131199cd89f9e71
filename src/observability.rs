//! Observer hooks for upload outcomes and operator alerts.
//!
//! The pipeline logs through `tracing` on its own; an observer is the operator channel on top of
//! that, e.g. for retention cleanup that failed after the new dataset was already committed.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::ProcessingError;
use crate::types::{DatasetId, OwnerId};

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (operation failed because of its input).
    Error,
    /// Critical error (I/O or persistence failures).
    Critical,
}

impl std::str::FromStr for Severity {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            _ => Err(ProcessingError::config(format!("invalid severity: {s}"))),
        }
    }
}

impl Severity {
    /// Classify a pipeline error.
    pub fn of(err: &ProcessingError) -> Self {
        match err {
            ProcessingError::Io(_) | ProcessingError::Json(_) | ProcessingError::Storage { .. } => {
                Self::Critical
            }
            ProcessingError::Csv(e) => match e.kind() {
                ::csv::ErrorKind::Io(_) => Self::Critical,
                _ => Self::Error,
            },
            ProcessingError::Schema { .. }
            | ProcessingError::UnsupportedFormat { .. }
            | ProcessingError::Render { .. }
            | ProcessingError::Config { .. } => Self::Error,
            ProcessingError::NotFound { .. } => Self::Warning,
        }
    }
}

/// Context about an upload attempt.
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub owner: OwnerId,
    pub filename: String,
}

/// Stats reported once an upload is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadStats {
    pub dataset: DatasetId,
    /// Records stored.
    pub rows: usize,
    /// Rows discarded as incomplete.
    pub dropped_rows: usize,
    /// Older datasets removed by retention.
    pub evicted: usize,
}

/// Why a dataset was being removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    /// Evicted by the retention cap after a newer commit.
    Retention,
    /// Deleted on the owner's request.
    Delete,
}

/// A dataset removal that could not be completed.
#[derive(Debug, Clone)]
pub struct CleanupContext {
    pub owner: OwnerId,
    pub dataset: DatasetId,
    pub artifact: Option<PathBuf>,
    pub reason: CleanupReason,
}

/// Observer interface for pipeline outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait PipelineObserver: Send + Sync {
    /// Called when an upload is committed.
    fn on_success(&self, _ctx: &UploadContext, _stats: UploadStats) {}

    /// Called when an upload fails.
    fn on_failure(&self, _ctx: &UploadContext, _severity: Severity, _error: &ProcessingError) {}

    /// Called when an upload failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &UploadContext, severity: Severity, error: &ProcessingError) {
        self.on_failure(ctx, severity, error)
    }

    /// Called when an old dataset or its backing artifact could not be removed.
    ///
    /// For [`CleanupReason::Retention`] the commit that triggered it has already succeeded.
    fn on_cleanup_failure(&self, _ctx: &CleanupContext, _error: &ProcessingError) {}
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_success(&self, ctx: &UploadContext, stats: UploadStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &UploadContext, severity: Severity, error: &ProcessingError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &UploadContext, severity: Severity, error: &ProcessingError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }

    fn on_cleanup_failure(&self, ctx: &CleanupContext, error: &ProcessingError) {
        for o in &self.observers {
            o.on_cleanup_failure(ctx, error);
        }
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_success(&self, ctx: &UploadContext, stats: UploadStats) {
        info!(
            owner = %ctx.owner,
            file = %ctx.filename,
            dataset = %stats.dataset,
            rows = stats.rows,
            dropped = stats.dropped_rows,
            evicted = stats.evicted,
            "upload committed"
        );
    }

    fn on_failure(&self, ctx: &UploadContext, severity: Severity, error: &ProcessingError) {
        warn!(owner = %ctx.owner, file = %ctx.filename, ?severity, %error, "upload failed");
    }

    fn on_alert(&self, ctx: &UploadContext, severity: Severity, error: &ProcessingError) {
        error!(owner = %ctx.owner, file = %ctx.filename, ?severity, %error, "upload alert");
    }

    fn on_cleanup_failure(&self, ctx: &CleanupContext, error: &ProcessingError) {
        error!(
            owner = %ctx.owner,
            dataset = %ctx.dataset,
            artifact = ?ctx.artifact,
            reason = ?ctx.reason,
            %error,
            "dataset cleanup failed"
        );
    }
}

/// Appends events to a local operator log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{} {line}", Utc::now().to_rfc3339());
        }
    }
}

impl PipelineObserver for FileObserver {
    fn on_success(&self, ctx: &UploadContext, stats: UploadStats) {
        self.append_line(&format!(
            "ok owner={} file={} dataset={} rows={} dropped={} evicted={}",
            ctx.owner, ctx.filename, stats.dataset, stats.rows, stats.dropped_rows, stats.evicted
        ));
    }

    fn on_failure(&self, ctx: &UploadContext, severity: Severity, error: &ProcessingError) {
        self.append_line(&format!(
            "fail severity={severity:?} owner={} file={} err={error}",
            ctx.owner, ctx.filename
        ));
    }

    fn on_alert(&self, ctx: &UploadContext, severity: Severity, error: &ProcessingError) {
        self.append_line(&format!(
            "ALERT severity={severity:?} owner={} file={} err={error}",
            ctx.owner, ctx.filename
        ));
    }

    fn on_cleanup_failure(&self, ctx: &CleanupContext, error: &ProcessingError) {
        self.append_line(&format!(
            "CLEANUP reason={:?} owner={} dataset={} artifact={:?} err={error}",
            ctx.reason, ctx.owner, ctx.dataset, ctx.artifact
        ));
    }
}
