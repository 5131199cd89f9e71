//! Service configuration.
//!
//! Settings are an explicit value handed to [`crate::service::EquipmentService::open`]; nothing in
//! the core reads globals.
//!
//! Environment variables read by [`Config::from_env`]:
//! - `EQUIPMENT_DATA_DIR`: root directory (default `./media`)
//! - `EQUIPMENT_RETENTION_LIMIT`: datasets kept per owner (default 5)
//! - `EQUIPMENT_REPORT_DETAIL_ROWS`: records listed in a report (default 50)
//! - `EQUIPMENT_ALERT_AT`: alert threshold (`info`, `warning`, `error`, `critical`)
//! - `EQUIPMENT_OPERATOR_LOG`: append-only operator event log file
//! - `EQUIPMENT_LOG_LEVEL`, `EQUIPMENT_LOG_FORMAT`, `EQUIPMENT_LOG_FILTER`: see [`LogConfig`]

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, ProcessingResult};
use crate::logging::LogConfig;
use crate::observability::Severity;
use crate::report::DEFAULT_DETAIL_ROWS;
use crate::storage::DEFAULT_RETENTION_LIMIT;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root for `datasets/`, `uploads/` and `reports/`.
    pub data_dir: PathBuf,
    pub retention_limit: usize,
    pub report_detail_rows: usize,
    /// Upload failures at or above this severity also raise `on_alert`.
    pub alert_at_or_above: Severity,
    pub operator_log: Option<PathBuf>,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./media"),
            retention_limit: DEFAULT_RETENTION_LIMIT,
            report_detail_rows: DEFAULT_DETAIL_ROWS,
            alert_at_or_above: Severity::Critical,
            operator_log: None,
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load from `EQUIPMENT_*` environment variables on top of the defaults.
    pub fn from_env() -> ProcessingResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup on top of the defaults.
    pub fn from_lookup<F>(lookup: F) -> ProcessingResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("EQUIPMENT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup("EQUIPMENT_RETENTION_LIMIT") {
            config.retention_limit = parse_number("EQUIPMENT_RETENTION_LIMIT", &v)?;
        }
        if let Some(v) = lookup("EQUIPMENT_REPORT_DETAIL_ROWS") {
            config.report_detail_rows = parse_number("EQUIPMENT_REPORT_DETAIL_ROWS", &v)?;
        }
        if let Some(v) = lookup("EQUIPMENT_ALERT_AT") {
            config.alert_at_or_above = v.parse()?;
        }
        if let Some(path) = lookup("EQUIPMENT_OPERATOR_LOG") {
            config.operator_log = Some(PathBuf::from(path));
        }
        if let Some(v) = lookup("EQUIPMENT_LOG_LEVEL") {
            config.log.level = v.parse()?;
        }
        if let Some(v) = lookup("EQUIPMENT_LOG_FORMAT") {
            config.log.format = v.parse()?;
        }
        if let Some(v) = lookup("EQUIPMENT_LOG_FILTER") {
            config.log.filter_directives = Some(v);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot honor.
    pub fn validate(&self) -> ProcessingResult<()> {
        if self.retention_limit == 0 {
            return Err(ProcessingError::config("retention_limit must be at least 1"));
        }
        Ok(())
    }

    pub fn datasets_dir(&self) -> PathBuf {
        self.data_dir.join("datasets")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> ProcessingResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ProcessingError::config(format!("{key}='{raw}': {e}")))
}
