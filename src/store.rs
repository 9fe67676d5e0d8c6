//! Collaborator stores for datasets, reports and column profiles.
//!
//! The engine reports into three seams: dataset identity and status, the
//! finalized audit report (upsert per dataset), and the per-column
//! profiles (replace per dataset). The trait objects keep real document
//! stores out of the core; the in-memory implementations back tests and
//! single-process deployments.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    audit::{ColumnProfile, HealthStatus, ScoreSummary},
    error::{Error, Result},
};

/// Lifecycle status of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetStatus {
    /// Registered, not yet audited.
    Uploaded,
    /// An audit is in flight.
    Processing,
    /// The last audit finished and its report is stored.
    Completed,
    /// The last audit failed; the report carries the error.
    Failed,
}

impl std::fmt::Display for DatasetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uploaded => write!(f, "uploaded"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A registered dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Stable identity, unique per dataset.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Path of the stored file.
    pub path: String,
    /// Current lifecycle status.
    pub status: DatasetStatus,
    /// Row count reported by the last completed audit.
    pub rows: Option<usize>,
    /// Column count reported by the last completed audit.
    pub columns: Option<usize>,
    /// When the dataset was registered.
    pub uploaded_at: DateTime<Utc>,
    /// When the last audit reached a terminal status.
    pub processed_at: Option<DateTime<Utc>>,
}

impl DatasetRecord {
    /// Register a new dataset in the `Uploaded` state.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: path.into(),
            status: DatasetStatus::Uploaded,
            rows: None,
            columns: None,
            uploaded_at: Utc::now(),
            processed_at: None,
        }
    }
}

/// The finalized audit report for one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// The audited dataset.
    pub dataset_id: String,
    /// Overall reliability score in `[0, 100]`.
    pub reliability_score: f64,
    /// Health band; `None` for failed runs.
    pub health: Option<HealthStatus>,
    /// Summary of the scoring inputs; `None` for failed runs.
    pub summary: Option<ScoreSummary>,
    /// Rows flagged by the multivariate model.
    pub anomaly_count: usize,
    /// Exact duplicate rows.
    pub duplicate_count: usize,
    /// Actionable follow-ups derived from the findings.
    pub recommendations: Vec<String>,
    /// Error captured when the audit failed.
    pub error_message: Option<String>,
    /// Whether anomaly statistics come from a subsample.
    pub is_sampled: bool,
    /// Rows the anomaly detectors actually saw.
    pub sample_size: usize,
    /// When the report was produced.
    pub created_at: DateTime<Utc>,
}

/// One column's profile and issue list, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfileRecord {
    /// Column name.
    pub column_name: String,
    /// The finalized profile.
    pub profile: ColumnProfile,
    /// Issue strings from both evaluators, in emission order.
    pub issues: Vec<String>,
}

/// Dataset identity and lifecycle persistence.
pub trait DatasetStore: Send + Sync {
    /// Register a dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    fn insert(&self, record: DatasetRecord) -> Result<()>;

    /// Fetch a dataset by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, dataset_id: &str) -> Result<Option<DatasetRecord>>;

    /// Update a dataset's lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DatasetNotFound`] for unknown ids.
    fn update_status(&self, dataset_id: &str, status: DatasetStatus) -> Result<()>;

    /// Record final row/column counts after a completed audit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DatasetNotFound`] for unknown ids.
    fn update_stats(&self, dataset_id: &str, rows: usize, columns: usize) -> Result<()>;

    /// List all known datasets.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list(&self) -> Result<Vec<DatasetRecord>>;
}

/// Audit report persistence, one report per dataset.
pub trait ReportStore: Send + Sync {
    /// Insert or overwrite the report for a dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    fn upsert(&self, report: AuditReport) -> Result<()>;

    /// Fetch the report for a dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, dataset_id: &str) -> Result<Option<AuditReport>>;
}

/// Column profile persistence, replaced wholesale per audit.
pub trait ProfileStore: Send + Sync {
    /// Replace all profiles for a dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    fn replace_for_dataset(
        &self,
        dataset_id: &str,
        columns: Vec<ColumnProfileRecord>,
    ) -> Result<()>;

    /// Fetch all profiles for a dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_for_dataset(&self, dataset_id: &str) -> Result<Vec<ColumnProfileRecord>>;
}

fn lock_err() -> Error {
    Error::store("store lock poisoned")
}

/// In-memory dataset store.
#[derive(Debug, Default, Clone)]
pub struct MemoryDatasetStore {
    datasets: Arc<Mutex<HashMap<String, DatasetRecord>>>,
}

impl MemoryDatasetStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DatasetStore for MemoryDatasetStore {
    fn insert(&self, record: DatasetRecord) -> Result<()> {
        let mut datasets = self.datasets.lock().map_err(|_| lock_err())?;
        datasets.insert(record.id.clone(), record);
        Ok(())
    }

    fn get(&self, dataset_id: &str) -> Result<Option<DatasetRecord>> {
        let datasets = self.datasets.lock().map_err(|_| lock_err())?;
        Ok(datasets.get(dataset_id).cloned())
    }

    fn update_status(&self, dataset_id: &str, status: DatasetStatus) -> Result<()> {
        let mut datasets = self.datasets.lock().map_err(|_| lock_err())?;
        let record = datasets
            .get_mut(dataset_id)
            .ok_or_else(|| Error::dataset_not_found(dataset_id))?;
        record.status = status;
        if matches!(status, DatasetStatus::Completed | DatasetStatus::Failed) {
            record.processed_at = Some(Utc::now());
        }
        Ok(())
    }

    fn update_stats(&self, dataset_id: &str, rows: usize, columns: usize) -> Result<()> {
        let mut datasets = self.datasets.lock().map_err(|_| lock_err())?;
        let record = datasets
            .get_mut(dataset_id)
            .ok_or_else(|| Error::dataset_not_found(dataset_id))?;
        record.rows = Some(rows);
        record.columns = Some(columns);
        Ok(())
    }

    fn list(&self) -> Result<Vec<DatasetRecord>> {
        let datasets = self.datasets.lock().map_err(|_| lock_err())?;
        let mut records: Vec<DatasetRecord> = datasets.values().cloned().collect();
        records.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(records)
    }
}

/// In-memory report store with upsert semantics.
#[derive(Debug, Default, Clone)]
pub struct MemoryReportStore {
    reports: Arc<Mutex<HashMap<String, AuditReport>>>,
}

impl MemoryReportStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportStore for MemoryReportStore {
    fn upsert(&self, report: AuditReport) -> Result<()> {
        let mut reports = self.reports.lock().map_err(|_| lock_err())?;
        reports.insert(report.dataset_id.clone(), report);
        Ok(())
    }

    fn get(&self, dataset_id: &str) -> Result<Option<AuditReport>> {
        let reports = self.reports.lock().map_err(|_| lock_err())?;
        Ok(reports.get(dataset_id).cloned())
    }
}

/// In-memory profile store with replace semantics.
#[derive(Debug, Default, Clone)]
pub struct MemoryProfileStore {
    profiles: Arc<Mutex<HashMap<String, Vec<ColumnProfileRecord>>>>,
}

impl MemoryProfileStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn replace_for_dataset(
        &self,
        dataset_id: &str,
        columns: Vec<ColumnProfileRecord>,
    ) -> Result<()> {
        let mut profiles = self.profiles.lock().map_err(|_| lock_err())?;
        profiles.insert(dataset_id.to_string(), columns);
        Ok(())
    }

    fn get_for_dataset(&self, dataset_id: &str) -> Result<Vec<ColumnProfileRecord>> {
        let profiles = self.profiles.lock().map_err(|_| lock_err())?;
        Ok(profiles.get(dataset_id).cloned().unwrap_or_default())
    }
}
