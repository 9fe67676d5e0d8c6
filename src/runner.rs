//! Audit orchestration.
//!
//! One logical pipeline per audit: chunks are fed strictly in arrival
//! order to the five accumulators, then the finalize chain runs
//! sequentially (profiles, issue evaluation, duplicate stats, anomaly
//! stats, score). [`run_pipeline`] is the store-free engine entry;
//! [`Auditor`] wraps it with dataset lifecycle, mutual exclusion and
//! report persistence.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::{
    audit::{
        compute_reliability_score, AnomalyDetector, AnomalyStats, ColumnProfile, ColumnProfiler,
        ConsistencyChecker, DuplicateDetector, DuplicateStats, InconsistencyDetector,
        ReliabilityScore,
    },
    config::AuditConfig,
    error::{Error, Result},
    source::{open_source, ChunkSource},
    store::{
        AuditReport, ColumnProfileRecord, DatasetStatus, DatasetStore, ProfileStore, ReportStore,
    },
};

/// Everything one audit run produces.
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    /// Total rows observed by the profiler.
    pub total_rows: usize,
    /// Finalized per-column profiles.
    pub profiles: HashMap<String, ColumnProfile>,
    /// Merged issue map from both evaluators, in emission order.
    pub issues: HashMap<String, Vec<String>>,
    /// Duplicate statistics.
    pub duplicates: DuplicateStats,
    /// Anomaly statistics.
    pub anomalies: AnomalyStats,
    /// The combined reliability score.
    pub score: ReliabilityScore,
    /// Actionable follow-ups derived from the findings.
    pub recommendations: Vec<String>,
    /// Whether anomaly statistics come from a subsample of the stream.
    pub is_sampled: bool,
}

/// Drive one chunk stream through the whole engine.
///
/// The accumulators are chunk-independent, so their per-chunk update
/// order is irrelevant; the finalize chain below is strictly sequential
/// because each stage consumes the previous stage's output.
///
/// # Errors
///
/// Propagates the first stream-level failure from the source. Data
/// problems are findings, not errors.
pub fn run_pipeline(source: &mut dyn ChunkSource, config: &AuditConfig) -> Result<AuditOutcome> {
    let mut profiler = ColumnProfiler::new();
    let mut inconsistencies = InconsistencyDetector::new();
    let mut consistency = ConsistencyChecker::new();
    let mut duplicates = DuplicateDetector::new();
    let mut anomalies = AnomalyDetector::new();

    while let Some(chunk) = source.next_chunk()? {
        profiler.process_chunk(&chunk);
        inconsistencies.process_chunk(&chunk);
        consistency.process_chunk(&chunk);
        duplicates.process_chunk(&chunk);
        anomalies.process_chunk_for_sampling(&chunk);
    }

    let (profiles, total_rows) = profiler.build_profiles();
    info!(
        total_rows,
        columns = profiles.len(),
        "profiling completed"
    );

    let mut issues = inconsistencies.evaluate(&profiles);
    let consistency_issues = consistency.evaluate(&profiles);
    // One unified issue view: consistency messages append after
    // inconsistency messages per column, no deduplication.
    for (column, messages) in consistency_issues {
        issues.entry(column).or_default().extend(messages);
    }
    info!(columns_with_issues = issues.len(), "issue detection completed");

    let duplicate_stats = duplicates.stats();
    info!(
        duplicates = duplicate_stats.duplicate_count,
        ratio = duplicate_stats.duplicate_ratio,
        "duplicate detection completed"
    );

    let anomaly_stats = anomalies.compute_anomalies();
    let is_sampled =
        total_rows > 0 && anomaly_stats.sample_size > 0 && total_rows > anomaly_stats.sample_size;
    info!(
        anomalies = anomaly_stats.anomaly_count,
        ratio = anomaly_stats.anomaly_ratio,
        sample_size = anomaly_stats.sample_size,
        is_sampled,
        "anomaly detection completed"
    );

    let score = compute_reliability_score(
        &profiles,
        &issues,
        &anomaly_stats,
        &duplicate_stats,
        &config.weights,
    );
    info!(score = score.score, status = %score.status, "scoring completed");

    let recommendations =
        build_recommendations(&profiles, &issues, &anomaly_stats, &duplicate_stats);

    Ok(AuditOutcome {
        total_rows,
        profiles,
        issues,
        duplicates: duplicate_stats,
        anomalies: anomaly_stats,
        score,
        recommendations,
        is_sampled,
    })
}

/// Simple textual recommendations from the finalized metrics.
fn build_recommendations(
    profiles: &HashMap<String, ColumnProfile>,
    issues: &HashMap<String, Vec<String>>,
    anomaly_stats: &AnomalyStats,
    duplicate_stats: &DuplicateStats,
) -> Vec<String> {
    let mut recommendations: Vec<String> = Vec::new();

    let mut high_missing: Vec<&str> = profiles
        .iter()
        .filter(|(_, p)| p.missing_percentage > 30.0)
        .map(|(name, _)| name.as_str())
        .collect();
    high_missing.sort_unstable();
    if !high_missing.is_empty() {
        recommendations.push(format!(
            "Columns with high missing values (>30%): {}. Consider imputation or dropping.",
            high_missing.join(", ")
        ));
    }

    if !issues.is_empty() {
        let mut columns: Vec<&str> = issues.keys().map(|k| k.as_str()).collect();
        columns.sort_unstable();
        recommendations.push(format!(
            "Resolve schema inconsistencies in columns: {}",
            columns.join(", ")
        ));
    }

    if anomaly_stats.anomaly_ratio > 0.05 {
        recommendations.push(
            "High anomaly ratio detected; review outlier records for data quality issues."
                .to_string(),
        );
    }

    if duplicate_stats.duplicate_ratio > 0.01 {
        recommendations.push(
            "Significant duplicate records found; consider de-duplication strategies.".to_string(),
        );
    }

    if recommendations.is_empty() {
        recommendations.push("Dataset quality is generally good; monitor periodically.".to_string());
    }

    recommendations
}

/// Orchestrates full audits against the collaborator stores.
///
/// Multiple datasets may be audited concurrently as independent
/// pipelines; per dataset, mutual exclusion is enforced through the
/// `Processing` status so a re-audit cannot interleave with a running
/// one.
pub struct Auditor {
    datasets: Arc<dyn DatasetStore>,
    reports: Arc<dyn ReportStore>,
    profiles: Arc<dyn ProfileStore>,
    config: AuditConfig,
}

impl Auditor {
    /// Create an auditor over the given stores.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is out of
    /// range.
    pub fn new(
        datasets: Arc<dyn DatasetStore>,
        reports: Arc<dyn ReportStore>,
        profiles: Arc<dyn ProfileStore>,
        config: AuditConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            datasets,
            reports,
            profiles,
            config,
        })
    }

    /// Execute the audit pipeline for a registered dataset.
    ///
    /// Any pipeline failure is caught here once: the dataset is marked
    /// `Failed`, a failed report with the captured error is upserted, and
    /// the error is returned. The host process never sees a panic.
    ///
    /// # Errors
    ///
    /// [`Error::DatasetNotFound`] for unknown ids,
    /// [`Error::AuditInProgress`] when the dataset is already being
    /// audited, or the underlying stream failure.
    pub fn run_audit(&self, dataset_id: &str) -> Result<AuditOutcome> {
        let dataset = self
            .datasets
            .get(dataset_id)?
            .ok_or_else(|| Error::dataset_not_found(dataset_id))?;

        if dataset.status == DatasetStatus::Processing {
            info!(dataset_id, "concurrent audit prevented");
            return Err(Error::audit_in_progress(dataset_id));
        }

        self.datasets
            .update_status(dataset_id, DatasetStatus::Processing)?;
        info!(dataset_id, path = %dataset.path, "audit started");

        match self.run_to_completion(dataset_id, &dataset.path) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let error_message = e.to_string();
                error!(dataset_id, error = %error_message, "audit failed");
                self.record_failure(dataset_id, &error_message);
                Err(e)
            }
        }
    }

    fn run_to_completion(&self, dataset_id: &str, path: &str) -> Result<AuditOutcome> {
        let mut source = open_source(path, self.config.chunk_size)?;
        let outcome = run_pipeline(source.as_mut(), &self.config)?;

        let columns: Vec<ColumnProfileRecord> = outcome
            .profiles
            .iter()
            .map(|(name, profile)| ColumnProfileRecord {
                column_name: name.clone(),
                profile: profile.clone(),
                issues: outcome.issues.get(name).cloned().unwrap_or_default(),
            })
            .collect();
        let column_count = columns.len();
        self.profiles.replace_for_dataset(dataset_id, columns)?;

        self.reports.upsert(AuditReport {
            dataset_id: dataset_id.to_string(),
            reliability_score: outcome.score.score,
            health: Some(outcome.score.status),
            summary: Some(outcome.score.summary.clone()),
            anomaly_count: outcome.anomalies.anomaly_count,
            duplicate_count: outcome.duplicates.duplicate_count,
            recommendations: outcome.recommendations.clone(),
            error_message: None,
            is_sampled: outcome.is_sampled,
            sample_size: outcome.anomalies.sample_size,
            created_at: Utc::now(),
        })?;

        self.datasets
            .update_stats(dataset_id, outcome.total_rows, column_count)?;
        self.datasets
            .update_status(dataset_id, DatasetStatus::Completed)?;
        info!(
            dataset_id,
            rows = outcome.total_rows,
            columns = column_count,
            "audit completed"
        );

        Ok(outcome)
    }

    /// Best-effort terminal bookkeeping for a failed run.
    fn record_failure(&self, dataset_id: &str, error_message: &str) {
        if let Err(e) = self
            .datasets
            .update_status(dataset_id, DatasetStatus::Failed)
        {
            error!(dataset_id, error = %e, "failed to mark dataset as failed");
        }
        let report = AuditReport {
            dataset_id: dataset_id.to_string(),
            reliability_score: 0.0,
            health: None,
            summary: None,
            anomaly_count: 0,
            duplicate_count: 0,
            recommendations: vec!["System error during analysis. Check logs.".to_string()],
            error_message: Some(error_message.to_string()),
            is_sampled: false,
            sample_size: 0,
            created_at: Utc::now(),
        };
        if let Err(e) = self.reports.upsert(report) {
            error!(dataset_id, error = %e, "failed to persist failure report");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use crate::{
        audit::HealthStatus,
        source::MemoryChunkSource,
        store::{DatasetRecord, MemoryDatasetStore, MemoryProfileStore, MemoryReportStore},
    };

    use super::*;

    fn csv_batch(rows: &[(&str, &str)]) -> arrow::array::RecordBatch {
        use arrow::{
            array::StringArray,
            datatypes::{DataType, Field, Schema},
        };
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, true),
            Field::new("value", DataType::Utf8, true),
        ]));
        let names: Vec<&str> = rows.iter().map(|(n, _)| *n).collect();
        let values: Vec<&str> = rows.iter().map(|(_, v)| *v).collect();
        arrow::array::RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(names)),
                Arc::new(StringArray::from(values)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_run_pipeline_clean_data() {
        // Five repeated groups keep the categorical column clear of the
        // rare-value heuristic.
        let rows: Vec<(String, String)> = (0..50)
            .map(|i| (format!("grp{}", i % 5), format!("{}", i)))
            .collect();
        let refs: Vec<(&str, &str)> = rows.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let mut source = MemoryChunkSource::new(vec![csv_batch(&refs)]);

        let outcome = run_pipeline(&mut source, &AuditConfig::default()).unwrap();
        assert_eq!(outcome.total_rows, 50);
        assert_eq!(outcome.profiles.len(), 2);
        assert_eq!(outcome.duplicates.duplicate_count, 0);
        assert_eq!(outcome.score.status, HealthStatus::Healthy);
        assert!(!outcome.is_sampled);
    }

    #[test]
    fn test_run_pipeline_empty_stream() {
        let mut source = MemoryChunkSource::new(Vec::new());
        let outcome = run_pipeline(&mut source, &AuditConfig::default()).unwrap();

        assert_eq!(outcome.total_rows, 0);
        assert!(outcome.score.score.abs() < 1e-12);
        assert_eq!(outcome.score.status, HealthStatus::Critical);
    }

    fn auditor_with_file(contents: &str) -> (Auditor, MemoryDatasetStore, MemoryReportStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();

        let datasets = MemoryDatasetStore::new();
        let reports = MemoryReportStore::new();
        let profiles = MemoryProfileStore::new();
        datasets
            .insert(DatasetRecord::new(
                "ds-1",
                "data",
                path.to_string_lossy().to_string(),
            ))
            .unwrap();

        let auditor = Auditor::new(
            Arc::new(datasets.clone()),
            Arc::new(reports.clone()),
            Arc::new(profiles),
            AuditConfig::default().with_chunk_size(100),
        )
        .unwrap();
        (auditor, datasets, reports, dir)
    }

    #[test]
    fn test_run_audit_completes_and_persists() {
        let (auditor, datasets, reports, _dir) =
            auditor_with_file("id,amount\n1,10\n2,20\n3,30\n4,40\n");

        let outcome = auditor.run_audit("ds-1").unwrap();
        assert_eq!(outcome.total_rows, 4);

        let dataset = datasets.get("ds-1").unwrap().unwrap();
        assert_eq!(dataset.status, DatasetStatus::Completed);
        assert_eq!(dataset.rows, Some(4));
        assert_eq!(dataset.columns, Some(2));

        let report = reports.get("ds-1").unwrap().unwrap();
        assert!(report.error_message.is_none());
        assert!(report.health.is_some());

        // Re-audit overwrites the prior report.
        let second = auditor.run_audit("ds-1").unwrap();
        assert_eq!(second.total_rows, 4);
    }

    #[test]
    fn test_run_audit_rejects_concurrent_audit() {
        let (auditor, datasets, _reports, _dir) = auditor_with_file("a\n1\n");
        datasets
            .update_status("ds-1", DatasetStatus::Processing)
            .unwrap();

        let err = auditor.run_audit("ds-1").unwrap_err();
        assert!(matches!(err, Error::AuditInProgress { .. }));

        // The in-flight marker is untouched.
        let dataset = datasets.get("ds-1").unwrap().unwrap();
        assert_eq!(dataset.status, DatasetStatus::Processing);
    }

    #[test]
    fn test_run_audit_unknown_dataset() {
        let (auditor, _datasets, _reports, _dir) = auditor_with_file("a\n1\n");
        let err = auditor.run_audit("nope").unwrap_err();
        assert!(matches!(err, Error::DatasetNotFound { .. }));
    }

    #[test]
    fn test_failed_audit_marks_dataset_and_report() {
        let datasets = MemoryDatasetStore::new();
        let reports = MemoryReportStore::new();
        datasets
            .insert(DatasetRecord::new("ds-1", "gone", "/nonexistent/file.csv"))
            .unwrap();

        let auditor = Auditor::new(
            Arc::new(datasets.clone()),
            Arc::new(reports.clone()),
            Arc::new(MemoryProfileStore::new()),
            AuditConfig::default(),
        )
        .unwrap();

        assert!(auditor.run_audit("ds-1").is_err());

        let dataset = datasets.get("ds-1").unwrap().unwrap();
        assert_eq!(dataset.status, DatasetStatus::Failed);

        let report = reports.get("ds-1").unwrap().unwrap();
        assert!(report.error_message.is_some());
        assert!(report.health.is_none());
        assert!(report.reliability_score.abs() < 1e-12);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let result = Auditor::new(
            Arc::new(MemoryDatasetStore::new()),
            Arc::new(MemoryReportStore::new()),
            Arc::new(MemoryProfileStore::new()),
            AuditConfig::default().with_chunk_size(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_recommendations_for_clean_data() {
        let recommendations = build_recommendations(
            &HashMap::new(),
            &HashMap::new(),
            &AnomalyStats::default(),
            &crate::audit::DuplicateStats {
                duplicate_count: 0,
                duplicate_ratio: 0.0,
                key_duplicates: HashMap::new(),
                fuzzy_duplicate_pairs: 0,
            },
        );
        assert_eq!(recommendations.len(), 1);
        assert!(recommendations[0].contains("generally good"));
    }
}
