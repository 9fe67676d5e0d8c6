//! Multi-dimensional reliability scoring.
//!
//! A pure function over the finalized signals: profiles, the merged issue
//! map, anomaly statistics and duplicate statistics. Four base penalties
//! (missing, anomaly ratio, inconsistency fraction, duplicate ratio) feed
//! both the per-dimension breakdown and the weighted overall score.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    anomalies::AnomalyStats, duplicates::DuplicateStats, profiler::ColumnProfile,
};

/// Weights for the overall reliability blend.
///
/// Defaults mirror the penalties' relative severity: anomalies weigh the
/// most, duplicates the least.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight of the average missing percentage.
    pub missing: f64,
    /// Weight of the anomaly ratio.
    pub anomaly: f64,
    /// Weight of the fraction of columns with issues.
    pub inconsistency: f64,
    /// Weight of the exact duplicate ratio.
    pub duplicate: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            missing: 1.0,
            anomaly: 1.5,
            inconsistency: 1.0,
            duplicate: 0.5,
        }
    }
}

/// Overall health classification of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Score >= 85.
    Healthy,
    /// Score >= 60.
    Warning,
    /// Everything below.
    Critical,
}

impl HealthStatus {
    /// Classify a 0-100 reliability score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Self::Healthy
        } else if score >= 60.0 {
            Self::Warning
        } else {
            Self::Critical
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "Healthy"),
            Self::Warning => write!(f, "Warning"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// Per-dimension quality scores, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    /// 100 minus the average missing percentage.
    pub completeness: f64,
    /// Blend of inconsistency and anomaly penalties.
    pub validity: f64,
    /// 100 minus the fraction of columns with issues.
    pub consistency: f64,
    /// Blend of anomaly and duplicate penalties.
    pub accuracy: f64,
    /// Fixed at 100; no temporal-lineage signal is available.
    pub timeliness: f64,
}

/// Human-readable summary of the scoring inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSummary {
    /// Average missing percentage across columns.
    pub missing: String,
    /// Multivariate anomaly ratio over the sample.
    pub anomalies: String,
    /// Columns with issues over total columns.
    pub inconsistencies: String,
    /// Exact duplicate ratio.
    pub duplicates: String,
}

/// Result of the reliability computation. Created once, terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityScore {
    /// Overall weighted score in `[0, 100]`.
    pub score: f64,
    /// Status band for the overall score.
    pub status: HealthStatus,
    /// Per-dimension breakdown, rounded to two decimals.
    pub dimensions: DimensionScores,
    /// Summary strings for reporting.
    pub summary: ScoreSummary,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Combine all audit signals into one score, status and summary.
///
/// An empty profile set scores 0.0 and Critical: a dataset the profiler
/// never saw a column of cannot be vouched for.
#[must_use]
pub fn compute_reliability_score(
    profiles: &HashMap<String, ColumnProfile>,
    issues: &HashMap<String, Vec<String>>,
    anomaly_stats: &AnomalyStats,
    duplicate_stats: &DuplicateStats,
    weights: &ScoringWeights,
) -> ReliabilityScore {
    if profiles.is_empty() {
        return ReliabilityScore {
            score: 0.0,
            status: HealthStatus::Critical,
            dimensions: DimensionScores::default(),
            summary: ScoreSummary {
                missing: "No columns profiled".to_string(),
                anomalies: "No columns profiled".to_string(),
                inconsistencies: "No columns profiled".to_string(),
                duplicates: "No columns profiled".to_string(),
            },
        };
    }

    let total_columns = profiles.len();

    // Base penalties, each on a 0-100 scale.
    let missing_penalty = profiles
        .values()
        .map(|p| p.missing_percentage)
        .sum::<f64>()
        / total_columns as f64;

    let anomaly_ratio = anomaly_stats.anomaly_ratio;
    let anomaly_penalty = anomaly_ratio * 100.0;

    let columns_with_issues = issues.len();
    let inconsistency_fraction = columns_with_issues as f64 / total_columns as f64;
    let inconsistency_penalty = inconsistency_fraction * 100.0;

    let duplicate_ratio = duplicate_stats.duplicate_ratio;
    let duplicate_penalty = duplicate_ratio * 100.0;

    let dimensions = DimensionScores {
        completeness: round2((100.0 - missing_penalty).max(0.0)),
        validity: round2((100.0 - 0.5 * (inconsistency_penalty + anomaly_penalty)).max(0.0)),
        consistency: round2((100.0 - inconsistency_penalty).max(0.0)),
        accuracy: round2((100.0 - 0.5 * (anomaly_penalty + duplicate_penalty)).max(0.0)),
        timeliness: 100.0,
    };

    let overall = 100.0
        - (weights.missing * missing_penalty
            + weights.anomaly * anomaly_penalty
            + weights.inconsistency * inconsistency_penalty
            + weights.duplicate * duplicate_penalty);
    let score = overall.clamp(0.0, 100.0);

    ReliabilityScore {
        score,
        status: HealthStatus::from_score(score),
        dimensions,
        summary: ScoreSummary {
            missing: format!("Average missing percentage: {:.2}%", missing_penalty),
            anomalies: format!("Anomaly ratio: {:.4}", anomaly_ratio),
            inconsistencies: format!(
                "Columns with issues: {}/{}",
                columns_with_issues, total_columns
            ),
            duplicates: format!("Duplicate ratio: {:.4}", duplicate_ratio),
        },
    }
}
