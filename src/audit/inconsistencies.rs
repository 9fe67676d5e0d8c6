//! Schema and value inconsistency detection.
//!
//! Collects a bounded head sample of raw strings per column during
//! streaming, then derives heuristic issues from profiling metrics and
//! those samples once profiles are built.

use std::collections::HashMap;

use arrow::array::RecordBatch;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    profiler::{ColumnProfile, InferredType},
    stats::parse_datetime,
    values::column_strings,
};

/// Maximum raw strings sampled per column for the evaluators.
pub(crate) const TEXT_SAMPLE_CAP: usize = 5_000;

/// Samples inspected for the date-parse-rate band.
const DATE_CHECK_SAMPLES: usize = 1_000;

/// Unique-ratio above which a categorical column counts as exploding.
const CARDINALITY_RATIO_THRESHOLD: f64 = 0.8;

/// Unique-count floor for the cardinality explosion rule.
const CARDINALITY_COUNT_THRESHOLD: usize = 1_000;

static ISSUE_MIXED_TYPES: &str = "Mixed data types detected in column.";
static ISSUE_HIGH_CARDINALITY: &str = "High cardinality categorical values (entropy explosion).";
static ISSUE_DATE_FORMATS: &str = "Inconsistent date formats or invalid date values.";
static ISSUE_TEXT_PATTERNS: &str = "Inconsistent text patterns detected in categorical data.";
static ISSUE_RARE_VALUES: &str =
    "Rare categorical values detected (values appearing only 1-2 times).";

/// Streaming sample collector and heuristic inconsistency evaluator.
///
/// # Example
///
/// ```ignore
/// let mut detector = InconsistencyDetector::new();
/// for chunk in chunks {
///     detector.process_chunk(&chunk);
/// }
/// let issues = detector.evaluate(&profiles);
/// ```
#[derive(Debug, Default)]
pub struct InconsistencyDetector {
    string_samples: HashMap<String, Vec<String>>,
}

impl InconsistencyDetector {
    /// Create an empty detector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect non-null, non-empty string samples from a chunk, capped at
    /// `TEXT_SAMPLE_CAP` (5,000) per column (first come, no eviction).
    pub fn process_chunk(&mut self, chunk: &RecordBatch) {
        collect_text_samples(&mut self.string_samples, chunk);
    }

    /// Derive per-column issue lists from profiles and collected samples.
    #[must_use]
    pub fn evaluate(
        &self,
        profiles: &HashMap<String, ColumnProfile>,
    ) -> HashMap<String, Vec<String>> {
        let mut issues: HashMap<String, Vec<String>> = HashMap::new();

        for (column, profile) in profiles {
            let mut column_issues: Vec<String> = Vec::new();

            if profile.mixed_types {
                column_issues.push(ISSUE_MIXED_TYPES.to_string());
            }

            if profile.inferred_type == InferredType::Categorical
                && profile.unique_ratio > CARDINALITY_RATIO_THRESHOLD
                && profile.unique_count > CARDINALITY_COUNT_THRESHOLD
            {
                column_issues.push(ISSUE_HIGH_CARDINALITY.to_string());
            }

            let samples = self
                .string_samples
                .get(column)
                .map(|s| &s[..s.len().min(DATE_CHECK_SAMPLES)])
                .unwrap_or(&[]);

            // A parse rate outside the band means the column is either
            // mostly dates or mostly not dates; both read as consistent.
            if !samples.is_empty() {
                let parsed = samples
                    .iter()
                    .filter(|v| parse_datetime(v).is_some())
                    .count();
                let parse_rate = parsed as f64 / samples.len() as f64;
                if parse_rate > 0.3 && parse_rate < 0.9 {
                    column_issues.push(ISSUE_DATE_FORMATS.to_string());
                }
            }

            if !samples.is_empty() && profile.inferred_type == InferredType::Categorical {
                let lengths: Vec<f64> = samples.iter().map(|v| v.chars().count() as f64).collect();
                if length_std(&lengths) > 10.0 {
                    column_issues.push(ISSUE_TEXT_PATTERNS.to_string());
                }
            }

            if profile.inferred_type == InferredType::Categorical {
                if let Some(full_samples) = self.string_samples.get(column) {
                    if rare_value_ratio(full_samples) > 0.2 {
                        column_issues.push(ISSUE_RARE_VALUES.to_string());
                    }
                }
            }

            if !column_issues.is_empty() {
                issues.insert(column.clone(), column_issues);
            }
        }

        issues
    }
}

/// Sample standard deviation of string lengths, matching the estimator the
/// profile thresholds were tuned against.
fn length_std(lengths: &[f64]) -> f64 {
    if lengths.len() < 2 {
        return 0.0;
    }
    let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
    let var = lengths.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (lengths.len() - 1) as f64;
    var.max(0.0).sqrt()
}

/// Fraction of sampled occurrences that belong to values appearing at most
/// twice.
fn rare_value_ratio(samples: &[String]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in samples {
        *counts.entry(value.as_str()).or_insert(0) += 1;
    }
    let rare_total: usize = counts.values().filter(|&&c| c <= 2).sum();
    rare_total as f64 / samples.len() as f64
}

/// Shared sample collection for the evaluators: non-null, non-empty values
/// per column, capped at `TEXT_SAMPLE_CAP` (5,000) first-come.
pub(crate) fn collect_text_samples(
    samples: &mut HashMap<String, Vec<String>>,
    chunk: &RecordBatch,
) {
    for (name, values) in column_strings(chunk) {
        let column_samples = samples.entry(name).or_default();
        if column_samples.len() >= TEXT_SAMPLE_CAP {
            continue;
        }
        for value in values.into_iter().flatten() {
            if column_samples.len() >= TEXT_SAMPLE_CAP {
                break;
            }
            if !value.is_empty() {
                column_samples.push(value);
            }
        }
    }
}

// Shared with the consistency checker so both see one compiled instance.
#[allow(clippy::unwrap_used)]
pub(crate) static NUMERIC_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?$").unwrap());
