//! Incremental per-column statistics.
//!
//! One [`ColumnAccumulator`] per column, created on first sight and updated
//! chunk by chunk. Exact running aggregates (counts, sum, sum of squares,
//! min/max) are kept for the full stream; order statistics, type inference
//! and categorical intelligence come from a capped head sample. Memory per
//! column is bounded by [`UNIQUE_TRACKING_CAP`] and [`PROFILE_SAMPLE_CAP`]
//! regardless of row count.

use std::collections::{HashMap, HashSet};
use std::fmt;

use arrow::array::RecordBatch;
use serde::{Deserialize, Serialize};

use super::{
    stats::{
        median_sorted, parse_datetime, parse_numeric, quantile_sorted, sample_kurtosis,
        sample_skewness, shannon_entropy,
    },
    values::column_strings,
};

/// Maximum number of distinct values tracked per column.
///
/// Beyond this cap the unique count is a lower bound; the ratio derived
/// from it degrades gracefully on very-high-cardinality columns.
pub const UNIQUE_TRACKING_CAP: usize = 50_000;

/// Maximum number of raw values sampled per column for order statistics,
/// type inference and categorical metrics.
pub const PROFILE_SAMPLE_CAP: usize = 10_000;

/// Relative frequency below which a category counts as rare.
pub const RARE_CATEGORY_THRESHOLD: f64 = 0.02;

/// Fraction of sampled values that must coerce for a type to win.
const TYPE_DETECTION_RATIO: f64 = 0.9;

/// Semantic type inferred for a column from its sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferredType {
    /// At least 90% of sampled values coerce to a finite number.
    Numeric,
    /// At least 90% of sampled values parse as a date or timestamp.
    Datetime,
    /// Everything else with a non-empty sample.
    Categorical,
    /// No non-null values were observed.
    Unknown,
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric => write!(f, "numeric"),
            Self::Datetime => write!(f, "datetime"),
            Self::Categorical => write!(f, "categorical"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Heuristic distribution classification from sample skewness and kurtosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionShape {
    /// |skew| < 0.5 and |kurtosis| < 1.
    ApproximatelyNormal,
    /// skew > 0.5.
    RightSkewed,
    /// skew < -0.5.
    LeftSkewed,
    /// |kurtosis| >= 3.
    HeavyTailed,
    /// None of the above.
    NonNormal,
}

impl DistributionShape {
    /// Classify from skewness and excess kurtosis. Ties resolve in the
    /// listed order.
    #[must_use]
    pub fn classify(skewness: f64, kurtosis: f64) -> Self {
        if skewness.abs() < 0.5 && kurtosis.abs() < 1.0 {
            Self::ApproximatelyNormal
        } else if skewness > 0.5 {
            Self::RightSkewed
        } else if skewness < -0.5 {
            Self::LeftSkewed
        } else if kurtosis.abs() >= 3.0 {
            Self::HeavyTailed
        } else {
            Self::NonNormal
        }
    }
}

impl fmt::Display for DistributionShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApproximatelyNormal => write!(f, "approximately_normal"),
            Self::RightSkewed => write!(f, "right_skewed"),
            Self::LeftSkewed => write!(f, "left_skewed"),
            Self::HeavyTailed => write!(f, "heavy_tailed"),
            Self::NonNormal => write!(f, "non_normal"),
        }
    }
}

/// Numeric distribution statistics for a column.
///
/// `mean`, `variance`, `std_dev`, `min` and `max` are exact over the full
/// stream; the order statistics and moments come from the capped sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericSummary {
    /// Mean of all coercible values.
    pub mean: f64,
    /// Population variance, clamped at zero.
    pub variance: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Minimum observed value.
    pub min: f64,
    /// Maximum observed value.
    pub max: f64,
    /// Sample median.
    pub median: Option<f64>,
    /// Most frequent sampled value (ties resolve to the smallest).
    pub mode: Option<f64>,
    /// Sample first quartile.
    pub q1: Option<f64>,
    /// Sample third quartile.
    pub q3: Option<f64>,
    /// Sample interquartile range.
    pub iqr: Option<f64>,
    /// Bias-corrected sample skewness.
    pub skewness: Option<f64>,
    /// Bias-corrected sample excess kurtosis.
    pub kurtosis: Option<f64>,
    /// Distribution classification, when both moments are defined.
    pub shape: Option<DistributionShape>,
}

/// Categorical intelligence for a column, computed over the sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalSummary {
    /// Number of distinct sampled values.
    pub cardinality: usize,
    /// Shannon entropy in bits over the sample frequency distribution.
    pub entropy: f64,
    /// Values below the rare-frequency threshold, sorted for determinism.
    pub rare_categories: Vec<String>,
    /// The relative frequency threshold used for rarity.
    pub rare_threshold: f64,
}

/// Final per-column profile. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    /// Percentage of missing (null or empty) values, 0-100.
    pub missing_percentage: f64,
    /// Distinct values over total count (capped; see [`UNIQUE_TRACKING_CAP`]).
    pub unique_ratio: f64,
    /// Number of distinct values observed, up to the tracking cap.
    pub unique_count: usize,
    /// Semantic type inferred from the sample.
    pub inferred_type: InferredType,
    /// Whether the sample mixes numeric, boolean and text representations.
    pub mixed_types: bool,
    /// Top five sampled values with their sample counts.
    pub top_values: Vec<(String, usize)>,
    /// Numeric statistics, present when any value coerced to a number.
    pub numeric: Option<NumericSummary>,
    /// Categorical statistics over the sample.
    pub categorical: CategoricalSummary,
}

impl ColumnProfile {
    /// True when the column was inferred numeric.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.inferred_type == InferredType::Numeric
    }
}

/// Lexical class of a raw value, for mixed-type detection.
#[derive(PartialEq, Eq, Hash, Clone, Copy)]
enum ValueClass {
    Numeric,
    Boolean,
    Text,
}

fn classify_value(value: &str) -> ValueClass {
    if parse_numeric(value).is_some() {
        ValueClass::Numeric
    } else if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        ValueClass::Boolean
    } else {
        ValueClass::Text
    }
}

/// Per-column running state. Mutated only by `process_chunk`.
#[derive(Debug, Default)]
struct ColumnAccumulator {
    count: usize,
    missing: usize,
    unique: HashSet<String>,
    samples: Vec<String>,
    numeric_count: usize,
    numeric_sum: f64,
    numeric_sumsq: f64,
    numeric_min: f64,
    numeric_max: f64,
}

impl ColumnAccumulator {
    fn observe(&mut self, value: Option<&str>) {
        self.count += 1;

        let Some(value) = value else {
            self.missing += 1;
            return;
        };
        if value.is_empty() {
            self.missing += 1;
        }

        if self.unique.len() < UNIQUE_TRACKING_CAP && !self.unique.contains(value) {
            self.unique.insert(value.to_string());
        }
        if self.samples.len() < PROFILE_SAMPLE_CAP {
            self.samples.push(value.to_string());
        }

        if let Some(number) = parse_numeric(value) {
            if self.numeric_count == 0 {
                self.numeric_min = number;
                self.numeric_max = number;
            } else {
                self.numeric_min = self.numeric_min.min(number);
                self.numeric_max = self.numeric_max.max(number);
            }
            self.numeric_count += 1;
            self.numeric_sum += number;
            self.numeric_sumsq += number * number;
        }
    }

    fn infer_type(&self) -> InferredType {
        if self.samples.is_empty() {
            return InferredType::Unknown;
        }
        let total = self.samples.len() as f64;

        let numeric_hits = self
            .samples
            .iter()
            .filter(|v| parse_numeric(v).is_some())
            .count();
        if numeric_hits as f64 / total >= TYPE_DETECTION_RATIO {
            return InferredType::Numeric;
        }

        let datetime_hits = self
            .samples
            .iter()
            .filter(|v| parse_datetime(v).is_some())
            .count();
        if datetime_hits as f64 / total >= TYPE_DETECTION_RATIO {
            return InferredType::Datetime;
        }

        InferredType::Categorical
    }

    fn mixed_types(&self) -> bool {
        let classes: HashSet<ValueClass> = self
            .samples
            .iter()
            .filter(|v| !v.is_empty())
            .map(|v| classify_value(v))
            .collect();
        classes.len() > 1
    }

    fn numeric_summary(&self) -> Option<NumericSummary> {
        if self.numeric_count == 0 {
            return None;
        }
        let n = self.numeric_count as f64;
        let mean = self.numeric_sum / n;
        // Running-moment variance can go slightly negative through
        // floating-point cancellation; clamp before the square root.
        let variance = (self.numeric_sumsq / n - mean * mean).max(0.0);

        let mut numeric_sample: Vec<f64> = self
            .samples
            .iter()
            .filter_map(|v| parse_numeric(v))
            .collect();
        numeric_sample.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let (median, mode, q1, q3, iqr, skewness, kurtosis) = if numeric_sample.is_empty() {
            (None, None, None, None, None, None, None)
        } else {
            let median = median_sorted(&numeric_sample);
            let q1 = quantile_sorted(&numeric_sample, 0.25);
            let q3 = quantile_sorted(&numeric_sample, 0.75);
            (
                Some(median),
                Some(sample_mode(&numeric_sample)),
                Some(q1),
                Some(q3),
                Some(q3 - q1),
                sample_skewness(&numeric_sample),
                sample_kurtosis(&numeric_sample),
            )
        };

        let shape = match (skewness, kurtosis) {
            (Some(s), Some(k)) => Some(DistributionShape::classify(s, k)),
            _ => None,
        };

        Some(NumericSummary {
            mean,
            variance,
            std_dev: variance.sqrt(),
            min: self.numeric_min,
            max: self.numeric_max,
            median,
            mode,
            q1,
            q3,
            iqr,
            skewness,
            kurtosis,
            shape,
        })
    }

    fn categorical_summary(&self) -> CategoricalSummary {
        if self.samples.is_empty() {
            return CategoricalSummary {
                cardinality: 0,
                entropy: 0.0,
                rare_categories: Vec::new(),
                rare_threshold: RARE_CATEGORY_THRESHOLD,
            };
        }

        let counts = value_counts(&self.samples);
        let total = self.samples.len() as f64;
        let frequencies: Vec<usize> = counts.values().copied().collect();
        let entropy = shannon_entropy(&frequencies);

        let mut rare_categories: Vec<String> = counts
            .iter()
            .filter(|(_, &count)| (count as f64 / total) < RARE_CATEGORY_THRESHOLD)
            .map(|(value, _)| value.clone())
            .collect();
        rare_categories.sort();

        CategoricalSummary {
            cardinality: counts.len(),
            entropy,
            rare_categories,
            rare_threshold: RARE_CATEGORY_THRESHOLD,
        }
    }

    fn top_values(&self) -> Vec<(String, usize)> {
        let counts = value_counts(&self.samples);
        let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(5);
        entries
    }

    fn build(self) -> ColumnProfile {
        let missing_percentage = if self.count > 0 {
            self.missing as f64 / self.count as f64 * 100.0
        } else {
            0.0
        };
        let unique_ratio = if self.count > 0 {
            self.unique.len() as f64 / self.count as f64
        } else {
            0.0
        };

        ColumnProfile {
            missing_percentage,
            unique_ratio,
            unique_count: self.unique.len(),
            inferred_type: self.infer_type(),
            mixed_types: self.mixed_types(),
            top_values: self.top_values(),
            numeric: self.numeric_summary(),
            categorical: self.categorical_summary(),
        }
    }
}

fn value_counts(samples: &[String]) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in samples {
        *counts.entry(value.clone()).or_insert(0) += 1;
    }
    counts
}

/// Most frequent value in a sorted sample; ties resolve to the smallest.
fn sample_mode(sorted: &[f64]) -> f64 {
    let mut best_value = sorted[0];
    let mut best_len = 0usize;
    let mut run_value = sorted[0];
    let mut run_len = 0usize;

    for &value in sorted {
        if value == run_value {
            run_len += 1;
        } else {
            run_value = value;
            run_len = 1;
        }
        if run_len > best_len {
            best_len = run_len;
            best_value = run_value;
        }
    }
    best_value
}

/// Incremental column profiler operating on record-batch chunks.
///
/// Accumulators are created lazily when a column is first seen; a column
/// appearing only in later chunks gets its own independently initialized
/// accumulator rather than being treated as an error.
///
/// # Example
///
/// ```ignore
/// let mut profiler = ColumnProfiler::new();
/// for chunk in chunks {
///     profiler.process_chunk(&chunk);
/// }
/// let (profiles, total_rows) = profiler.build_profiles();
/// ```
#[derive(Debug, Default)]
pub struct ColumnProfiler {
    columns: HashMap<String, ColumnAccumulator>,
}

impl ColumnProfiler {
    /// Create an empty profiler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Update statistics from a single chunk.
    ///
    /// Runs in O(chunk size) time and adds no memory beyond the per-column
    /// caps. Accumulation is order-independent: splitting the same rows
    /// into different chunk boundaries yields identical final aggregates.
    pub fn process_chunk(&mut self, chunk: &RecordBatch) {
        for (name, values) in column_strings(chunk) {
            let accumulator = self.columns.entry(name).or_default();
            for value in &values {
                accumulator.observe(value.as_deref());
            }
        }
    }

    /// Build final column profiles and the total row count.
    ///
    /// Consumes the profiler: profiles are terminal, no further chunks can
    /// be folded in. The row count is the maximum per-column observation
    /// count (columns may differ in null patterns, not in row counts).
    #[must_use]
    pub fn build_profiles(self) -> (HashMap<String, ColumnProfile>, usize) {
        let total_rows = self
            .columns
            .values()
            .map(|acc| acc.count)
            .max()
            .unwrap_or(0);

        let profiles = self
            .columns
            .into_iter()
            .map(|(name, accumulator)| (name, accumulator.build()))
            .collect();

        (profiles, total_rows)
    }
}
