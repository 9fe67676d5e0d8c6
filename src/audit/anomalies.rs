//! Anomaly detection over a reservoir-sampled numeric subset.
//!
//! The detector keeps at most [`RESERVOIR_CAP`] complete numeric rows,
//! merged chunk by chunk with uniform-subsample semantics. Finalization
//! trains an isolation forest on the reservoir and runs three univariate
//! statistical rules on the same rows, so all four counts describe one
//! sample and are directly comparable.

// Tree building and scoring lean on float casts and exact comparisons
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::float_cmp)]

use std::collections::HashMap;

use arrow::array::RecordBatch;
use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{
    stats::{mad, mean, median_sorted, parse_numeric, population_std, quantile_sorted},
    values::column_strings,
};

/// Maximum number of numeric rows retained for anomaly detection.
pub const RESERVOIR_CAP: usize = 10_000;

/// Number of trees in the isolation forest.
const FOREST_ESTIMATORS: usize = 200;

/// Expected fraction of outliers in the data.
const FOREST_CONTAMINATION: f64 = 0.02;

/// Rows drawn per tree.
const FOREST_SUBSAMPLE: usize = 256;

/// Fixed seed so repeated audits of the same chunk stream agree.
const DETECTOR_SEED: u64 = 42;

/// Default |z| threshold for the standard Z-score rule.
const Z_SCORE_THRESHOLD: f64 = 3.0;

/// Default threshold for the MAD-based modified Z-score rule.
const MODIFIED_Z_THRESHOLD: f64 = 3.5;

/// Default IQR multiplier for the Tukey fence rule.
const IQR_FACTOR: f64 = 1.5;

/// Counts produced by the four detection methods over one reservoir.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnomalyStats {
    /// Rows flagged by the isolation forest.
    pub anomaly_count: usize,
    /// Flagged rows over sample size, in `[0, 1]`.
    pub anomaly_ratio: f64,
    /// Number of rows the detectors actually saw.
    pub sample_size: usize,
    /// Rows with any column beyond the Z-score threshold.
    pub z_score_outliers: usize,
    /// Rows with any column beyond the modified Z-score threshold.
    pub modified_z_outliers: usize,
    /// Rows with any column outside the Tukey fences.
    pub iqr_outliers: usize,
}

/// Reservoir-sampling anomaly detector.
///
/// Numeric columns latch on the first chunk that yields any; rows where
/// every latched column coerces to a number enter the reservoir.
///
/// # Example
///
/// ```ignore
/// let mut detector = AnomalyDetector::new();
/// for chunk in chunks {
///     detector.process_chunk_for_sampling(&chunk);
/// }
/// let stats = detector.compute_anomalies();
/// assert!(stats.sample_size <= 10_000);
/// ```
#[derive(Debug)]
pub struct AnomalyDetector {
    numeric_columns: Option<Vec<String>>,
    reservoir: Vec<Vec<f64>>,
    rng: StdRng,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector {
    /// Create a detector with the fixed reproducibility seed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            numeric_columns: None,
            reservoir: Vec::new(),
            rng: StdRng::seed_from_u64(DETECTOR_SEED),
        }
    }

    /// Rows currently held in the reservoir.
    #[must_use]
    pub fn reservoir_len(&self) -> usize {
        self.reservoir.len()
    }

    /// Columns with at least one coercible value.
    fn select_numeric_columns(columns: &[(String, Vec<Option<String>>)]) -> Vec<String> {
        columns
            .iter()
            .filter(|(_, values)| {
                values
                    .iter()
                    .flatten()
                    .any(|value| parse_numeric(value).is_some())
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Fold a chunk's complete numeric rows into the reservoir.
    ///
    /// While the pool is below [`RESERVOIR_CAP`] everything is kept; once
    /// the combined size exceeds the cap, a uniform random subsample of
    /// exactly cap size replaces the pool.
    pub fn process_chunk_for_sampling(&mut self, chunk: &RecordBatch) {
        let columns = column_strings(chunk);

        if self.numeric_columns.is_none() {
            let detected = Self::select_numeric_columns(&columns);
            if detected.is_empty() {
                return;
            }
            self.numeric_columns = Some(detected);
        }

        let Some(numeric_columns) = self.numeric_columns.as_deref() else {
            return;
        };

        let by_name: HashMap<&str, &Vec<Option<String>>> = columns
            .iter()
            .map(|(name, values)| (name.as_str(), values))
            .collect();

        let row_count = chunk.num_rows();
        let mut rows: Vec<Vec<f64>> = Vec::new();
        'rows: for row in 0..row_count {
            let mut parsed = Vec::with_capacity(numeric_columns.len());
            for name in numeric_columns {
                let value = by_name
                    .get(name.as_str())
                    .and_then(|values| values.get(row))
                    .and_then(|v| v.as_deref())
                    .and_then(parse_numeric);
                match value {
                    Some(number) => parsed.push(number),
                    // Incomplete numeric rows are dropped, not imputed.
                    None => continue 'rows,
                }
            }
            rows.push(parsed);
        }

        if rows.is_empty() {
            return;
        }

        self.reservoir.append(&mut rows);
        if self.reservoir.len() > RESERVOIR_CAP {
            let picked = index::sample(&mut self.rng, self.reservoir.len(), RESERVOIR_CAP);
            let mut indices: Vec<usize> = picked.into_iter().collect();
            indices.sort_unstable();
            let mut kept = Vec::with_capacity(RESERVOIR_CAP);
            for idx in indices {
                kept.push(std::mem::take(&mut self.reservoir[idx]));
            }
            self.reservoir = kept;
        }
    }

    /// Train the forest and run the univariate rules on the reservoir.
    ///
    /// Called once after the stream ends; consumes the detector. An empty
    /// reservoir yields all-zero statistics, not an error.
    #[must_use]
    pub fn compute_anomalies(self) -> AnomalyStats {
        if self.reservoir.is_empty() {
            return AnomalyStats::default();
        }

        let sample_size = self.reservoir.len();

        let forest = IsolationForest::new(FOREST_ESTIMATORS, FOREST_CONTAMINATION, DETECTOR_SEED);
        let flags = forest.fit_predict(&self.reservoir);
        let anomaly_count = flags.iter().filter(|&&flagged| flagged).count();
        let anomaly_ratio = anomaly_count as f64 / sample_size as f64;

        AnomalyStats {
            anomaly_count,
            anomaly_ratio,
            sample_size,
            z_score_outliers: count_z_score_outliers(&self.reservoir, Z_SCORE_THRESHOLD),
            modified_z_outliers: count_modified_z_outliers(&self.reservoir, MODIFIED_Z_THRESHOLD),
            iqr_outliers: count_iqr_outliers(&self.reservoir, IQR_FACTOR),
        }
    }
}

fn column_vector(rows: &[Vec<f64>], col: usize) -> Vec<f64> {
    rows.iter().map(|row| row[col]).collect()
}

fn num_columns(rows: &[Vec<f64>]) -> usize {
    rows.first().map_or(0, |row| row.len())
}

/// Rows where any column has |(x - mean) / std| above the threshold.
/// A zero standard deviation is treated as 1.0 to avoid division faults.
pub(crate) fn count_z_score_outliers(rows: &[Vec<f64>], threshold: f64) -> usize {
    if rows.is_empty() {
        return 0;
    }
    let stats: Vec<(f64, f64)> = (0..num_columns(rows))
        .map(|col| {
            let values = column_vector(rows, col);
            let std = population_std(&values);
            (mean(&values), if std == 0.0 { 1.0 } else { std })
        })
        .collect();

    rows.iter()
        .filter(|row| {
            row.iter()
                .zip(&stats)
                .any(|(x, (m, std))| ((x - m) / std).abs() > threshold)
        })
        .count()
}

/// Rows where any column has |0.6745 · (x - median) / MAD| above the
/// threshold. A zero MAD is treated as 1.0.
pub(crate) fn count_modified_z_outliers(rows: &[Vec<f64>], threshold: f64) -> usize {
    if rows.is_empty() {
        return 0;
    }
    let stats: Vec<(f64, f64)> = (0..num_columns(rows))
        .map(|col| {
            let mut values = column_vector(rows, col);
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let median = median_sorted(&values);
            let mad = mad(&values, median);
            (median, if mad == 0.0 { 1.0 } else { mad })
        })
        .collect();

    rows.iter()
        .filter(|row| {
            row.iter()
                .zip(&stats)
                .any(|(x, (median, mad))| (0.6745 * (x - median) / mad).abs() > threshold)
        })
        .count()
}

/// Rows where any column falls outside `[Q1 - f·IQR, Q3 + f·IQR]`.
/// A zero IQR is treated as 1.0.
pub(crate) fn count_iqr_outliers(rows: &[Vec<f64>], factor: f64) -> usize {
    if rows.is_empty() {
        return 0;
    }
    let fences: Vec<(f64, f64)> = (0..num_columns(rows))
        .map(|col| {
            let mut values = column_vector(rows, col);
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let q1 = quantile_sorted(&values, 0.25);
            let q3 = quantile_sorted(&values, 0.75);
            let iqr = q3 - q1;
            let iqr = if iqr == 0.0 { 1.0 } else { iqr };
            (q1 - factor * iqr, q3 + factor * iqr)
        })
        .collect();

    rows.iter()
        .filter(|row| {
            row.iter()
                .zip(&fences)
                .any(|(x, (lower, upper))| x < lower || x > upper)
        })
        .count()
}

/// A node in an isolation tree, stored in a flat arena.
#[derive(Debug)]
enum IsoNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug)]
struct IsoTree {
    nodes: Vec<IsoNode>,
}

impl IsoTree {
    fn fit(rows: &[Vec<f64>], sample: &[usize], max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(rows, sample, 0, max_depth, rng);
        tree
    }

    /// Grow a subtree over `sample`, returning its arena index.
    fn grow(
        &mut self,
        rows: &[Vec<f64>],
        sample: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        if sample.len() <= 1 || depth >= max_depth {
            self.nodes.push(IsoNode::Leaf { size: sample.len() });
            return self.nodes.len() - 1;
        }

        // Pick a feature that still varies within this partition.
        let n_features = num_columns(rows);
        let mut candidates: Vec<usize> = (0..n_features)
            .filter(|&col| {
                let first = rows[sample[0]][col];
                sample.iter().any(|&idx| rows[idx][col] != first)
            })
            .collect();
        if candidates.is_empty() {
            self.nodes.push(IsoNode::Leaf { size: sample.len() });
            return self.nodes.len() - 1;
        }

        let feature = candidates.swap_remove(rng.gen_range(0..candidates.len()));
        let (min, max) = sample
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &idx| {
                let v = rows[idx][feature];
                (lo.min(v), hi.max(v))
            });
        let threshold = rng.gen_range(min..max);

        let (left_sample, right_sample): (Vec<usize>, Vec<usize>) = sample
            .iter()
            .copied()
            .partition(|&idx| rows[idx][feature] < threshold);

        let left = self.grow(rows, &left_sample, depth + 1, max_depth, rng);
        let right = self.grow(rows, &right_sample, depth + 1, max_depth, rng);
        self.nodes.push(IsoNode::Split {
            feature,
            threshold,
            left,
            right,
        });
        self.nodes.len() - 1
    }

    /// Path length of a point: tree depth to its leaf plus the average
    /// path adjustment for the leaf's residual size.
    fn path_length(&self, row: &[f64]) -> f64 {
        // The root is always the last node pushed.
        let mut node_idx = self.nodes.len() - 1;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node_idx] {
                IsoNode::Leaf { size } => return depth + average_path_length(*size),
                IsoNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node_idx = if row[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_MASCHERONI) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Multivariate outlier model scoring points by how easily random
/// partitioning separates them from the rest.
///
/// # Example
///
/// ```
/// use auditar::IsolationForest;
///
/// let mut rows: Vec<Vec<f64>> = (0..100).map(|i| vec![f64::from(i % 10)]).collect();
/// rows.push(vec![1_000.0]);
///
/// let forest = IsolationForest::new(200, 0.02, 42);
/// let flags = forest.fit_predict(&rows);
/// assert!(flags[100]);
/// ```
#[derive(Debug)]
pub struct IsolationForest {
    n_estimators: usize,
    contamination: f64,
    seed: u64,
}

impl IsolationForest {
    /// Create a forest with the given size, expected contamination and seed.
    #[must_use]
    pub fn new(n_estimators: usize, contamination: f64, seed: u64) -> Self {
        Self {
            n_estimators,
            contamination,
            seed,
        }
    }

    /// Anomaly score in `(0, 1)` per row; higher means more isolated.
    #[must_use]
    pub fn score(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        if rows.is_empty() || num_columns(rows) == 0 {
            return vec![0.0; rows.len()];
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let subsample = FOREST_SUBSAMPLE.min(rows.len());
        let max_depth = (subsample as f64).log2().ceil().max(1.0) as usize;

        let trees: Vec<IsoTree> = (0..self.n_estimators)
            .map(|_| {
                let sample: Vec<usize> = if subsample == rows.len() {
                    (0..rows.len()).collect()
                } else {
                    index::sample(&mut rng, rows.len(), subsample).into_iter().collect()
                };
                IsoTree::fit(rows, &sample, max_depth, &mut rng)
            })
            .collect();

        let normalization = average_path_length(subsample).max(f64::MIN_POSITIVE);
        rows.iter()
            .map(|row| {
                let total: f64 = trees.iter().map(|tree| tree.path_length(row)).sum();
                let mean_path = total / trees.len() as f64;
                2.0_f64.powf(-mean_path / normalization)
            })
            .collect()
    }

    /// Flag the most isolated rows per the configured contamination.
    ///
    /// The threshold is the `1 - contamination` quantile of the score
    /// distribution; rows strictly above it are flagged, so roughly the
    /// expected fraction is marked and a constant sample flags nothing.
    #[must_use]
    pub fn fit_predict(&self, rows: &[Vec<f64>]) -> Vec<bool> {
        let scores = self.score(rows);
        if scores.is_empty() {
            return Vec::new();
        }
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let threshold = quantile_sorted(&sorted, 1.0 - self.contamination);
        scores.iter().map(|&score| score > threshold).collect()
    }
}
