//! Duplicate detection across chunks.
//!
//! Three independent strategies:
//!
//! - **Exact**: every row is serialized in schema order and hashed with
//!   SHA-256; a global digest set flags repeats. The digest set is the one
//!   intentionally unbounded structure in the engine, exact membership
//!   over an unbounded stream cannot be capped without false positives.
//! - **Key-based**: columns whose name looks identifier-like (email,
//!   phone, id, ...) get a per-column seen-value set and repeat counter.
//! - **Fuzzy**: up to [`FUZZY_SAMPLE_CAP`] distinct strings per column are
//!   collected first-seen; after streaming, all pairs within a column are
//!   compared with a longest-matching-block similarity ratio. O(n²) on a
//!   capped n is the accepted trade-off for zero tuning.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use arrow::array::RecordBatch;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::values::column_strings;

/// Maximum distinct strings kept per column for fuzzy comparison.
pub const FUZZY_SAMPLE_CAP: usize = 300;

/// Similarity at or above which a pair counts as a fuzzy duplicate.
pub const FUZZY_SIMILARITY_THRESHOLD: f64 = 0.9;

/// Name fragments that mark a column as identifier-like. Checked in order,
/// first match wins; matching is case-insensitive on the column name.
const KEY_COLUMN_MARKERS: &[&str] = &["email", "phone", "mobile", "id", "ssn"];

/// Placeholder used for missing cells in the row serialization.
const NULL_TOKEN: &str = "NULL";

/// Aggregated duplicate statistics for one audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateStats {
    /// Number of exact row repeats.
    pub duplicate_count: usize,
    /// Exact repeats over total rows, in `[0, 1]`.
    pub duplicate_ratio: f64,
    /// Repeat counts per identifier-like column.
    pub key_duplicates: HashMap<String, usize>,
    /// Number of near-identical string pairs across all columns.
    pub fuzzy_duplicate_pairs: usize,
}

/// Streaming duplicate detector.
///
/// # Example
///
/// ```ignore
/// let mut detector = DuplicateDetector::new();
/// for chunk in chunks {
///     detector.process_chunk(&chunk);
/// }
/// let stats = detector.stats();
/// assert!(stats.duplicate_ratio <= 1.0);
/// ```
#[derive(Debug, Default)]
pub struct DuplicateDetector {
    seen_hashes: HashSet<[u8; 32]>,
    duplicate_count: usize,
    total_rows: usize,
    key_seen: HashMap<String, HashSet<String>>,
    key_duplicate_counts: HashMap<String, usize>,
    string_samples: HashMap<String, Vec<String>>,
    fuzzy_pairs: OnceLock<usize>,
}

impl DuplicateDetector {
    /// Create an empty detector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the column name marks an identifier-like column.
    fn is_key_column(name: &str) -> bool {
        let lowered = name.to_lowercase();
        KEY_COLUMN_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
    }

    /// Fold one chunk into all three strategies.
    ///
    /// Row serialization assumes a stable column order across chunks (the
    /// schema order); sources that reorder columns between chunks would
    /// silently break exact hashing.
    pub fn process_chunk(&mut self, chunk: &RecordBatch) {
        let columns = column_strings(chunk);
        let row_count = chunk.num_rows();
        self.total_rows += row_count;

        // Exact row duplicates
        for row in 0..row_count {
            let mut hasher = Sha256::new();
            for (i, (_, values)) in columns.iter().enumerate() {
                if i > 0 {
                    hasher.update(b"||");
                }
                match values.get(row).and_then(|v| v.as_deref()) {
                    Some(value) => hasher.update(value.as_bytes()),
                    None => hasher.update(NULL_TOKEN.as_bytes()),
                }
            }
            let digest: [u8; 32] = hasher.finalize().into();
            if !self.seen_hashes.insert(digest) {
                self.duplicate_count += 1;
            }
        }

        for (name, values) in &columns {
            // Key-based duplicates
            if Self::is_key_column(name) {
                let seen = self.key_seen.entry(name.clone()).or_default();
                let counter = self.key_duplicate_counts.entry(name.clone()).or_insert(0);
                for value in values.iter().flatten() {
                    if seen.contains(value) {
                        *counter += 1;
                    } else {
                        seen.insert(value.clone());
                    }
                }
            }

            // Fuzzy sample collection: distinct values, first seen, no
            // eviction once the cap is reached.
            let samples = self.string_samples.entry(name.clone()).or_default();
            if samples.len() >= FUZZY_SAMPLE_CAP {
                continue;
            }
            for value in values.iter().flatten() {
                if samples.len() >= FUZZY_SAMPLE_CAP {
                    break;
                }
                if !samples.iter().any(|existing| existing == value) {
                    samples.push(value.clone());
                }
            }
        }
    }

    /// Count near-identical pairs over the collected samples.
    fn compute_fuzzy_pairs(&self) -> usize {
        let mut total_pairs = 0;
        for samples in self.string_samples.values() {
            if samples.len() <= 1 {
                continue;
            }
            let lowered: Vec<String> = samples.iter().map(|s| s.to_lowercase()).collect();
            for i in 0..lowered.len() {
                for j in (i + 1)..lowered.len() {
                    let (a, b) = (&lowered[i], &lowered[j]);
                    if a.is_empty() || b.is_empty() {
                        continue;
                    }
                    if similarity_ratio(a, b) >= FUZZY_SIMILARITY_THRESHOLD {
                        total_pairs += 1;
                    }
                }
            }
        }
        total_pairs
    }

    /// Aggregate statistics across all strategies.
    ///
    /// The fuzzy pairwise pass is memoized: the first call computes it,
    /// later calls return the cached count.
    pub fn stats(&self) -> DuplicateStats {
        let duplicate_ratio = if self.total_rows > 0 {
            self.duplicate_count as f64 / self.total_rows as f64
        } else {
            0.0
        };
        let fuzzy_duplicate_pairs = *self.fuzzy_pairs.get_or_init(|| self.compute_fuzzy_pairs());

        DuplicateStats {
            duplicate_count: self.duplicate_count,
            duplicate_ratio,
            key_duplicates: self.key_duplicate_counts.clone(),
            fuzzy_duplicate_pairs,
        }
    }
}

/// Normalized similarity of two strings in `[0, 1]`.
///
/// Longest-matching-block ratio: `2·M / (|a| + |b|)` where `M` is the
/// total length of the recursively matched common blocks, the same measure
/// classic diff tooling reports.
#[must_use]
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let matched = matching_block_len(&a_chars, &b_chars);
    2.0 * matched as f64 / (a_chars.len() + b_chars.len()) as f64
}

/// Total length of common blocks: find the longest common substring, then
/// recurse on the pieces before and after it.
fn matching_block_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    // Longest common substring via a rolling DP row.
    let mut best_len = 0;
    let mut best_a_end = 0;
    let mut best_b_end = 0;
    let mut prev = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        for (j, &cb) in b.iter().enumerate() {
            if ca == cb {
                current[j + 1] = prev[j] + 1;
                if current[j + 1] > best_len {
                    best_len = current[j + 1];
                    best_a_end = i + 1;
                    best_b_end = j + 1;
                }
            } else {
                current[j + 1] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut current);
        current.fill(0);
    }

    if best_len == 0 {
        return 0;
    }

    let a_start = best_a_end - best_len;
    let b_start = best_b_end - best_len;
    best_len
        + matching_block_len(&a[..a_start], &b[..b_start])
        + matching_block_len(&a[best_a_end..], &b[best_b_end..])
}
