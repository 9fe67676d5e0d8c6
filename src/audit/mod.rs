//! The streaming audit engine.
//!
//! Five independent accumulators consume the dataset one chunk at a time:
//! the [`ColumnProfiler`], the [`DuplicateDetector`], the sample collectors
//! of the [`InconsistencyDetector`] and [`ConsistencyChecker`], and the
//! reservoir of the [`AnomalyDetector`]. Each owns disjoint state and obeys
//! a bounded-memory contract: O(1) per column beyond its documented caps,
//! independent of total row count.
//!
//! After the stream is exhausted the finalize chain runs strictly in order:
//! profiles are built, the evaluators derive issue lists from profiles and
//! samples, the anomaly detector trains on its reservoir, and the scorer
//! blends everything into one 0-100 reliability score.
//!
//! # Example
//!
//! ```ignore
//! let mut profiler = ColumnProfiler::new();
//! let mut duplicates = DuplicateDetector::new();
//!
//! for chunk in chunks {
//!     profiler.process_chunk(&chunk);
//!     duplicates.process_chunk(&chunk);
//! }
//!
//! let (profiles, total_rows) = profiler.build_profiles();
//! let stats = duplicates.stats();
//! ```

// Statistical computation and internal methods
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::if_not_else)]

mod anomalies;
mod consistency;
mod duplicates;
mod inconsistencies;
mod profiler;
mod scoring;
mod stats;
mod values;

#[cfg(test)]
mod tests;

// Re-export profiler types
pub use profiler::{
    CategoricalSummary, ColumnProfile, ColumnProfiler, DistributionShape, InferredType,
    NumericSummary,
};

// Re-export duplicate detection types
pub use duplicates::{similarity_ratio, DuplicateDetector, DuplicateStats};

// Re-export anomaly detection types
pub use anomalies::{AnomalyDetector, AnomalyStats, IsolationForest};

// Re-export evaluator types
pub use consistency::ConsistencyChecker;
pub use inconsistencies::InconsistencyDetector;

// Re-export scoring types
pub use scoring::{
    compute_reliability_score, DimensionScores, HealthStatus, ReliabilityScore, ScoreSummary,
    ScoringWeights,
};
