//! auditar - Streaming Data Quality Auditing in Pure Rust
//!
//! Audits the quality of large tabular datasets (CSV, JSON, XLSX, Parquet)
//! without ever loading them fully into memory. A set of stateful
//! accumulators consumes the dataset one bounded chunk at a time, maintains
//! approximate-but-bounded per-column statistics, detects anomalies,
//! duplicates and inconsistencies from those statistics, and combines the
//! results into a single multi-dimensional reliability score.
//!
//! # Design Principles
//!
//! 1. **Bounded memory** - every accumulator is O(1) per column beyond its
//!    documented caps, independent of total row count
//! 2. **Pure Rust** - no Python, no FFI
//! 3. **Arrow throughout** - chunks are Arrow `RecordBatch`es
//! 4. **Findings, not failures** - data problems surface through the score
//!    and issue channel, never as errors
//!
//! # Quick Start
//!
//! ```no_run
//! use auditar::{open_source, run_pipeline, AuditConfig};
//!
//! let config = AuditConfig::default();
//! let mut source = open_source("data/orders.csv", config.chunk_size).unwrap();
//! let outcome = run_pipeline(source.as_mut(), &config).unwrap();
//!
//! println!(
//!     "score {:.1} ({}) over {} rows",
//!     outcome.score.score, outcome.score.status, outcome.total_rows
//! );
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
// Allow common test patterns
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::cast_lossless,
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::float_cmp,
        clippy::unreadable_literal
    )
)]
// Allow some pedantic lints for cleaner code
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::map_unwrap_or)]

pub mod audit;
pub mod config;
pub mod error;
pub mod runner;
pub mod source;
pub mod store;

// Re-exports for convenience
// Re-export arrow types commonly needed
pub use arrow::{
    array::RecordBatch,
    datatypes::{Schema, SchemaRef},
};
pub use audit::{
    compute_reliability_score, AnomalyDetector, AnomalyStats, ColumnProfile, ColumnProfiler,
    ConsistencyChecker, DimensionScores, DistributionShape, DuplicateDetector, DuplicateStats,
    HealthStatus, InconsistencyDetector, InferredType, IsolationForest, ReliabilityScore,
    ScoreSummary, ScoringWeights,
};
pub use config::AuditConfig;
pub use error::{Error, Result};
pub use runner::{run_pipeline, AuditOutcome, Auditor};
pub use source::{
    open_source, ChunkSource, CsvSource, JsonSource, MemoryChunkSource, ParquetChunkSource,
    XlsxSource,
};
pub use store::{
    AuditReport, ColumnProfileRecord, DatasetRecord, DatasetStatus, DatasetStore,
    MemoryDatasetStore, MemoryProfileStore, MemoryReportStore, ProfileStore, ReportStore,
};
