//! Audit configuration.
//!
//! Carries the two knobs the engine exposes: the chunk size used by file
//! sources and the scoring weights applied to the four base penalties.
//! Everything else (sampling caps, similarity thresholds, outlier rules)
//! is part of the engine's memory and semantics contract and is fixed.

use serde::{Deserialize, Serialize};

use crate::{
    audit::ScoringWeights,
    error::{Error, Result},
};

/// Smallest accepted chunk size.
pub const MIN_CHUNK_SIZE: usize = 100;

/// Largest accepted chunk size.
pub const MAX_CHUNK_SIZE: usize = 100_000;

/// Configuration for an audit run.
///
/// # Example
///
/// ```
/// use auditar::AuditConfig;
///
/// let config = AuditConfig::default().with_chunk_size(10_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Number of rows per chunk read from file sources.
    pub chunk_size: usize,
    /// Weights for the overall reliability score blend.
    pub weights: ScoringWeights,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            chunk_size: MAX_CHUNK_SIZE,
            weights: ScoringWeights::default(),
        }
    }
}

impl AuditConfig {
    /// Set the chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the scoring weights.
    #[must_use]
    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Check that the configuration stays within its documented ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `chunk_size` is outside
    /// `100..=100_000` or any weight is negative.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(Error::invalid_config(format!(
                "chunk_size must be between {} and {}, got {}",
                MIN_CHUNK_SIZE, MAX_CHUNK_SIZE, self.chunk_size
            )));
        }
        let w = &self.weights;
        if [w.missing, w.anomaly, w.inconsistency, w.duplicate]
            .iter()
            .any(|v| *v < 0.0)
        {
            return Err(Error::invalid_config("scoring weights must be non-negative"));
        }
        Ok(())
    }
}
