//! Error taxonomy for the sampling engine.
//!
//! Construction-time failures (`DegenerateDistribution`, `InvalidTable`) mean the
//! physical model handed to the engine is misconfigured and abort model setup.
//! `SequencingViolation` aborts only the offending call. Out-of-range thresholds
//! and query times are never errors: they are clamped to the valid axis range.

use thiserror::Error;

/// Errors raised while building or querying sampling tables.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplingError {
    /// The accumulated total of a cumulative table is zero or non-finite,
    /// so it cannot be normalized to [0, 1].
    #[error("Degenerate distribution: cumulative total is {total} ({context})")]
    DegenerateDistribution { total: f64, context: String },

    /// The input table violates a structural invariant (length, ordering,
    /// non-negative finite densities).
    #[error("Invalid table: {0}")]
    InvalidTable(String),

    /// Photon attributes were requested without a completed draw for that photon.
    #[error("Sequencing violation: {0}")]
    SequencingViolation(String),
}

impl SamplingError {
    pub(crate) fn degenerate(total: f64, context: impl Into<String>) -> Self {
        Self::DegenerateDistribution {
            total,
            context: context.into(),
        }
    }
}
