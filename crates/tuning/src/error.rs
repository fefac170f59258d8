//! Tuning error type.

use gaitspec_validation::ValidationError;
use serde::{Deserialize, Serialize};

/// Result alias for tuning operations.
pub type Result<T> = std::result::Result<T, TuningError>;

/// Why a candidate range could not be produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TuningError {
    /// Fewer finite samples than the method needs
    #[error("insufficient samples: {found} finite, {needed} required")]
    InsufficientSamples {
        /// Required by the method
        needed: usize,
        /// Finite samples available
        found: usize,
    },

    /// Samples have no spread, so no range can be estimated
    #[error("degenerate samples: no spread around {value:.4}")]
    DegenerateSamples {
        /// Representative value of the samples
        value: f64,
    },

    /// Clamping into the plausibility bound left an empty range
    #[error(
        "estimate [{min:.4},{max:.4}] for {variable} lies outside plausible bounds [{bound_min:.4},{bound_max:.4}]"
    )]
    OutsidePlausibleBounds {
        /// Variable name
        variable: String,
        /// Estimated lower bound
        min: f64,
        /// Estimated upper bound
        max: f64,
        /// Plausible lower limit
        bound_min: f64,
        /// Plausible upper limit
        bound_max: f64,
    },

    /// No plausibility bound covers the variable, so clamping is impossible
    #[error("no plausibility bound for {variable}")]
    NoPlausibilityBound {
        /// Variable name
        variable: String,
    },

    /// Nothing could be tuned
    #[error("no candidate ranges: {failures} keys failed, {preserved} preserved")]
    NoCandidates {
        /// Keys that failed
        failures: usize,
        /// Keys skipped as manual overrides
        preserved: usize,
    },

    /// Cancelled through the cancellation token
    #[error("tuning cancelled after {processed}/{total} keys")]
    Cancelled {
        /// Keys finished before cancellation
        processed: usize,
        /// Keys requested
        total: usize,
    },

    /// Impact analysis failed
    #[serde(skip)]
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
