//! Data-driven range tuning.
//!
//! [`RangeTuner`] pools phase-specific samples from one or more datasets,
//! estimates a candidate range per (task, phase, variable) with the selected
//! [`TuningMethod`] and clamps every candidate into absolute plausibility
//! bounds. The result is a proposal: it can be turned into staged edits but
//! is never committed by the tuner.

#![warn(missing_docs)]

pub mod error;
pub mod estimator;
pub mod tuner;

pub use error::{Result, TuningError};
pub use estimator::{percentile, EstimatedRange, RangeEstimator, TuningMethod};
pub use tuner::{
    CandidateRange, Justification, RangeComparison, RangeTuner, TuningConfig, TuningFailure,
    TuningResult, TuningScope,
};
