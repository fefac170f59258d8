//! Dataset quality assessment and cross-dataset comparison.
//!
//! [`QualityAssessor`] summarizes coverage, separates critical outliers
//! (outside absolute plausibility bounds) from informational ones and scores
//! overall plausibility. [`ComparisonEngine`] tests pairs of datasets for
//! systematic bias per shared (task, variable).

#![warn(missing_docs)]

pub mod assessor;
pub mod comparison;
pub mod norms;

pub use assessor::{
    AssessorConfig, Outlier, OutlierSeverity, QualityAssessor, QualityCoverage, QualityReport,
};
pub use comparison::{
    ComparisonConfig, ComparisonEngine, ComparisonError, ComparisonReport, PairComparison,
    SampleSummary, VariableComparison,
};
pub use norms::{compare_to_norms, NormComparison, NormDeviation, NormRange, PopulationNorms, StaticNorms};
