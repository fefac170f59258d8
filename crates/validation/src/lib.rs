//! Stride-level range validation.
//!
//! [`RangeValidator`] checks every stride of a dataset against a pinned
//! specification snapshot, [`StrideFilter`] turns the verdicts into a filtered
//! dataset with statistics, and [`ImpactAnalyzer`] previews how a candidate
//! specification would change those verdicts. [`BatchValidator`] runs the
//! whole pipeline over many sources concurrently.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod structure;
pub mod validator;
pub mod filter;
pub mod report;
pub mod impact;
pub mod batch;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::{BatchConfig, ValidationConfig};
pub use error::{Result, ValidationError};
pub use structure::{check_structure, naming_warnings};
pub use validator::{Coverage, RangeValidator, ValidationResult};
pub use filter::{DatasetValidityPolicy, FilterOutcome, FilterStats, Rejection, StrideFilter};
pub use report::{recommend, Priority, Recommendation, RecommendationKind, ValidationReport};
pub use impact::ImpactAnalyzer;
pub use batch::{load_sources, BatchReport, BatchValidator, DatasetLoader, FileOutcome, FileResult, FileValidation};
