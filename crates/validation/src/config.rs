//! Validation and batch configuration.

use std::time::Duration;

use gaitspec_core::{SchemaConfig, ValidationMode};
use serde::{Deserialize, Serialize};

use crate::filter::DatasetValidityPolicy;

/// Range validation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Which phase points are checked
    pub mode: ValidationMode,

    /// Extra spacing (percentage points) allowed between consecutive phase samples
    pub gap_tolerance: f64,

    /// How far (percentage points) the first and last samples may sit from 0 and 100
    pub endpoint_tolerance: f64,

    /// Evaluate strides on the rayon pool
    pub parallel: bool,

    /// Emit a progress event every this many strides
    pub progress_interval: usize,

    /// Upper bound on range comparisons per run
    pub max_checks: Option<usize>,

    /// Wall-clock budget per run, in milliseconds
    pub time_budget_ms: Option<u64>,

    /// Warn about non-standard variable names
    pub check_naming: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            mode: ValidationMode::Representative,
            gap_tolerance: 1.0,
            endpoint_tolerance: 1.0,
            parallel: true,
            progress_interval: 100,
            max_checks: None,
            time_budget_ms: None,
            check_naming: true,
        }
    }
}

impl ValidationConfig {
    /// Set the mode.
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the phase gap tolerance.
    pub fn with_gap_tolerance(mut self, tolerance: f64) -> Self {
        self.gap_tolerance = tolerance;
        self
    }

    /// Enable or disable parallel evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the progress interval.
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Limit the number of range comparisons.
    pub fn with_max_checks(mut self, max_checks: usize) -> Self {
        self.max_checks = Some(max_checks);
        self
    }

    /// Limit wall-clock time.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget_ms = Some(budget.as_millis() as u64);
        self
    }

    /// Time budget as a duration.
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }
}

/// Batch validation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Files loaded and validated at the same time
    pub max_concurrent_files: usize,

    /// Input column names
    pub schema: SchemaConfig,

    /// Per-file validation settings
    pub validation: ValidationConfig,

    /// Dataset-level validity rule
    pub validity: DatasetValidityPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: 4,
            schema: SchemaConfig::default(),
            validation: ValidationConfig::default(),
            validity: DatasetValidityPolicy::default(),
        }
    }
}

impl BatchConfig {
    /// Set file concurrency.
    pub fn with_max_concurrent_files(mut self, n: usize) -> Self {
        self.max_concurrent_files = n;
        self
    }

    /// Set the input schema.
    pub fn with_schema(mut self, schema: SchemaConfig) -> Self {
        self.schema = schema;
        self
    }

    /// Set per-file validation settings.
    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    /// Set the validity rule.
    pub fn with_validity(mut self, validity: DatasetValidityPolicy) -> Self {
        self.validity = validity;
        self
    }
}
