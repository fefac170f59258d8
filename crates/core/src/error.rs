//! Fatal error taxonomy shared by the validation pipeline.

use serde::{Deserialize, Serialize};

/// The dataset is structurally unusable. Raised before any stride-level check.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum StructuralError {
    /// Required identifying columns are missing from the input table
    #[error("{dataset}: missing required columns: {}", .columns.join(", "))]
    MissingColumns {
        /// Dataset name
        dataset: String,
        /// Missing column names
        columns: Vec<String>,
    },

    /// A column does not have the same row count as the table
    #[error("{dataset}: column '{column}' has {actual} rows, expected {expected}")]
    RaggedColumn {
        /// Dataset name
        dataset: String,
        /// Column name
        column: String,
        /// Table row count
        expected: usize,
        /// Column row count
        actual: usize,
    },

    /// A column that must be numeric holds text
    #[error("{dataset}: column '{column}' must be numeric")]
    NonNumericColumn {
        /// Dataset name
        dataset: String,
        /// Column name
        column: String,
    },

    /// The table is indexed by time, not by gait phase
    #[error("{dataset}: dataset is time-indexed; phase-indexed data is required")]
    NotPhaseIndexed {
        /// Dataset name
        dataset: String,
    },

    /// No strides at all
    #[error("{dataset}: dataset contains no strides")]
    EmptyDataset {
        /// Dataset name
        dataset: String,
    },

    /// A stride does not have exactly the expected number of phase points
    #[error("{dataset}: stride {stride}: expected {expected} phase points, found {actual}")]
    PhasePointCount {
        /// Dataset name
        dataset: String,
        /// Stride identity
        stride: String,
        /// Expected point count
        expected: usize,
        /// Observed point count
        actual: usize,
    },

    /// A variable does not have one sample per phase point
    #[error("{dataset}: stride {stride}: variable '{variable}' has {actual} samples, expected {expected}")]
    VariableLength {
        /// Dataset name
        dataset: String,
        /// Stride identity
        stride: String,
        /// Variable name
        variable: String,
        /// Expected sample count
        expected: usize,
        /// Observed sample count
        actual: usize,
    },

    /// Phase values are out of bounds, not increasing, or have a gap
    #[error("{dataset}: stride {stride}: invalid phase progression at index {index}: {detail}")]
    PhaseProgression {
        /// Dataset name
        dataset: String,
        /// Stride identity
        stride: String,
        /// Sample index where the problem was found
        index: usize,
        /// What is wrong
        detail: String,
    },

    /// The same stride identity appears twice
    #[error("{dataset}: stride {stride} appears more than once")]
    DuplicateStride {
        /// Dataset name
        dataset: String,
        /// Stride identity
        stride: String,
    },
}

/// A batch or statistical operation exceeded its configured budget.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum ResourceError {
    /// Estimated work exceeds the check budget before starting
    #[error("{operation}: {estimated} range checks exceed the budget of {budget}; split the input into chunks of at most {suggested_chunk} strides")]
    CheckBudget {
        /// Operation name
        operation: String,
        /// Estimated number of checks
        estimated: usize,
        /// Configured budget
        budget: usize,
        /// Stride count per chunk that fits the budget
        suggested_chunk: usize,
    },

    /// Wall-clock budget ran out mid-operation
    #[error("{operation}: exceeded time budget of {budget_ms} ms after {processed}/{total} items; retry with smaller chunks")]
    TimeBudget {
        /// Operation name
        operation: String,
        /// Configured budget in milliseconds
        budget_ms: u64,
        /// Items finished before the budget ran out
        processed: usize,
        /// Items requested
        total: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_error_messages_carry_context() {
        let err = StructuralError::PhasePointCount {
            dataset: "umich_2021.parquet".to_string(),
            stride: "S1/1/2/walking".to_string(),
            expected: 150,
            actual: 149,
        };
        let msg = err.to_string();
        assert!(msg.contains("umich_2021.parquet"));
        assert!(msg.contains("expected 150"));
        assert!(msg.contains("found 149"));

        let missing = StructuralError::MissingColumns {
            dataset: "ds".to_string(),
            columns: vec!["subject".to_string(), "task".to_string()],
        };
        assert_eq!(missing.to_string(), "ds: missing required columns: subject, task");
    }

    #[test]
    fn test_resource_error_suggests_chunking() {
        let err = ResourceError::CheckBudget {
            operation: "validate".to_string(),
            estimated: 10_000,
            budget: 1_000,
            suggested_chunk: 10,
        };
        assert!(err.to_string().contains("chunks of at most 10 strides"));
    }
}
