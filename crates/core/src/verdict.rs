//! Per-stride verdicts, violations and non-fatal warnings.

use serde::{Deserialize, Serialize};

use crate::id::StrideId;
use crate::spec::AllowedRange;

/// A value outside its allowed range at one phase point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Task
    pub task: String,

    /// Phase percent
    pub phase: f64,

    /// Sample index
    pub phase_index: usize,

    /// Variable
    pub variable: String,

    /// Observed value (may be NaN)
    pub observed: f64,

    /// Bounds that applied
    pub allowed: AllowedRange,

    /// Whether the bounds were interpolated
    pub interpolated: bool,
}

impl Violation {
    /// Human-readable rejection reason.
    pub fn describe(&self) -> String {
        let phase = if self.phase.fract() == 0.0 {
            format!("{:.0}", self.phase)
        } else {
            format!("{:.1}", self.phase)
        };
        format!(
            "{} out of range {}, got {:.2} at phase {}% ({})",
            self.variable, self.allowed, self.observed, phase, self.task
        )
    }
}

/// Outcome of evaluating one stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// Every checked point was in range
    Pass,
    /// At least one checked point was out of range
    Fail,
    /// Task unknown to the specification; retained but not checked
    Excluded,
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerdictStatus::Pass => write!(f, "pass"),
            VerdictStatus::Fail => write!(f, "fail"),
            VerdictStatus::Excluded => write!(f, "excluded"),
        }
    }
}

/// Verdict for one stride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrideVerdict {
    /// Stride identity
    pub stride: StrideId,

    /// Outcome
    pub status: VerdictStatus,

    /// Violations found (empty unless failed)
    pub violations: Vec<Violation>,

    /// Number of points compared
    pub checked_points: usize,
}

impl StrideVerdict {
    /// Build a verdict from the violations of a checked stride.
    pub fn evaluated(stride: StrideId, violations: Vec<Violation>, checked_points: usize) -> Self {
        let status = if violations.is_empty() {
            VerdictStatus::Pass
        } else {
            VerdictStatus::Fail
        };
        Self {
            stride,
            status,
            violations,
            checked_points,
        }
    }

    /// Verdict for a stride excluded from range checks.
    pub fn excluded(stride: StrideId) -> Self {
        Self {
            stride,
            status: VerdictStatus::Excluded,
            violations: Vec::new(),
            checked_points: 0,
        }
    }

    /// Whether the stride passed.
    pub fn passed(&self) -> bool {
        self.status == VerdictStatus::Pass
    }

    /// Rejection reasons, one per violation.
    pub fn reasons(&self) -> Vec<String> {
        self.violations.iter().map(Violation::describe).collect()
    }
}

/// Violations of one (task, variable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationGroup {
    /// Task
    pub task: String,

    /// Variable
    pub variable: String,

    /// Number of distinct strides affected
    pub strides_affected: usize,

    /// All violations, in stride order
    pub violations: Vec<Violation>,
}

/// Non-fatal findings reported alongside results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Task not in the specification catalog
    UnknownTask {
        /// Task name
        task: String,
        /// Number of strides excluded
        strides: usize,
    },
    /// Specification requires a variable the data does not have
    MissingVariable {
        /// Task
        task: String,
        /// Variable
        variable: String,
    },
    /// Data variable with no range in the specification
    UncheckedVariable {
        /// Task
        task: String,
        /// Variable
        variable: String,
    },
    /// Variable name does not follow the naming convention
    NonStandardVariableName {
        /// Variable
        variable: String,
        /// What is wrong
        reason: String,
    },
    /// An optional input column is absent
    MissingOptionalColumn {
        /// Column name
        column: String,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnknownTask { task, strides } => write!(
                f,
                "task '{}' is not in the specification; {} strides retained without range checks",
                task, strides
            ),
            Warning::MissingVariable { task, variable } => write!(
                f,
                "task '{}': specified variable '{}' is missing from the data",
                task, variable
            ),
            Warning::UncheckedVariable { task, variable } => write!(
                f,
                "task '{}': variable '{}' has no specification range and was not checked",
                task, variable
            ),
            Warning::NonStandardVariableName { variable, reason } => {
                write!(f, "variable '{}' is non-standard: {}", variable, reason)
            }
            Warning::MissingOptionalColumn { column } => {
                write!(f, "optional column '{}' is missing", column)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knee_violation(observed: f64) -> Violation {
        Violation {
            task: "walking".to_string(),
            phase: 50.0,
            phase_index: 75,
            variable: "knee_flexion_angle".to_string(),
            observed,
            allowed: AllowedRange::new(0.10, 1.20),
            interpolated: false,
        }
    }

    #[test]
    fn test_violation_description() {
        let reason = knee_violation(1.5).describe();
        assert!(reason.contains("knee_flexion_angle out of range [0.10,1.20], got 1.50"));
        assert!(reason.ends_with("at phase 50% (walking)"));
    }

    #[test]
    fn test_interpolated_phase_keeps_one_decimal() {
        let mut v = knee_violation(1.5);
        v.phase = 24.832;
        assert!(v.describe().contains("at phase 24.8%"));
    }

    #[test]
    fn test_verdict_status_from_violations() {
        let id = StrideId::new("S1", "1", "1", "walking");
        assert!(StrideVerdict::evaluated(id.clone(), vec![], 4).passed());

        let failed = StrideVerdict::evaluated(id.clone(), vec![knee_violation(1.5)], 4);
        assert_eq!(failed.status, VerdictStatus::Fail);
        assert_eq!(failed.reasons().len(), 1);

        let excluded = StrideVerdict::excluded(id);
        assert_eq!(excluded.status, VerdictStatus::Excluded);
        assert!(!excluded.passed());
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let w = Warning::UnknownTask {
            task: "hopping".to_string(),
            strides: 3,
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["kind"], "unknown_task");
        assert!(w.to_string().contains("3 strides retained"));
    }
}
