//! Validation reports and recommendations.

use std::collections::BTreeMap;

use gaitspec_core::{SpecVersion, Time, ValidationMode, ViolationGroup, Warning};
use serde::{Deserialize, Serialize};

use crate::filter::{FilterOutcome, FilterStats};
use crate::validator::{Coverage, ValidationResult};

/// Pass rate under which a low-pass-rate recommendation is raised.
const LOW_PASS_RATE: f64 = 0.5;

/// How many hot spots get their own recommendation.
const MAX_HOT_SPOTS: usize = 3;

/// What a recommendation asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// A range rejects many strides; review it against the literature or tune it
    ReviewRange,
    /// Data has a task the specification does not cover
    AddTaskToSpecification,
    /// Specification expects a variable the data lacks
    ProvideMissingVariable,
    /// Variable names do not follow the convention
    RenameVariable,
    /// Few strides pass
    LowPassRate,
    /// No stride passes
    NoValidStrides,
}

/// Urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Blocks use of the dataset
    High,
    /// Worth acting on
    Medium,
    /// Informational
    Low,
}

/// A human-readable, machine-consumable suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Kind
    pub kind: RecommendationKind,

    /// Urgency
    pub priority: Priority,

    /// Message
    pub message: String,

    /// Task concerned
    pub task: Option<String>,

    /// Variable concerned
    pub variable: Option<String>,

    /// Phase percent concerned
    pub phase: Option<f64>,
}

impl Recommendation {
    fn new(kind: RecommendationKind, priority: Priority, message: String) -> Self {
        Self {
            kind,
            priority,
            message,
            task: None,
            variable: None,
            phase: None,
        }
    }
}

/// Derive recommendations, most urgent first.
pub fn recommend(result: &ValidationResult, stats: &FilterStats) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if stats.total > 0 && stats.valid == 0 {
        out.push(Recommendation::new(
            RecommendationKind::NoValidStrides,
            Priority::High,
            format!(
                "none of the {} checked strides in {} pass; the dataset is unusable as is",
                stats.total, stats.dataset
            ),
        ));
    } else if stats.total > 0 && stats.pass_rate < LOW_PASS_RATE {
        out.push(Recommendation::new(
            RecommendationKind::LowPassRate,
            Priority::Medium,
            format!(
                "only {:.0}% of strides in {} pass ({} of {})",
                stats.pass_rate * 100.0,
                stats.dataset,
                stats.valid,
                stats.total
            ),
        ));
    }

    // Hot spots: (task, variable, phase) with the most violations
    let mut spots: BTreeMap<(&str, &str, u64), usize> = BTreeMap::new();
    for group in &result.violations {
        for v in &group.violations {
            *spots
                .entry((v.task.as_str(), v.variable.as_str(), v.phase.to_bits()))
                .or_default() += 1;
        }
    }
    let mut spots: Vec<_> = spots.into_iter().collect();
    spots.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for ((task, variable, phase_bits), count) in spots.into_iter().take(MAX_HOT_SPOTS) {
        let phase = f64::from_bits(phase_bits);
        let share = if stats.total > 0 {
            count as f64 / stats.total as f64
        } else {
            0.0
        };
        let priority = if share >= LOW_PASS_RATE {
            Priority::High
        } else {
            Priority::Medium
        };
        out.push(Recommendation {
            kind: RecommendationKind::ReviewRange,
            priority,
            message: format!(
                "{} at phase {:.0}% ({}) rejects {} strides; review the range or tune it from data",
                variable, phase, task, count
            ),
            task: Some(task.to_string()),
            variable: Some(variable.to_string()),
            phase: Some(phase),
        });
    }

    for warning in &result.warnings {
        let rec = match warning {
            Warning::UnknownTask { task, strides } => Recommendation {
                task: Some(task.clone()),
                ..Recommendation::new(
                    RecommendationKind::AddTaskToSpecification,
                    Priority::Medium,
                    format!("add ranges for task '{}' to validate its {} strides", task, strides),
                )
            },
            Warning::MissingVariable { task, variable } => Recommendation {
                task: Some(task.clone()),
                variable: Some(variable.clone()),
                ..Recommendation::new(
                    RecommendationKind::ProvideMissingVariable,
                    Priority::Low,
                    format!("provide '{}' for task '{}' so it can be validated", variable, task),
                )
            },
            Warning::NonStandardVariableName { variable, reason } => Recommendation {
                variable: Some(variable.clone()),
                ..Recommendation::new(
                    RecommendationKind::RenameVariable,
                    Priority::Low,
                    format!("rename '{}': {}", variable, reason),
                )
            },
            Warning::UncheckedVariable { .. } | Warning::MissingOptionalColumn { .. } => continue,
        };
        out.push(rec);
    }

    out.sort_by_key(|r| r.priority);
    out
}

/// Serializable summary of one validated dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Dataset name
    pub dataset: String,

    /// Pinned specification version
    pub spec_version: SpecVersion,

    /// Mode used
    pub mode: ValidationMode,

    /// Filter statistics
    pub stats: FilterStats,

    /// Coverage
    pub coverage: Coverage,

    /// Violations by (task, variable)
    pub violations: Vec<ViolationGroup>,

    /// Warnings
    pub warnings: Vec<Warning>,

    /// Recommendations
    pub recommendations: Vec<Recommendation>,

    /// Report time
    pub generated_at: Time,
}

impl ValidationReport {
    /// Assemble a report from a run and its filter outcome.
    pub fn build(result: &ValidationResult, outcome: &FilterOutcome) -> Self {
        Self {
            dataset: result.dataset.clone(),
            spec_version: result.spec_version,
            mode: result.mode,
            stats: outcome.stats.clone(),
            coverage: result.coverage.clone(),
            violations: result.violations.clone(),
            warnings: result.warnings.clone(),
            recommendations: recommend(result, &outcome.stats),
            generated_at: chrono::Utc::now(),
        }
    }

    /// Pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::StrideFilter;
    use crate::fixtures::{knee_dataset, knee_spec, KNEE};
    use crate::validator::RangeValidator;
    use gaitspec_core::{Dataset, Stride, StrideId};

    fn report(ds: &Dataset) -> ValidationReport {
        let result = RangeValidator::default().validate(ds, &knee_spec()).unwrap();
        let outcome = StrideFilter::new().apply(ds, &result);
        ValidationReport::build(&result, &outcome)
    }

    #[test]
    fn test_clean_dataset_has_no_recommendations() {
        assert!(report(&knee_dataset(5, 0)).recommendations.is_empty());
    }

    #[test]
    fn test_hot_spot_names_variable_and_phase() {
        let report = report(&knee_dataset(10, 3));
        let rec = &report.recommendations[0];
        assert_eq!(rec.kind, RecommendationKind::ReviewRange);
        assert_eq!(rec.variable.as_deref(), Some(KNEE));
        assert_eq!(rec.phase, Some(50.0));
        assert!(rec.message.contains("rejects 3 strides"));
    }

    #[test]
    fn test_all_failing_dataset_is_flagged_first() {
        let report = report(&knee_dataset(5, 5));
        assert_eq!(report.recommendations[0].kind, RecommendationKind::NoValidStrides);
        assert_eq!(report.recommendations[0].priority, Priority::High);
    }

    #[test]
    fn test_low_pass_rate_and_unknown_task() {
        let hop = Stride::new(StrideId::new("S2", "1", "1", "hopping")).with_constant(KNEE, 0.5);
        let report = report(&knee_dataset(10, 6).with_stride(hop));
        let kinds: Vec<RecommendationKind> = report.recommendations.iter().map(|r| r.kind).collect();
        assert!(kinds.contains(&RecommendationKind::LowPassRate));
        assert!(kinds.contains(&RecommendationKind::AddTaskToSpecification));
    }

    #[test]
    fn test_report_serializes() {
        let json = report(&knee_dataset(4, 1)).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["stats"]["valid"], 3);
        assert_eq!(value["spec_version"], 1);
    }
}
