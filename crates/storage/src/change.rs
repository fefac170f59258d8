//! Staged specification changes, integrity checks and impact reports.

use std::collections::BTreeSet;

use gaitspec_core::{ChangeId, RangeEdit, SpecKey, SpecVersion, Specification, StrideId, Time};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a proposed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChangeStatus {
    /// Staged, integrity not yet checked
    Draft,
    /// Integrity check passed; may be committed
    Validated,
    /// Became a specification version
    Committed {
        /// Version created by the commit
        version: SpecVersion,
    },
    /// Refused; terminal
    Rejected {
        /// Why it was refused
        reason: String,
    },
}

impl ChangeStatus {
    /// Whether the change is still open (draft or validated).
    pub fn is_pending(&self) -> bool {
        matches!(self, ChangeStatus::Draft | ChangeStatus::Validated)
    }
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeStatus::Draft => write!(f, "draft"),
            ChangeStatus::Validated => write!(f, "validated"),
            ChangeStatus::Committed { version } => write!(f, "committed as {}", version),
            ChangeStatus::Rejected { reason } => write!(f, "rejected: {}", reason),
        }
    }
}

/// Severity of an integrity finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Blocks the commit
    Error,
    /// Reported only
    Warning,
}

/// What an integrity finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// The change has no edits
    EmptyChange,
    /// A bound is NaN or infinite
    NonFiniteBound,
    /// min >= max
    InvertedRange,
    /// Typical range reaches outside [min, max]
    TypicalOutsideRange,
    /// typical_min > typical_max
    TypicalInverted,
    /// Phase is not below 100
    PhaseOutOfRange,
    /// Confidence outside [0, 1]
    ConfidenceOutOfRange,
    /// Units are empty
    MissingUnits,
    /// A configured required task has no ranges
    MissingRequiredTask,
    /// A task covered by the base version lost all its ranges
    DroppedTask,
}

/// One integrity finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    /// Severity
    pub severity: IssueSeverity,

    /// Finding kind
    pub kind: IssueKind,

    /// Key concerned, if any
    pub key: Option<SpecKey>,

    /// Description
    pub message: String,
}

/// Outcome of an integrity check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityResult {
    /// All findings
    pub issues: Vec<IntegrityIssue>,

    /// When the check ran
    pub checked_at: Time,
}

impl IntegrityResult {
    /// True when no finding is an error.
    pub fn passed(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Blocking findings.
    pub fn errors(&self) -> impl Iterator<Item = &IntegrityIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
    }

    /// Non-blocking findings.
    pub fn warnings(&self) -> impl Iterator<Item = &IntegrityIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
    }

    /// Error messages.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors().map(|i| i.message.clone()).collect()
    }
}

/// Before/after comparison of one dataset under a candidate specification.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatasetImpact {
    /// Dataset name
    pub dataset: String,

    /// Passing strides under the base version
    pub valid_before: usize,

    /// Passing strides under the candidate
    pub valid_after: usize,

    /// Failing strides under the base version
    pub invalid_before: usize,

    /// Failing strides under the candidate
    pub invalid_after: usize,

    /// Strides that pass only under the candidate
    pub newly_valid: Vec<StrideId>,

    /// Strides that fail only under the candidate
    pub newly_invalid: Vec<StrideId>,
}

/// Impact of a candidate specification over a set of datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// Version the candidate was built on
    pub base_version: SpecVersion,

    /// Per-dataset impact, in input order
    pub datasets: Vec<DatasetImpact>,

    /// When the preview was computed
    pub computed_at: Time,
}

impl ImpactReport {
    /// Empty report against `base_version`.
    pub fn new(base_version: SpecVersion) -> Self {
        Self {
            base_version,
            datasets: Vec::new(),
            computed_at: chrono::Utc::now(),
        }
    }

    /// Total strides newly passing.
    pub fn newly_valid_count(&self) -> usize {
        self.datasets.iter().map(|d| d.newly_valid.len()).sum()
    }

    /// Total strides newly failing.
    pub fn newly_invalid_count(&self) -> usize {
        self.datasets.iter().map(|d| d.newly_invalid.len()).sum()
    }

    /// More strides gained than lost.
    pub fn net_improvement(&self) -> bool {
        self.newly_valid_count() > self.newly_invalid_count()
    }
}

/// A staged, not-yet-committed specification edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedChange {
    /// Change ID
    pub id: ChangeId,

    /// Live version when the change was staged
    pub base_version: SpecVersion,

    /// Edits to apply
    pub edits: Vec<RangeEdit>,

    /// Why the change is proposed
    pub rationale: String,

    /// When it was staged
    pub created_at: Time,

    /// Lifecycle state
    pub status: ChangeStatus,

    /// Last integrity check
    pub integrity: Option<IntegrityResult>,

    /// Attached impact preview
    pub impact: Option<ImpactReport>,
}

impl ProposedChange {
    /// New draft against `base_version`.
    pub fn draft(base_version: SpecVersion, edits: Vec<RangeEdit>, rationale: impl Into<String>) -> Self {
        Self {
            id: ChangeId::new(),
            base_version,
            edits,
            rationale: rationale.into(),
            created_at: chrono::Utc::now(),
            status: ChangeStatus::Draft,
            integrity: None,
            impact: None,
        }
    }

    /// Keys touched by the change.
    pub fn keys(&self) -> BTreeSet<&SpecKey> {
        self.edits.iter().map(|e| &e.key).collect()
    }
}

/// Check `edits` (already applied to produce `candidate`) against the base.
///
/// Only edited ranges are inspected; untouched ranges passed when they were
/// committed. Task coverage is checked on the whole candidate.
pub fn check_integrity(
    base: &Specification,
    candidate: &Specification,
    edits: &[RangeEdit],
    required_tasks: &[String],
) -> IntegrityResult {
    let mut issues = Vec::new();
    let mut error = |kind, key: Option<&SpecKey>, message: String| {
        issues.push(IntegrityIssue {
            severity: IssueSeverity::Error,
            kind,
            key: key.cloned(),
            message,
        });
    };

    if edits.is_empty() {
        error(IssueKind::EmptyChange, None, "change has no edits".to_string());
    }

    let mut warnings = Vec::new();
    for edit in edits {
        let key = &edit.key;
        if key.phase >= 100 {
            error(
                IssueKind::PhaseOutOfRange,
                Some(key),
                format!("{}: phase must be below 100", key),
            );
        }
        let Some(range) = &edit.range else {
            continue;
        };

        let bounds = [Some(range.min), Some(range.max), range.typical_min, range.typical_max];
        if bounds.iter().flatten().any(|v| !v.is_finite()) {
            error(
                IssueKind::NonFiniteBound,
                Some(key),
                format!("{}: bounds must be finite", key),
            );
            continue;
        }
        if range.min >= range.max {
            error(
                IssueKind::InvertedRange,
                Some(key),
                format!("{}: min {} must be below max {}", key, range.min, range.max),
            );
        }
        if let (Some(lo), Some(hi)) = (range.typical_min, range.typical_max) {
            if lo > hi {
                error(
                    IssueKind::TypicalInverted,
                    Some(key),
                    format!("{}: typical_min {} exceeds typical_max {}", key, lo, hi),
                );
            }
        }
        let typical_outside = [range.typical_min, range.typical_max]
            .iter()
            .flatten()
            .any(|v| *v < range.min || *v > range.max);
        if typical_outside {
            error(
                IssueKind::TypicalOutsideRange,
                Some(key),
                format!("{}: typical range must lie within [{}, {}]", key, range.min, range.max),
            );
        }
        if !(0.0..=1.0).contains(&range.confidence) {
            error(
                IssueKind::ConfidenceOutOfRange,
                Some(key),
                format!("{}: confidence {} outside [0, 1]", key, range.confidence),
            );
        }
        if range.units.trim().is_empty() {
            warnings.push(IntegrityIssue {
                severity: IssueSeverity::Warning,
                kind: IssueKind::MissingUnits,
                key: Some(key.clone()),
                message: format!("{}: units are empty", key),
            });
        }
    }

    let covered = candidate.tasks();
    for task in required_tasks {
        if !covered.contains(task) {
            error(
                IssueKind::MissingRequiredTask,
                None,
                format!("required task '{}' has no ranges", task),
            );
        }
    }
    for task in base.tasks().difference(&covered) {
        error(
            IssueKind::DroppedTask,
            None,
            format!("task '{}' would lose all of its ranges", task),
        );
    }

    issues.extend(warnings);
    IntegrityResult {
        issues,
        checked_at: chrono::Utc::now(),
    }
}
