//! Partial-acceptance stride filtering.
//!
//! Failing strides are dropped; passing strides and strides excluded from
//! checks (unknown tasks) are kept. A dataset stays usable as long as its
//! structure is sound and the validity policy accepts its pass rate.

use std::collections::HashMap;

use gaitspec_core::{Dataset, StrideId, VerdictStatus};
use serde::{Deserialize, Serialize};

use crate::validator::ValidationResult;

/// Reason recorded for a stride the validator never saw.
const NO_VERDICT: &str = "no verdict recorded";

/// Dataset-level validity rule.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "rule", content = "value", rename_all = "snake_case")]
pub enum DatasetValidityPolicy {
    /// Valid when at least one checked stride passes
    #[default]
    AnyPass,
    /// Valid when the pass rate reaches the threshold (and is above zero)
    MinPassRate(f64),
}

impl DatasetValidityPolicy {
    /// Whether `pass_rate` is acceptable.
    pub fn accepts(&self, pass_rate: f64) -> bool {
        match self {
            DatasetValidityPolicy::AnyPass => pass_rate > 0.0,
            DatasetValidityPolicy::MinPassRate(min) => pass_rate > 0.0 && pass_rate >= *min,
        }
    }
}

/// Filtering statistics of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterStats {
    /// Dataset name
    pub dataset: String,

    /// Checked strides (valid + invalid)
    pub total: usize,

    /// Passing strides
    pub valid: usize,

    /// Failing strides
    pub invalid: usize,

    /// Strides kept without checks
    pub excluded: usize,

    /// valid / total, 0 when nothing was checked
    pub pass_rate: f64,

    /// Structure is sound
    pub structural_valid: bool,

    /// Validity policy accepts the pass rate
    pub content_valid: bool,

    /// Both flags hold
    pub dataset_valid: bool,
}

impl FilterStats {
    /// Stats for a dataset rejected by structural checks.
    pub fn structural_failure(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            total: 0,
            valid: 0,
            invalid: 0,
            excluded: 0,
            pass_rate: 0.0,
            structural_valid: false,
            content_valid: false,
            dataset_valid: false,
        }
    }
}

/// Rejection reasons of one deleted stride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Stride
    pub stride: StrideId,

    /// One description per violation
    pub reasons: Vec<String>,
}

/// Filtered dataset with statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    /// Kept strides only, in source order
    pub dataset: Dataset,

    /// Statistics
    pub stats: FilterStats,

    /// Passing and excluded strides
    pub kept_ids: Vec<StrideId>,

    /// Failing strides
    pub deleted_ids: Vec<StrideId>,

    /// Why each deleted stride was dropped
    pub rejections: Vec<Rejection>,
}

impl FilterOutcome {
    /// Rejection reasons of a stride.
    pub fn reasons_for(&self, id: &StrideId) -> Option<&[String]> {
        self.rejections
            .iter()
            .find(|r| &r.stride == id)
            .map(|r| r.reasons.as_slice())
    }
}

/// Applies verdicts to a dataset.
#[derive(Debug, Clone, Default)]
pub struct StrideFilter {
    policy: DatasetValidityPolicy,
}

impl StrideFilter {
    /// Create a filter with the any-pass rule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the validity rule.
    pub fn with_policy(mut self, policy: DatasetValidityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Statistics only, from verdicts.
    pub fn statistics(&self, result: &ValidationResult) -> FilterStats {
        let valid = result.count(VerdictStatus::Pass);
        let invalid = result.count(VerdictStatus::Fail);
        let excluded = result.count(VerdictStatus::Excluded);
        self.stats(&result.dataset, valid, invalid, excluded)
    }

    fn stats(&self, dataset: &str, valid: usize, invalid: usize, excluded: usize) -> FilterStats {
        let total = valid + invalid;
        let pass_rate = if total == 0 {
            0.0
        } else {
            valid as f64 / total as f64
        };
        let content_valid = self.policy.accepts(pass_rate);
        FilterStats {
            dataset: dataset.to_string(),
            total,
            valid,
            invalid,
            excluded,
            pass_rate,
            structural_valid: true,
            content_valid,
            dataset_valid: content_valid,
        }
    }

    /// Keep passing and excluded strides, drop the rest.
    ///
    /// A stride with no verdict in `result` is dropped and counted invalid.
    pub fn apply(&self, dataset: &Dataset, result: &ValidationResult) -> FilterOutcome {
        let verdicts: HashMap<&StrideId, _> = result.verdicts.iter().map(|v| (&v.stride, v)).collect();

        let mut kept = Dataset::new(dataset.name.clone());
        let mut kept_ids = Vec::new();
        let mut deleted_ids = Vec::new();
        let mut rejections = Vec::new();
        let (mut valid, mut invalid, mut excluded) = (0, 0, 0);

        for stride in &dataset.strides {
            match verdicts.get(&stride.id) {
                Some(v) if v.status != VerdictStatus::Fail => {
                    if v.status == VerdictStatus::Pass {
                        valid += 1;
                    } else {
                        excluded += 1;
                    }
                    kept_ids.push(stride.id.clone());
                    kept.push(stride.clone());
                }
                Some(v) => {
                    invalid += 1;
                    deleted_ids.push(stride.id.clone());
                    rejections.push(Rejection {
                        stride: stride.id.clone(),
                        reasons: v.reasons(),
                    });
                }
                None => {
                    invalid += 1;
                    deleted_ids.push(stride.id.clone());
                    rejections.push(Rejection {
                        stride: stride.id.clone(),
                        reasons: vec![NO_VERDICT.to_string()],
                    });
                }
            }
        }

        let stats = self.stats(&dataset.name, valid, invalid, excluded);
        tracing::info!(
            "Filtered {}: kept {}, deleted {}, pass rate {:.3}, dataset valid: {}",
            dataset.name,
            kept_ids.len(),
            deleted_ids.len(),
            stats.pass_rate,
            stats.dataset_valid
        );
        FilterOutcome {
            dataset: kept,
            stats,
            kept_ids,
            deleted_ids,
            rejections,
        }
    }
}
