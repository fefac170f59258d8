//! Impact preview of candidate specifications.

use gaitspec_core::{ChangeId, Dataset, Specification, VerdictStatus};
use gaitspec_storage::{DatasetImpact, ImpactReport, SpecificationStore};

use crate::error::Result;
use crate::validator::{RangeValidator, ValidationResult};

/// Re-validates datasets under a candidate specification without committing it.
#[derive(Clone, Default)]
pub struct ImpactAnalyzer {
    validator: RangeValidator,
}

impl ImpactAnalyzer {
    /// Use `validator` for both the base and the candidate runs.
    pub fn new(validator: RangeValidator) -> Self {
        Self { validator }
    }

    /// Compare verdicts under `base` and `candidate` for every dataset.
    pub fn compare(
        &self,
        datasets: &[Dataset],
        base: &Specification,
        candidate: &Specification,
    ) -> Result<ImpactReport> {
        let mut report = ImpactReport::new(base.version);
        for dataset in datasets {
            let before = self.validator.validate(dataset, base)?;
            let after = self.validator.validate(dataset, candidate)?;
            report.datasets.push(diff(&before, &after));
        }
        tracing::info!(
            "Impact of candidate on {}: {} newly valid, {} newly invalid",
            base.version,
            report.newly_valid_count(),
            report.newly_invalid_count()
        );
        Ok(report)
    }

    /// Preview a staged change against its own base version.
    pub fn preview_change(
        &self,
        store: &SpecificationStore,
        change: ChangeId,
        datasets: &[Dataset],
    ) -> Result<ImpactReport> {
        let staged = store.change(change)?;
        let base = store.snapshot_at(staged.base_version)?;
        let candidate = store.candidate(change)?;
        self.compare(datasets, &base, &candidate)
    }

    /// Preview a staged change and attach the result to it.
    pub fn preview_and_attach(
        &self,
        store: &SpecificationStore,
        change: ChangeId,
        datasets: &[Dataset],
    ) -> Result<ImpactReport> {
        let report = self.preview_change(store, change, datasets)?;
        store.attach_impact(change, report.clone())?;
        Ok(report)
    }
}

fn diff(before: &ValidationResult, after: &ValidationResult) -> DatasetImpact {
    let previous = before.statuses();
    let mut impact = DatasetImpact {
        dataset: after.dataset.clone(),
        valid_before: before.count(VerdictStatus::Pass),
        valid_after: after.count(VerdictStatus::Pass),
        invalid_before: before.count(VerdictStatus::Fail),
        invalid_after: after.count(VerdictStatus::Fail),
        ..Default::default()
    };
    for verdict in &after.verdicts {
        let was = previous.get(&verdict.stride).copied();
        match (was, verdict.status) {
            (Some(VerdictStatus::Pass), VerdictStatus::Fail) => {
                impact.newly_invalid.push(verdict.stride.clone())
            }
            (was, VerdictStatus::Pass) if was != Some(VerdictStatus::Pass) => {
                impact.newly_valid.push(verdict.stride.clone())
            }
            _ => {}
        }
    }
    impact
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::StrideFilter;
    use crate::fixtures::{knee_dataset, knee_spec, KNEE};
    use gaitspec_core::{PhaseRange, RangeEdit, SpecKey};

    fn widen() -> Vec<RangeEdit> {
        vec![RangeEdit::set(
            SpecKey::new("walking", 50, KNEE),
            PhaseRange::new(0.10, 1.60).with_units("rad"),
        )]
    }

    #[test]
    fn test_widening_makes_strides_valid() {
        let base = knee_spec();
        let candidate = base.derive(&widen(), "widen");
        let report = ImpactAnalyzer::default()
            .compare(&[knee_dataset(5, 2)], &base, &candidate)
            .unwrap();
        assert_eq!(report.newly_valid_count(), 2);
        assert_eq!(report.newly_invalid_count(), 0);
        assert!(report.net_improvement());
        assert_eq!(report.datasets[0].valid_before, 3);
        assert_eq!(report.datasets[0].valid_after, 5);
    }

    #[test]
    fn test_narrowing_makes_strides_invalid() {
        let base = knee_spec();
        let candidate = base.derive(
            &[RangeEdit::set(
                SpecKey::new("walking", 50, KNEE),
                PhaseRange::new(0.6, 1.6).with_units("rad"),
            )],
            "narrow",
        );
        let report = ImpactAnalyzer::default()
            .compare(&[knee_dataset(5, 2)], &base, &candidate)
            .unwrap();
        // The three 0.5 strides now fail, the two 1.5 strides now pass
        assert_eq!(report.newly_invalid_count(), 3);
        assert_eq!(report.newly_valid_count(), 2);
        assert!(!report.net_improvement());
    }

    #[test]
    fn test_preview_matches_commit() {
        let store = SpecificationStore::new(knee_spec()).unwrap();
        let datasets = vec![knee_dataset(10, 4), knee_dataset(6, 1)];
        let analyzer = ImpactAnalyzer::default();

        let change = store.stage_edits(widen(), "widen knee at mid-stance");
        store.validate_integrity(change.id).unwrap();
        let preview = analyzer.preview_and_attach(&store, change.id, &datasets).unwrap();
        store.commit(change.id).unwrap();

        let validator = RangeValidator::default();
        for (dataset, predicted) in datasets.iter().zip(&preview.datasets) {
            let result = validator.validate_live(dataset, &store).unwrap();
            let stats = StrideFilter::new().statistics(&result);
            assert_eq!(stats.valid, predicted.valid_after);
            assert_eq!(stats.invalid, predicted.invalid_after);
        }
        assert_eq!(store.change(change.id).unwrap().impact, Some(preview));
    }
}
