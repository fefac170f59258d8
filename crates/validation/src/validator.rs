//! Range validator.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use gaitspec_core::{
    Dataset, RangeProfile, ResourceError, SpecVersion, Specification, Stride, StrideId,
    StrideVerdict, Time, ValidationMode, VerdictStatus, Violation, ViolationGroup, Warning,
};
use gaitspec_progress::{CancellationToken, NoopProgress, ProgressCounter, ProgressSink};
use gaitspec_storage::SpecificationStore;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::error::{Result, ValidationError};
use crate::structure::{check_structure, naming_warnings};

/// What the data offers versus what the specification covers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Coverage {
    /// Tasks present in the data
    pub available_tasks: BTreeSet<String>,

    /// Tasks in the specification catalog
    pub specified_tasks: BTreeSet<String>,

    /// Data tasks the specification does not know
    pub unknown_tasks: BTreeSet<String>,

    /// Variables present in the data
    pub available_variables: BTreeSet<String>,

    /// Variables the specification has ranges for, over the data's known tasks
    pub required_variables: BTreeSet<String>,

    /// Required variables absent from the data
    pub missing_variables: BTreeSet<String>,

    /// Data variables without any range
    pub unchecked_variables: BTreeSet<String>,
}

impl Coverage {
    /// Fraction of data tasks known to the specification.
    pub fn task_coverage(&self) -> f64 {
        if self.available_tasks.is_empty() {
            return 0.0;
        }
        let known = self.available_tasks.len() - self.unknown_tasks.len();
        known as f64 / self.available_tasks.len() as f64
    }
}

/// Outcome of one validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Dataset name
    pub dataset: String,

    /// Specification version the run was pinned to
    pub spec_version: SpecVersion,

    /// Mode used
    pub mode: ValidationMode,

    /// One verdict per stride, in dataset order
    pub verdicts: Vec<StrideVerdict>,

    /// Violations grouped by (task, variable)
    pub violations: Vec<ViolationGroup>,

    /// Coverage metadata
    pub coverage: Coverage,

    /// Non-fatal warnings
    pub warnings: Vec<Warning>,

    /// Range comparisons performed
    pub checked_points: usize,

    /// When the run started
    pub started_at: Time,

    /// Wall-clock duration
    pub duration_ms: u64,
}

impl ValidationResult {
    /// Verdict of one stride.
    pub fn verdict(&self, id: &StrideId) -> Option<&StrideVerdict> {
        self.verdicts.iter().find(|v| &v.stride == id)
    }

    /// Number of verdicts with `status`.
    pub fn count(&self, status: VerdictStatus) -> usize {
        self.verdicts.iter().filter(|v| v.status == status).count()
    }

    /// Status per stride.
    pub fn statuses(&self) -> HashMap<&StrideId, VerdictStatus> {
        self.verdicts.iter().map(|v| (&v.stride, v.status)).collect()
    }

    /// Ids of failing strides.
    pub fn failed_ids(&self) -> Vec<&StrideId> {
        self.verdicts
            .iter()
            .filter(|v| v.status == VerdictStatus::Fail)
            .map(|v| &v.stride)
            .collect()
    }

    /// Total violation count.
    pub fn violation_count(&self) -> usize {
        self.violations.iter().map(|g| g.violations.len()).sum()
    }
}

enum Interrupt {
    Cancelled,
    OutOfTime,
}

/// Checks strides against a pinned specification snapshot.
#[derive(Clone)]
pub struct RangeValidator {
    config: ValidationConfig,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl Default for RangeValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl RangeValidator {
    /// Create a validator.
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            progress: Arc::new(NoopProgress),
            cancel: CancellationToken::new(),
        }
    }

    /// Report progress to `sink`.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// Observe `token` for cancellation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Configuration.
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate against the store's live head, pinned for the whole run.
    pub fn validate_live(&self, dataset: &Dataset, store: &SpecificationStore) -> Result<ValidationResult> {
        let spec = store.snapshot();
        self.validate(dataset, &spec)
    }

    /// Validate every stride of `dataset` against `spec`.
    pub fn validate(&self, dataset: &Dataset, spec: &Specification) -> Result<ValidationResult> {
        let started = Instant::now();
        let started_at = chrono::Utc::now();
        tracing::info!(
            "Validating {} ({} strides) against {} in {} mode",
            dataset.name,
            dataset.len(),
            spec.version,
            self.config.mode
        );

        check_structure(dataset, &self.config)?;

        let (plans, coverage, mut warnings) = self.plan(dataset, spec);
        if self.config.check_naming {
            warnings.extend(naming_warnings(dataset));
        }
        self.check_budget(dataset, &plans)?;

        let total = dataset.len();
        let counter = ProgressCounter::start(
            self.progress.as_ref(),
            "validate",
            total,
            self.config.progress_interval,
        );
        let deadline = self.config.time_budget().map(|budget| started + budget);

        let eval = |stride: &Stride| -> std::result::Result<StrideVerdict, Interrupt> {
            if self.cancel.is_cancelled() {
                return Err(Interrupt::Cancelled);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(Interrupt::OutOfTime);
            }
            let verdict = evaluate(stride, plans.get(stride.task()));
            counter.tick();
            Ok(verdict)
        };

        let outcome: std::result::Result<Vec<StrideVerdict>, Interrupt> = if self.config.parallel {
            dataset.strides.par_iter().map(eval).collect()
        } else {
            dataset.strides.iter().map(eval).collect()
        };

        let verdicts = outcome.map_err(|interrupt| {
            let processed = counter.processed();
            match interrupt {
                Interrupt::Cancelled => {
                    tracing::warn!("Validation of {} cancelled at {}/{}", dataset.name, processed, total);
                    ValidationError::Cancelled {
                        operation: "validate".to_string(),
                        processed,
                        total,
                    }
                }
                Interrupt::OutOfTime => ResourceError::TimeBudget {
                    operation: "validate".to_string(),
                    budget_ms: self.config.time_budget_ms.unwrap_or_default(),
                    processed,
                    total,
                }
                .into(),
            }
        })?;

        let checked_points = verdicts.iter().map(|v| v.checked_points).sum();
        let violations = group_violations(&verdicts);
        let result = ValidationResult {
            dataset: dataset.name.clone(),
            spec_version: spec.version,
            mode: self.config.mode,
            verdicts,
            violations,
            coverage,
            warnings,
            checked_points,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Validated {}: {} pass, {} fail, {} excluded ({} checks, {} ms)",
            result.dataset,
            result.count(VerdictStatus::Pass),
            result.count(VerdictStatus::Fail),
            result.count(VerdictStatus::Excluded),
            result.checked_points,
            result.duration_ms
        );
        Ok(result)
    }

    /// Resolve check points per known task, plus coverage and warnings.
    fn plan(
        &self,
        dataset: &Dataset,
        spec: &Specification,
    ) -> (HashMap<String, Vec<RangeProfile>>, Coverage, Vec<Warning>) {
        let mut plans = HashMap::new();
        let mut warnings = Vec::new();
        let mut coverage = Coverage {
            available_tasks: dataset.tasks(),
            specified_tasks: spec.tasks(),
            available_variables: dataset.variables(),
            ..Default::default()
        };

        for task in &coverage.available_tasks {
            if !spec.has_task(task) {
                let strides = dataset.strides_for_task(task).count();
                tracing::warn!(
                    "Task '{}' is not in the specification; {} strides excluded from range checks",
                    task,
                    strides
                );
                coverage.unknown_tasks.insert(task.clone());
                warnings.push(Warning::UnknownTask {
                    task: task.clone(),
                    strides,
                });
                continue;
            }

            let specified = spec.variables_for(task);
            let present = dataset.variables_for_task(task);
            let mut profiles = Vec::new();
            for variable in &specified {
                coverage.required_variables.insert(variable.clone());
                if !present.contains(variable) {
                    tracing::debug!("Task '{}': variable '{}' missing from data", task, variable);
                    coverage.missing_variables.insert(variable.clone());
                    warnings.push(Warning::MissingVariable {
                        task: task.clone(),
                        variable: variable.clone(),
                    });
                    continue;
                }
                if let Some(profile) = spec.profile(task, variable, self.config.mode) {
                    if !profile.points.is_empty() {
                        profiles.push(profile);
                    }
                }
            }
            for variable in present.difference(&specified) {
                coverage.unchecked_variables.insert(variable.clone());
                warnings.push(Warning::UncheckedVariable {
                    task: task.clone(),
                    variable: variable.clone(),
                });
            }
            plans.insert(task.clone(), profiles);
        }

        (plans, coverage, warnings)
    }

    fn check_budget(&self, dataset: &Dataset, plans: &HashMap<String, Vec<RangeProfile>>) -> Result<()> {
        let Some(budget) = self.config.max_checks else {
            return Ok(());
        };
        let per_stride: Vec<usize> = dataset
            .strides
            .iter()
            .map(|stride| {
                plans.get(stride.task()).map_or(0, |profiles| {
                    profiles
                        .iter()
                        .filter(|p| stride.variables.contains_key(&p.variable))
                        .map(|p| p.points.len())
                        .sum()
                })
            })
            .collect();
        let estimated: usize = per_stride.iter().sum();
        if estimated <= budget {
            return Ok(());
        }
        let widest = per_stride.iter().copied().max().unwrap_or(1).max(1);
        Err(ResourceError::CheckBudget {
            operation: "validate".to_string(),
            estimated,
            budget,
            suggested_chunk: (budget / widest).max(1),
        }
        .into())
    }
}

fn evaluate(stride: &Stride, profiles: Option<&Vec<RangeProfile>>) -> StrideVerdict {
    let Some(profiles) = profiles else {
        return StrideVerdict::excluded(stride.id.clone());
    };

    let mut violations = Vec::new();
    let mut checked = 0;
    for profile in profiles {
        let Some(samples) = stride.variables.get(&profile.variable) else {
            continue;
        };
        for point in &profile.points {
            checked += 1;
            let observed = samples.get(point.index).copied().unwrap_or(f64::NAN);
            if !point.range.contains(observed) {
                violations.push(Violation {
                    task: profile.task.clone(),
                    phase: point.phase,
                    phase_index: point.index,
                    variable: profile.variable.clone(),
                    observed,
                    allowed: point.range,
                    interpolated: point.interpolated,
                });
            }
        }
    }
    StrideVerdict::evaluated(stride.id.clone(), violations, checked)
}

fn group_violations(verdicts: &[StrideVerdict]) -> Vec<ViolationGroup> {
    let mut groups: BTreeMap<(&str, &str), (BTreeSet<&StrideId>, Vec<Violation>)> = BTreeMap::new();
    for verdict in verdicts {
        for violation in &verdict.violations {
            let (strides, list) = groups
                .entry((violation.task.as_str(), violation.variable.as_str()))
                .or_default();
            strides.insert(&verdict.stride);
            list.push(violation.clone());
        }
    }
    groups
        .into_iter()
        .map(|((task, variable), (strides, violations))| ViolationGroup {
            task: task.to_string(),
            variable: variable.to_string(),
            strides_affected: strides.len(),
            violations,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{knee_dataset, knee_spec, stride, walking_dataset, KNEE};
    use gaitspec_core::{PhaseRange, SpecKey, StructuralError};
    use gaitspec_progress::ProgressRecorder;
    use proptest::prelude::*;

    fn validator() -> RangeValidator {
        RangeValidator::default()
    }

    /// Knee ranges at 0% and 50%, both [0.10, 1.20].
    fn two_phase_spec() -> Specification {
        Specification::new(
            SpecVersion::INITIAL,
            vec![
                (SpecKey::new("walking", 0, KNEE), PhaseRange::new(0.10, 1.20)),
                (SpecKey::new("walking", 50, KNEE), PhaseRange::new(0.10, 1.20)),
            ],
            "two phases",
        )
    }

    #[test]
    fn test_in_range_strides_pass() {
        let result = validator().validate(&walking_dataset(&[0.5, 0.8, 1.1]), &knee_spec()).unwrap();
        assert_eq!(result.count(VerdictStatus::Pass), 3);
        assert_eq!(result.checked_points, 3);
        assert!(result.violations.is_empty());
        assert_eq!(result.spec_version, SpecVersion::INITIAL);
    }

    #[test]
    fn test_knee_violations_are_reported() {
        let ds = knee_dataset(5, 2);
        let result = validator().validate(&ds, &knee_spec()).unwrap();
        assert_eq!(result.count(VerdictStatus::Pass), 3);
        assert_eq!(result.count(VerdictStatus::Fail), 2);

        let failed = result.verdict(&ds.strides[0].id).unwrap();
        let reason = failed.violations[0].describe();
        assert!(reason.contains("knee_flexion_angle out of range [0.10,1.20], got 1.50"));

        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].strides_affected, 2);
    }

    #[test]
    fn test_verdicts_keep_dataset_order() {
        let ds = knee_dataset(40, 7);
        let result = validator().validate(&ds, &knee_spec()).unwrap();
        let order: Vec<&StrideId> = result.verdicts.iter().map(|v| &v.stride).collect();
        let expected: Vec<&StrideId> = ds.strides.iter().map(|s| &s.id).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_full_mode_catches_off_phase_spikes() {
        let mut ds = walking_dataset(&[0.5]);
        ds.strides[0].set_value(KNEE, 10, 2.0);

        let representative = validator().validate(&ds, &two_phase_spec()).unwrap();
        assert!(representative.verdicts[0].passed());

        let full = RangeValidator::new(ValidationConfig::default().with_mode(ValidationMode::Full))
            .validate(&ds, &two_phase_spec())
            .unwrap();
        assert!(!full.verdicts[0].passed());
        assert!(full.verdicts[0].violations[0].interpolated);
        assert_eq!(full.checked_points, 150);
    }

    #[test]
    fn test_non_finite_values_fail() {
        let mut ds = walking_dataset(&[0.5]);
        ds.strides[0].set_value(KNEE, 75, f64::NAN);
        let result = validator().validate(&ds, &knee_spec()).unwrap();
        assert_eq!(result.verdicts[0].status, VerdictStatus::Fail);
    }

    #[test]
    fn test_unknown_task_is_excluded_with_warning() {
        let hop = Stride::new(StrideId::new("S2", "1", "1", "hopping")).with_constant(KNEE, 9.0);
        let ds = walking_dataset(&[0.5]).with_stride(hop);
        let result = validator().validate(&ds, &knee_spec()).unwrap();

        assert_eq!(result.verdicts[1].status, VerdictStatus::Excluded);
        assert!(result.coverage.unknown_tasks.contains("hopping"));
        assert!(result.warnings.contains(&Warning::UnknownTask {
            task: "hopping".to_string(),
            strides: 1,
        }));
        assert!((result.coverage.task_coverage() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_and_unchecked_variables() {
        let mut spec_ranges: Vec<(SpecKey, PhaseRange)> = knee_spec()
            .iter()
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect();
        spec_ranges.push((SpecKey::new("walking", 50, "hip_flexion_angle"), PhaseRange::new(-0.3, 0.5)));
        let spec = Specification::new(SpecVersion::INITIAL, spec_ranges, "knee and hip");

        let ds = Dataset::new("ds").with_stride(stride("S1", "1", 0.5).with_constant("ankle_angle", 0.0));
        let result = validator().validate(&ds, &spec).unwrap();

        assert!(result.coverage.missing_variables.contains("hip_flexion_angle"));
        assert!(result.coverage.unchecked_variables.contains("ankle_angle"));
        assert!(result.verdicts[0].passed());
        assert!(result.warnings.iter().any(|w| matches!(w, Warning::MissingVariable { .. })));
        assert!(result.warnings.iter().any(|w| matches!(w, Warning::UncheckedVariable { .. })));
    }

    #[test]
    fn test_structural_error_aborts_run() {
        let mut ds = knee_dataset(3, 0);
        ds.strides[2].phase.truncate(100);
        let err = validator().validate(&ds, &knee_spec()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Structural(StructuralError::PhasePointCount { .. })
        ));
    }

    #[test]
    fn test_revalidation_is_idempotent() {
        let ds = knee_dataset(20, 6);
        let spec = knee_spec();
        let first = validator().validate(&ds, &spec).unwrap();
        let second = validator().validate(&ds, &spec).unwrap();
        assert_eq!(first.verdicts, second.verdicts);
        assert_eq!(first.violations, second.violations);
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let ds = knee_dataset(64, 9);
        let spec = knee_spec();
        let parallel = validator().validate(&ds, &spec).unwrap();
        let sequential = RangeValidator::new(ValidationConfig::default().with_parallel(false))
            .validate(&ds, &spec)
            .unwrap();
        assert_eq!(parallel.verdicts, sequential.verdicts);
    }

    #[test]
    fn test_progress_and_cancellation() {
        let recorder = Arc::new(ProgressRecorder::new());
        let ds = knee_dataset(10, 0);
        RangeValidator::new(
            ValidationConfig::default()
                .with_progress_interval(5)
                .with_parallel(false),
        )
        .with_progress(recorder.clone())
        .validate(&ds, &knee_spec())
        .unwrap();
        assert_eq!(recorder.last().unwrap().processed, 10);

        let token = CancellationToken::new();
        token.cancel();
        let err = validator()
            .with_cancellation(token)
            .validate(&ds, &knee_spec())
            .unwrap_err();
        assert!(matches!(err, ValidationError::Cancelled { total: 10, .. }));
    }

    #[test]
    fn test_budgets() {
        let ds = knee_dataset(10, 0);
        let err = RangeValidator::new(ValidationConfig::default().with_max_checks(4))
            .validate(&ds, &knee_spec())
            .unwrap_err();
        match err {
            ValidationError::Resource(ResourceError::CheckBudget {
                estimated,
                suggested_chunk,
                ..
            }) => {
                assert_eq!(estimated, 10);
                assert_eq!(suggested_chunk, 4);
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = RangeValidator::new(
            ValidationConfig::default().with_time_budget(std::time::Duration::ZERO),
        )
        .validate(&ds, &knee_spec())
        .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Resource(ResourceError::TimeBudget { .. })
        ));
    }

    #[test]
    fn test_live_validation_pins_snapshot() {
        let store = SpecificationStore::new(knee_spec()).unwrap();
        let result = validator().validate_live(&knee_dataset(3, 1), &store).unwrap();
        assert_eq!(result.spec_version, store.live_version());
        assert_eq!(result.count(VerdictStatus::Fail), 1);
    }

    proptest! {
        #[test]
        fn prop_in_range_values_always_pass(values in prop::collection::vec(0.10f64..=1.20, 150)) {
            let ds = Dataset::new("prop").with_stride(
                Stride::new(StrideId::new("S1", "1", "1", "walking")).with_variable(KNEE, values),
            );
            let config = ValidationConfig::default().with_mode(ValidationMode::Full).with_parallel(false);
            let result = RangeValidator::new(config).validate(&ds, &two_phase_spec()).unwrap();
            prop_assert!(result.verdicts[0].passed());
        }
    }
}
