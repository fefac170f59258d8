//! Range tuner.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use gaitspec_core::{
    infer_units, phase_index, AllowedRange, Dataset, PhaseRange, PlausibilityBounds, RangeEdit,
    SpecKey, SpecVersion, Specification, Time, REPRESENTATIVE_PHASES,
};
use gaitspec_progress::{CancellationToken, NoopProgress, ProgressCounter, ProgressSink};
use gaitspec_storage::{ImpactReport, ProposedChange, SpecificationStore};
use gaitspec_validation::ImpactAnalyzer;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TuningError};
use crate::estimator::{EstimatedRange, TuningMethod};

/// How samples from several datasets are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningScope {
    /// One estimate over all samples
    #[default]
    Pooled,
    /// One estimate per dataset, then the envelope of those
    PerDatasetEnvelope,
}

/// Tuning configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Estimation method
    pub method: TuningMethod,

    /// Sample combination across datasets
    pub scope: TuningScope,

    /// Phase percents to tune
    pub phases: Vec<u8>,

    /// Tasks to tune; empty means every task in the data
    pub tasks: BTreeSet<String>,

    /// Variables to tune; empty means every variable in the data
    pub variables: BTreeSet<String>,

    /// Raise the method's minimum sample count
    pub min_samples: Option<usize>,

    /// Sample count at which confidence reaches 1
    pub recommended_samples: usize,

    /// Expert-set keys that are never retuned
    pub overrides: BTreeSet<SpecKey>,

    /// Estimate keys on the rayon pool
    pub parallel: bool,

    /// Emit a progress event every this many keys
    pub progress_interval: usize,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            method: TuningMethod::default(),
            scope: TuningScope::default(),
            phases: REPRESENTATIVE_PHASES.to_vec(),
            tasks: BTreeSet::new(),
            variables: BTreeSet::new(),
            min_samples: None,
            recommended_samples: 50,
            overrides: BTreeSet::new(),
            parallel: true,
            progress_interval: 50,
        }
    }
}

impl TuningConfig {
    /// Set the method.
    pub fn with_method(mut self, method: TuningMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the scope.
    pub fn with_scope(mut self, scope: TuningScope) -> Self {
        self.scope = scope;
        self
    }

    /// Tune only these phases.
    pub fn with_phases(mut self, phases: impl IntoIterator<Item = u8>) -> Self {
        self.phases = phases.into_iter().collect();
        self
    }

    /// Tune only this task (may be repeated).
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.tasks.insert(task.into());
        self
    }

    /// Tune only this variable (may be repeated).
    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variables.insert(variable.into());
        self
    }

    /// Require at least `n` samples per key.
    pub fn with_min_samples(mut self, n: usize) -> Self {
        self.min_samples = Some(n);
        self
    }

    /// Preserve an expert-set range.
    pub fn with_override(mut self, key: SpecKey) -> Self {
        self.overrides.insert(key);
        self
    }

    /// Enable or disable parallel estimation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn wants(&self, task: &str, variable: &str) -> bool {
        (self.tasks.is_empty() || self.tasks.contains(task))
            && (self.variables.is_empty() || self.variables.contains(variable))
    }
}

/// Statistical backing of a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Justification {
    /// Samples used
    pub samples: usize,

    /// Sample mean
    pub mean: f64,

    /// Sample standard deviation
    pub std: f64,

    /// samples / recommended samples, capped at 1
    pub confidence: f64,

    /// Datasets that contributed
    pub datasets: usize,
}

/// Candidate versus the live range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeComparison {
    /// Live bounds
    pub current: AllowedRange,

    /// candidate.min - current.min
    pub delta_min: f64,

    /// candidate.max - current.max
    pub delta_max: f64,

    /// candidate width / current width
    pub width_ratio: f64,
}

impl RangeComparison {
    fn new(current: AllowedRange, candidate: AllowedRange) -> Self {
        let width = current.width();
        Self {
            current,
            delta_min: candidate.min - current.min,
            delta_max: candidate.max - current.max,
            width_ratio: if width > 0.0 {
                candidate.width() / width
            } else {
                f64::INFINITY
            },
        }
    }

    /// Whether the candidate accepts everything the live range accepts.
    pub fn widens(&self) -> bool {
        self.delta_min <= 0.0 && self.delta_max >= 0.0
    }
}

/// Proposed range for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRange {
    /// Key
    pub key: SpecKey,

    /// Proposed range, clamped and with provenance
    pub range: PhaseRange,

    /// Unclamped estimate
    pub estimate: EstimatedRange,

    /// Whether clamping changed the estimate
    pub clamped: bool,

    /// Statistics
    pub justification: Justification,

    /// Comparison with the live range, if one exists
    pub comparison: Option<RangeComparison>,
}

/// A key that could not be tuned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningFailure {
    /// Key
    pub key: SpecKey,

    /// Reason
    pub error: TuningError,
}

/// Outcome of a tuning run. A proposal, never committed by the tuner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningResult {
    /// Method used
    pub method: TuningMethod,

    /// Scope used
    pub scope: TuningScope,

    /// Live version the candidates were compared with
    pub base_version: SpecVersion,

    /// Names of the datasets sampled
    pub datasets: Vec<String>,

    /// Candidates, ordered by key
    pub candidates: Vec<CandidateRange>,

    /// Keys that could not be tuned
    pub failures: Vec<TuningFailure>,

    /// Keys skipped as manual overrides
    pub preserved: Vec<SpecKey>,

    /// Impact of the candidates, when analysed
    pub impact: Option<ImpactReport>,

    /// Run time
    pub tuned_at: Time,
}

impl TuningResult {
    /// Candidate for `key`.
    pub fn candidate(&self, key: &SpecKey) -> Option<&CandidateRange> {
        self.candidates.iter().find(|c| &c.key == key)
    }

    /// Edits setting every candidate range.
    pub fn to_edits(&self) -> Vec<RangeEdit> {
        self.candidates
            .iter()
            .map(|c| RangeEdit::set(c.key.clone(), c.range.clone()))
            .collect()
    }

    /// Stage the candidates as a draft change on `store`.
    pub fn stage(&self, store: &SpecificationStore, rationale: impl Into<String>) -> ProposedChange {
        store.stage_edits(self.to_edits(), rationale)
    }
}

enum KeyOutcome {
    Candidate(CandidateRange),
    Failure(TuningFailure),
}

/// Derives candidate ranges from data.
#[derive(Clone)]
pub struct RangeTuner {
    config: TuningConfig,
    bounds: Arc<PlausibilityBounds>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl Default for RangeTuner {
    fn default() -> Self {
        Self::new(TuningConfig::default())
    }
}

impl RangeTuner {
    /// Create a tuner with the standard plausibility bounds.
    pub fn new(config: TuningConfig) -> Self {
        Self {
            config,
            bounds: Arc::new(PlausibilityBounds::standard()),
            progress: Arc::new(NoopProgress),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the plausibility bounds.
    pub fn with_bounds(mut self, bounds: PlausibilityBounds) -> Self {
        self.bounds = Arc::new(bounds);
        self
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
    pub fn config(&self) -> &TuningConfig {
        &self.config
    }

    /// Estimate candidate ranges from `datasets`, compared with `live`.
    pub fn tune(&self, datasets: &[Dataset], live: &Specification) -> Result<TuningResult> {
        tracing::info!(
            "Tuning {} datasets with {} ({:?}) against {}",
            datasets.len(),
            self.config.method,
            self.config.scope,
            live.version
        );

        let (samples, preserved) = self.gather(datasets);
        for key in &preserved {
            tracing::debug!("Preserving manual override {}", key);
        }

        let total = samples.len();
        let counter = ProgressCounter::start(
            self.progress.as_ref(),
            "tune",
            total,
            self.config.progress_interval,
        );

        let work = |(key, per_dataset): (&SpecKey, &Vec<Vec<f64>>)| -> Option<KeyOutcome> {
            if self.cancel.is_cancelled() {
                return None;
            }
            let outcome = match self.tune_key(key, per_dataset, live) {
                Ok(candidate) => KeyOutcome::Candidate(candidate),
                Err(error) => {
                    tracing::debug!("Skipping {}: {}", key, error);
                    KeyOutcome::Failure(TuningFailure {
                        key: key.clone(),
                        error,
                    })
                }
            };
            counter.tick();
            Some(outcome)
        };

        let outcomes: Option<Vec<KeyOutcome>> = if self.config.parallel {
            samples.par_iter().map(work).collect()
        } else {
            samples.iter().map(work).collect()
        };
        let Some(outcomes) = outcomes else {
            tracing::warn!("Tuning cancelled at {}/{} keys", counter.processed(), total);
            return Err(TuningError::Cancelled {
                processed: counter.processed(),
                total,
            });
        };

        let mut candidates = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                KeyOutcome::Candidate(c) => candidates.push(c),
                KeyOutcome::Failure(f) => failures.push(f),
            }
        }

        if candidates.is_empty() {
            tracing::warn!(
                "Tuning produced no candidates ({} failed, {} preserved)",
                failures.len(),
                preserved.len()
            );
            return Err(TuningError::NoCandidates {
                failures: failures.len(),
                preserved: preserved.len(),
            });
        }

        tracing::info!(
            "Tuned {} keys ({} clamped), {} failed, {} preserved",
            candidates.len(),
            candidates.iter().filter(|c| c.clamped).count(),
            failures.len(),
            preserved.len()
        );
        Ok(TuningResult {
            method: self.config.method,
            scope: self.config.scope,
            base_version: live.version,
            datasets: datasets.iter().map(|d| d.name.clone()).collect(),
            candidates,
            failures,
            preserved: preserved.into_iter().collect(),
            impact: None,
            tuned_at: chrono::Utc::now(),
        })
    }

    /// Tune against the store's live head and measure the impact of the
    /// candidates on `evaluation` (the tuning data itself when `None`).
    pub fn tune_with_impact(
        &self,
        datasets: &[Dataset],
        store: &SpecificationStore,
        evaluation: Option<&[Dataset]>,
        analyzer: &ImpactAnalyzer,
    ) -> Result<TuningResult> {
        let live = store.snapshot();
        let mut result = self.tune(datasets, &live)?;
        let candidate = live.derive(&result.to_edits(), "tuning preview");
        let impact = analyzer.compare(evaluation.unwrap_or(datasets), &live, &candidate)?;
        result.impact = Some(impact);
        Ok(result)
    }

    /// Phase samples per key and dataset, plus the overridden keys met.
    fn gather(&self, datasets: &[Dataset]) -> (BTreeMap<SpecKey, Vec<Vec<f64>>>, BTreeSet<SpecKey>) {
        let mut samples: BTreeMap<SpecKey, Vec<Vec<f64>>> = BTreeMap::new();
        let mut preserved = BTreeSet::new();
        for (d, dataset) in datasets.iter().enumerate() {
            for stride in &dataset.strides {
                for (variable, values) in &stride.variables {
                    if !self.config.wants(stride.task(), variable) {
                        continue;
                    }
                    for &phase in &self.config.phases {
                        let key = SpecKey::new(stride.task(), phase, variable.as_str());
                        if self.config.overrides.contains(&key) {
                            preserved.insert(key);
                            continue;
                        }
                        let Some(&value) = values.get(phase_index(f64::from(phase))) else {
                            continue;
                        };
                        samples
                            .entry(key)
                            .or_insert_with(|| vec![Vec::new(); datasets.len()])[d]
                            .push(value);
                    }
                }
            }
        }
        (samples, preserved)
    }

    fn tune_key(
        &self,
        key: &SpecKey,
        per_dataset: &[Vec<f64>],
        live: &Specification,
    ) -> Result<CandidateRange> {
        let bound = self.bounds.bound_for(&key.variable).ok_or_else(|| {
            TuningError::NoPlausibilityBound {
                variable: key.variable.clone(),
            }
        })?;

        let (estimate, contributing) = self.estimate(per_dataset)?;
        let (min, max) = bound.clamp(estimate.min, estimate.max);
        if max <= min {
            return Err(TuningError::OutsidePlausibleBounds {
                variable: key.variable.clone(),
                min: estimate.min,
                max: estimate.max,
                bound_min: bound.min,
                bound_max: bound.max,
            });
        }
        let clamped = min != estimate.min || max != estimate.max;
        if clamped {
            tracing::debug!(
                "Clamped {} from [{:.4},{:.4}] to [{:.4},{:.4}]",
                key,
                estimate.min,
                estimate.max,
                min,
                max
            );
        }
        let typical_min = estimate.typical_min.clamp(min, max);
        let typical_max = estimate.typical_max.clamp(typical_min, max);

        let current = live.get(&key.task, key.phase, &key.variable);
        let units = current
            .map(|r| r.units.clone())
            .filter(|u| !u.is_empty())
            .or_else(|| infer_units(&key.variable).map(str::to_string))
            .unwrap_or_else(|| bound.units.clone());

        let justification = Justification {
            samples: estimate.samples,
            mean: estimate.mean,
            std: estimate.std,
            confidence: (estimate.samples as f64 / self.config.recommended_samples.max(1) as f64)
                .min(1.0),
            datasets: contributing,
        };
        let range = PhaseRange::new(min, max)
            .with_typical(typical_min, typical_max)
            .with_units(units)
            .with_confidence(justification.confidence)
            .with_citation(format!(
                "tuned by {} from {} samples across {} datasets",
                self.config.method, estimate.samples, contributing
            ));
        let comparison = current.map(|c| RangeComparison::new(c.allowed(), range.allowed()));

        Ok(CandidateRange {
            key: key.clone(),
            range,
            estimate,
            clamped,
            justification,
            comparison,
        })
    }

    /// Estimate from per-dataset samples according to the scope.
    fn estimate(&self, per_dataset: &[Vec<f64>]) -> Result<(EstimatedRange, usize)> {
        let estimator = self.config.method.estimator();
        let needed = self.config.min_samples.unwrap_or(0);
        let check = |samples: &[f64]| -> Result<EstimatedRange> {
            let found = samples.iter().filter(|v| v.is_finite()).count();
            if found < needed {
                return Err(TuningError::InsufficientSamples { needed, found });
            }
            estimator.compute(samples)
        };

        let contributing = per_dataset.iter().filter(|s| !s.is_empty()).count();
        match self.config.scope {
            TuningScope::Pooled => {
                let pooled: Vec<f64> = per_dataset.iter().flatten().copied().collect();
                Ok((check(&pooled)?, contributing))
            }
            TuningScope::PerDatasetEnvelope => {
                let mut first_error = None;
                let mut estimates = Vec::new();
                for samples in per_dataset.iter().filter(|s| !s.is_empty()) {
                    match check(samples) {
                        Ok(estimate) => estimates.push(estimate),
                        Err(e) if first_error.is_none() => first_error = Some(e),
                        Err(_) => {}
                    }
                }
                let Some(mut envelope) = estimates.first().cloned() else {
                    return Err(first_error.unwrap_or(TuningError::InsufficientSamples {
                        needed: needed.max(estimator.min_samples()),
                        found: 0,
                    }));
                };
                for e in &estimates[1..] {
                    envelope.min = envelope.min.min(e.min);
                    envelope.max = envelope.max.max(e.max);
                    envelope.typical_min = envelope.typical_min.min(e.typical_min);
                    envelope.typical_max = envelope.typical_max.max(e.typical_max);
                }
                let pooled: Vec<f64> = per_dataset
                    .iter()
                    .flatten()
                    .copied()
                    .filter(|v| v.is_finite())
                    .collect();
                let n = pooled.len() as f64;
                envelope.samples = pooled.len();
                envelope.mean = pooled.iter().sum::<f64>() / n;
                envelope.std = if pooled.len() > 1 {
                    (pooled.iter().map(|v| (v - envelope.mean).powi(2)).sum::<f64>() / (n - 1.0))
                        .sqrt()
                } else {
                    0.0
                };
                Ok((envelope, estimates.len()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaitspec_core::{Stride, StrideId};
    use gaitspec_progress::ProgressRecorder;
    use proptest::prelude::*;

    const KNEE: &str = "knee_flexion_angle";

    /// One walking stride per value, knee constant over the stride.
    fn dataset(name: &str, values: impl IntoIterator<Item = f64>) -> Dataset {
        values
            .into_iter()
            .enumerate()
            .fold(Dataset::new(name), |ds, (i, v)| {
                ds.with_stride(
                    Stride::new(StrideId::new("S1", "1", &(i + 1).to_string(), "walking"))
                        .with_constant(KNEE, v),
                )
            })
    }

    /// 0.50 .. 0.99 in steps of 0.01.
    fn spread_dataset(name: &str) -> Dataset {
        dataset(name, (0..50).map(|i| 0.5 + i as f64 * 0.01))
    }

    fn live() -> Specification {
        Specification::new(
            SpecVersion::INITIAL,
            vec![(
                SpecKey::new("walking", 50, KNEE),
                PhaseRange::new(0.6, 0.9).with_units("rad"),
            )],
            "initial",
        )
    }

    fn tuner(method: TuningMethod) -> RangeTuner {
        RangeTuner::new(TuningConfig::default().with_method(method).with_phases([50]))
    }

    #[test]
    fn test_percentile_candidate_with_comparison() {
        let result = tuner(TuningMethod::Percentile95)
            .tune(&[spread_dataset("a")], &live())
            .unwrap();
        let key = SpecKey::new("walking", 50, KNEE);
        let candidate = result.candidate(&key).unwrap();

        assert!(!candidate.clamped);
        assert!((candidate.range.min - 0.51225).abs() < 1e-9);
        assert!((candidate.range.max - 0.97775).abs() < 1e-9);
        assert_eq!(candidate.range.units, "rad");
        assert_eq!(candidate.justification.samples, 50);
        assert_eq!(candidate.justification.confidence, 1.0);

        let comparison = candidate.comparison.unwrap();
        assert!(comparison.widens());
        assert!(comparison.width_ratio > 1.0);
        assert_eq!(result.to_edits().len(), 1);
    }

    #[test]
    fn test_estimate_beyond_bound_is_clamped() {
        let bounds = PlausibilityBounds::empty()
            .with_rule("^knee", 0.0, 0.8, "rad")
            .unwrap();
        let result = tuner(TuningMethod::ZScore)
            .with_bounds(bounds)
            .tune(&[spread_dataset("a")], &Specification::empty())
            .unwrap();
        let candidate = &result.candidates[0];
        assert!(candidate.clamped);
        assert!(candidate.estimate.max > 0.8);
        assert_eq!(candidate.range.max, 0.8);
        assert!(candidate.range.typical_max.unwrap() <= 0.8);
        assert!(candidate.comparison.is_none());
    }

    #[test]
    fn test_degree_variable_clamped_in_degrees() {
        const KNEE_DEG: &str = "knee_flexion_angle_ipsi_deg";
        let data = (0..50).fold(Dataset::new("deg"), |ds, i| {
            ds.with_stride(
                Stride::new(StrideId::new("S1", "1", &(i + 1).to_string(), "walking"))
                    .with_constant(KNEE_DEG, -20.0 + i as f64 * 1.5),
            )
        });
        let result = tuner(TuningMethod::ZScore)
            .tune(&[data], &Specification::empty())
            .unwrap();
        let candidate = &result.candidates[0];
        assert_eq!(candidate.key.variable, KNEE_DEG);
        assert_eq!(candidate.range.units, "deg");
        // Lower tail is clipped at the knee's hyperextension limit, upper tail is not.
        assert!(candidate.clamped);
        assert!((candidate.range.min - (-0.35f64).to_degrees()).abs() < 1e-9);
        assert_eq!(candidate.range.max, candidate.estimate.max);
        assert!(candidate.range.max > 50.0);
    }

    #[test]
    fn test_estimate_entirely_outside_bound_fails() {
        let bounds = PlausibilityBounds::empty()
            .with_rule("^knee", 2.0, 3.0, "rad")
            .unwrap();
        let err = tuner(TuningMethod::ZScore)
            .with_bounds(bounds)
            .tune(&[spread_dataset("a")], &live())
            .unwrap_err();
        assert_eq!(err, TuningError::NoCandidates { failures: 1, preserved: 0 });
    }

    #[test]
    fn test_failures_are_recorded_per_key() {
        let ds = spread_dataset("a");
        let mut odd = dataset("b", [0.4, 0.5]);
        for stride in &mut odd.strides {
            stride.variables.insert("mystery".to_string(), vec![1.0; 150]);
        }
        let result = tuner(TuningMethod::ZScore).tune(&[ds, odd], &live()).unwrap();
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(
            result.failures[0].error,
            TuningError::NoPlausibilityBound {
                variable: "mystery".to_string()
            }
        );
    }

    #[test]
    fn test_insufficient_samples() {
        let err = tuner(TuningMethod::Percentile95)
            .tune(&[dataset("a", [0.5, 0.6, 0.7])], &live())
            .unwrap_err();
        assert!(matches!(err, TuningError::NoCandidates { failures: 1, .. }));

        let result = RangeTuner::new(
            TuningConfig::default()
                .with_method(TuningMethod::ZScore)
                .with_phases([50])
                .with_min_samples(100),
        )
        .tune(&[spread_dataset("a"), dataset("b", [0.4, 0.5, 0.6, 0.7, 0.8])], &live());
        assert!(matches!(result, Err(TuningError::NoCandidates { .. })));
    }

    #[test]
    fn test_overrides_are_preserved() {
        let key = SpecKey::new("walking", 50, KNEE);
        let tuner = RangeTuner::new(
            TuningConfig::default()
                .with_method(TuningMethod::ZScore)
                .with_phases([25, 50])
                .with_override(key.clone()),
        );
        let result = tuner.tune(&[spread_dataset("a")], &live()).unwrap();
        assert_eq!(result.preserved, vec![key.clone()]);
        assert!(result.candidate(&key).is_none());
        assert!(result.candidate(&SpecKey::new("walking", 25, KNEE)).is_some());
    }

    #[test]
    fn test_envelope_covers_each_dataset() {
        let low = dataset("low", (0..10).map(|i| 0.2 + i as f64 * 0.01));
        let high = dataset("high", (0..10).map(|i| 0.9 + i as f64 * 0.01));
        let pooled = tuner(TuningMethod::ZScore)
            .tune(&[low.clone(), high.clone()], &live())
            .unwrap();
        let envelope = RangeTuner::new(
            TuningConfig::default()
                .with_method(TuningMethod::ZScore)
                .with_scope(TuningScope::PerDatasetEnvelope)
                .with_phases([50]),
        )
        .tune(&[low, high], &live())
        .unwrap();

        let e = &envelope.candidates[0];
        assert_eq!(e.justification.datasets, 2);
        assert_eq!(e.justification.samples, 20);
        assert!(e.range.min < 0.2 && e.range.max > 0.99);
        assert_eq!(pooled.candidates[0].justification.samples, 20);
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let datasets = [spread_dataset("a"), spread_dataset("b")];
        let parallel = RangeTuner::new(TuningConfig::default()).tune(&datasets, &live()).unwrap();
        let sequential = RangeTuner::new(TuningConfig::default().with_parallel(false))
            .tune(&datasets, &live())
            .unwrap();
        let bounds = |r: &TuningResult| -> Vec<(SpecKey, AllowedRange)> {
            r.candidates.iter().map(|c| (c.key.clone(), c.range.allowed())).collect()
        };
        assert_eq!(bounds(&parallel), bounds(&sequential));
        assert_eq!(parallel.candidates.len(), 4);
    }

    #[test]
    fn test_progress_and_cancellation() {
        let recorder = Arc::new(ProgressRecorder::new());
        RangeTuner::default()
            .with_progress(recorder.clone())
            .tune(&[spread_dataset("a")], &live())
            .unwrap();
        assert!(recorder.last().unwrap().is_complete());

        let token = CancellationToken::new();
        token.cancel();
        let err = RangeTuner::default()
            .with_cancellation(token)
            .tune(&[spread_dataset("a")], &live())
            .unwrap_err();
        assert_eq!(err, TuningError::Cancelled { processed: 0, total: 4 });
    }

    #[test]
    fn test_impact_and_staging_never_commit() {
        let store = SpecificationStore::new(live()).unwrap();
        let data = [spread_dataset("a")];
        let result = tuner(TuningMethod::Percentile95)
            .tune_with_impact(&data, &store, None, &ImpactAnalyzer::default())
            .unwrap();

        let impact = result.impact.as_ref().unwrap();
        // live accepts 0.60..=0.90 (31 strides); the candidate accepts 0.52..=0.97
        assert_eq!(impact.datasets[0].valid_before, 31);
        assert_eq!(impact.datasets[0].valid_after, 46);
        assert_eq!(impact.newly_invalid_count(), 0);
        assert!(impact.net_improvement());

        let change = result.stage(&store, "tuned from dataset a");
        assert_eq!(store.live_version(), SpecVersion::INITIAL);
        assert_eq!(change.edits.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_candidates_stay_within_bounds(
            values in prop::collection::vec(-5.0f64..5.0, 20..60),
            method in prop::sample::select(TuningMethod::ALL.to_vec()),
        ) {
            let bounds = PlausibilityBounds::empty().with_rule("^knee", -0.35, 2.70, "rad").unwrap();
            let tuner = RangeTuner::new(TuningConfig::default().with_method(method).with_phases([50]))
                .with_bounds(bounds);
            if let Ok(result) = tuner.tune(&[dataset("p", values)], &Specification::empty()) {
                for c in &result.candidates {
                    prop_assert!(c.range.min >= -0.35 && c.range.max <= 2.70);
                    prop_assert!(c.range.min < c.range.max);
                }
            }
        }
    }
}
