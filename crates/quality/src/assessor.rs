//! Quality assessment of a (typically filtered) dataset.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use gaitspec_core::{
    phase_index, AbsoluteBound, Dataset, PlausibilityBounds, StrideId, Time, PHASE_POINTS,
    REPRESENTATIVE_PHASES,
};
use gaitspec_validation::{FilterOutcome, FilterStats};
use serde::{Deserialize, Serialize};

use crate::norms::{compare_to_norms, NormComparison, PopulationNorms};

/// Assessor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessorConfig {
    /// Phase percents inspected for outliers and norms
    pub phases: Vec<u8>,

    /// |z| above which a value is an informational outlier
    pub z_threshold: f64,

    /// Weight of the plausibility (absolute bound) check
    pub plausibility_weight: f64,

    /// Weight of the consistency (z-score) check
    pub consistency_weight: f64,

    /// Variables every stride should carry; empty means the union in the data
    pub expected_variables: BTreeSet<String>,
}

impl Default for AssessorConfig {
    fn default() -> Self {
        Self {
            phases: REPRESENTATIVE_PHASES.to_vec(),
            z_threshold: 3.0,
            plausibility_weight: 1.0,
            consistency_weight: 0.5,
            expected_variables: BTreeSet::new(),
        }
    }
}

impl AssessorConfig {
    /// Inspect these phases.
    pub fn with_phases(mut self, phases: impl IntoIterator<Item = u8>) -> Self {
        self.phases = phases.into_iter().collect();
        self
    }

    /// Set the z threshold.
    pub fn with_z_threshold(mut self, z: f64) -> Self {
        self.z_threshold = z;
        self
    }

    /// Require a variable.
    pub fn with_expected_variable(mut self, variable: impl Into<String>) -> Self {
        self.expected_variables.insert(variable.into());
        self
    }
}

/// Coverage statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityCoverage {
    /// Distinct subjects
    pub subjects: usize,

    /// Tasks present
    pub tasks: BTreeSet<String>,

    /// Stride count per task
    pub strides_per_task: BTreeMap<String, usize>,

    /// Cycle count per subject
    pub cycles_per_subject: BTreeMap<String, usize>,

    /// Variables completeness is measured against
    pub expected_variables: BTreeSet<String>,

    /// Finite samples over expected samples
    pub completeness: f64,
}

/// How serious an outlier is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierSeverity {
    /// Outside absolute plausibility bounds, or not finite
    Critical,
    /// Plausible but far from the other strides
    Informational,
}

/// One suspicious value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    /// Stride
    pub stride: StrideId,

    /// Phase percent
    pub phase: u8,

    /// Variable
    pub variable: String,

    /// Value
    pub value: f64,

    /// z-score across strides at the same task, phase and variable
    pub z: Option<f64>,

    /// Severity
    pub severity: OutlierSeverity,

    /// Bound that was violated
    pub bound: Option<AbsoluteBound>,
}

/// Assessment of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Dataset name
    pub dataset: String,

    /// Coverage
    pub coverage: QualityCoverage,

    /// Outliers, critical first
    pub outliers: Vec<Outlier>,

    /// Weighted fraction of passing checks, 0 when nothing was checked
    pub plausibility_score: f64,

    /// Checks performed
    pub checks: usize,

    /// Population norm comparison
    pub norms: NormComparison,

    /// Statistics of the filter that produced the dataset
    pub filter: Option<FilterStats>,

    /// Assessment time
    pub assessed_at: Time,
}

impl QualityReport {
    /// Outliers of one severity.
    pub fn count(&self, severity: OutlierSeverity) -> usize {
        self.outliers.iter().filter(|o| o.severity == severity).count()
    }
}

/// Assesses dataset quality.
#[derive(Clone)]
pub struct QualityAssessor {
    config: AssessorConfig,
    bounds: Arc<PlausibilityBounds>,
    norms: Option<Arc<dyn PopulationNorms>>,
}

impl Default for QualityAssessor {
    fn default() -> Self {
        Self::new(AssessorConfig::default())
    }
}

impl QualityAssessor {
    /// Create an assessor with the standard plausibility bounds and no norms.
    pub fn new(config: AssessorConfig) -> Self {
        Self {
            config,
            bounds: Arc::new(PlausibilityBounds::standard()),
            norms: None,
        }
    }

    /// Replace the plausibility bounds.
    pub fn with_bounds(mut self, bounds: PlausibilityBounds) -> Self {
        self.bounds = Arc::new(bounds);
        self
    }

    /// Compare against population norms.
    pub fn with_norms(mut self, norms: Arc<dyn PopulationNorms>) -> Self {
        self.norms = Some(norms);
        self
    }

    /// Assess the kept strides of a filter outcome.
    pub fn assess_filtered(&self, outcome: &FilterOutcome) -> QualityReport {
        let mut report = self.assess(&outcome.dataset);
        report.filter = Some(outcome.stats.clone());
        report
    }

    /// Assess a dataset.
    pub fn assess(&self, dataset: &Dataset) -> QualityReport {
        tracing::debug!("Running quality assessment: {}", dataset.name);

        let coverage = self.coverage(dataset);
        let (mut outliers, passed, weight, checks) = self.outliers(dataset);
        outliers.sort_by_key(|o| o.severity != OutlierSeverity::Critical);
        let plausibility_score = if weight > 0.0 { passed / weight } else { 0.0 };
        let norms = compare_to_norms(dataset, self.norms.as_deref(), &self.config.phases);

        let report = QualityReport {
            dataset: dataset.name.clone(),
            coverage,
            outliers,
            plausibility_score,
            checks,
            norms,
            filter: None,
            assessed_at: chrono::Utc::now(),
        };
        tracing::info!(
            "Quality of {}: score {:.3}, {} critical and {} informational outliers, completeness {:.3}",
            report.dataset,
            report.plausibility_score,
            report.count(OutlierSeverity::Critical),
            report.count(OutlierSeverity::Informational),
            report.coverage.completeness
        );
        report
    }

    fn coverage(&self, dataset: &Dataset) -> QualityCoverage {
        let expected = if self.config.expected_variables.is_empty() {
            dataset.variables()
        } else {
            self.config.expected_variables.clone()
        };

        let mut strides_per_task: BTreeMap<String, usize> = BTreeMap::new();
        let mut cycles: BTreeMap<String, BTreeSet<(&str, &str, &str)>> = BTreeMap::new();
        let mut finite = 0usize;
        for stride in &dataset.strides {
            *strides_per_task.entry(stride.task().to_string()).or_default() += 1;
            cycles.entry(stride.id.subject_id.clone()).or_default().insert((
                stride.id.trial_id.as_str(),
                stride.id.cycle_id.as_str(),
                stride.id.task.as_str(),
            ));
            finite += expected
                .iter()
                .filter_map(|v| stride.variables.get(v))
                .map(|values| values.iter().filter(|x| x.is_finite()).count())
                .sum::<usize>();
        }

        let possible = dataset.len() * expected.len() * PHASE_POINTS;
        QualityCoverage {
            subjects: cycles.len(),
            tasks: dataset.tasks(),
            strides_per_task,
            cycles_per_subject: cycles.into_iter().map(|(s, c)| (s, c.len())).collect(),
            expected_variables: expected,
            completeness: if possible > 0 {
                finite as f64 / possible as f64
            } else {
                0.0
            },
        }
    }

    /// Outliers plus (weighted passes, total weight, check count).
    fn outliers(&self, dataset: &Dataset) -> (Vec<Outlier>, f64, f64, usize) {
        // (task, phase, variable) -> [(stride, value)]
        let mut groups: BTreeMap<(&str, u8, &str), Vec<(&StrideId, f64)>> = BTreeMap::new();
        for stride in &dataset.strides {
            for (variable, values) in &stride.variables {
                for &phase in &self.config.phases {
                    if let Some(&v) = values.get(phase_index(f64::from(phase))) {
                        groups
                            .entry((stride.task(), phase, variable.as_str()))
                            .or_default()
                            .push((&stride.id, v));
                    }
                }
            }
        }

        let mut outliers = Vec::new();
        let (mut passed, mut weight, mut checks) = (0.0, 0.0, 0usize);
        for ((_, phase, variable), samples) in groups {
            let bound = self.bounds.bound_for(variable);
            let (mean, std) = finite_mean_std(samples.iter().map(|(_, v)| *v));

            for (stride, value) in samples {
                checks += 1;
                let z = (std > 0.0 && value.is_finite()).then(|| (value - mean) / std);
                let plausible =
                    value.is_finite() && bound.as_ref().map_or(true, |b| value >= b.min && value <= b.max);
                let consistent = z.map_or(value.is_finite(), |z| z.abs() <= self.config.z_threshold);

                weight += self.config.consistency_weight;
                if consistent {
                    passed += self.config.consistency_weight;
                }
                if bound.is_some() || !value.is_finite() {
                    weight += self.config.plausibility_weight;
                    if plausible {
                        passed += self.config.plausibility_weight;
                    }
                }

                let severity = if !plausible {
                    OutlierSeverity::Critical
                } else if !consistent {
                    OutlierSeverity::Informational
                } else {
                    continue;
                };
                outliers.push(Outlier {
                    stride: stride.clone(),
                    phase,
                    variable: variable.to_string(),
                    value,
                    z,
                    severity,
                    bound: bound.as_ref().filter(|_| !plausible).cloned(),
                });
            }
        }
        (outliers, passed, weight, checks)
    }
}

fn finite_mean_std(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let finite: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return (finite.first().copied().unwrap_or(f64::NAN), 0.0);
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}
