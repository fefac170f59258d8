//! Cross-dataset bias detection.
//!
//! Each stride contributes one sample per variable (its mean over the
//! cycle). For every pair of datasets and every (task, variable) they share,
//! the engine runs Welch's t-test, computes Cohen's d and the two-sample
//! Kolmogorov-Smirnov statistic, and flags a bias when the difference is both
//! significant and large.

use std::collections::{BTreeMap, BTreeSet};

use gaitspec_core::{Dataset, Time};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Comparison failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComparisonError {
    /// Fewer than two datasets given
    #[error("comparison needs at least two datasets, got {found}")]
    NotEnoughDatasets {
        /// Datasets given
        found: usize,
    },
}

/// Comparison settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Significance level
    pub alpha: f64,

    /// Smallest |d| that counts as a bias
    pub min_effect_size: f64,

    /// Stride samples each side needs
    pub min_samples: usize,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            min_effect_size: 0.5,
            min_samples: 3,
        }
    }
}

/// Mean and spread of one side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    /// Samples
    pub n: usize,
    /// Mean
    pub mean: f64,
    /// Sample standard deviation
    pub std: f64,
}

impl SampleSummary {
    fn of(samples: &[f64]) -> Self {
        let n = samples.len();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let std = if n > 1 {
            (samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        Self { n, mean, std }
    }

    fn variance(&self) -> f64 {
        self.std * self.std
    }
}

/// Test results for one shared (task, variable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableComparison {
    /// Task
    pub task: String,
    /// Variable
    pub variable: String,
    /// First dataset
    pub left: SampleSummary,
    /// Second dataset
    pub right: SampleSummary,
    /// Welch t statistic
    pub t_statistic: f64,
    /// Welch-Satterthwaite degrees of freedom
    pub degrees_of_freedom: f64,
    /// Two-sided p-value
    pub p_value: f64,
    /// Cohen's d (pooled standard deviation)
    pub cohens_d: f64,
    /// Kolmogorov-Smirnov D
    pub ks_statistic: f64,
    /// Significant and large difference
    pub biased: bool,
}

/// Comparison of two datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairComparison {
    /// First dataset name
    pub left: String,
    /// Second dataset name
    pub right: String,
    /// Tested (task, variable) pairs
    pub variables: Vec<VariableComparison>,
    /// Shared (task, variable) pairs with too few samples
    pub skipped: Vec<(String, String)>,
    /// Fraction of tested variables without bias; `None` when nothing was tested
    pub compatibility: Option<f64>,
}

/// Comparison of every dataset pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Dataset names
    pub datasets: Vec<String>,
    /// One entry per unordered pair
    pub pairs: Vec<PairComparison>,
    /// Fraction of all tested variables without bias
    pub compatibility: Option<f64>,
    /// Comparison time
    pub compared_at: Time,
}

impl ComparisonReport {
    /// Every flagged variable with its dataset pair.
    pub fn biases(&self) -> impl Iterator<Item = (&PairComparison, &VariableComparison)> {
        self.pairs
            .iter()
            .flat_map(|p| p.variables.iter().filter(|v| v.biased).map(move |v| (p, v)))
    }
}

/// Pairwise statistical comparison of datasets.
#[derive(Debug, Clone, Default)]
pub struct ComparisonEngine {
    config: ComparisonConfig,
}

impl ComparisonEngine {
    /// Create an engine.
    pub fn new(config: ComparisonConfig) -> Self {
        Self { config }
    }

    /// Compare every pair of `datasets`.
    pub fn compare(&self, datasets: &[&Dataset]) -> Result<ComparisonReport, ComparisonError> {
        if datasets.len() < 2 {
            return Err(ComparisonError::NotEnoughDatasets {
                found: datasets.len(),
            });
        }
        tracing::debug!("Running dataset comparison: {} datasets", datasets.len());

        let samples: Vec<_> = datasets.iter().map(|d| stride_means(d)).collect();
        let mut pairs = Vec::new();
        for i in 0..datasets.len() {
            for j in i + 1..datasets.len() {
                pairs.push(self.compare_pair(
                    &datasets[i].name,
                    &samples[i],
                    &datasets[j].name,
                    &samples[j],
                ));
            }
        }

        let tested: usize = pairs.iter().map(|p| p.variables.len()).sum();
        let unbiased = pairs
            .iter()
            .flat_map(|p| &p.variables)
            .filter(|v| !v.biased)
            .count();
        let report = ComparisonReport {
            datasets: datasets.iter().map(|d| d.name.clone()).collect(),
            pairs,
            compatibility: (tested > 0).then(|| unbiased as f64 / tested as f64),
            compared_at: chrono::Utc::now(),
        };
        for (pair, v) in report.biases() {
            tracing::info!(
                "Bias between {} and {} on {} ({}): d = {:.2}, p = {:.4}",
                pair.left,
                pair.right,
                v.variable,
                v.task,
                v.cohens_d,
                v.p_value
            );
        }
        Ok(report)
    }

    fn compare_pair(
        &self,
        left_name: &str,
        left: &BTreeMap<(String, String), Vec<f64>>,
        right_name: &str,
        right: &BTreeMap<(String, String), Vec<f64>>,
    ) -> PairComparison {
        let mut variables = Vec::new();
        let mut skipped = Vec::new();
        for (key, a) in left {
            let Some(b) = right.get(key) else {
                continue;
            };
            if a.len() < self.config.min_samples || b.len() < self.config.min_samples {
                skipped.push(key.clone());
                continue;
            }
            variables.push(self.compare_samples(&key.0, &key.1, a, b));
        }
        let compatibility = (!variables.is_empty()).then(|| {
            variables.iter().filter(|v| !v.biased).count() as f64 / variables.len() as f64
        });
        PairComparison {
            left: left_name.to_string(),
            right: right_name.to_string(),
            variables,
            skipped,
            compatibility,
        }
    }

    fn compare_samples(&self, task: &str, variable: &str, a: &[f64], b: &[f64]) -> VariableComparison {
        let left = SampleSummary::of(a);
        let right = SampleSummary::of(b);
        let (t_statistic, degrees_of_freedom, p_value) = welch(&left, &right);
        let cohens_d = cohens_d(&left, &right);
        let biased = p_value < self.config.alpha && cohens_d.abs() >= self.config.min_effect_size;
        VariableComparison {
            task: task.to_string(),
            variable: variable.to_string(),
            left,
            right,
            t_statistic,
            degrees_of_freedom,
            p_value,
            cohens_d,
            ks_statistic: ks_statistic(a, b),
            biased,
        }
    }
}

/// Finite stride means per (task, variable).
fn stride_means(dataset: &Dataset) -> BTreeMap<(String, String), Vec<f64>> {
    let mut out: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
    for stride in &dataset.strides {
        for variable in stride.variables.keys() {
            if let Some(mean) = stride.mean(variable).filter(|m| m.is_finite()) {
                out.entry((stride.task().to_string(), variable.clone()))
                    .or_default()
                    .push(mean);
            }
        }
    }
    out
}

/// (t, df, two-sided p) of Welch's unequal-variance t-test.
fn welch(a: &SampleSummary, b: &SampleSummary) -> (f64, f64, f64) {
    let va = a.variance() / a.n as f64;
    let vb = b.variance() / b.n as f64;
    let se2 = va + vb;
    let diff = a.mean - b.mean;
    if se2 <= 0.0 {
        return if diff == 0.0 {
            (0.0, f64::NAN, 1.0)
        } else {
            (diff.signum() * f64::INFINITY, f64::NAN, 0.0)
        };
    }
    let t = diff / se2.sqrt();
    let df = se2 * se2 / (va * va / (a.n - 1) as f64 + vb * vb / (b.n - 1) as f64);
    let p = StudentsT::new(0.0, 1.0, df)
        .map(|dist| 2.0 * (1.0 - dist.cdf(t.abs())))
        .unwrap_or(f64::NAN);
    (t, df, p)
}

fn cohens_d(a: &SampleSummary, b: &SampleSummary) -> f64 {
    let dof = (a.n + b.n - 2) as f64;
    let pooled = (((a.n - 1) as f64 * a.variance() + (b.n - 1) as f64 * b.variance()) / dof).sqrt();
    let diff = a.mean - b.mean;
    if pooled > 0.0 {
        diff / pooled
    } else if diff == 0.0 {
        0.0
    } else {
        diff.signum() * f64::INFINITY
    }
}

/// Largest distance between the two empirical CDFs.
fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);
    let points: BTreeSet<u64> = a.iter().chain(&b).map(|v| v.to_bits()).collect();

    points
        .into_iter()
        .map(f64::from_bits)
        .map(|x| {
            let fa = a.partition_point(|v| *v <= x) as f64 / a.len() as f64;
            let fb = b.partition_point(|v| *v <= x) as f64 / b.len() as f64;
            (fa - fb).abs()
        })
        .fold(0.0, f64::max)
}
