//! Statistical range estimators.
//!
//! Each [`TuningMethod`] maps to one [`RangeEstimator`] through a fixed
//! table. Estimators only see finite samples, sorted ascending.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TuningError};

/// Scale factor turning a MAD into a normal-consistent standard deviation.
const MAD_SCALE: f64 = 1.4826;

/// Spread under which samples count as identical.
const DEGENERATE_SPREAD: f64 = 1e-12;

/// Statistical method used to derive a candidate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningMethod {
    /// Central 95% of samples
    #[default]
    Percentile95,
    /// Tukey fences
    Iqr,
    /// Mean plus or minus two standard deviations
    ZScore,
    /// Robust median/MAD range
    BiomechanicallyConstrained,
}

static ESTIMATORS: [&dyn RangeEstimator; 4] = [
    &Percentile95Estimator,
    &IqrEstimator,
    &ZScoreEstimator,
    &MadEstimator,
];

impl TuningMethod {
    /// Every method, in table order.
    pub const ALL: [TuningMethod; 4] = [
        TuningMethod::Percentile95,
        TuningMethod::Iqr,
        TuningMethod::ZScore,
        TuningMethod::BiomechanicallyConstrained,
    ];

    /// The estimator implementing this method.
    pub fn estimator(self) -> &'static dyn RangeEstimator {
        ESTIMATORS[self as usize]
    }

    /// Minimum finite samples the method needs.
    pub fn min_samples(self) -> usize {
        self.estimator().min_samples()
    }
}

impl std::fmt::Display for TuningMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TuningMethod::Percentile95 => "percentile_95",
            TuningMethod::Iqr => "iqr",
            TuningMethod::ZScore => "z_score",
            TuningMethod::BiomechanicallyConstrained => "biomechanically_constrained",
        };
        f.write_str(name)
    }
}

/// Raw estimate, before clamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatedRange {
    /// Lower bound
    pub min: f64,

    /// Upper bound
    pub max: f64,

    /// Lower end of the typical range
    pub typical_min: f64,

    /// Upper end of the typical range
    pub typical_max: f64,

    /// Finite samples used
    pub samples: usize,

    /// Sample mean
    pub mean: f64,

    /// Sample standard deviation (n - 1)
    pub std: f64,
}

/// One estimation strategy.
pub trait RangeEstimator: Send + Sync {
    /// Method implemented.
    fn method(&self) -> TuningMethod;

    /// Minimum finite samples required.
    fn min_samples(&self) -> usize;

    /// `(min, max, typical_min, typical_max)` from sorted finite samples.
    fn bounds(&self, sorted: &[f64], mean: f64, std: f64) -> (f64, f64, f64, f64);

    /// Estimate a range. Non-finite samples are dropped first.
    fn compute(&self, samples: &[f64]) -> Result<EstimatedRange> {
        let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.len() < self.min_samples() {
            return Err(TuningError::InsufficientSamples {
                needed: self.min_samples(),
                found: sorted.len(),
            });
        }
        sorted.sort_by(f64::total_cmp);

        let (mean, std) = mean_std(&sorted);
        if sorted[sorted.len() - 1] - sorted[0] <= DEGENERATE_SPREAD {
            return Err(TuningError::DegenerateSamples { value: mean });
        }

        let (min, max, typical_min, typical_max) = self.bounds(&sorted, mean, std);
        if max - min <= DEGENERATE_SPREAD {
            return Err(TuningError::DegenerateSamples {
                value: percentile(&sorted, 50.0),
            });
        }
        Ok(EstimatedRange {
            min,
            max,
            typical_min,
            typical_max,
            samples: sorted.len(),
            mean,
            std,
        })
    }
}

struct Percentile95Estimator;

impl RangeEstimator for Percentile95Estimator {
    fn method(&self) -> TuningMethod {
        TuningMethod::Percentile95
    }

    fn min_samples(&self) -> usize {
        20
    }

    fn bounds(&self, sorted: &[f64], _mean: f64, _std: f64) -> (f64, f64, f64, f64) {
        (
            percentile(sorted, 2.5),
            percentile(sorted, 97.5),
            percentile(sorted, 25.0),
            percentile(sorted, 75.0),
        )
    }
}

struct IqrEstimator;

impl RangeEstimator for IqrEstimator {
    fn method(&self) -> TuningMethod {
        TuningMethod::Iqr
    }

    fn min_samples(&self) -> usize {
        10
    }

    fn bounds(&self, sorted: &[f64], _mean: f64, _std: f64) -> (f64, f64, f64, f64) {
        let q1 = percentile(sorted, 25.0);
        let q3 = percentile(sorted, 75.0);
        let iqr = q3 - q1;
        (q1 - 1.5 * iqr, q3 + 1.5 * iqr, q1, q3)
    }
}

struct ZScoreEstimator;

impl RangeEstimator for ZScoreEstimator {
    fn method(&self) -> TuningMethod {
        TuningMethod::ZScore
    }

    fn min_samples(&self) -> usize {
        5
    }

    fn bounds(&self, _sorted: &[f64], mean: f64, std: f64) -> (f64, f64, f64, f64) {
        (mean - 2.0 * std, mean + 2.0 * std, mean - std, mean + std)
    }
}

struct MadEstimator;

impl RangeEstimator for MadEstimator {
    fn method(&self) -> TuningMethod {
        TuningMethod::BiomechanicallyConstrained
    }

    fn min_samples(&self) -> usize {
        10
    }

    fn bounds(&self, sorted: &[f64], _mean: f64, _std: f64) -> (f64, f64, f64, f64) {
        let median = percentile(sorted, 50.0);
        let spread = 3.0 * MAD_SCALE * mad(sorted, median);
        (
            median - spread,
            median + spread,
            percentile(sorted, 25.0),
            percentile(sorted, 75.0),
        )
    }
}

/// Linear-interpolated percentile (`p` in 0-100) of sorted samples.
///
/// Returns NaN for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

/// Median absolute deviation around `median`.
fn mad(sorted: &[f64], median: f64) -> f64 {
    let mut deviations: Vec<f64> = sorted.iter().map(|v| (v - median).abs()).collect();
    deviations.sort_by(f64::total_cmp);
    percentile(&deviations, 50.0)
}

fn mean_std(samples: &[f64]) -> (f64, f64) {
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    if samples.len() < 2 {
        return (mean, 0.0);
    }
    let var = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}
