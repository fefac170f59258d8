//! Comparison against external population norms.

use std::collections::BTreeMap;

use gaitspec_core::{phase_index, Dataset, SpecKey};
use serde::{Deserialize, Serialize};

/// Deviation (in norm standard deviations) within which a mean agrees.
const AGREEMENT_Z: f64 = 2.0;

/// Published mean and spread of one (task, phase, variable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormRange {
    /// Population mean
    pub mean: f64,

    /// Population standard deviation
    pub std: f64,

    /// Reference the norm comes from
    pub source: String,
}

/// Source of population norms.
pub trait PopulationNorms: Send + Sync {
    /// Name shown in reports.
    fn name(&self) -> &str;

    /// Norm for a key, if the source has one.
    fn norm(&self, key: &SpecKey) -> Option<&NormRange>;
}

/// Norms held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticNorms {
    name: String,
    entries: BTreeMap<SpecKey, NormRange>,
}

impl StaticNorms {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Add a norm.
    pub fn with_norm(
        mut self,
        key: SpecKey,
        mean: f64,
        std: f64,
        source: impl Into<String>,
    ) -> Self {
        self.entries.insert(
            key,
            NormRange {
                mean,
                std,
                source: source.into(),
            },
        );
        self
    }

    /// Number of norms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PopulationNorms for StaticNorms {
    fn name(&self) -> &str {
        &self.name
    }

    fn norm(&self, key: &SpecKey) -> Option<&NormRange> {
        self.entries.get(key)
    }
}

/// Dataset mean versus a norm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormDeviation {
    /// Key
    pub key: SpecKey,

    /// Dataset mean at the key
    pub observed_mean: f64,

    /// Norm mean
    pub norm_mean: f64,

    /// (observed - norm) / norm std
    pub z: f64,

    /// |z| within the agreement limit
    pub agrees: bool,
}

/// Outcome of a norm comparison. Never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NormComparison {
    /// No norms configured, or none overlap the data
    NotApplicable {
        /// Why
        reason: String,
    },
    /// Compared
    Compared {
        /// Norm source name
        source: String,
        /// One entry per key with data and a norm
        deviations: Vec<NormDeviation>,
        /// Fraction of deviations that agree
        agreement: f64,
    },
}

/// Compare dataset means at `phases` against `norms`.
pub fn compare_to_norms(
    dataset: &Dataset,
    norms: Option<&dyn PopulationNorms>,
    phases: &[u8],
) -> NormComparison {
    let Some(norms) = norms else {
        return NormComparison::NotApplicable {
            reason: "no population norms configured".to_string(),
        };
    };

    let mut sums: BTreeMap<SpecKey, (f64, usize)> = BTreeMap::new();
    for stride in &dataset.strides {
        for (variable, values) in &stride.variables {
            for &phase in phases {
                let key = SpecKey::new(stride.task(), phase, variable.as_str());
                if norms.norm(&key).is_none() {
                    continue;
                }
                match values.get(phase_index(f64::from(phase))) {
                    Some(v) if v.is_finite() => {
                        let entry = sums.entry(key).or_default();
                        entry.0 += v;
                        entry.1 += 1;
                    }
                    _ => {}
                }
            }
        }
    }

    let deviations: Vec<NormDeviation> = sums
        .into_iter()
        .filter_map(|(key, (sum, n))| {
            let norm = norms.norm(&key)?;
            let observed_mean = sum / n as f64;
            let z = if norm.std > 0.0 {
                (observed_mean - norm.mean) / norm.std
            } else if observed_mean == norm.mean {
                0.0
            } else {
                f64::INFINITY
            };
            Some(NormDeviation {
                key,
                observed_mean,
                norm_mean: norm.mean,
                z,
                agrees: z.abs() <= AGREEMENT_Z,
            })
        })
        .collect();

    if deviations.is_empty() {
        return NormComparison::NotApplicable {
            reason: format!("{} has no norms for the data's tasks and variables", norms.name()),
        };
    }
    let agreement =
        deviations.iter().filter(|d| d.agrees).count() as f64 / deviations.len() as f64;
    NormComparison::Compared {
        source: norms.name().to_string(),
        deviations,
        agreement,
    }
}
