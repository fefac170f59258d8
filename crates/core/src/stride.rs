//! Stride and dataset model.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::id::StrideId;
use crate::phase::{standard_phase_grid, PHASE_POINTS};

/// One gait cycle normalized to phase samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stride {
    /// Stride identity
    pub id: StrideId,

    /// Phase value (percent) of every sample
    pub phase: Vec<f64>,

    /// Phase-indexed samples per variable
    pub variables: BTreeMap<String, Vec<f64>>,
}

impl Stride {
    /// Create a stride on the standard 150-point phase grid with no variables.
    pub fn new(id: StrideId) -> Self {
        Self {
            id,
            phase: standard_phase_grid(),
            variables: BTreeMap::new(),
        }
    }

    /// Add (or replace) a variable's samples.
    pub fn with_variable(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.variables.insert(name.into(), values);
        self
    }

    /// Add a variable holding the same value at every phase point.
    pub fn with_constant(self, name: impl Into<String>, value: f64) -> Self {
        self.with_variable(name, vec![value; PHASE_POINTS])
    }

    /// Task of this stride.
    pub fn task(&self) -> &str {
        &self.id.task
    }

    /// Sample of `variable` at phase `index`.
    pub fn value_at(&self, variable: &str, index: usize) -> Option<f64> {
        self.variables.get(variable).and_then(|v| v.get(index)).copied()
    }

    /// Overwrite one sample. Returns false if the variable or index does not exist.
    pub fn set_value(&mut self, variable: &str, index: usize, value: f64) -> bool {
        match self.variables.get_mut(variable).and_then(|v| v.get_mut(index)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Mean over the finite samples of a variable.
    pub fn mean(&self, variable: &str) -> Option<f64> {
        let values = self.variables.get(variable)?;
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        Some(finite.iter().sum::<f64>() / finite.len() as f64)
    }
}

/// An ordered collection of strides loaded from one source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Dataset name (usually the source file)
    pub name: String,

    /// Strides in source order
    pub strides: Vec<Stride>,
}

impl Dataset {
    /// Create an empty dataset.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strides: Vec::new(),
        }
    }

    /// Builder-style stride append.
    pub fn with_stride(mut self, stride: Stride) -> Self {
        self.strides.push(stride);
        self
    }

    /// Append a stride.
    pub fn push(&mut self, stride: Stride) {
        self.strides.push(stride);
    }

    /// Number of strides.
    pub fn len(&self) -> usize {
        self.strides.len()
    }

    /// Whether the dataset has no strides.
    pub fn is_empty(&self) -> bool {
        self.strides.is_empty()
    }

    /// Distinct tasks, sorted.
    pub fn tasks(&self) -> BTreeSet<String> {
        self.strides.iter().map(|s| s.id.task.clone()).collect()
    }

    /// Distinct subjects, sorted.
    pub fn subjects(&self) -> BTreeSet<String> {
        self.strides.iter().map(|s| s.id.subject_id.clone()).collect()
    }

    /// Union of variable names over all strides, sorted.
    pub fn variables(&self) -> BTreeSet<String> {
        self.strides
            .iter()
            .flat_map(|s| s.variables.keys().cloned())
            .collect()
    }

    /// Variables present in the strides of one task.
    pub fn variables_for_task(&self, task: &str) -> BTreeSet<String> {
        self.strides_for_task(task)
            .flat_map(|s| s.variables.keys().cloned())
            .collect()
    }

    /// Strides belonging to a task.
    pub fn strides_for_task<'a>(&'a self, task: &'a str) -> impl Iterator<Item = &'a Stride> + 'a {
        self.strides.iter().filter(move |s| s.id.task == task)
    }

    /// A copy holding only the strides whose ids are in `keep`, order preserved.
    pub fn retain_ids(&self, keep: &HashSet<StrideId>) -> Dataset {
        Dataset {
            name: self.name.clone(),
            strides: self
                .strides
                .iter()
                .filter(|s| keep.contains(&s.id))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stride(subject: &str, cycle: &str, task: &str) -> Stride {
        Stride::new(StrideId::new(subject, "1", cycle, task)).with_constant("knee_flexion_angle", 0.5)
    }

    #[test]
    fn test_stride_defaults_to_standard_grid() {
        let s = stride("S1", "1", "walking");
        assert_eq!(s.phase.len(), PHASE_POINTS);
        assert_eq!(s.value_at("knee_flexion_angle", 75), Some(0.5));
        assert_eq!(s.value_at("hip_flexion_angle", 75), None);
    }

    #[test]
    fn test_set_value_and_mean() {
        let mut s = stride("S1", "1", "walking");
        assert!(s.set_value("knee_flexion_angle", 0, 0.5 + PHASE_POINTS as f64));
        let mean = s.mean("knee_flexion_angle").unwrap();
        assert!((mean - 1.5).abs() < 1e-9);
        assert!(!s.set_value("knee_flexion_angle", PHASE_POINTS, 1.0));
    }

    #[test]
    fn test_dataset_queries() {
        let ds = Dataset::new("ds")
            .with_stride(stride("S1", "1", "walking"))
            .with_stride(stride("S2", "1", "running"))
            .with_stride(stride("S1", "2", "walking"));

        assert_eq!(ds.len(), 3);
        assert_eq!(ds.tasks().len(), 2);
        assert_eq!(ds.subjects().len(), 2);
        assert_eq!(ds.strides_for_task("walking").count(), 2);

        let keep: HashSet<StrideId> = [ds.strides[2].id.clone()].into_iter().collect();
        let filtered = ds.retain_ids(&keep);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.strides[0].id.cycle_id, "2");
    }
}
