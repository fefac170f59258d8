//! Structural preconditions checked once before any range comparison.

use std::collections::HashSet;

use gaitspec_core::{Dataset, Stride, StructuralError, VariableName, Warning, PHASE_POINTS, PHASE_STEP};

use crate::config::ValidationConfig;

/// Verify that every stride can be range-checked.
///
/// Fails on the first problem: empty dataset, duplicate stride ids, wrong
/// point or sample counts, or a phase column that is out of [0, 100], not
/// strictly increasing, does not reach both ends, or has a gap wider than
/// one step plus the configured tolerance.
pub fn check_structure(dataset: &Dataset, config: &ValidationConfig) -> Result<(), StructuralError> {
    if dataset.is_empty() {
        return Err(StructuralError::EmptyDataset {
            dataset: dataset.name.clone(),
        });
    }

    let mut seen = HashSet::with_capacity(dataset.len());
    for stride in &dataset.strides {
        if !seen.insert(&stride.id) {
            return Err(StructuralError::DuplicateStride {
                dataset: dataset.name.clone(),
                stride: stride.id.to_string(),
            });
        }
        check_stride(&dataset.name, stride, config)?;
    }
    Ok(())
}

fn check_stride(dataset: &str, stride: &Stride, config: &ValidationConfig) -> Result<(), StructuralError> {
    if stride.phase.len() != PHASE_POINTS {
        return Err(StructuralError::PhasePointCount {
            dataset: dataset.to_string(),
            stride: stride.id.to_string(),
            expected: PHASE_POINTS,
            actual: stride.phase.len(),
        });
    }

    for (variable, samples) in &stride.variables {
        if samples.len() != PHASE_POINTS {
            return Err(StructuralError::VariableLength {
                dataset: dataset.to_string(),
                stride: stride.id.to_string(),
                variable: variable.clone(),
                expected: PHASE_POINTS,
                actual: samples.len(),
            });
        }
    }

    let progression = |index: usize, detail: String| StructuralError::PhaseProgression {
        dataset: dataset.to_string(),
        stride: stride.id.to_string(),
        index,
        detail,
    };

    let max_gap = PHASE_STEP + config.gap_tolerance;
    for (i, &p) in stride.phase.iter().enumerate() {
        if !p.is_finite() || !(0.0..=100.0).contains(&p) {
            return Err(progression(i, format!("phase {} outside [0, 100]", p)));
        }
        if i > 0 {
            let prev = stride.phase[i - 1];
            if p <= prev {
                return Err(progression(i, format!("phase {} does not increase after {}", p, prev)));
            }
            if p - prev > max_gap {
                return Err(progression(
                    i,
                    format!("gap of {:.3} exceeds {:.3}", p - prev, max_gap),
                ));
            }
        }
    }

    let first = stride.phase[0];
    if first > config.endpoint_tolerance {
        return Err(progression(0, format!("starts at {} instead of 0", first)));
    }
    let last = stride.phase[PHASE_POINTS - 1];
    if last < 100.0 - config.endpoint_tolerance {
        return Err(progression(
            PHASE_POINTS - 1,
            format!("ends at {} instead of 100", last),
        ));
    }
    Ok(())
}

/// Naming-convention warnings for every variable in the dataset.
pub fn naming_warnings(dataset: &Dataset) -> Vec<Warning> {
    dataset
        .variables()
        .into_iter()
        .filter_map(|variable| {
            VariableName::diagnose(&variable)
                .map(|reason| Warning::NonStandardVariableName { variable, reason })
        })
        .collect()
}
