//! Shared test data.

use gaitspec_core::{Dataset, PhaseRange, SpecKey, SpecVersion, Specification, Stride, StrideId};

pub const KNEE: &str = "knee_flexion_angle";

/// walking @ 50%: knee_flexion_angle in [0.10, 1.20] rad.
pub fn knee_spec() -> Specification {
    Specification::new(
        SpecVersion::INITIAL,
        vec![(
            SpecKey::new("walking", 50, KNEE),
            PhaseRange::new(0.10, 1.20).with_units("rad"),
        )],
        "knee at mid-stance",
    )
}

/// A walking stride with a constant knee angle.
pub fn stride(subject: &str, cycle: &str, knee: f64) -> Stride {
    Stride::new(StrideId::new(subject, "1", cycle, "walking")).with_constant(KNEE, knee)
}

/// One walking stride per value, cycles numbered from 1.
pub fn walking_dataset(knee_values: &[f64]) -> Dataset {
    knee_values
        .iter()
        .enumerate()
        .fold(Dataset::new("walking.parquet"), |ds, (i, &v)| {
            ds.with_stride(stride("S1", &(i + 1).to_string(), v))
        })
}

/// `total` compliant strides of which the first `violating` have 1.50 at 50%.
pub fn knee_dataset(total: usize, violating: usize) -> Dataset {
    let mut ds = walking_dataset(&vec![0.5; total]);
    for stride in ds.strides.iter_mut().take(violating) {
        stride.set_value(KNEE, 75, 1.50);
    }
    ds
}
