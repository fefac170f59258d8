//! Gait phase sampling.

use serde::{Deserialize, Serialize};

/// Number of phase samples in every normalized stride.
pub const PHASE_POINTS: usize = 150;

/// Spacing between consecutive phase samples, in percent.
pub const PHASE_STEP: f64 = 100.0 / (PHASE_POINTS - 1) as f64;

/// The canonical checkpoints used by representative validation.
pub const REPRESENTATIVE_PHASES: [u8; 4] = [0, 25, 50, 75];

/// Phase percent of the sample at `index`.
pub fn phase_percent(index: usize) -> f64 {
    index as f64 * 100.0 / (PHASE_POINTS - 1) as f64
}

/// Sample index closest to a phase percent. Values outside [0, 100] are clamped.
pub fn phase_index(percent: f64) -> usize {
    let clamped = percent.clamp(0.0, 100.0);
    let index = (clamped * (PHASE_POINTS - 1) as f64 / 100.0).round() as usize;
    index.min(PHASE_POINTS - 1)
}

/// The 150-point phase grid from 0 to 100 percent.
pub fn standard_phase_grid() -> Vec<f64> {
    (0..PHASE_POINTS).map(phase_percent).collect()
}

/// Which phase points a validation run checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Only the representative phases 0/25/50/75
    #[default]
    Representative,
    /// All 150 phase points
    Full,
}

impl std::fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationMode::Representative => write!(f, "representative"),
            ValidationMode::Full => write!(f, "full"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_representative_indices() {
        let indices: Vec<usize> = REPRESENTATIVE_PHASES
            .iter()
            .map(|p| phase_index(*p as f64))
            .collect();
        assert_eq!(indices, vec![0, 37, 75, 112]);
    }

    #[test]
    fn test_grid_spans_full_cycle() {
        let grid = standard_phase_grid();
        assert_eq!(grid.len(), PHASE_POINTS);
        assert_eq!(grid[0], 0.0);
        assert!((grid[PHASE_POINTS - 1] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_phase_index_clamps() {
        assert_eq!(phase_index(-5.0), 0);
        assert_eq!(phase_index(250.0), PHASE_POINTS - 1);
    }
}
