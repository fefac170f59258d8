//! Specification model - validation ranges keyed by (task, phase, variable).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::id::SpecVersion;
use crate::phase::{phase_index, phase_percent, ValidationMode, PHASE_POINTS, REPRESENTATIVE_PHASES};
use crate::Time;

/// Key of one specification range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpecKey {
    /// Locomotion task
    pub task: String,

    /// Phase percent (0-99)
    pub phase: u8,

    /// Variable name
    pub variable: String,
}

impl SpecKey {
    /// Create a key.
    pub fn new(task: impl Into<String>, phase: u8, variable: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            phase,
            variable: variable.into(),
        }
    }
}

impl std::fmt::Display for SpecKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}%:{}", self.task, self.phase, self.variable)
    }
}

/// Acceptable values for one (task, phase, variable), with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRange {
    /// Lower bound (inclusive)
    pub min: f64,

    /// Upper bound (inclusive)
    pub max: f64,

    /// Lower end of the typical range
    pub typical_min: Option<f64>,

    /// Upper end of the typical range
    pub typical_max: Option<f64>,

    /// Units, e.g. `rad`
    pub units: String,

    /// Literature citation or derivation note
    pub source_citation: Option<String>,

    /// Confidence in the range (0-1)
    pub confidence: f64,

    /// When the range was last changed
    pub last_updated: Time,
}

impl PhaseRange {
    /// Create a range with full confidence and no provenance.
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            typical_min: None,
            typical_max: None,
            units: String::new(),
            source_citation: None,
            confidence: 1.0,
            last_updated: chrono::Utc::now(),
        }
    }

    /// Set the typical range.
    pub fn with_typical(mut self, min: f64, max: f64) -> Self {
        self.typical_min = Some(min);
        self.typical_max = Some(max);
        self
    }

    /// Set units.
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    /// Set the citation.
    pub fn with_citation(mut self, citation: impl Into<String>) -> Self {
        self.source_citation = Some(citation.into());
        self
    }

    /// Set confidence.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Bounds only.
    pub fn allowed(&self) -> AllowedRange {
        AllowedRange {
            min: self.min,
            max: self.max,
        }
    }
}

/// Bare [min, max] bounds used for comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllowedRange {
    /// Lower bound (inclusive)
    pub min: f64,
    /// Upper bound (inclusive)
    pub max: f64,
}

impl AllowedRange {
    /// Create bounds.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies within the bounds. NaN never does.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Width of the range.
    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

impl std::fmt::Display for AllowedRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.2},{:.2}]", self.min, self.max)
    }
}

/// One staged edit: set or remove the range at a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeEdit {
    /// Target key
    pub key: SpecKey,

    /// New range, or `None` to remove the key
    pub range: Option<PhaseRange>,
}

impl RangeEdit {
    /// Set the range at `key`.
    pub fn set(key: SpecKey, range: PhaseRange) -> Self {
        Self { key, range: Some(range) }
    }

    /// Remove the range at `key`.
    pub fn remove(key: SpecKey) -> Self {
        Self { key, range: None }
    }
}

/// A point a validation run checks, with the range that applies there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckPoint {
    /// Sample index (0-149)
    pub index: usize,

    /// Phase percent reported for this point
    pub phase: f64,

    /// Applicable bounds
    pub range: AllowedRange,

    /// Whether the bounds were interpolated between specified phases
    pub interpolated: bool,
}

/// Check points of one (task, variable) for a validation mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeProfile {
    /// Task
    pub task: String,

    /// Variable
    pub variable: String,

    /// Points to check, ordered by index
    pub points: Vec<CheckPoint>,
}

/// An immutable snapshot of every range at one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    /// Version number
    pub version: SpecVersion,

    /// Version this snapshot was derived from
    pub parent: Option<SpecVersion>,

    /// When the snapshot was created
    pub created_at: Time,

    /// Commit message / rationale
    pub message: String,

    /// True for uncommitted previews
    #[serde(default)]
    pub provisional: bool,

    #[serde(with = "entries")]
    ranges: BTreeMap<SpecKey, PhaseRange>,
}

impl Specification {
    /// Create a snapshot from ranges.
    pub fn new(
        version: SpecVersion,
        ranges: impl IntoIterator<Item = (SpecKey, PhaseRange)>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            version,
            parent: None,
            created_at: chrono::Utc::now(),
            message: message.into(),
            provisional: false,
            ranges: ranges.into_iter().collect(),
        }
    }

    /// An empty initial snapshot.
    pub fn empty() -> Self {
        Self::new(SpecVersion::INITIAL, Vec::new(), "empty specification")
    }

    /// A provisional child snapshot with `edits` applied on top of this one.
    pub fn derive(&self, edits: &[RangeEdit], message: impl Into<String>) -> Specification {
        let mut ranges = self.ranges.clone();
        for edit in edits {
            match &edit.range {
                Some(range) => {
                    ranges.insert(edit.key.clone(), range.clone());
                }
                None => {
                    ranges.remove(&edit.key);
                }
            }
        }
        Specification {
            version: self.version.next(),
            parent: Some(self.version),
            created_at: chrono::Utc::now(),
            message: message.into(),
            provisional: true,
            ranges,
        }
    }

    /// Range at an exact key.
    pub fn get(&self, task: &str, phase: u8, variable: &str) -> Option<&PhaseRange> {
        self.ranges.get(&SpecKey::new(task, phase, variable))
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether there are no ranges.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// All ranges in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&SpecKey, &PhaseRange)> {
        self.ranges.iter()
    }

    /// Tasks with at least one range.
    pub fn tasks(&self) -> BTreeSet<String> {
        self.ranges.keys().map(|k| k.task.clone()).collect()
    }

    /// Whether the task is in the catalog.
    pub fn has_task(&self, task: &str) -> bool {
        self.ranges.keys().any(|k| k.task == task)
    }

    /// Variables with ranges for a task.
    pub fn variables_for(&self, task: &str) -> BTreeSet<String> {
        self.ranges
            .keys()
            .filter(|k| k.task == task)
            .map(|k| k.variable.clone())
            .collect()
    }

    /// Specified phases of a (task, variable), ascending.
    pub fn phases_for(&self, task: &str, variable: &str) -> Vec<(u8, &PhaseRange)> {
        self.ranges
            .iter()
            .filter(|(k, _)| k.task == task && k.variable == variable)
            .map(|(k, r)| (k.phase, r))
            .collect()
    }

    /// Points to check for a (task, variable) under `mode`.
    ///
    /// Representative mode checks the representative phases that have an
    /// explicit range. Full mode checks all 150 points, interpolating bounds
    /// linearly between specified phases (wrapping around the cycle); with
    /// fewer than two specified phases it checks only the specified ones.
    pub fn profile(&self, task: &str, variable: &str, mode: ValidationMode) -> Option<RangeProfile> {
        let phases = self.phases_for(task, variable);
        if phases.is_empty() {
            return None;
        }

        let explicit = |(phase, range): &(u8, &PhaseRange)| CheckPoint {
            index: phase_index(*phase as f64),
            phase: *phase as f64,
            range: range.allowed(),
            interpolated: false,
        };

        let points = match mode {
            ValidationMode::Representative => phases
                .iter()
                .filter(|(p, _)| REPRESENTATIVE_PHASES.contains(p))
                .map(explicit)
                .collect(),
            ValidationMode::Full if phases.len() < 2 => phases.iter().map(explicit).collect(),
            ValidationMode::Full => (0..PHASE_POINTS)
                .map(|index| {
                    match phases.iter().find(|(p, _)| phase_index(*p as f64) == index) {
                        Some(hit) => explicit(hit),
                        None => {
                            let phase = phase_percent(index);
                            CheckPoint {
                                index,
                                phase,
                                range: interpolate(&phases, phase),
                                interpolated: true,
                            }
                        }
                    }
                })
                .collect(),
        };

        Some(RangeProfile {
            task: task.to_string(),
            variable: variable.to_string(),
            points,
        })
    }
}

/// Linear interpolation of bounds at `phase`, wrapping cyclically. Needs at
/// least two phases.
fn interpolate(phases: &[(u8, &PhaseRange)], phase: f64) -> AllowedRange {
    let n = phases.len();
    let (lo_phase, lo, hi_phase, hi) = match phases.iter().position(|(p, _)| *p as f64 > phase) {
        Some(0) => (
            phases[n - 1].0 as f64 - 100.0,
            phases[n - 1].1,
            phases[0].0 as f64,
            phases[0].1,
        ),
        Some(k) => (
            phases[k - 1].0 as f64,
            phases[k - 1].1,
            phases[k].0 as f64,
            phases[k].1,
        ),
        None => (
            phases[n - 1].0 as f64,
            phases[n - 1].1,
            phases[0].0 as f64 + 100.0,
            phases[0].1,
        ),
    };
    let t = (phase - lo_phase) / (hi_phase - lo_phase);
    AllowedRange {
        min: lo.min + t * (hi.min - lo.min),
        max: lo.max + t * (hi.max - lo.max),
    }
}

/// Ranges serialize as a list because JSON maps need string keys.
mod entries {
    use super::{PhaseRange, SpecKey};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct EntryRef<'a> {
        key: &'a SpecKey,
        range: &'a PhaseRange,
    }

    #[derive(Deserialize)]
    struct Entry {
        key: SpecKey,
        range: PhaseRange,
    }

    pub fn serialize<S: Serializer>(
        ranges: &BTreeMap<SpecKey, PhaseRange>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let entries: Vec<EntryRef<'_>> = ranges
            .iter()
            .map(|(key, range)| EntryRef { key, range })
            .collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<SpecKey, PhaseRange>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries.into_iter().map(|e| (e.key, e.range)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walking_spec() -> Specification {
        Specification::new(
            SpecVersion::INITIAL,
            vec![
                (SpecKey::new("walking", 0, "knee"), PhaseRange::new(0.0, 0.4)),
                (SpecKey::new("walking", 50, "knee"), PhaseRange::new(0.2, 1.2)),
                (SpecKey::new("walking", 50, "hip"), PhaseRange::new(-0.3, 0.3)),
            ],
            "seed",
        )
    }

    #[test]
    fn test_lookup_and_catalog() {
        let spec = walking_spec();
        assert_eq!(spec.get("walking", 50, "knee").unwrap().max, 1.2);
        assert!(spec.get("walking", 25, "knee").is_none());
        assert!(spec.has_task("walking"));
        assert!(!spec.has_task("running"));
        assert_eq!(spec.variables_for("walking").len(), 2);
        assert_eq!(spec.phases_for("walking", "knee").len(), 2);
    }

    #[test]
    fn test_representative_profile_uses_explicit_phases() {
        let spec = walking_spec();
        let profile = spec.profile("walking", "knee", ValidationMode::Representative).unwrap();
        let indices: Vec<usize> = profile.points.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 75]);
        assert!(profile.points.iter().all(|p| !p.interpolated));
    }

    #[test]
    fn test_full_profile_interpolates_and_wraps() {
        let spec = walking_spec();
        let profile = spec.profile("walking", "knee", ValidationMode::Full).unwrap();
        assert_eq!(profile.points.len(), PHASE_POINTS);

        let at_50 = profile.points[75];
        assert!(!at_50.interpolated);
        assert_eq!(at_50.range, AllowedRange::new(0.2, 1.2));

        // Halfway between 0% and 50%
        let mid = profile.points[37];
        assert!(mid.interpolated);
        let t = mid.phase / 50.0;
        assert!((mid.range.max - (0.4 + t * 0.8)).abs() < 1e-9);

        // Past 50% the bounds head back toward the 0% range at 100%
        let last = profile.points[PHASE_POINTS - 1];
        assert!((last.range.min - 0.0).abs() < 1e-9);
        assert!((last.range.max - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_full_profile_single_phase_checks_only_that_phase() {
        let spec = walking_spec();
        let profile = spec.profile("walking", "hip", ValidationMode::Full).unwrap();
        assert_eq!(profile.points.len(), 1);
        assert_eq!(profile.points[0].index, 75);
    }

    #[test]
    fn test_derive_applies_edits_without_touching_parent() {
        let spec = walking_spec();
        let child = spec.derive(
            &[
                RangeEdit::set(SpecKey::new("walking", 50, "knee"), PhaseRange::new(0.1, 1.3)),
                RangeEdit::remove(SpecKey::new("walking", 50, "hip")),
            ],
            "widen knee",
        );
        assert_eq!(child.version, SpecVersion(2));
        assert_eq!(child.parent, Some(SpecVersion::INITIAL));
        assert!(child.provisional);
        assert_eq!(child.get("walking", 50, "knee").unwrap().max, 1.3);
        assert!(child.get("walking", 50, "hip").is_none());
        assert_eq!(spec.get("walking", 50, "knee").unwrap().max, 1.2);
    }

    #[test]
    fn test_serialization_keeps_ranges() {
        let spec = walking_spec();
        let json = serde_json::to_string(&spec).unwrap();
        let back: Specification = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_allowed_range_rejects_nan() {
        let range = AllowedRange::new(0.1, 1.2);
        assert!(range.contains(0.1));
        assert!(range.contains(1.2));
        assert!(!range.contains(1.5));
        assert!(!range.contains(f64::NAN));
        assert_eq!(range.to_string(), "[0.10,1.20]");
    }
}
