//! Absolute physiological plausibility limits.
//!
//! Tuned ranges are always clamped into these limits, so a statistical
//! estimate can never widen a range past what a human joint can do.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::naming::infer_units;

/// Hard limits for one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteBound {
    /// Lowest plausible value
    pub min: f64,

    /// Highest plausible value
    pub max: f64,

    /// Units the limits are expressed in
    pub units: String,
}

impl AbsoluteBound {
    /// Create a bound.
    pub fn new(min: f64, max: f64, units: impl Into<String>) -> Self {
        Self {
            min,
            max,
            units: units.into(),
        }
    }

    /// The same limits expressed in `units`, when a conversion exists.
    pub fn in_units(&self, units: &str) -> Option<AbsoluteBound> {
        let scale = match (self.units.as_str(), units) {
            (from, to) if from == to => 1.0,
            ("rad", "deg") | ("rad/s", "deg/s") => 180.0 / std::f64::consts::PI,
            ("deg", "rad") | ("deg/s", "rad/s") => std::f64::consts::PI / 180.0,
            _ => return None,
        };
        Some(AbsoluteBound::new(self.min * scale, self.max * scale, units))
    }

    /// Clamp `[min, max]` into this bound.
    pub fn clamp(&self, min: f64, max: f64) -> (f64, f64) {
        (min.clamp(self.min, self.max), max.clamp(self.min, self.max))
    }
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: Regex,
    bound: AbsoluteBound,
}

/// Ordered pattern rules; the first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct PlausibilityBounds {
    rules: Vec<Rule>,
}

// Named variables first, unit-suffix fallbacks last. Named rules are written
// in the normalized units; a suffixed variable in other units either gets a
// converted bound or falls through to its unit rule.
const STANDARD_RULES: &[(&str, f64, f64, &str)] = &[
    (r"^hip_flexion_angle", -0.70, 2.10, "rad"),
    (r"^knee_flexion_angle", -0.35, 2.70, "rad"),
    (r"^ankle_dorsiflexion_angle", -1.05, 0.80, "rad"),
    (r"^(pelvis|trunk)_\w*angle", -1.00, 1.00, "rad"),
    (r"_moment", -4.0, 4.0, "Nm/kg"),
    (r"^vertical_grf", -0.1, 6.0, "BW"),
    (r"_grf", -2.0, 2.0, "BW"),
    (r"_power", -20.0, 20.0, "W/kg"),
    (r"_rad_s$", -30.0, 30.0, "rad/s"),
    (r"_rad$", -std::f64::consts::PI, std::f64::consts::PI, "rad"),
    (r"_deg$", -180.0, 180.0, "deg"),
    (r"_Nm_kg$", -5.0, 5.0, "Nm/kg"),
    (r"_W_kg$", -25.0, 25.0, "W/kg"),
    (r"_BW$", -2.0, 6.0, "BW"),
    (r"_Nm$", -1000.0, 1000.0, "Nm"),
    (r"_N$", -5000.0, 10000.0, "N"),
];

impl PlausibilityBounds {
    /// No rules at all; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in human limits for common gait variables.
    pub fn standard() -> Self {
        let rules = STANDARD_RULES
            .iter()
            .filter_map(|(pattern, min, max, units)| match Regex::new(pattern) {
                Ok(pattern) => Some(Rule {
                    pattern,
                    bound: AbsoluteBound::new(*min, *max, *units),
                }),
                Err(e) => {
                    tracing::warn!("Dropping plausibility rule {}: {}", pattern, e);
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// Add a rule ahead of the existing ones.
    pub fn with_rule(
        mut self,
        pattern: &str,
        min: f64,
        max: f64,
        units: &str,
    ) -> Result<Self, regex::Error> {
        let rule = Rule {
            pattern: Regex::new(pattern)?,
            bound: AbsoluteBound::new(min, max, units),
        };
        self.rules.insert(0, rule);
        Ok(self)
    }

    /// Bound for a variable in the variable's own units.
    ///
    /// A variable with a unit suffix only takes a rule whose units match or
    /// convert to that suffix; unsuffixed names take the first matching rule.
    pub fn bound_for(&self, variable: &str) -> Option<AbsoluteBound> {
        let units = infer_units(variable);
        self.rules
            .iter()
            .filter(|rule| rule.pattern.is_match(variable))
            .find_map(|rule| match units {
                Some(units) => rule.bound.in_units(units),
                None => Some(rule.bound.clone()),
            })
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
