//! Biomechanical variable naming convention.
//!
//! Standard names read `<joint>_<motion>_<measure>[_<side>][_<unit>]`, all
//! lowercase snake case except for the unit suffix, e.g.
//! `knee_flexion_angle_ipsi_rad` or `ankle_dorsiflexion_moment_contra_Nm_kg`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Unit suffixes in match order (longest first so `rad_s` wins over `rad`).
const UNIT_SUFFIXES: &[(&str, &str)] = &[
    ("_rad_s", "rad/s"),
    ("_Nm_kg", "Nm/kg"),
    ("_W_kg", "W/kg"),
    ("_rad", "rad"),
    ("_deg", "deg"),
    ("_BW", "BW"),
    ("_Nm", "Nm"),
    ("_N", "N"),
    ("_mm", "mm"),
    ("_m", "m"),
];

fn convention() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<base>[a-z][a-z0-9]*(?:_[a-z0-9]+)*?)(?:_(?P<side>ipsi|contra))?(?:_(?P<unit>rad_s|Nm_kg|W_kg|rad|deg|BW|Nm|N|mm|m))?$",
        )
        .ok()
    })
    .as_ref()
}

/// A variable name split into its conventional parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableName {
    /// Joint, motion and measure, e.g. `knee_flexion_angle`
    pub base: String,

    /// `ipsi` or `contra` when present
    pub side: Option<String>,

    /// Unit suffix as written, e.g. `Nm_kg`
    pub unit: Option<String>,
}

impl VariableName {
    /// Parse a name. Returns `None` when it does not follow the convention.
    pub fn parse(name: &str) -> Option<Self> {
        let caps = convention()?.captures(name)?;
        Some(Self {
            base: caps.name("base")?.as_str().to_string(),
            side: caps.name("side").map(|m| m.as_str().to_string()),
            unit: caps.name("unit").map(|m| m.as_str().to_string()),
        })
    }

    /// Why `name` is non-standard, or `None` if it is standard.
    pub fn diagnose(name: &str) -> Option<String> {
        if name.is_empty() {
            return Some("name is empty".to_string());
        }
        if name.contains(char::is_whitespace) {
            return Some("name contains whitespace".to_string());
        }
        if Self::parse(name).is_none() {
            return Some(
                "expected lowercase <joint>_<motion>_<measure>[_ipsi|_contra][_<unit>]".to_string(),
            );
        }
        None
    }
}

/// Units implied by a variable's suffix.
pub fn infer_units(name: &str) -> Option<&'static str> {
    UNIT_SUFFIXES
        .iter()
        .find(|(suffix, _)| name.ends_with(suffix))
        .map(|(_, units)| *units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_name() {
        let name = VariableName::parse("knee_flexion_angle_ipsi_rad").unwrap();
        assert_eq!(name.base, "knee_flexion_angle");
        assert_eq!(name.side.as_deref(), Some("ipsi"));
        assert_eq!(name.unit.as_deref(), Some("rad"));
    }

    #[test]
    fn test_parse_unit_with_underscore() {
        let name = VariableName::parse("ankle_dorsiflexion_moment_contra_Nm_kg").unwrap();
        assert_eq!(name.base, "ankle_dorsiflexion_moment");
        assert_eq!(name.unit.as_deref(), Some("Nm_kg"));
    }

    #[test]
    fn test_bare_name_is_standard() {
        assert!(VariableName::diagnose("knee_flexion_angle").is_none());
    }

    #[test]
    fn test_non_standard_names() {
        assert!(VariableName::diagnose("KneeFlexion").is_some());
        assert!(VariableName::diagnose("knee flexion").is_some());
        assert!(VariableName::diagnose("").is_some());
    }

    #[test]
    fn test_infer_units() {
        assert_eq!(infer_units("hip_flexion_velocity_ipsi_rad_s"), Some("rad/s"));
        assert_eq!(infer_units("knee_flexion_angle_ipsi_rad"), Some("rad"));
        assert_eq!(infer_units("vertical_grf_ipsi_BW"), Some("BW"));
        assert_eq!(infer_units("knee_flexion_angle"), None);
    }
}
