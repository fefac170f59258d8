//! gaitspec core data models.
//!
//! This crate defines the data structures shared by the validation, tuning
//! and quality crates: strides and datasets, the versioned range
//! specification, per-stride verdicts and the structural error taxonomy.

#![warn(missing_docs)]

// Identities
mod id;

// Gait data
mod phase;
mod stride;
mod table;
mod naming;

// Specification and verdicts
mod spec;
mod verdict;
mod bounds;

mod error;

// Re-exports
pub use id::{ChangeId, SpecVersion, StrideId};

pub use phase::{
    phase_index, phase_percent, standard_phase_grid, ValidationMode, PHASE_POINTS, PHASE_STEP,
    REPRESENTATIVE_PHASES,
};
pub use stride::{Dataset, Stride};
pub use table::{Column, DatasetKind, SchemaConfig, Table};
pub use naming::{infer_units, VariableName};

pub use spec::{AllowedRange, CheckPoint, PhaseRange, RangeEdit, RangeProfile, SpecKey, Specification};
pub use verdict::{StrideVerdict, VerdictStatus, Violation, ViolationGroup, Warning};
pub use bounds::{AbsoluteBound, PlausibilityBounds};

pub use error::{ResourceError, StructuralError};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
