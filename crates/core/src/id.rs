//! Identifiers for gaitspec entities.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a staged specification change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangeId(Ulid);

impl ChangeId {
    /// Generate a new ChangeId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ChangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ChangeId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Monotonic number of a committed specification snapshot.
///
/// Versions are never reused: a rollback appends a new version that carries
/// the ranges of an older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpecVersion(pub u64);

impl SpecVersion {
    /// The first version of every store.
    pub const INITIAL: SpecVersion = SpecVersion(1);

    /// The version that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw version number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identity of one gait cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrideId {
    /// Subject identifier
    pub subject_id: String,

    /// Trial identifier
    pub trial_id: String,

    /// Cycle (step) identifier within the trial
    pub cycle_id: String,

    /// Locomotion task
    pub task: String,
}

impl StrideId {
    /// Create a stride identifier.
    pub fn new(
        subject_id: impl Into<String>,
        trial_id: impl Into<String>,
        cycle_id: impl Into<String>,
        task: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            trial_id: trial_id.into(),
            cycle_id: cycle_id.into(),
            task: task.into(),
        }
    }
}

impl std::fmt::Display for StrideId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.subject_id, self.trial_id, self.cycle_id, self.task
        )
    }
}
