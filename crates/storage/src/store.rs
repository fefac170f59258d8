//! Versioned specification store.
//!
//! Committed versions form an append-only history of immutable
//! `Arc<Specification>` snapshots; the last one is the live head. Readers pin
//! a snapshot and are never affected by later commits. Edits go through a
//! staged [`ProposedChange`]: stage, check integrity, optionally attach an
//! impact preview, then commit against the version it was staged on.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use gaitspec_core::{ChangeId, PhaseRange, RangeEdit, SpecKey, SpecVersion, Specification, Time};
use serde::{Deserialize, Serialize};

use crate::change::{check_integrity, ChangeStatus, ImpactReport, IntegrityResult, ProposedChange};

/// Errors raised by the specification store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpecError {
    /// The change failed its integrity check
    #[error("change {change} failed integrity checks: {}", .issues.join("; "))]
    Integrity {
        /// Change ID
        change: ChangeId,
        /// Error messages
        issues: Vec<String>,
    },

    /// The live version moved since the change was staged
    #[error("version conflict: change was staged on {expected} but live version is {actual}; rebase and retry")]
    Conflict {
        /// Version the change was staged on
        expected: SpecVersion,
        /// Current live version
        actual: SpecVersion,
    },

    /// No change with this ID
    #[error("change not found: {0}")]
    ChangeNotFound(ChangeId),

    /// No version with this number
    #[error("version not found: {0}")]
    VersionNotFound(SpecVersion),

    /// The change is in the wrong state for the operation
    #[error("cannot {operation} change {change}: it is {status}")]
    InvalidState {
        /// Change ID
        change: ChangeId,
        /// Current status
        status: String,
        /// Attempted operation
        operation: &'static str,
    },

    /// An impact preview was computed against another base version
    #[error("impact preview for change {change} was computed on {actual}, change is based on {expected}")]
    StaleImpact {
        /// Change ID
        change: ChangeId,
        /// Change base version
        expected: SpecVersion,
        /// Preview base version
        actual: SpecVersion,
    },

    /// Commit requires an impact preview and none is attached
    #[error("change {0} has no impact preview")]
    MissingImpact(ChangeId),

    /// A seeded or loaded version holds malformed ranges
    #[error("version {version} failed integrity checks: {}", .issues.join("; "))]
    CorruptVersion {
        /// Offending version
        version: SpecVersion,
        /// Error messages
        issues: Vec<String>,
    },

    /// A history handed to the store is unusable
    #[error("invalid history: {0}")]
    InvalidHistory(String),
}

/// Result alias for store operations
pub type Result<T> = std::result::Result<T, SpecError>;

/// Store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Tasks every committed version must cover
    pub required_tasks: Vec<String>,

    /// Refuse commits without an attached impact preview
    #[serde(default)]
    pub require_impact: bool,
}

impl StoreConfig {
    /// Add a required task.
    pub fn with_required_task(mut self, task: impl Into<String>) -> Self {
        self.required_tasks.push(task.into());
        self
    }

    /// Require an impact preview before commit.
    pub fn with_require_impact(mut self, require: bool) -> Self {
        self.require_impact = require;
        self
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    /// Committed change
    pub change: ChangeId,

    /// New live version
    pub version: SpecVersion,

    /// Previous live version
    pub parent: SpecVersion,

    /// Number of edits applied
    pub edits_applied: usize,
}

/// History entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Version
    pub version: SpecVersion,

    /// Parent version
    pub parent: Option<SpecVersion>,

    /// Creation time
    pub created_at: Time,

    /// Commit message
    pub message: String,

    /// Number of ranges in the snapshot
    pub range_count: usize,
}

#[derive(Debug)]
struct StoreState {
    versions: Vec<Arc<Specification>>,
    changes: BTreeMap<ChangeId, ProposedChange>,
}

impl StoreState {
    fn head(&self) -> &Arc<Specification> {
        // Never empty: constructors always seed one version.
        &self.versions[self.versions.len() - 1]
    }

    fn version(&self, version: SpecVersion) -> Option<&Arc<Specification>> {
        self.versions.iter().find(|s| s.version == version)
    }

    fn change(&self, id: ChangeId) -> Result<&ProposedChange> {
        self.changes.get(&id).ok_or(SpecError::ChangeNotFound(id))
    }

    fn change_mut(&mut self, id: ChangeId) -> Result<&mut ProposedChange> {
        self.changes.get_mut(&id).ok_or(SpecError::ChangeNotFound(id))
    }
}

/// Single-writer, many-reader specification store.
#[derive(Debug)]
pub struct SpecificationStore {
    config: StoreConfig,
    state: RwLock<StoreState>,
}

impl SpecificationStore {
    /// Create a store whose first version is `initial`.
    ///
    /// Every range of `initial` must pass the per-range integrity checks.
    pub fn new(initial: Specification) -> Result<Self> {
        check_version(&initial)?;
        let mut initial = initial;
        initial.provisional = false;
        Ok(Self {
            config: StoreConfig::default(),
            state: RwLock::new(StoreState {
                versions: vec![Arc::new(initial)],
                changes: BTreeMap::new(),
            }),
        })
    }

    /// Rebuild a store from persisted versions (any order).
    pub fn from_history(versions: Vec<Specification>) -> Result<Self> {
        let mut versions = versions;
        versions.sort_by_key(|s| s.version);
        if versions.is_empty() {
            return Err(SpecError::InvalidHistory("no versions".to_string()));
        }
        if let Some(pair) = versions.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(SpecError::InvalidHistory(format!(
                "version {} appears twice",
                pair[0].version
            )));
        }
        for version in &versions {
            check_version(version)?;
        }
        let versions = versions
            .into_iter()
            .map(|mut s| {
                s.provisional = false;
                Arc::new(s)
            })
            .collect();
        Ok(Self {
            config: StoreConfig::default(),
            state: RwLock::new(StoreState {
                versions,
                changes: BTreeMap::new(),
            }),
        })
    }

    /// Set configuration.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // === Reads ===

    /// Live version number.
    pub fn live_version(&self) -> SpecVersion {
        self.read().head().version
    }

    /// Pin the live head.
    pub fn snapshot(&self) -> Arc<Specification> {
        Arc::clone(self.read().head())
    }

    /// Pin a specific committed version.
    pub fn snapshot_at(&self, version: SpecVersion) -> Result<Arc<Specification>> {
        self.read()
            .version(version)
            .cloned()
            .ok_or(SpecError::VersionNotFound(version))
    }

    /// Range at an exact key on the live head.
    pub fn get_range(&self, task: &str, phase: u8, variable: &str) -> Option<PhaseRange> {
        self.read().head().get(task, phase, variable).cloned()
    }

    /// Committed versions, oldest first.
    pub fn history(&self) -> Vec<VersionInfo> {
        self.read()
            .versions
            .iter()
            .map(|s| VersionInfo {
                version: s.version,
                parent: s.parent,
                created_at: s.created_at,
                message: s.message.clone(),
                range_count: s.len(),
            })
            .collect()
    }

    /// Uncommitted candidate: the live head with `edits` applied.
    pub fn preview(&self, edits: &[RangeEdit]) -> Specification {
        self.snapshot().derive(edits, "preview")
    }

    // === Staging ===

    /// Stage new ranges for one (task, variable), keyed by phase.
    pub fn stage_change(
        &self,
        task: &str,
        variable: &str,
        ranges_by_phase: impl IntoIterator<Item = (u8, PhaseRange)>,
        rationale: impl Into<String>,
    ) -> ProposedChange {
        let edits = ranges_by_phase
            .into_iter()
            .map(|(phase, range)| RangeEdit::set(SpecKey::new(task, phase, variable), range))
            .collect();
        self.stage_edits(edits, rationale)
    }

    /// Stage arbitrary edits against the live head.
    pub fn stage_edits(&self, edits: Vec<RangeEdit>, rationale: impl Into<String>) -> ProposedChange {
        let mut state = self.write();
        let change = ProposedChange::draft(state.head().version, edits, rationale);
        tracing::debug!(
            "Staged change {} with {} edits on {}",
            change.id,
            change.edits.len(),
            change.base_version
        );
        state.changes.insert(change.id, change.clone());
        change
    }

    /// A staged change.
    pub fn change(&self, id: ChangeId) -> Result<ProposedChange> {
        self.read().change(id).cloned()
    }

    /// Changes still draft or validated.
    pub fn pending_changes(&self) -> Vec<ProposedChange> {
        self.read()
            .changes
            .values()
            .filter(|c| c.status.is_pending())
            .cloned()
            .collect()
    }

    /// The change's base version with its edits applied.
    pub fn candidate(&self, id: ChangeId) -> Result<Specification> {
        let state = self.read();
        let change = state.change(id)?;
        let base = state
            .version(change.base_version)
            .ok_or(SpecError::VersionNotFound(change.base_version))?;
        Ok(base.derive(&change.edits, change.rationale.clone()))
    }

    /// Run integrity checks. Draft becomes Validated on success and Rejected on failure.
    pub fn validate_integrity(&self, id: ChangeId) -> Result<IntegrityResult> {
        let mut state = self.write();
        let change = state.change(id)?;
        if change.status != ChangeStatus::Draft && change.status != ChangeStatus::Validated {
            return Err(SpecError::InvalidState {
                change: id,
                status: change.status.to_string(),
                operation: "validate",
            });
        }
        let base = state
            .version(change.base_version)
            .ok_or(SpecError::VersionNotFound(change.base_version))?;
        let candidate = base.derive(&change.edits, change.rationale.clone());
        let result = check_integrity(base, &candidate, &change.edits, &self.config.required_tasks);

        let change = state.change_mut(id)?;
        change.status = if result.passed() {
            ChangeStatus::Validated
        } else {
            let reason = result.error_messages().join("; ");
            tracing::warn!("Change {} rejected by integrity check: {}", id, reason);
            ChangeStatus::Rejected { reason }
        };
        change.integrity = Some(result.clone());
        Ok(result)
    }

    /// Attach an impact preview computed on the change's base version.
    pub fn attach_impact(&self, id: ChangeId, impact: ImpactReport) -> Result<()> {
        let mut state = self.write();
        let change = state.change_mut(id)?;
        if !change.status.is_pending() {
            return Err(SpecError::InvalidState {
                change: id,
                status: change.status.to_string(),
                operation: "attach impact to",
            });
        }
        if impact.base_version != change.base_version {
            return Err(SpecError::StaleImpact {
                change: id,
                expected: change.base_version,
                actual: impact.base_version,
            });
        }
        change.impact = Some(impact);
        Ok(())
    }

    /// Commit a validated change as the new live version.
    ///
    /// Fails with [`SpecError::Conflict`] if the live version moved since the
    /// change was staged.
    pub fn commit(&self, id: ChangeId) -> Result<CommitResult> {
        let mut state = self.write();
        let change = state.change(id)?;
        match &change.status {
            ChangeStatus::Validated => {}
            ChangeStatus::Draft => {
                return Err(SpecError::Integrity {
                    change: id,
                    issues: vec!["integrity has not been validated".to_string()],
                })
            }
            other => {
                return Err(SpecError::InvalidState {
                    change: id,
                    status: other.to_string(),
                    operation: "commit",
                })
            }
        }
        if self.config.require_impact && change.impact.is_none() {
            return Err(SpecError::MissingImpact(id));
        }

        let head = Arc::clone(state.head());
        if head.version != change.base_version {
            tracing::warn!(
                "Commit of {} conflicts: staged on {}, live is {}",
                id,
                change.base_version,
                head.version
            );
            return Err(SpecError::Conflict {
                expected: change.base_version,
                actual: head.version,
            });
        }

        let mut next = head.derive(&change.edits, change.rationale.clone());
        next.provisional = false;
        let version = next.version;
        let edits_applied = change.edits.len();
        state.versions.push(Arc::new(next));
        state.change_mut(id)?.status = ChangeStatus::Committed { version };

        tracing::info!("Committed change {} as {} ({} edits)", id, version, edits_applied);
        Ok(CommitResult {
            change: id,
            version,
            parent: head.version,
            edits_applied,
        })
    }

    /// Reject an open change.
    pub fn reject(&self, id: ChangeId, reason: impl Into<String>) -> Result<()> {
        let mut state = self.write();
        let change = state.change_mut(id)?;
        if !change.status.is_pending() {
            return Err(SpecError::InvalidState {
                change: id,
                status: change.status.to_string(),
                operation: "reject",
            });
        }
        change.status = ChangeStatus::Rejected {
            reason: reason.into(),
        };
        Ok(())
    }

    /// Re-stage a change's edits as a fresh draft on the live head.
    ///
    /// The old change is rejected as superseded.
    pub fn rebase(&self, id: ChangeId) -> Result<ProposedChange> {
        let mut state = self.write();
        let old = state.change(id)?;
        if !old.status.is_pending() {
            return Err(SpecError::InvalidState {
                change: id,
                status: old.status.to_string(),
                operation: "rebase",
            });
        }
        let fresh = ProposedChange::draft(state.head().version, old.edits.clone(), old.rationale.clone());
        tracing::debug!("Rebased change {} onto {} as {}", id, fresh.base_version, fresh.id);

        state.change_mut(id)?.status = ChangeStatus::Rejected {
            reason: format!("superseded by {}", fresh.id),
        };
        state.changes.insert(fresh.id, fresh.clone());
        Ok(fresh)
    }

    /// Restore a prior version as a new live head. History is kept.
    pub fn rollback(&self, version: SpecVersion) -> Result<SpecVersion> {
        let mut state = self.write();
        let target = state
            .version(version)
            .cloned()
            .ok_or(SpecError::VersionNotFound(version))?;
        let head = state.head().version;

        let mut restored = (*target).clone();
        restored.version = head.next();
        restored.parent = Some(head);
        restored.created_at = chrono::Utc::now();
        restored.message = format!("rollback to {}", version);
        restored.provisional = false;

        let new_version = restored.version;
        state.versions.push(Arc::new(restored));
        tracing::info!("Rolled back to {} as {}", version, new_version);
        Ok(new_version)
    }

    // === Exchange ===

    /// Copy of a change for export.
    pub fn export_change(&self, id: ChangeId) -> Result<ProposedChange> {
        self.change(id)
    }

    /// Import a change as a draft. Integrity must be re-checked here.
    pub fn import_change(&self, change: ProposedChange) -> ChangeId {
        let mut change = change;
        change.status = ChangeStatus::Draft;
        change.integrity = None;
        let mut state = self.write();
        if state.changes.contains_key(&change.id) {
            change.id = ChangeId::new();
        }
        let id = change.id;
        state.changes.insert(id, change);
        id
    }

    /// All committed snapshots, oldest first.
    pub fn versions(&self) -> Vec<Arc<Specification>> {
        self.read().versions.clone()
    }

    /// Forget committed and rejected changes. Returns how many were dropped.
    pub fn prune_closed(&self) -> usize {
        let mut state = self.write();
        let before = state.changes.len();
        state.changes.retain(|_, change| change.status.is_pending());
        let pruned = before - state.changes.len();
        if pruned > 0 {
            tracing::debug!("Pruned {} closed changes", pruned);
        }
        pruned
    }
}

/// Per-range integrity of a whole version, as if every range were an edit.
fn check_version(spec: &Specification) -> Result<()> {
    if spec.is_empty() {
        return Ok(());
    }
    let edits: Vec<RangeEdit> = spec
        .iter()
        .map(|(key, range)| RangeEdit::set(key.clone(), range.clone()))
        .collect();
    let result = check_integrity(&Specification::empty(), spec, &edits, &[]);
    if result.passed() {
        return Ok(());
    }
    Err(SpecError::CorruptVersion {
        version: spec.version,
        issues: result.error_messages(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{DatasetImpact, IssueKind};

    fn knee(min: f64, max: f64) -> PhaseRange {
        PhaseRange::new(min, max).with_units("rad")
    }

    fn store() -> SpecificationStore {
        SpecificationStore::new(Specification::new(
            SpecVersion::INITIAL,
            vec![(SpecKey::new("walking", 50, "knee_flexion_angle"), knee(0.1, 1.2))],
            "seed",
        ))
        .unwrap()
    }

    fn staged(store: &SpecificationStore, max: f64) -> ProposedChange {
        store.stage_change(
            "walking",
            "knee_flexion_angle",
            vec![(50, knee(0.1, max))],
            "widen",
        )
    }

    #[test]
    fn test_staging_does_not_affect_live_reads() {
        let store = store();
        let change = staged(&store, 1.6);
        assert_eq!(change.status, ChangeStatus::Draft);
        assert_eq!(store.get_range("walking", 50, "knee_flexion_angle").unwrap().max, 1.2);
        assert_eq!(store.candidate(change.id).unwrap().get("walking", 50, "knee_flexion_angle").unwrap().max, 1.6);
        assert_eq!(store.pending_changes().len(), 1);
    }

    #[test]
    fn test_commit_requires_integrity() {
        let store = store();
        let change = staged(&store, 1.6);
        assert!(matches!(store.commit(change.id), Err(SpecError::Integrity { .. })));

        assert!(store.validate_integrity(change.id).unwrap().passed());
        let result = store.commit(change.id).unwrap();
        assert_eq!(result.version, SpecVersion(2));
        assert_eq!(result.parent, SpecVersion::INITIAL);
        assert_eq!(store.live_version(), SpecVersion(2));
        assert_eq!(store.get_range("walking", 50, "knee_flexion_angle").unwrap().max, 1.6);
        assert!(matches!(
            store.change(change.id).unwrap().status,
            ChangeStatus::Committed { .. }
        ));
    }

    #[test]
    fn test_failed_integrity_rejects() {
        let store = store();
        let change = staged(&store, 0.0);
        let result = store.validate_integrity(change.id).unwrap();
        assert!(!result.passed());
        assert_eq!(result.issues[0].kind, IssueKind::InvertedRange);
        assert!(matches!(
            store.change(change.id).unwrap().status,
            ChangeStatus::Rejected { .. }
        ));
        assert!(matches!(store.commit(change.id), Err(SpecError::InvalidState { .. })));
    }

    #[test]
    fn test_pinned_snapshot_survives_commit() {
        let store = store();
        let pinned = store.snapshot();
        let change = staged(&store, 1.6);
        store.validate_integrity(change.id).unwrap();
        store.commit(change.id).unwrap();
        assert_eq!(pinned.version, SpecVersion::INITIAL);
        assert_eq!(pinned.get("walking", 50, "knee_flexion_angle").unwrap().max, 1.2);
    }

    #[test]
    fn test_stale_commit_conflicts_then_rebase() {
        let store = store();
        let first = staged(&store, 1.4);
        let second = staged(&store, 1.6);
        store.validate_integrity(first.id).unwrap();
        store.validate_integrity(second.id).unwrap();
        store.commit(first.id).unwrap();

        match store.commit(second.id) {
            Err(SpecError::Conflict { expected, actual }) => {
                assert_eq!(expected, SpecVersion::INITIAL);
                assert_eq!(actual, SpecVersion(2));
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        let rebased = store.rebase(second.id).unwrap();
        assert_eq!(rebased.base_version, SpecVersion(2));
        store.validate_integrity(rebased.id).unwrap();
        assert_eq!(store.commit(rebased.id).unwrap().version, SpecVersion(3));
        assert!(matches!(
            store.change(second.id).unwrap().status,
            ChangeStatus::Rejected { .. }
        ));
    }

    #[test]
    fn test_concurrent_commits_single_winner() {
        let store = store();
        let changes: Vec<ProposedChange> = (0..8).map(|i| staged(&store, 1.3 + i as f64 * 0.1)).collect();
        for change in &changes {
            store.validate_integrity(change.id).unwrap();
        }

        let shared = &store;
        let results: Vec<Result<CommitResult>> = std::thread::scope(|scope| {
            let handles: Vec<_> = changes
                .iter()
                .map(|c| {
                    let id = c.id;
                    scope.spawn(move || shared.commit(id))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(SpecError::Conflict { .. })))
                .count(),
            7
        );
        assert_eq!(store.live_version(), SpecVersion(2));
    }

    #[test]
    fn test_malformed_seed_is_refused() {
        let inverted = Specification::new(
            SpecVersion::INITIAL,
            vec![(SpecKey::new("walking", 50, "knee_flexion_angle"), knee(1.2, 0.1))],
            "bad seed",
        );
        assert!(matches!(
            SpecificationStore::new(inverted.clone()),
            Err(SpecError::CorruptVersion { version: SpecVersion::INITIAL, .. })
        ));

        let good = store().snapshot().as_ref().clone();
        let mut later = inverted;
        later.version = SpecVersion(2);
        assert!(matches!(
            SpecificationStore::from_history(vec![good, later]),
            Err(SpecError::CorruptVersion { version: SpecVersion(2), .. })
        ));
        assert!(SpecificationStore::new(Specification::empty()).is_ok());
    }

    #[test]
    fn test_prune_closed_keeps_pending_changes() {
        let store = store();
        let committed = staged(&store, 1.6);
        store.validate_integrity(committed.id).unwrap();
        store.commit(committed.id).unwrap();
        let rejected = staged(&store, 1.7);
        store.reject(rejected.id, "not needed").unwrap();
        let open = staged(&store, 1.8);

        assert_eq!(store.prune_closed(), 2);
        assert!(matches!(store.change(committed.id), Err(SpecError::ChangeNotFound(_))));
        assert_eq!(store.change(open.id).unwrap().status, ChangeStatus::Draft);
        assert_eq!(store.pending_changes().len(), 1);
        assert_eq!(store.prune_closed(), 0);
    }

    #[test]
    fn test_rollback_appends_history() {
        let store = store();
        let change = staged(&store, 1.6);
        store.validate_integrity(change.id).unwrap();
        store.commit(change.id).unwrap();

        let restored = store.rollback(SpecVersion::INITIAL).unwrap();
        assert_eq!(restored, SpecVersion(3));
        assert_eq!(store.get_range("walking", 50, "knee_flexion_angle").unwrap().max, 1.2);

        let history = store.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].parent, Some(SpecVersion(2)));
        assert!(store.snapshot_at(SpecVersion(2)).is_ok());
        assert!(matches!(
            store.rollback(SpecVersion(9)),
            Err(SpecError::VersionNotFound(_))
        ));
    }

    #[test]
    fn test_impact_must_match_base() {
        let store = store().with_config(StoreConfig::default().with_require_impact(true));
        let change = staged(&store, 1.6);
        store.validate_integrity(change.id).unwrap();
        assert!(matches!(store.commit(change.id), Err(SpecError::MissingImpact(_))));

        let stale = ImpactReport::new(SpecVersion(7));
        assert!(matches!(
            store.attach_impact(change.id, stale),
            Err(SpecError::StaleImpact { .. })
        ));

        let mut impact = ImpactReport::new(SpecVersion::INITIAL);
        impact.datasets.push(DatasetImpact::default());
        store.attach_impact(change.id, impact).unwrap();
        assert!(store.commit(change.id).is_ok());
    }

    #[test]
    fn test_required_task_blocks_commit() {
        let store = store().with_config(StoreConfig::default().with_required_task("running"));
        let change = staged(&store, 1.6);
        assert!(!store.validate_integrity(change.id).unwrap().passed());
    }

    #[test]
    fn test_export_import_round_trip() {
        let source = store();
        let change = staged(&source, 1.6);
        source.validate_integrity(change.id).unwrap();
        let exported = source.export_change(change.id).unwrap();

        let target = store();
        let id = target.import_change(exported);
        let imported = target.change(id).unwrap();
        assert_eq!(imported.status, ChangeStatus::Draft);
        assert!(imported.integrity.is_none());
        target.validate_integrity(id).unwrap();
        assert!(target.commit(id).is_ok());
    }

    #[test]
    fn test_from_history_orders_versions() {
        let v1 = Specification::empty();
        let v2 = v1.derive(
            &[RangeEdit::set(SpecKey::new("walking", 0, "knee"), knee(0.0, 0.5))],
            "add knee",
        );
        let store = SpecificationStore::from_history(vec![v2, v1]).unwrap();
        assert_eq!(store.live_version(), SpecVersion(2));
        assert!(!store.snapshot().provisional);
        assert!(SpecificationStore::from_history(vec![]).is_err());
    }
}
