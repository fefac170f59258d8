//! Versioned specification storage for gaitspec.
//!
//! This crate owns every committed specification version and every staged
//! change, and provides a JSON file archive for persisting them.

#![warn(missing_docs)]

pub mod change;
pub mod store;
pub mod trait_;
pub mod json_storage;

pub use change::{
    check_integrity, ChangeStatus, DatasetImpact, ImpactReport, IntegrityIssue, IntegrityResult,
    IssueKind, IssueSeverity, ProposedChange,
};
pub use store::{CommitResult, SpecError, SpecificationStore, StoreConfig, VersionInfo};
pub use trait_::{Result, SpecArchive, StorageError};
pub use json_storage::JsonSpecArchive;
