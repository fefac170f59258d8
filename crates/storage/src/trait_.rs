//! Archive trait for persisting specification history.

use async_trait::async_trait;
use gaitspec_core::{ChangeId, SpecVersion, Specification};

use crate::change::ProposedChange;
use crate::store::{SpecError, SpecificationStore};

/// Error type for archive operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while reading or writing an archive.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Loaded records do not form a usable store
    #[error("specification error: {0}")]
    Spec(#[from] SpecError),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Persistence for committed versions and staged changes.
///
/// Versions are append-only; staged changes can be exported for review
/// elsewhere and imported back.
#[async_trait]
pub trait SpecArchive: Send + Sync {
    // === Versions ===

    /// Write a committed snapshot.
    async fn save_version(&self, spec: &Specification) -> Result<()>;

    /// Read one snapshot.
    async fn load_version(&self, version: SpecVersion) -> Result<Option<Specification>>;

    /// Read every snapshot, oldest first.
    async fn list_versions(&self) -> Result<Vec<Specification>>;

    /// Record the live head.
    async fn set_head(&self, version: SpecVersion) -> Result<()>;

    /// Recorded live head.
    async fn head(&self) -> Result<Option<SpecVersion>>;

    // === Staged changes ===

    /// Write a staged change.
    async fn save_staged(&self, change: &ProposedChange) -> Result<()>;

    /// Read a staged change.
    async fn load_staged(&self, id: ChangeId) -> Result<Option<ProposedChange>>;

    /// Read every staged change.
    async fn list_staged(&self) -> Result<Vec<ProposedChange>>;

    /// Delete a staged change.
    async fn remove_staged(&self, id: ChangeId) -> Result<()>;

    // === Whole store ===

    /// Write all versions, the head marker and every pending change.
    async fn save_store(&self, store: &SpecificationStore) -> Result<()> {
        for spec in store.versions() {
            self.save_version(&spec).await?;
        }
        self.set_head(store.live_version()).await?;
        for change in store.pending_changes() {
            self.save_staged(&change).await?;
        }
        tracing::debug!("Saved specification store at {}", store.live_version());
        Ok(())
    }

    /// Rebuild a store with full history and its staged changes as drafts.
    async fn load_store(&self) -> Result<SpecificationStore> {
        let versions = self.list_versions().await?;
        if versions.is_empty() {
            return Err(StorageError::NotFound("no specification versions".to_string()));
        }
        let store = SpecificationStore::from_history(versions)?;
        if let Some(head) = self.head().await? {
            if head != store.live_version() {
                tracing::warn!(
                    "Head marker says {} but newest version is {}",
                    head,
                    store.live_version()
                );
            }
        }
        for change in self.list_staged().await? {
            store.import_change(change);
        }
        Ok(store)
    }
}
