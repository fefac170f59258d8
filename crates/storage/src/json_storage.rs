//! JSON file archive.
//!
//! Layout under the archive root:
//!
//! ```text
//! versions/<n>.json        one committed snapshot per file
//! meta/head.json           live version marker
//! staged/<change_id>.json  exported staged changes
//! ```

use std::path::{Path, PathBuf};

use gaitspec_core::{ChangeId, SpecVersion, Specification};
use tokio::fs;

use super::{ProposedChange, Result, SpecArchive};

/// File-per-record JSON archive.
#[derive(Debug, Clone)]
pub struct JsonSpecArchive {
    root: PathBuf,
}

impl JsonSpecArchive {
    /// Open an archive, creating its directories if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("versions")).await?;
        fs::create_dir_all(root.join("meta")).await?;
        fs::create_dir_all(root.join("staged")).await?;
        Ok(Self { root })
    }

    /// Archive root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn version_path(&self, version: SpecVersion) -> PathBuf {
        self.root.join("versions").join(format!("{}.json", version.get()))
    }

    fn staged_path(&self, id: ChangeId) -> PathBuf {
        self.root.join("staged").join(format!("{}.json", id))
    }

    fn head_path(&self) -> PathBuf {
        self.root.join("meta").join("head.json")
    }
}

#[async_trait::async_trait]
impl SpecArchive for JsonSpecArchive {
    async fn save_version(&self, spec: &Specification) -> Result<()> {
        let json = serde_json::to_string_pretty(spec)?;
        fs::write(self.version_path(spec.version), json.as_bytes()).await?;
        Ok(())
    }

    async fn load_version(&self, version: SpecVersion) -> Result<Option<Specification>> {
        read_json(&self.version_path(version)).await
    }

    async fn list_versions(&self) -> Result<Vec<Specification>> {
        let mut versions: Vec<Specification> = list_dir(&self.root.join("versions")).await?;
        versions.sort_by_key(|s| s.version);
        Ok(versions)
    }

    async fn set_head(&self, version: SpecVersion) -> Result<()> {
        let meta = serde_json::json!({"version": version.get(), "updated_at": chrono::Utc::now()});
        fs::write(self.head_path(), serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(())
    }

    async fn head(&self) -> Result<Option<SpecVersion>> {
        let meta: Option<serde_json::Value> = read_json(&self.head_path()).await?;
        Ok(meta
            .and_then(|m| m.get("version").and_then(|v| v.as_u64()))
            .map(SpecVersion))
    }

    async fn save_staged(&self, change: &ProposedChange) -> Result<()> {
        let json = serde_json::to_string_pretty(change)?;
        fs::write(self.staged_path(change.id), json.as_bytes()).await?;
        Ok(())
    }

    async fn load_staged(&self, id: ChangeId) -> Result<Option<ProposedChange>> {
        read_json(&self.staged_path(id)).await
    }

    async fn list_staged(&self) -> Result<Vec<ProposedChange>> {
        let mut changes: Vec<ProposedChange> = list_dir(&self.root.join("staged")).await?;
        changes.sort_by_key(|c| c.created_at);
        Ok(changes)
    }

    async fn remove_staged(&self, id: ChangeId) -> Result<()> {
        match fs::remove_file(self.staged_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        match read_json(&entry.path()).await {
            Ok(Some(item)) => items.push(item),
            Ok(None) => {}
            Err(e) => tracing::warn!("Skipping unreadable record {}: {}", entry.path().display(), e),
        }
    }
    Ok(items)
}
