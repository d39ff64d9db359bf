pub mod cache_dir;
pub mod filesystem;
pub mod memory;

pub use cache_dir::{default_cache_dir, default_store_dir};
pub use filesystem::FilesystemArtifactStore;
pub use memory::MemoryArtifactStore;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::PathBuf;

/// Durable, idempotent byte store with public retrieval URLs.
///
/// `store` checks for the key first: an existing key is never written
/// again, and the same URL is returned every time.
pub trait ArtifactStore: Send + Sync {
    /// Check if an artifact exists
    fn key_exists(&self, key: &str) -> Result<bool>;

    /// Store bytes under `key` unless already present; returns the public URL
    fn store(&self, key: &str, data: &[u8], content_type: &str) -> Result<String>;

    /// Public URL for `key`, whether or not it has been stored yet
    fn url_for(&self, key: &str) -> String;
}

/// Metadata recorded for each stored artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub size: u64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_objects: u64,
    pub total_bytes: u64,
    pub store_dir: PathBuf,
}

/// Give a freshly written temp file the usual `0644` mode before it is
/// persisted, since temp files are created owner-only.
pub(crate) fn make_world_readable(file: &File) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }
    #[cfg(not(unix))]
    let _ = file;
    Ok(())
}
