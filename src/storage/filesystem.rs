use super::{make_world_readable, ArtifactRecord, ArtifactStore, StoreStats};
use anyhow::{Context, Result};
use chrono::Utc;
use rocksdb::{Options, DB};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::logging::{operations, services, status};

/// Filesystem-based artifact store with RocksDB metadata tracking
///
/// Layout:
/// - `<root>/objects/ab/cd1234...` - Artifact bytes, keyed by fingerprint (first 2 chars = subdir)
/// - `<root>/metadata/` - RocksDB database with size, content type and creation time per key
///
/// Public URLs mirror the object layout under `base_url`, which defaults to
/// a `file://` URL of the objects directory.
pub struct FilesystemArtifactStore {
    objects_dir: PathBuf,
    base_url: String,
    db: Arc<DB>,
}

impl FilesystemArtifactStore {
    /// Open (or create) a store at the given root directory
    pub fn new<P: AsRef<Path>>(root: P, base_url: Option<String>) -> Result<Self> {
        let root = root.as_ref();
        let objects_dir = root.join("objects");
        let db_path = root.join("metadata");

        // Create directories
        fs::create_dir_all(&objects_dir).context("Failed to create objects directory")?;

        let objects_dir = objects_dir
            .canonicalize()
            .context("Failed to resolve objects directory")?;

        // Configure RocksDB options
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
        opts.increase_parallelism(num_cpus::get() as i32);

        let db = DB::open(&opts, &db_path).context("Failed to open RocksDB database")?;

        let base_url = base_url
            .unwrap_or_else(|| format!("file://{}", objects_dir.display()))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            objects_dir,
            base_url,
            db: Arc::new(db),
        })
    }

    /// Split a key into its shard directory and file name
    fn shard(key: &str) -> Result<(&str, &str)> {
        if key.len() < 3
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            anyhow::bail!("Invalid artifact key: {:?}", key);
        }
        Ok(key.split_at(2))
    }

    /// Convert key to filesystem path
    fn key_to_path(&self, key: &str) -> Result<PathBuf> {
        let (prefix, suffix) = Self::shard(key)?;
        Ok(self.objects_dir.join(prefix).join(suffix))
    }

    /// Metadata recorded when `key` was stored
    pub fn metadata(&self, key: &str) -> Result<Option<ArtifactRecord>> {
        match self.db.get(key.as_bytes())? {
            Some(bytes) => {
                let record =
                    serde_json::from_slice(&bytes).context("Failed to decode artifact metadata")?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Get store statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let mut total_objects = 0u64;
        let mut total_bytes = 0u64;

        for item in self.db.iterator(rocksdb::IteratorMode::Start) {
            let (_, value) = item?;
            if let Ok(record) = serde_json::from_slice::<ArtifactRecord>(&value) {
                total_objects += 1;
                total_bytes += record.size;
            }
        }

        Ok(StoreStats {
            total_objects,
            total_bytes,
            store_dir: self
                .objects_dir
                .parent()
                .unwrap_or(&self.objects_dir)
                .to_path_buf(),
        })
    }
}

impl Drop for FilesystemArtifactStore {
    fn drop(&mut self) {
        if let Err(e) = self.db.flush() {
            eprintln!("Warning: Failed to flush RocksDB on shutdown: {}", e);
        }
        self.db.cancel_all_background_work(true);
    }
}

impl ArtifactStore for FilesystemArtifactStore {
    fn key_exists(&self, key: &str) -> Result<bool> {
        Ok(self.key_to_path(key)?.exists())
    }

    fn store(&self, key: &str, data: &[u8], content_type: &str) -> Result<String> {
        let url = self.url_for(key);

        if self.key_exists(key)? {
            debug!(
                service = services::ARTIFACT_STORE,
                operation = operations::PUT,
                status = status::EXISTS,
                key,
                "key already stored"
            );
            return Ok(url);
        }

        let path = self.key_to_path(key)?;
        let parent = path
            .parent()
            .context("Artifact path has no parent directory")?;
        fs::create_dir_all(parent).context("Failed to create parent directory")?;

        // Write data atomically (write to temp file, then rename)
        let mut file = NamedTempFile::new_in(parent).context("Failed to create temp file")?;
        file.write_all(data).context("Failed to write data")?;
        file.as_file().sync_all().context("Failed to sync file")?;
        make_world_readable(file.as_file()).context("Failed to set artifact permissions")?;
        file.persist(&path).context("Failed to rename temp file")?;

        let record = ArtifactRecord {
            size: data.len() as u64,
            content_type: content_type.to_string(),
            created_at: Utc::now(),
        };
        let record = serde_json::to_vec(&record).context("Failed to encode artifact metadata")?;
        self.db
            .put(key.as_bytes(), record)
            .context("Failed to update metadata")?;

        info!(
            service = services::ARTIFACT_STORE,
            operation = operations::PUT,
            status = status::SUCCESS,
            key,
            size_bytes = data.len(),
            content_type,
            "stored artifact"
        );

        Ok(url)
    }

    fn url_for(&self, key: &str) -> String {
        match Self::shard(key) {
            Ok((prefix, suffix)) => format!("{}/{}/{}", self.base_url, prefix, suffix),
            Err(_) => format!("{}/{}", self.base_url, key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const KEY: &str = "ab0123456789abcdef";

    #[test]
    fn test_store_and_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemArtifactStore::new(temp_dir.path(), None).unwrap();

        assert!(!store.key_exists(KEY).unwrap());

        let url = store.store(KEY, b"png bytes", "image/png").unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/ab/0123456789abcdef"));
        assert!(store.key_exists(KEY).unwrap());

        let record = store.metadata(KEY).unwrap().unwrap();
        assert_eq!(record.size, 9);
        assert_eq!(record.content_type, "image/png");

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_objects, 1);
        assert_eq!(stats.total_bytes, 9);
    }

    #[test]
    fn test_store_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemArtifactStore::new(temp_dir.path(), None).unwrap();

        let first = store.store(KEY, b"original", "image/png").unwrap();
        let second = store.store(KEY, b"replacement", "image/png").unwrap();

        assert_eq!(first, second);

        // The second call never touched the bytes
        let path = store.key_to_path(KEY).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"original");
        assert_eq!(store.metadata(KEY).unwrap().unwrap().size, 8);
    }

    #[cfg(unix)]
    #[test]
    fn test_stored_artifacts_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemArtifactStore::new(temp_dir.path(), None).unwrap();
        store.store(KEY, b"png bytes", "image/png").unwrap();

        let path = store.key_to_path(KEY).unwrap();
        let mode = fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_base_url_override() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemArtifactStore::new(
            temp_dir.path(),
            Some("https://cdn.example.com/notes/".to_string()),
        )
        .unwrap();

        assert_eq!(
            store.url_for(KEY),
            "https://cdn.example.com/notes/ab/0123456789abcdef"
        );
    }

    #[test]
    fn test_rejects_unsafe_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemArtifactStore::new(temp_dir.path(), None).unwrap();

        assert!(store.store("../etc/passwd", b"x", "text/plain").is_err());
        assert!(store.key_exists("a").is_err());
    }

    #[test]
    fn test_metadata_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = FilesystemArtifactStore::new(temp_dir.path(), None).unwrap();
            store.store(KEY, b"audio", "audio/ogg").unwrap();
        }

        let store = FilesystemArtifactStore::new(temp_dir.path(), None).unwrap();
        assert!(store.key_exists(KEY).unwrap());
        assert_eq!(
            store.metadata(KEY).unwrap().unwrap().content_type,
            "audio/ogg"
        );
    }
}
