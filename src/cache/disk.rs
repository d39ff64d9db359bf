/// Persistent fragment cache
///
/// Layout:
/// - `<cache_dir>/blocks/ab/cd1234....json` - one JSON entry per key (first 2 hex chars = subdir)
///
/// Keys are stored in their 64-character hex form, so hits survive process
/// restarts as long as the fingerprint format is unchanged.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{CacheEntry, CacheKey, CacheStats, ResultCache};

const ENTRY_VERSION: u32 = 1;

/// On-disk form of a cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub version: u32,
    pub key: CacheKey,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: CacheEntry,
}

/// Cache entries persisted as JSON files
pub struct DiskCache {
    blocks_dir: PathBuf,
}

impl DiskCache {
    /// Open (or create) the cache rooted at `cache_dir`
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Result<Self> {
        let blocks_dir = cache_dir.as_ref().join("blocks");
        fs::create_dir_all(&blocks_dir).with_context(|| {
            format!(
                "Failed to create cache directory: {}",
                blocks_dir.display()
            )
        })?;

        Ok(Self { blocks_dir })
    }

    /// Git-style sharding: first 2 hex chars as subdirectory
    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let hex_key = key.to_hex();
        let (prefix, suffix) = hex_key.split_at(2);
        self.blocks_dir.join(prefix).join(format!("{}.json", suffix))
    }

    /// Load the full stored entry, including its metadata
    pub fn get_stored(&self, key: &CacheKey) -> Result<Option<StoredEntry>> {
        let path = self.entry_path(key);

        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache entry: {}", path.display()))?;

        match serde_json::from_str::<StoredEntry>(&json) {
            Ok(stored) if stored.version == ENTRY_VERSION && stored.key == *key => Ok(Some(stored)),
            _ => {
                // Invalid cache entry - clean it up
                warn!(key = %key, "Discarding unreadable cache entry");
                let _ = fs::remove_file(&path);
                Ok(None)
            }
        }
    }

    /// Remove a single entry
    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        let path = self.entry_path(key);

        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove cache entry: {}", path.display()))?;
        }

        Ok(())
    }

    /// All stored keys, sorted
    pub fn list(&self) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();

        for entry in WalkDir::new(&self.blocks_dir).min_depth(2).max_depth(2) {
            let entry = entry.with_context(|| {
                format!(
                    "Failed to read cache directory: {}",
                    self.blocks_dir.display()
                )
            })?;

            if let Some(key) = key_from_path(entry.path()) {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }

    /// Get cache statistics
    pub fn stats(&self) -> Result<CacheStats> {
        let mut total_entries = 0;
        let mut total_bytes = 0;

        for entry in WalkDir::new(&self.blocks_dir).min_depth(2).max_depth(2) {
            let entry = entry?;
            if key_from_path(entry.path()).is_some() {
                total_entries += 1;
                total_bytes += entry.metadata()?.len();
            }
        }

        Ok(CacheStats {
            total_entries,
            total_bytes,
            cache_dir: self
                .blocks_dir
                .parent()
                .unwrap_or(&self.blocks_dir)
                .to_path_buf(),
        })
    }

    /// Clean all cache entries
    pub fn clean_all(&self) -> Result<()> {
        if self.blocks_dir.exists() {
            fs::remove_dir_all(&self.blocks_dir).with_context(|| {
                format!(
                    "Failed to remove cache directory: {}",
                    self.blocks_dir.display()
                )
            })?;
        }
        fs::create_dir_all(&self.blocks_dir).with_context(|| {
            format!(
                "Failed to recreate cache directory: {}",
                self.blocks_dir.display()
            )
        })?;
        Ok(())
    }
}

/// `<blocks>/ab/cdef....json` -> key `abcdef...`
fn key_from_path(path: &Path) -> Option<CacheKey> {
    if path.extension()? != "json" {
        return None;
    }
    let suffix = path.file_stem()?.to_str()?;
    let prefix = path.parent()?.file_name()?.to_str()?;
    CacheKey::from_hex(&format!("{}{}", prefix, suffix)).ok()
}

impl ResultCache for DiskCache {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(self.get_stored(key)?.map(|stored| stored.entry))
    }

    fn put(&mut self, key: CacheKey, entry: CacheEntry) -> Result<()> {
        let path = self.entry_path(&key);

        if path.exists() {
            debug!(key = %key, "Cache entry already present");
            return Ok(());
        }

        let parent = path
            .parent()
            .context("Cache entry path has no parent directory")?;
        fs::create_dir_all(parent).context("Failed to create cache shard directory")?;

        let stored = StoredEntry {
            version: ENTRY_VERSION,
            key,
            created_at: Utc::now(),
            entry,
        };
        let json =
            serde_json::to_string_pretty(&stored).context("Failed to serialize cache entry")?;

        // Write atomically (temp file in the same directory, then rename)
        let mut file = NamedTempFile::new_in(parent).context("Failed to create temp file")?;
        file.write_all(json.as_bytes())
            .context("Failed to write cache entry")?;
        file.persist(&path)
            .with_context(|| format!("Failed to persist cache entry: {}", path.display()))?;

        Ok(())
    }

    fn contains(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entry_path(key).exists())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fingerprint;
    use crate::engine::Environment;
    use serde_json::json;
    use tempfile::TempDir;

    fn entry(n: i64) -> CacheEntry {
        CacheEntry {
            environment: Environment::new().with_binding("n", json!(n)),
            value: Some(json!(n * 2)),
        }
    }

    #[test]
    fn test_cache_put_and_get() {
        let temp = TempDir::new().unwrap();
        let mut cache = DiskCache::new(temp.path()).unwrap();
        let key = fingerprint("", "n = 1");

        cache.put(key, entry(1)).unwrap();

        assert_eq!(cache.get(&key).unwrap(), Some(entry(1)));
        assert!(cache.contains(&key).unwrap());

        let stored = cache.get_stored(&key).unwrap().unwrap();
        assert_eq!(stored.key, key);
        assert_eq!(stored.version, ENTRY_VERSION);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let key = fingerprint("", "n = 7");

        {
            let mut cache = DiskCache::new(temp.path()).unwrap();
            cache.put(key, entry(7)).unwrap();
        }

        let cache = DiskCache::new(temp.path()).unwrap();
        assert_eq!(cache.get(&key).unwrap(), Some(entry(7)));
    }

    #[test]
    fn test_put_is_write_once() {
        let temp = TempDir::new().unwrap();
        let mut cache = DiskCache::new(temp.path()).unwrap();
        let key = fingerprint("", "n = 1");

        cache.put(key, entry(1)).unwrap();
        cache.put(key, entry(2)).unwrap();

        assert_eq!(cache.get(&key).unwrap(), Some(entry(1)));
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let mut cache = DiskCache::new(temp.path()).unwrap();
        let key = fingerprint("", "n = 1");

        cache.put(key, entry(1)).unwrap();
        fs::write(cache.entry_path(&key), "{ not json").unwrap();

        assert!(cache.get(&key).unwrap().is_none());
        assert!(!cache.entry_path(&key).exists());
    }

    #[test]
    fn test_list_stats_and_clean() {
        let temp = TempDir::new().unwrap();
        let mut cache = DiskCache::new(temp.path()).unwrap();

        let mut keys: Vec<_> = (1..=3)
            .map(|i| fingerprint("", &format!("n = {}", i)))
            .collect();
        for (i, key) in keys.iter().enumerate() {
            cache.put(*key, entry(i as i64)).unwrap();
        }
        keys.sort();

        assert_eq!(cache.list().unwrap(), keys);
        assert_eq!(cache.len().unwrap(), 3);

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_entries, 3);
        assert!(stats.total_bytes > 0);
        assert_eq!(stats.cache_dir, temp.path());

        cache.clean_all().unwrap();
        assert!(cache.is_empty().unwrap());
    }
}
