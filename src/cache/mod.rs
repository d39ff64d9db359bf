pub mod disk;
pub mod key;
pub mod memory;

pub use disk::{DiskCache, StoredEntry};
pub use key::{fingerprint, positional_fingerprint, CacheKey, KeyChain, KeyPolicy};
pub use memory::MemoryCache;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::engine::{Environment, Evaluation};

/// Memoized outcome of one fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub environment: Environment,
    pub value: Option<Value>,
}

impl From<Evaluation> for CacheEntry {
    fn from(evaluation: Evaluation) -> Self {
        Self {
            environment: evaluation.environment,
            value: evaluation.value,
        }
    }
}

impl From<CacheEntry> for Evaluation {
    fn from(entry: CacheEntry) -> Self {
        Self {
            environment: entry.environment,
            value: entry.value,
        }
    }
}

/// Content-addressed memo of fragment outcomes.
///
/// Entries are write-once: a `put` for a key that is already present keeps
/// the existing entry. Nothing is ever invalidated explicitly, a changed
/// prefix simply produces new keys.
pub trait ResultCache: Send {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    fn put(&mut self, key: CacheKey, entry: CacheEntry) -> Result<()>;

    fn contains(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Number of stored entries
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_bytes: u64,
    pub cache_dir: PathBuf,
}
