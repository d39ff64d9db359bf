use anyhow::Result;
use std::collections::HashMap;

use super::{CacheEntry, CacheKey, ResultCache};

/// Process-local cache; lives as long as the pipeline that owns it
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: CacheKey, entry: CacheEntry) -> Result<()> {
        self.entries.entry(key).or_insert(entry);
        Ok(())
    }

    fn contains(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.contains_key(key))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}
