use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::ArtifactStore;

/// In-process artifact store; counts byte transfers so callers can verify
/// that re-runs never upload twice
pub struct MemoryArtifactStore {
    base_url: String,
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    transfers: AtomicUsize,
}

impl MemoryArtifactStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
            transfers: AtomicUsize::new(0),
        }
    }

    /// Number of writes that actually moved bytes
    pub fn transfers(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }

    /// Stored bytes and content type for `key`
    pub fn get(&self, key: &str) -> Option<(Vec<u8>, String)> {
        self.objects.lock().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new("memory://artifacts")
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn key_exists(&self, key: &str) -> Result<bool> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| anyhow::anyhow!("Artifact store lock poisoned"))?;
        Ok(objects.contains_key(key))
    }

    fn store(&self, key: &str, data: &[u8], content_type: &str) -> Result<String> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| anyhow::anyhow!("Artifact store lock poisoned"))?;

        if !objects.contains_key(key) {
            objects.insert(key.to_string(), (data.to_vec(), content_type.to_string()));
            self.transfers.fetch_add(1, Ordering::SeqCst);
        }

        Ok(self.url_for(key))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}
