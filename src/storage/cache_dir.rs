use std::path::PathBuf;

/// Get default cache directory following XDG conventions
///
/// - Linux/Unix: $XDG_CACHE_HOME/tangle or ~/.cache/tangle
/// - macOS: ~/Library/Caches/tangle
/// - Windows: %LOCALAPPDATA%/tangle
pub fn default_cache_dir() -> PathBuf {
    if let Some(cache_dir) = dirs::cache_dir() {
        cache_dir.join("tangle")
    } else {
        // Fallback to current directory if we can't determine cache dir
        PathBuf::from(".tangle/cache")
    }
}

/// Default artifact store directory (beside the cache)
pub fn default_store_dir() -> PathBuf {
    default_cache_dir().join("artifacts")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_dir() {
        let cache_dir = default_cache_dir();
        assert!(cache_dir.to_string_lossy().contains("tangle"));
        assert!(default_store_dir().starts_with(&cache_dir));
    }
}
