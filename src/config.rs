use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::cache::KeyPolicy;
use crate::engine::Environment;
use crate::storage::{default_cache_dir, default_store_dir};

/// Complete tangle configuration (loaded from `tangle.toml`)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TangleConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

/// Result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache directory path
    #[serde(default = "default_cache_dir_string")]
    pub dir: String,

    /// Keep results on disk between runs (false = in-memory only)
    #[serde(default = "default_true")]
    pub persist: bool,

    /// Key derivation: "chained" or "positional"
    #[serde(default = "default_key_policy")]
    pub key_policy: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir_string(),
            persist: true,
            key_policy: default_key_policy(),
        }
    }
}

/// Artifact store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for stored artifacts
    #[serde(default = "default_store_dir_string")]
    pub dir: String,

    /// Public URL prefix for artifacts (defaults to a file:// URL of the store)
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir_string(),
            base_url: None,
        }
    }
}

/// Fragment engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-fragment wall-clock limit (e.g., "30s", "5m")
    #[serde(default = "default_engine_timeout")]
    pub timeout: String,

    /// Engine heap limit (e.g., "256MB"); unset means no limit
    #[serde(default)]
    pub memory_limit: Option<String>,

    /// Bindings every document starts with
    #[serde(default)]
    pub bootstrap: Environment,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: default_engine_timeout(),
            memory_limit: None,
            bootstrap: Environment::new(),
        }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Drop change events arriving this soon after a pass started
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

// Default value functions
fn default_cache_dir_string() -> String {
    default_cache_dir().to_string_lossy().into_owned()
}

fn default_store_dir_string() -> String {
    default_store_dir().to_string_lossy().into_owned()
}

fn default_key_policy() -> String {
    "chained".to_string()
}

fn default_engine_timeout() -> String {
    "30s".to_string()
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_true() -> bool {
    true
}

impl TangleConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: TangleConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache.dir.trim().is_empty() {
            anyhow::bail!("cache.dir must be set");
        }

        if self.store.dir.trim().is_empty() {
            anyhow::bail!("store.dir must be set");
        }

        self.key_policy()?;

        if let Some(base_url) = &self.store.base_url {
            if !base_url.starts_with("http://")
                && !base_url.starts_with("https://")
                && !base_url.starts_with("file://")
            {
                anyhow::bail!(
                    "store.base_url must start with http://, https://, or file://: {}",
                    base_url
                );
            }
        }

        parse_duration(&self.engine.timeout).context("engine.timeout is invalid")?;

        if let Some(limit) = &self.engine.memory_limit {
            parse_size(limit).context("engine.memory_limit is invalid")?;
        }

        Ok(())
    }

    pub fn key_policy(&self) -> Result<KeyPolicy> {
        self.cache
            .key_policy
            .parse()
            .map_err(|_| anyhow!("cache.key_policy must be one of: chained, positional"))
    }

    /// Per-fragment timeout; "0s" disables it
    pub fn engine_timeout(&self) -> Result<Option<Duration>> {
        let timeout = parse_duration(&self.engine.timeout)?;
        Ok((!timeout.is_zero()).then_some(timeout))
    }

    pub fn engine_memory_limit(&self) -> Result<Option<usize>> {
        self.engine
            .memory_limit
            .as_deref()
            .map(|limit| {
                let bytes = parse_size(limit)?;
                usize::try_from(bytes).context("engine.memory_limit does not fit in memory")
            })
            .transpose()
    }
}

/// Parse size string (e.g., "256MB", "1GB", "512KB") into bytes
pub fn parse_size(size_str: &str) -> Result<u64> {
    let size_str = size_str.trim().to_uppercase();

    if let Some(num) = size_str.strip_suffix("GB") {
        let num: u64 = num.trim().parse().context("Invalid size number")?;
        Ok(num * 1024 * 1024 * 1024)
    } else if let Some(num) = size_str.strip_suffix("MB") {
        let num: u64 = num.trim().parse().context("Invalid size number")?;
        Ok(num * 1024 * 1024)
    } else if let Some(num) = size_str.strip_suffix("KB") {
        let num: u64 = num.trim().parse().context("Invalid size number")?;
        Ok(num * 1024)
    } else {
        // Assume bytes
        size_str.parse().context("Invalid size format")
    }
}

/// Parse duration string (e.g., "500ms", "30s", "5m", "1h")
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(anyhow!("Empty duration string"));
    }

    if let Some(num) = s.strip_suffix("ms") {
        let num: u64 = num
            .parse()
            .map_err(|_| anyhow!("Invalid duration: {}", s))?;
        return Ok(Duration::from_millis(num));
    }

    let unit_len = s.chars().last().map_or(1, char::len_utf8);
    let (num_str, unit) = s.split_at(s.len() - unit_len);
    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid duration: {}", s))?;

    let seconds = match unit {
        "s" => num,
        "m" => num * 60,
        "h" => num * 3600,
        _ => return Err(anyhow!("Invalid duration unit: {}. Use: ms, s, m, h", unit)),
    };

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = TangleConfig::default();
        assert!(config.cache.persist);
        assert_eq!(config.cache.key_policy, "chained");
        assert_eq!(config.engine.timeout, "30s");
        assert_eq!(config.watch.debounce_ms, 200);
        assert!(config.engine.bootstrap.is_empty());
    }

    #[test]
    fn test_validate_config() {
        let config = TangleConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_file() {
        let config: TangleConfig = toml::from_str(
            r#"
            [cache]
            dir = "/tmp/tangle-cache"
            persist = false
            key_policy = "positional"

            [store]
            dir = "/tmp/tangle-store"
            base_url = "https://cdn.example.com/artifacts"

            [engine]
            timeout = "5m"
            memory_limit = "64MB"

            [engine.bootstrap]
            title = "Notes"
            scale = 2

            [watch]
            debounce_ms = 50
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert!(!config.cache.persist);
        assert_eq!(config.key_policy().unwrap(), KeyPolicy::Positional);
        assert_eq!(
            config.engine_timeout().unwrap(),
            Some(Duration::from_secs(300))
        );
        assert_eq!(config.engine_memory_limit().unwrap(), Some(64 * 1024 * 1024));
        assert_eq!(config.engine.bootstrap.get("scale"), Some(&json!(2)));
        assert_eq!(config.engine.bootstrap.get("title"), Some(&json!("Notes")));
        assert_eq!(config.watch.debounce_ms, 50);
    }

    #[test]
    fn test_invalid_key_policy() {
        let mut config = TangleConfig::default();
        config.cache.key_policy = "random".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = TangleConfig::default();
        config.store.base_url = Some("ftp://example.com".to_string());
        assert!(config.validate().is_err());

        config.store.base_url = Some("file:///srv/artifacts".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_dirs_rejected() {
        let mut config = TangleConfig::default();
        config.cache.dir = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = TangleConfig::default();
        config.store.dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_disables_limit() {
        let mut config = TangleConfig::default();
        config.engine.timeout = "0s".to_string();
        assert_eq!(config.engine_timeout().unwrap(), None);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("abc").is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1GB").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("256mb").unwrap(), 256 * 1024 * 1024);
        assert_eq!(parse_size("4KB").unwrap(), 4096);
        assert_eq!(parse_size("1000").unwrap(), 1000);
        assert!(parse_size("lots").is_err());
    }
}
