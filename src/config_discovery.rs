use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::TangleConfig;

/// File name looked up in the working directory and its ancestors
pub const CONFIG_FILE_NAME: &str = "tangle.toml";

/// Discovers tangle configuration by traversing up the directory tree
pub fn discover_config(start_dir: &Path) -> Result<Option<PathBuf>> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Ok(Some(config_path));
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    // Fallback to global config
    if let Some(home) = dirs::home_dir() {
        let global_config = home.join(".config/tangle/config.toml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// Loads configuration with auto-discovery support
///
/// If `explicit_path` is provided, loads config from that path.
/// Otherwise, auto-discovers config by traversing up directory tree from cwd.
///
/// Returns Ok(None) if no config is found (neither explicit nor discovered).
pub fn load_config_with_discovery(explicit_path: Option<&str>) -> Result<Option<TangleConfig>> {
    if let Some(config_path) = explicit_path {
        return Ok(Some(TangleConfig::from_file(config_path)?));
    }

    let current_dir =
        std::env::current_dir().context("Failed to get current directory for config discovery")?;

    match discover_config(&current_dir)? {
        Some(discovered_path) => {
            tracing::debug!("Using config: {}", discovered_path.display());
            Ok(Some(TangleConfig::from_file(&discovered_path)?))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_config_finds_nearest() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        let project = root.join("project");
        let subdir = project.join("docs").join("notes");
        fs::create_dir_all(&subdir).unwrap();

        let config_path = project.join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[watch]\ndebounce_ms = 10\n").unwrap();

        let found = discover_config(&subdir).unwrap();
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_explicit_path_wins() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("custom.toml");
        fs::write(&config_path, "[cache]\nkey_policy = \"positional\"\n").unwrap();

        let config = load_config_with_discovery(config_path.to_str())
            .unwrap()
            .unwrap();
        assert_eq!(config.cache.key_policy, "positional");
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.toml");
        assert!(load_config_with_discovery(missing.to_str()).is_err());
    }
}
