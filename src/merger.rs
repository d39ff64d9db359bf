/// Configuration merger: CLI args > Env vars > Config file > Defaults
///
/// Clap already resolves CLI flags against their env vars, so only the
/// file and the built-in defaults are left to fold in here.
use anyhow::Result;

use crate::cli::ConfigArgs;
use crate::config::TangleConfig;

/// Overlay the command line on top of the file configuration and validate the result
pub fn merge(args: &ConfigArgs, file_config: Option<TangleConfig>) -> Result<TangleConfig> {
    let mut config = file_config.unwrap_or_default();

    if let Some(dir) = &args.cache_dir {
        config.cache.dir = dir.clone();
    }
    if args.no_persist {
        config.cache.persist = false;
    }
    if let Some(policy) = &args.key_policy {
        config.cache.key_policy = policy.clone();
    }
    if let Some(dir) = &args.store {
        config.store.dir = dir.clone();
    }
    if let Some(base_url) = &args.base_url {
        config.store.base_url = Some(base_url.clone());
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config() -> TangleConfig {
        toml::from_str(
            r#"
            [cache]
            dir = "/from/file"
            key_policy = "positional"

            [store]
            base_url = "https://cdn.example.com"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_file_values_used_without_flags() {
        let config = merge(&ConfigArgs::default(), Some(file_config())).unwrap();
        assert_eq!(config.cache.dir, "/from/file");
        assert_eq!(config.cache.key_policy, "positional");
        assert!(config.cache.persist);
    }

    #[test]
    fn test_flags_override_file() {
        let args = ConfigArgs {
            cache_dir: Some("/from/cli".to_string()),
            no_persist: true,
            key_policy: Some("chained".to_string()),
            store: Some("/store/cli".to_string()),
            base_url: Some("http://localhost:8000".to_string()),
            ..Default::default()
        };

        let config = merge(&args, Some(file_config())).unwrap();
        assert_eq!(config.cache.dir, "/from/cli");
        assert!(!config.cache.persist);
        assert_eq!(config.cache.key_policy, "chained");
        assert_eq!(config.store.dir, "/store/cli");
        assert_eq!(config.store.base_url.as_deref(), Some("http://localhost:8000"));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = ConfigArgs {
            key_policy: Some("sometimes".to_string()),
            ..Default::default()
        };
        assert!(merge(&args, None).is_err());
    }
}
