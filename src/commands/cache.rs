/// `tangle cache` command implementation
///
/// Inspects and manages the result cache (status, clean, list, stats).
use anyhow::{Context, Result};
use std::path::Path;

use super::build_pipeline;
use crate::cache::DiskCache;
use crate::cli::{CacheArgs, CacheCommands};
use crate::cli_utils::{format_bytes, tangle_prefix};
use crate::config::TangleConfig;
use crate::config_discovery::load_config_with_discovery;
use crate::merger;
use crate::storage::FilesystemArtifactStore;

pub async fn cache(args: &CacheArgs) -> Result<()> {
    let file_config = load_config_with_discovery(args.config.config.as_deref())?;
    let config = merger::merge(&args.config, file_config)?;

    match &args.command {
        CacheCommands::Status { markdown, verbose } => status(&config, markdown, *verbose),
        CacheCommands::Clean { all } => clean(&config, *all),
        CacheCommands::List { verbose } => list(&config, *verbose),
        CacheCommands::Stats => stats(&config),
    }
}

fn open_disk_cache(config: &TangleConfig) -> Result<DiskCache> {
    DiskCache::new(&config.cache.dir).context("Failed to open result cache")
}

/// Show which blocks of a document would be served from cache
fn status(config: &TangleConfig, markdown: &str, verbose: bool) -> Result<()> {
    let path = Path::new(markdown);
    if !path.is_file() {
        anyhow::bail!("Document not found: {}", markdown);
    }

    let document = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", markdown))?;

    let pipeline = build_pipeline(config)?;
    let blocks = pipeline.status(&document)?;

    println!("Document: {}", markdown);
    println!("Key policy: {}", pipeline.key_policy());

    if blocks.is_empty() {
        println!("No executable blocks.");
        return Ok(());
    }

    let cached = blocks.iter().filter(|b| b.cached).count();
    println!("Blocks: {} ({} cached)", blocks.len(), cached);
    println!();

    for block in &blocks {
        let key = block.key.to_hex();
        let key = if verbose { key.as_str() } else { &key[..12] };
        let state = if block.cached { "CACHED ✓" } else { "NOT CACHED ✗" };
        println!(
            "  [{}] {:<10} {}  {}",
            block.position, block.language, key, state
        );
    }

    Ok(())
}

/// Remove every cached result
fn clean(config: &TangleConfig, all: bool) -> Result<()> {
    if !all {
        anyhow::bail!("Specify --all to clean the result cache");
    }

    let cache = open_disk_cache(config)?;
    println!("{} Cleaning result cache...", tangle_prefix());
    cache.clean_all().context("Failed to clean result cache")?;
    println!("{} Result cache cleaned.", tangle_prefix());

    Ok(())
}

/// List all cached results
fn list(config: &TangleConfig, verbose: bool) -> Result<()> {
    let cache = open_disk_cache(config)?;
    let keys = cache.list().context("Failed to list cache entries")?;

    if keys.is_empty() {
        println!("No cached results.");
        return Ok(());
    }

    println!("Cached results ({} entries):", keys.len());
    println!();

    for key in keys {
        let Some(stored) = cache.get_stored(&key)? else {
            continue;
        };

        println!("  {}", key);
        println!(
            "    Created: {}",
            stored.created_at.format("%Y-%m-%d %H:%M:%S")
        );

        if verbose {
            let names: Vec<&str> = stored.entry.environment.names().collect();
            println!("    Bindings: {}", names.join(", "));
            match &stored.entry.value {
                Some(value) => println!("    Value: {}", value),
                None => println!("    Value: (none)"),
            }
        }

        println!();
    }

    Ok(())
}

/// Show cache and artifact store statistics
fn stats(config: &TangleConfig) -> Result<()> {
    let cache = open_disk_cache(config)?;
    let cache_stats = cache.stats().context("Failed to get cache statistics")?;

    println!("Result Cache Statistics");
    println!();
    println!("Directory: {}", cache_stats.cache_dir.display());
    println!("Total entries: {}", cache_stats.total_entries);
    println!("Total size: {}", format_bytes(cache_stats.total_bytes));

    let store = FilesystemArtifactStore::new(&config.store.dir, config.store.base_url.clone())
        .context("Failed to open artifact store")?;
    let store_stats = store.stats().context("Failed to get store statistics")?;

    println!();
    println!("Artifact Store Statistics");
    println!();
    println!("Directory: {}", store_stats.store_dir.display());
    println!("Total artifacts: {}", store_stats.total_objects);
    println!("Total size: {}", format_bytes(store_stats.total_bytes));

    Ok(())
}
