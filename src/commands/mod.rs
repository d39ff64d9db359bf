pub mod cache;
pub mod render;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::cache::{DiskCache, MemoryCache, ResultCache};
use crate::config::TangleConfig;
use crate::engine::QuickJsEvaluator;
use crate::pipeline::Pipeline;
use crate::render::RendererRegistry;
use crate::storage::FilesystemArtifactStore;

/// Result cache selected by `cache.persist`
fn open_cache(config: &TangleConfig) -> Result<Box<dyn ResultCache>> {
    if config.cache.persist {
        let cache = DiskCache::new(&config.cache.dir).context("Failed to open result cache")?;
        Ok(Box::new(cache))
    } else {
        Ok(Box::new(MemoryCache::new()))
    }
}

fn evaluator(config: &TangleConfig) -> Result<QuickJsEvaluator> {
    let mut evaluator = QuickJsEvaluator::new();
    if let Some(timeout) = config.engine_timeout()? {
        evaluator = evaluator.with_timeout(timeout);
    }
    if let Some(limit) = config.engine_memory_limit()? {
        evaluator = evaluator.with_memory_limit(limit);
    }
    Ok(evaluator)
}

/// Assemble a pipeline from a merged, validated configuration
pub fn build_pipeline(config: &TangleConfig) -> Result<Pipeline> {
    let store = FilesystemArtifactStore::new(&config.store.dir, config.store.base_url.clone())
        .context("Failed to open artifact store")?;

    Ok(Pipeline::new(
        Box::new(evaluator(config)?),
        open_cache(config)?,
        RendererRegistry::with_defaults(),
        Arc::new(store),
    )
    .with_key_policy(config.key_policy()?)
    .with_bootstrap(config.engine.bootstrap.clone()))
}
