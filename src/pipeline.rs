//! One render pass over a document
//!
//! The pipeline walks every executable fragment in order, serving each one
//! from the result cache when its key is known and evaluating it otherwise.
//! Results are turned into markup and spliced back right after the fragment
//! that produced them. Text outside fragments is copied through unchanged.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheKey, KeyChain, KeyPolicy, ResultCache};
use crate::document::{extract_all, ExtractedBlock};
use crate::engine::{Environment, Evaluation, Evaluator};
use crate::error::PipelineError;
use crate::logging::{operations, services, status};
use crate::render::{self_embed, text_fallback, RendererRegistry};
use crate::storage::{make_world_readable, ArtifactStore};

/// Counters for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub blocks: usize,
    pub cache_hits: usize,
    pub executions: usize,
    pub artifacts_stored: usize,
    pub artifacts_reused: usize,
    pub fallbacks: usize,
    pub self_embeds: usize,
}

/// Result of rendering a document in memory
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub document: String,
    pub report: PassReport,
}

/// Cache state of one block, as reported by [`Pipeline::status`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStatus {
    pub position: usize,
    pub language: String,
    pub key: CacheKey,
    pub cached: bool,
}

/// The orchestrator: extraction, keying, evaluation, rendering and splicing
pub struct Pipeline {
    evaluator: Box<dyn Evaluator>,
    cache: Box<dyn ResultCache>,
    renderers: RendererRegistry,
    store: Arc<dyn ArtifactStore>,
    key_policy: KeyPolicy,
    bootstrap: Environment,
}

impl Pipeline {
    pub fn new(
        evaluator: Box<dyn Evaluator>,
        cache: Box<dyn ResultCache>,
        renderers: RendererRegistry,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            evaluator,
            cache,
            renderers,
            store,
            key_policy: KeyPolicy::default(),
            bootstrap: Environment::new(),
        }
    }

    pub fn with_key_policy(mut self, policy: KeyPolicy) -> Self {
        self.key_policy = policy;
        self
    }

    /// Bindings every document starts from
    pub fn with_bootstrap(mut self, bootstrap: Environment) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn cache(&self) -> &dyn ResultCache {
        self.cache.as_ref()
    }

    pub fn key_policy(&self) -> KeyPolicy {
        self.key_policy
    }

    /// A non-empty bootstrap seeds the chain, so changing it invalidates every block
    fn key_chain(&self) -> KeyChain {
        if self.bootstrap.is_empty() {
            KeyChain::new(self.key_policy)
        } else {
            KeyChain::with_seed(self.key_policy, self.bootstrap.digest())
        }
    }

    /// Render `document`, returning the new text.
    ///
    /// The first failing fragment aborts the pass. Fragments before it stay
    /// cached; the failing one is never cached.
    pub fn render(&mut self, document: &str) -> Result<RenderOutput, PipelineError> {
        let started = Instant::now();
        let mut report = PassReport::default();
        let mut output = String::with_capacity(document.len());
        let mut cursor = 0;

        let mut chain = self.key_chain();
        let mut environment = self.bootstrap.clone();

        for block in extract_all(document) {
            report.blocks += 1;
            let key = chain.next_key(&block);

            let evaluation = self.evaluate_cached(&block, key, &environment, &mut report)?;

            output.push_str(&document[cursor..block.start]);
            output.push_str(&block.fragment.markdown());
            if let Some(value) = &evaluation.value {
                output.push_str(&self.embed(&block, key, value, &mut report)?);
            }
            cursor = block.end;

            environment = evaluation.environment;
        }

        if report.blocks == 0 {
            debug!(service = services::PIPELINE, "No executable blocks found");
            return Ok(RenderOutput {
                document: document.to_string(),
                report,
            });
        }

        output.push_str(&document[cursor..]);

        info!(
            service = services::PIPELINE,
            operation = operations::RENDER,
            status = status::SUCCESS,
            blocks = report.blocks,
            cache_hits = report.cache_hits,
            executions = report.executions,
            artifacts_stored = report.artifacts_stored,
            "Rendered document in {:.2?}",
            started.elapsed()
        );

        Ok(RenderOutput {
            document: output,
            report,
        })
    }

    /// Render `input` into `output`.
    ///
    /// `output` may be an existing directory, in which case the input's file
    /// name is used inside it. Nothing is written unless the whole pass
    /// succeeds, and the write itself is atomic.
    pub fn render_file(&mut self, input: &Path, output: &Path) -> Result<PassReport, PipelineError> {
        let document = std::fs::read_to_string(input).map_err(|source| PipelineError::Io {
            path: input.to_path_buf(),
            source,
        })?;

        let target = resolve_output_path(input, output)?;
        let rendered = self.render(&document)?;

        write_atomic(&target, &rendered.document)?;
        info!(
            service = services::PIPELINE,
            "Wrote {} ({} blocks)",
            target.display(),
            rendered.report.blocks
        );

        Ok(rendered.report)
    }

    /// Key and cache state of every block in `document`, without evaluating anything
    pub fn status(&self, document: &str) -> Result<Vec<BlockStatus>, PipelineError> {
        let mut chain = self.key_chain();
        extract_all(document)
            .map(|block| {
                let key = chain.next_key(&block);
                let cached = self
                    .cache
                    .contains(&key)
                    .map_err(|source| PipelineError::Cache { key, source })?;
                Ok(BlockStatus {
                    position: block.position,
                    language: block.fragment.language().to_string(),
                    key,
                    cached,
                })
            })
            .collect()
    }

    fn evaluate_cached(
        &mut self,
        block: &ExtractedBlock,
        key: CacheKey,
        environment: &Environment,
        report: &mut PassReport,
    ) -> Result<Evaluation, PipelineError> {
        let cached = self
            .cache
            .get(&key)
            .map_err(|source| PipelineError::Cache { key, source })?;

        if let Some(entry) = cached {
            report.cache_hits += 1;
            info!(
                service = services::BLOCK_CACHE,
                operation = operations::GET,
                status = status::HIT,
                position = block.position,
                key = %key,
                "Pulled block from cache"
            );
            return Ok(entry.into());
        }

        info!(
            service = services::BLOCK_CACHE,
            operation = operations::GET,
            status = status::MISS,
            position = block.position,
            key = %key,
            "Computing block"
        );

        let started = Instant::now();
        let evaluation = self
            .evaluator
            .evaluate(block.fragment.normalized(), environment)
            .map_err(|source| {
                warn!(
                    service = services::PIPELINE,
                    operation = operations::EVALUATE,
                    status = status::ERROR,
                    position = block.position,
                    key = %key,
                    "{}",
                    source
                );
                PipelineError::Execution {
                    position: block.position,
                    key,
                    source,
                }
            })?;
        report.executions += 1;
        debug!(
            service = services::PIPELINE,
            operation = operations::EVALUATE,
            engine = self.evaluator.name(),
            position = block.position,
            bindings = evaluation.environment.len(),
            "Evaluated in {:.2?}",
            started.elapsed()
        );

        self.cache
            .put(key, CacheEntry::from(evaluation.clone()))
            .map_err(|source| PipelineError::Cache { key, source })?;
        debug!(
            service = services::BLOCK_CACHE,
            operation = operations::PUT,
            status = status::SUCCESS,
            key = %key,
            "Cached block"
        );

        Ok(evaluation)
    }

    /// Markup for a present result value
    fn embed(
        &self,
        block: &ExtractedBlock,
        key: CacheKey,
        value: &Value,
        report: &mut PassReport,
    ) -> Result<String, PipelineError> {
        if let Some(markup) = self_embed(value) {
            report.self_embeds += 1;
            return Ok(markup);
        }

        let Some(renderer) = self.renderers.find(value) else {
            report.fallbacks += 1;
            return Ok(text_fallback(value));
        };

        let artifact_key = key.to_hex();
        let storage_error = |source| PipelineError::Storage {
            key: artifact_key.clone(),
            source,
        };

        let url = if self.store.key_exists(&artifact_key).map_err(storage_error)? {
            report.artifacts_reused += 1;
            debug!(
                service = services::ARTIFACT_STORE,
                status = status::EXISTS,
                key = %artifact_key,
                "Reusing stored artifact"
            );
            self.store.url_for(&artifact_key)
        } else {
            let bytes = renderer
                .render(value)
                .map_err(|e| PipelineError::Render {
                    renderer: renderer.name().to_string(),
                    position: block.position,
                    message: format!("{:#}", e),
                })?;
            let content_type = renderer.content_type(value);
            let url = self
                .store
                .store(&artifact_key, &bytes, &content_type)
                .map_err(storage_error)?;
            report.artifacts_stored += 1;
            url
        };

        Ok(renderer.embed(&url))
    }
}

/// Where `render_file` writes: inside `output` when it is an existing directory.
///
/// A target that is the input itself is refused.
pub fn resolve_output_path(input: &Path, output: &Path) -> Result<PathBuf, PipelineError> {
    let target = match input.file_name() {
        Some(name) if output.is_dir() => output.join(name),
        _ => output.to_path_buf(),
    };

    if same_file(input, &target) {
        return Err(PipelineError::OutputIsInput { path: target });
    }
    Ok(target)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), PipelineError> {
    let io_error = |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_error)?;
    temp.write_all(contents.as_bytes()).map_err(io_error)?;
    make_world_readable(temp.as_file()).map_err(io_error)?;
    temp.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}
