// Library interface for tangle
// The binary and the integration tests both go through these modules

pub mod cache;
pub mod cli;
pub mod cli_utils;
pub mod commands;
pub mod config;
pub mod config_discovery;
pub mod document;
pub mod engine;
pub mod error;
pub mod logging;
pub mod merger;
pub mod pipeline;
pub mod render;
pub mod storage;
pub mod watch;

// Re-export commonly used types
pub use cache::{CacheKey, KeyPolicy, ResultCache};
pub use config::TangleConfig;
pub use document::{extract_all, CodeFragment, ExtractedBlock};
pub use engine::{Environment, Evaluation, EvaluationError, Evaluator, QuickJsEvaluator};
pub use error::PipelineError;
pub use pipeline::{PassReport, Pipeline, RenderOutput};
pub use render::{Renderer, RendererRegistry};
pub use storage::{ArtifactStore, FilesystemArtifactStore, MemoryArtifactStore};
pub use watch::WatchLoop;
