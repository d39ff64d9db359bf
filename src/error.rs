use std::path::PathBuf;
use thiserror::Error;

use crate::cache::CacheKey;
use crate::engine::EvaluationError;

/// Errors that abort a render pass.
///
/// A cache miss or a result with no matching renderer are normal control
/// flow and never show up here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A fragment failed to run. Nothing after it can be trusted.
    #[error("Block {position} ({key}) failed to execute: {source}")]
    Execution {
        position: usize,
        key: CacheKey,
        #[source]
        source: EvaluationError,
    },

    /// The artifact store could not be reached or written.
    #[error("Artifact store unavailable while storing {key}: {source:#}")]
    Storage {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The result cache could not be read or written.
    #[error("Result cache failed for {key}: {source:#}")]
    Cache {
        key: CacheKey,
        #[source]
        source: anyhow::Error,
    },

    /// A renderer accepted a value but could not turn it into bytes.
    #[error("Renderer `{renderer}` failed on block {position}: {message}")]
    Render {
        renderer: String,
        position: usize,
        message: String,
    },

    /// The output path resolves to the document being rendered.
    #[error("Refusing to overwrite the input document {}", .path.display())]
    OutputIsInput { path: PathBuf },

    /// Reading the document or writing the output failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
