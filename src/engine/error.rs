use std::time::Duration;
use thiserror::Error;

/// Errors raised while evaluating a single fragment
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The engine itself could not be set up.
    #[error("Failed to initialize {engine} runtime: {message}")]
    Runtime { engine: String, message: String },

    /// The fragment threw or failed to parse.
    #[error("Fragment raised an exception: {message}")]
    Exception {
        message: String,
        stack: Option<String>,
    },

    /// A binding holds a number JSON cannot represent.
    #[error("Binding `{binding}` holds {value}, which cannot be carried between blocks")]
    NonFinite { binding: String, value: String },

    /// The fragment ran past the configured wall-clock limit.
    #[error("Fragment exceeded the {}s execution limit", .limit.as_secs_f64())]
    Timeout { limit: Duration },
}
