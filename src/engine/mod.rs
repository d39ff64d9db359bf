//! Fragment evaluation
//!
//! The rest of the pipeline only sees the [`Evaluator`] trait: hand it a
//! fragment's normalized source plus the environment left by the previous
//! fragment, get back the new environment and the designated result value.
//! [`QuickJsEvaluator`] is the strategy shipped with the crate.

pub mod environment;
pub mod error;
pub mod quickjs;

pub use environment::{Environment, Evaluation, RESULT_BINDING};
pub use error::EvaluationError;
pub use quickjs::QuickJsEvaluator;

/// Executes one fragment against a snapshot of program state.
///
/// Implementations must never mutate `environment` in place; the returned
/// [`Evaluation`] carries a fresh snapshot.
pub trait Evaluator: Send + Sync {
    /// Short engine name used in logs and errors
    fn name(&self) -> &str;

    /// Run `source` as a whole program on top of `environment`
    fn evaluate(
        &self,
        source: &str,
        environment: &Environment,
    ) -> Result<Evaluation, EvaluationError>;
}
