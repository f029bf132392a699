//! Runtime error types for template execution.

pub use stencil_types::EvalError;

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;
