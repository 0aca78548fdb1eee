//! Runtime error types.

/// Failures of the evaluator itself
///
/// Exceptions thrown by the evaluated program are JavaScript values and stay
/// inside the evaluator; they only become a [`RuntimeError`] when nothing
/// catches them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// A construct the evaluator does not run (`await`, async functions,
    /// generators, imports)
    #[error("Unsupported construct: {0}")]
    Unsupported(String),

    /// An exception reached the top level of a script
    #[error("Uncaught exception: {0}")]
    Uncaught(String),

    /// The program ran more steps than the configured limit
    #[error("Step limit of {0} exhausted")]
    StepLimit(u64),

    /// `break` or `continue` escaped a function body
    #[error("Invalid completion: {0}")]
    InvalidCompletion(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
