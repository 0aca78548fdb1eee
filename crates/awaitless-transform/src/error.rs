//! Error types for the lowering
//!
//! Every failure carries the span of the node that caused it. The lowering is
//! deterministic, so none of these are retried: a function either lowers
//! completely or the whole pass fails.

use awaitless_ast::Span;
use thiserror::Error;

/// Errors that can occur while lowering a program
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LowerError {
    /// A construct the lowering cannot express inside an async function
    #[error("Unsupported construct in async function: {construct}")]
    UnsupportedConstruct {
        /// Short name of the construct (e.g. "eval")
        construct: String,
        /// Location of the construct
        span: Span,
    },

    /// `await` used in a function that is not async
    #[error("'await' is only valid inside async functions")]
    AwaitOutsideAsync {
        /// Location of the await expression
        span: Span,
    },

    /// An internal assumption of the lowering did not hold
    #[error("Internal lowering error: {message}")]
    Internal {
        /// What went wrong
        message: String,
        /// Location being lowered when the invariant failed
        span: Span,
    },
}

impl LowerError {
    /// Get the span of the error
    pub fn span(&self) -> Span {
        match self {
            LowerError::UnsupportedConstruct { span, .. }
            | LowerError::AwaitOutsideAsync { span }
            | LowerError::Internal { span, .. } => *span,
        }
    }

    pub(crate) fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        LowerError::UnsupportedConstruct {
            construct: construct.into(),
            span,
        }
    }

    pub(crate) fn internal(message: impl Into<String>, span: Span) -> Self {
        LowerError::Internal {
            message: message.into(),
            span,
        }
    }
}

/// Result type for lowering operations
pub type LowerResult<T> = Result<T, LowerError>;

/// Errors from reading lowering options
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The options object is not valid JSON or has the wrong shape
    #[error("Invalid options: {0}")]
    Json(#[from] serde_json::Error),
}
