//! Abstract Syntax Tree (AST) for the async lowering.
//!
//! This module defines the tree the lowering consumes and produces:
//! - Program structure
//! - Statements (declarations, control flow, etc.)
//! - Expressions (literals, operators, calls, functions, `await`)
//!
//! Every node carries a `Span`. Nodes created by a rewrite carry
//! `Span::default()`.

use crate::span::Span;

pub mod statement;
pub mod expression;
pub mod visitor;

pub use statement::*;
pub use expression::*;
pub use visitor::*;

/// Root node: one output unit
///
/// # Example
/// ```
/// use awaitless_ast::ast::*;
/// use awaitless_ast::Span;
///
/// let program = Program::new(vec![], Span::default());
/// assert!(program.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Top-level statements
    pub body: Vec<Statement>,

    /// Span covering the entire unit
    pub span: Span,
}

impl Program {
    /// Create a new program
    pub fn new(body: Vec<Statement>, span: Span) -> Self {
        Self { body, span }
    }

    /// Check if the program is empty
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Get the number of top-level statements
    pub fn len(&self) -> usize {
        self.body.len()
    }
}

/// Identifier
///
/// Represents a name for a variable, function, label or property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

impl Identifier {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }

    /// Identifier created by a rewrite
    pub fn synthetic(name: impl Into<String>) -> Self {
        Self::new(name, Span::default())
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}
