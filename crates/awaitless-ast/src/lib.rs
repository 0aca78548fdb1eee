//! Awaitless syntax tree
//!
//! The tree contract shared by the lowering and the reference runtime:
//! node types, builders, traversal, scope queries, fresh names and the code
//! emitter. There is no parser; trees are built with [`build`].

pub mod ast;
pub mod build;
pub mod codegen;
pub mod names;
pub mod scope;
pub mod span;

pub use ast::{Expression, Function, Identifier, Program, Statement};
pub use codegen::{print_expression, print_program, print_statement};
pub use names::NameGenerator;
pub use scope::FunctionScope;
pub use span::Span;
