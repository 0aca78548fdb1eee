//! Statement AST nodes
//!
//! This module defines all statement kinds the lowering understands:
//! - Variable declarations (var, let, const)
//! - Function declarations
//! - Control flow statements (if, loops, switch, try, labels)
//! - Jumps (return, break, continue, throw)
//! - Named imports (only produced for shared helpers)

use super::*;
use crate::span::Span;

/// Top-level or block-level statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Expression statement (e.g., function call)
    Expression(ExpressionStatement),

    /// Variable declaration: var/let/const
    VariableDecl(VariableDecl),

    /// Function declaration
    FunctionDecl(FunctionDecl),

    /// Block statement: { ... }
    Block(BlockStatement),

    /// If statement
    If(IfStatement),

    /// While loop
    While(WhileStatement),

    /// Do-while loop
    DoWhile(DoWhileStatement),

    /// C-style for loop
    For(ForStatement),

    /// For-in loop
    ForIn(ForInStatement),

    /// For-of loop, including for-await-of
    ForOf(ForOfStatement),

    /// Switch statement
    Switch(SwitchStatement),

    /// Try-catch-finally
    Try(TryStatement),

    /// Labeled statement: label: body
    Labeled(LabeledStatement),

    /// Return statement
    Return(ReturnStatement),

    /// Break statement
    Break(BreakStatement),

    /// Continue statement
    Continue(ContinueStatement),

    /// Throw statement
    Throw(ThrowStatement),

    /// Import statement
    Import(ImportDecl),

    /// Empty statement (;)
    Empty(Span),
}

impl Statement {
    /// Get the span of this statement
    pub fn span(&self) -> &Span {
        match self {
            Statement::Expression(s) => &s.span,
            Statement::VariableDecl(s) => &s.span,
            Statement::FunctionDecl(s) => &s.span,
            Statement::Block(s) => &s.span,
            Statement::If(s) => &s.span,
            Statement::While(s) => &s.span,
            Statement::DoWhile(s) => &s.span,
            Statement::For(s) => &s.span,
            Statement::ForIn(s) => &s.span,
            Statement::ForOf(s) => &s.span,
            Statement::Switch(s) => &s.span,
            Statement::Try(s) => &s.span,
            Statement::Labeled(s) => &s.span,
            Statement::Return(s) => &s.span,
            Statement::Break(s) => &s.span,
            Statement::Continue(s) => &s.span,
            Statement::Throw(s) => &s.span,
            Statement::Import(s) => &s.span,
            Statement::Empty(span) => span,
        }
    }

    /// Check if this statement is a loop that `continue` can target
    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            Statement::While(_)
                | Statement::DoWhile(_)
                | Statement::For(_)
                | Statement::ForIn(_)
                | Statement::ForOf(_)
        )
    }

    /// Check if this statement declares a block-scoped name
    pub fn is_lexical_declaration(&self) -> bool {
        match self {
            Statement::VariableDecl(decl) => decl.kind != VariableKind::Var,
            Statement::FunctionDecl(_) => true,
            _ => false,
        }
    }
}

// ============================================================================
// Variable Declarations
// ============================================================================

/// Variable declaration: var x = 1, y;
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub kind: VariableKind,
    pub declarations: Vec<VariableDeclarator>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Var,
    Let,
    Const,
}

impl VariableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableKind::Var => "var",
            VariableKind::Let => "let",
            VariableKind::Const => "const",
        }
    }
}

/// Single binding of a declaration
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclarator {
    pub id: Identifier,
    pub init: Option<Expression>,
    pub span: Span,
}

// ============================================================================
// Function Declarations
// ============================================================================

/// Function declaration: function foo(x) { ... }
///
/// `function.name` is always set for a declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub function: Function,
    pub span: Span,
}

impl FunctionDecl {
    /// Declared name, empty for a malformed anonymous declaration
    pub fn name(&self) -> &str {
        self.function
            .name
            .as_ref()
            .map(|id| id.name.as_str())
            .unwrap_or("")
    }
}

// ============================================================================
// Expression Statements
// ============================================================================

/// Expression statement: foo();
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    pub expression: Expression,
    pub span: Span,
}

// ============================================================================
// Control Flow
// ============================================================================

/// If statement: if (cond) { ... } else { ... }
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub condition: Expression,
    pub then_branch: Box<Statement>,
    pub else_branch: Option<Box<Statement>>,
    pub span: Span,
}

/// While loop: while (cond) { ... }
#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    pub condition: Expression,
    pub body: Box<Statement>,
    pub span: Span,
}

/// Do-while loop: do { ... } while (cond);
#[derive(Debug, Clone, PartialEq)]
pub struct DoWhileStatement {
    pub body: Box<Statement>,
    pub condition: Expression,
    pub span: Span,
}

/// For loop: for (init; test; update) { ... }
#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    pub init: Option<ForInit>,
    pub test: Option<Expression>,
    pub update: Option<Expression>,
    pub body: Box<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    VariableDecl(VariableDecl),
    Expression(Expression),
}

/// For-in loop: for (k in obj) { ... }
#[derive(Debug, Clone, PartialEq)]
pub struct ForInStatement {
    pub left: ForHead,
    pub right: Expression,
    pub body: Box<Statement>,
    pub span: Span,
}

/// For-of loop: for (x of items) { ... } / for await (x of items) { ... }
#[derive(Debug, Clone, PartialEq)]
pub struct ForOfStatement {
    pub left: ForHead,
    pub right: Expression,
    pub body: Box<Statement>,
    pub is_await: bool,
    pub span: Span,
}

/// Left side of a for-in / for-of head
#[derive(Debug, Clone, PartialEq)]
pub enum ForHead {
    /// `let x`, `const x` or `var x` (single declarator, no initializer)
    Declaration(VariableKind, Identifier),
    /// An assignment target: identifier or member expression
    Target(Expression),
}

/// Switch statement
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStatement {
    pub discriminant: Expression,
    pub cases: Vec<SwitchCase>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// None for the default case
    pub test: Option<Expression>,
    pub consequent: Vec<Statement>,
    pub span: Span,
}

/// Try-catch-finally
#[derive(Debug, Clone, PartialEq)]
pub struct TryStatement {
    pub body: BlockStatement,
    pub catch_clause: Option<CatchClause>,
    pub finally_clause: Option<BlockStatement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Option<Identifier>,
    pub body: BlockStatement,
    pub span: Span,
}

/// Labeled statement: outer: for (...) { ... }
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledStatement {
    pub label: Identifier,
    pub body: Box<Statement>,
    pub span: Span,
}

/// Return statement
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatement {
    pub value: Option<Expression>,
    pub span: Span,
}

/// Break statement
#[derive(Debug, Clone, PartialEq)]
pub struct BreakStatement {
    pub label: Option<Identifier>,
    pub span: Span,
}

/// Continue statement
#[derive(Debug, Clone, PartialEq)]
pub struct ContinueStatement {
    pub label: Option<Identifier>,
    pub span: Span,
}

/// Throw statement
#[derive(Debug, Clone, PartialEq)]
pub struct ThrowStatement {
    pub value: Expression,
    pub span: Span,
}

/// Block statement: { ... }
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
    pub span: Span,
}

impl BlockStatement {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            statements,
            span: Span::default(),
        }
    }
}

// ============================================================================
// Imports
// ============================================================================

/// Named import: import { a, b as c } from "module";
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub specifiers: Vec<ImportSpecifier>,
    pub source: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpecifier {
    /// Name exported by the module
    pub imported: Identifier,
    /// Local binding
    pub local: Identifier,
}
