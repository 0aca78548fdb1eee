//! AST visitor pattern for traversing the syntax tree
//!
//! This module provides two visitor traits:
//! - [`Visitor`] walks the tree by shared reference, for analyses
//! - [`VisitorMut`] walks the tree by mutable reference, for in-place renames
//!
//! Nested functions are reached through `visit_function`, so an analysis that
//! must stop at a function boundary overrides that one method.
//!
//! # Example
//!
//! ```rust
//! use awaitless_ast::ast::*;
//!
//! struct CountAwaits {
//!     count: usize,
//! }
//!
//! impl Visitor for CountAwaits {
//!     fn visit_expression(&mut self, expr: &Expression) {
//!         if let Expression::Await(_) = expr {
//!             self.count += 1;
//!         }
//!         walk_expression(self, expr);
//!     }
//!
//!     fn visit_function(&mut self, _func: &Function) {
//!         // Awaits in nested functions belong to those functions
//!     }
//! }
//! ```

use super::*;

/// AST visitor trait
///
/// Implement this trait to traverse the AST. Each visit method has a default
/// implementation that calls the corresponding walk function.
pub trait Visitor: Sized {
    fn visit_program(&mut self, program: &Program) {
        walk_program(self, program);
    }

    fn visit_statement(&mut self, stmt: &Statement) {
        walk_statement(self, stmt);
    }

    fn visit_variable_decl(&mut self, decl: &VariableDecl) {
        walk_variable_decl(self, decl);
    }

    fn visit_block_statement(&mut self, block: &BlockStatement) {
        walk_block_statement(self, block);
    }

    fn visit_expression(&mut self, expr: &Expression) {
        walk_expression(self, expr);
    }

    fn visit_function(&mut self, func: &Function) {
        walk_function(self, func);
    }

    fn visit_identifier(&mut self, _id: &Identifier) {
        // Leaf node
    }
}

// ============================================================================
// Walk Functions - Default Traversal Implementations
// ============================================================================

pub fn walk_program<V: Visitor>(visitor: &mut V, program: &Program) {
    for stmt in &program.body {
        visitor.visit_statement(stmt);
    }
}

pub fn walk_statement<V: Visitor>(visitor: &mut V, stmt: &Statement) {
    match stmt {
        Statement::Expression(stmt) => visitor.visit_expression(&stmt.expression),
        Statement::VariableDecl(decl) => visitor.visit_variable_decl(decl),
        Statement::FunctionDecl(decl) => visitor.visit_function(&decl.function),
        Statement::Block(block) => visitor.visit_block_statement(block),
        Statement::If(stmt) => {
            visitor.visit_expression(&stmt.condition);
            visitor.visit_statement(&stmt.then_branch);
            if let Some(else_branch) = &stmt.else_branch {
                visitor.visit_statement(else_branch);
            }
        }
        Statement::While(stmt) => {
            visitor.visit_expression(&stmt.condition);
            visitor.visit_statement(&stmt.body);
        }
        Statement::DoWhile(stmt) => {
            visitor.visit_statement(&stmt.body);
            visitor.visit_expression(&stmt.condition);
        }
        Statement::For(stmt) => {
            match &stmt.init {
                Some(ForInit::VariableDecl(decl)) => visitor.visit_variable_decl(decl),
                Some(ForInit::Expression(expr)) => visitor.visit_expression(expr),
                None => {}
            }
            if let Some(test) = &stmt.test {
                visitor.visit_expression(test);
            }
            if let Some(update) = &stmt.update {
                visitor.visit_expression(update);
            }
            visitor.visit_statement(&stmt.body);
        }
        Statement::ForIn(stmt) => {
            walk_for_head(visitor, &stmt.left);
            visitor.visit_expression(&stmt.right);
            visitor.visit_statement(&stmt.body);
        }
        Statement::ForOf(stmt) => {
            walk_for_head(visitor, &stmt.left);
            visitor.visit_expression(&stmt.right);
            visitor.visit_statement(&stmt.body);
        }
        Statement::Switch(stmt) => {
            visitor.visit_expression(&stmt.discriminant);
            for case in &stmt.cases {
                if let Some(test) = &case.test {
                    visitor.visit_expression(test);
                }
                for s in &case.consequent {
                    visitor.visit_statement(s);
                }
            }
        }
        Statement::Try(stmt) => {
            visitor.visit_block_statement(&stmt.body);
            if let Some(catch) = &stmt.catch_clause {
                if let Some(param) = &catch.param {
                    visitor.visit_identifier(param);
                }
                visitor.visit_block_statement(&catch.body);
            }
            if let Some(finally) = &stmt.finally_clause {
                visitor.visit_block_statement(finally);
            }
        }
        Statement::Labeled(stmt) => visitor.visit_statement(&stmt.body),
        Statement::Return(stmt) => {
            if let Some(value) = &stmt.value {
                visitor.visit_expression(value);
            }
        }
        Statement::Throw(stmt) => visitor.visit_expression(&stmt.value),
        Statement::Break(_) | Statement::Continue(_) => {}
        Statement::Import(decl) => {
            for specifier in &decl.specifiers {
                visitor.visit_identifier(&specifier.local);
            }
        }
        Statement::Empty(_) => {}
    }
}

fn walk_for_head<V: Visitor>(visitor: &mut V, head: &ForHead) {
    match head {
        ForHead::Declaration(_, id) => visitor.visit_identifier(id),
        ForHead::Target(expr) => visitor.visit_expression(expr),
    }
}

pub fn walk_variable_decl<V: Visitor>(visitor: &mut V, decl: &VariableDecl) {
    for declarator in &decl.declarations {
        visitor.visit_identifier(&declarator.id);
        if let Some(init) = &declarator.init {
            visitor.visit_expression(init);
        }
    }
}

pub fn walk_block_statement<V: Visitor>(visitor: &mut V, block: &BlockStatement) {
    for stmt in &block.statements {
        visitor.visit_statement(stmt);
    }
}

pub fn walk_function<V: Visitor>(visitor: &mut V, func: &Function) {
    if let Some(name) = &func.name {
        visitor.visit_identifier(name);
    }
    for param in &func.params {
        visitor.visit_identifier(param);
    }
    visitor.visit_block_statement(&func.body);
}

pub fn walk_expression<V: Visitor>(visitor: &mut V, expr: &Expression) {
    match expr {
        Expression::Identifier(id) => visitor.visit_identifier(id),
        Expression::This(_) | Expression::Literal(_) => {}
        Expression::Array(array) => {
            for element in &array.elements {
                visitor.visit_expression(element);
            }
        }
        Expression::Object(object) => {
            for prop in &object.properties {
                if let PropertyKey::Computed(key) = &prop.key {
                    visitor.visit_expression(key);
                }
                visitor.visit_expression(&prop.value);
            }
        }
        Expression::Function(func) => visitor.visit_function(func),
        Expression::Unary(unary) => visitor.visit_expression(&unary.operand),
        Expression::Update(update) => visitor.visit_expression(&update.target),
        Expression::Binary(binary) => {
            visitor.visit_expression(&binary.left);
            visitor.visit_expression(&binary.right);
        }
        Expression::Logical(logical) => {
            visitor.visit_expression(&logical.left);
            visitor.visit_expression(&logical.right);
        }
        Expression::Conditional(cond) => {
            visitor.visit_expression(&cond.test);
            visitor.visit_expression(&cond.consequent);
            visitor.visit_expression(&cond.alternate);
        }
        Expression::Assignment(assign) => {
            visitor.visit_expression(&assign.left);
            visitor.visit_expression(&assign.right);
        }
        Expression::Sequence(seq) => {
            for e in &seq.expressions {
                visitor.visit_expression(e);
            }
        }
        Expression::Call(call) => {
            visitor.visit_expression(&call.callee);
            for arg in &call.arguments {
                visitor.visit_expression(arg);
            }
        }
        Expression::New(new) => {
            visitor.visit_expression(&new.callee);
            for arg in &new.arguments {
                visitor.visit_expression(arg);
            }
        }
        Expression::Member(member) => {
            visitor.visit_expression(&member.object);
            if let MemberProperty::Computed(property) = &member.property {
                visitor.visit_expression(property);
            }
        }
        Expression::Await(await_expr) => visitor.visit_expression(&await_expr.argument),
    }
}

// ============================================================================
// Mutable Visitor
// ============================================================================

/// Mutable AST visitor
///
/// Same traversal order as [`Visitor`]. Property names of static member
/// accesses and object keys are not reported as identifiers.
pub trait VisitorMut: Sized {
    fn visit_statement_mut(&mut self, stmt: &mut Statement) {
        walk_statement_mut(self, stmt);
    }

    fn visit_expression_mut(&mut self, expr: &mut Expression) {
        walk_expression_mut(self, expr);
    }

    fn visit_function_mut(&mut self, func: &mut Function) {
        walk_function_mut(self, func);
    }

    fn visit_identifier_mut(&mut self, _id: &mut Identifier) {}
}

pub fn walk_statements_mut<V: VisitorMut>(visitor: &mut V, stmts: &mut [Statement]) {
    for stmt in stmts {
        visitor.visit_statement_mut(stmt);
    }
}

pub fn walk_statement_mut<V: VisitorMut>(visitor: &mut V, stmt: &mut Statement) {
    match stmt {
        Statement::Expression(stmt) => visitor.visit_expression_mut(&mut stmt.expression),
        Statement::VariableDecl(decl) => walk_variable_decl_mut(visitor, decl),
        Statement::FunctionDecl(decl) => visitor.visit_function_mut(&mut decl.function),
        Statement::Block(block) => walk_statements_mut(visitor, &mut block.statements),
        Statement::If(stmt) => {
            visitor.visit_expression_mut(&mut stmt.condition);
            visitor.visit_statement_mut(&mut stmt.then_branch);
            if let Some(else_branch) = &mut stmt.else_branch {
                visitor.visit_statement_mut(else_branch);
            }
        }
        Statement::While(stmt) => {
            visitor.visit_expression_mut(&mut stmt.condition);
            visitor.visit_statement_mut(&mut stmt.body);
        }
        Statement::DoWhile(stmt) => {
            visitor.visit_statement_mut(&mut stmt.body);
            visitor.visit_expression_mut(&mut stmt.condition);
        }
        Statement::For(stmt) => {
            match &mut stmt.init {
                Some(ForInit::VariableDecl(decl)) => walk_variable_decl_mut(visitor, decl),
                Some(ForInit::Expression(expr)) => visitor.visit_expression_mut(expr),
                None => {}
            }
            if let Some(test) = &mut stmt.test {
                visitor.visit_expression_mut(test);
            }
            if let Some(update) = &mut stmt.update {
                visitor.visit_expression_mut(update);
            }
            visitor.visit_statement_mut(&mut stmt.body);
        }
        Statement::ForIn(stmt) => {
            walk_for_head_mut(visitor, &mut stmt.left);
            visitor.visit_expression_mut(&mut stmt.right);
            visitor.visit_statement_mut(&mut stmt.body);
        }
        Statement::ForOf(stmt) => {
            walk_for_head_mut(visitor, &mut stmt.left);
            visitor.visit_expression_mut(&mut stmt.right);
            visitor.visit_statement_mut(&mut stmt.body);
        }
        Statement::Switch(stmt) => {
            visitor.visit_expression_mut(&mut stmt.discriminant);
            for case in &mut stmt.cases {
                if let Some(test) = &mut case.test {
                    visitor.visit_expression_mut(test);
                }
                walk_statements_mut(visitor, &mut case.consequent);
            }
        }
        Statement::Try(stmt) => {
            walk_statements_mut(visitor, &mut stmt.body.statements);
            if let Some(catch) = &mut stmt.catch_clause {
                if let Some(param) = &mut catch.param {
                    visitor.visit_identifier_mut(param);
                }
                walk_statements_mut(visitor, &mut catch.body.statements);
            }
            if let Some(finally) = &mut stmt.finally_clause {
                walk_statements_mut(visitor, &mut finally.statements);
            }
        }
        Statement::Labeled(stmt) => visitor.visit_statement_mut(&mut stmt.body),
        Statement::Return(stmt) => {
            if let Some(value) = &mut stmt.value {
                visitor.visit_expression_mut(value);
            }
        }
        Statement::Throw(stmt) => visitor.visit_expression_mut(&mut stmt.value),
        Statement::Break(_)
        | Statement::Continue(_)
        | Statement::Import(_)
        | Statement::Empty(_) => {}
    }
}

fn walk_for_head_mut<V: VisitorMut>(visitor: &mut V, head: &mut ForHead) {
    match head {
        ForHead::Declaration(_, id) => visitor.visit_identifier_mut(id),
        ForHead::Target(expr) => visitor.visit_expression_mut(expr),
    }
}

pub fn walk_variable_decl_mut<V: VisitorMut>(visitor: &mut V, decl: &mut VariableDecl) {
    for declarator in &mut decl.declarations {
        visitor.visit_identifier_mut(&mut declarator.id);
        if let Some(init) = &mut declarator.init {
            visitor.visit_expression_mut(init);
        }
    }
}

pub fn walk_function_mut<V: VisitorMut>(visitor: &mut V, func: &mut Function) {
    for param in &mut func.params {
        visitor.visit_identifier_mut(param);
    }
    walk_statements_mut(visitor, &mut func.body.statements);
}

pub fn walk_expression_mut<V: VisitorMut>(visitor: &mut V, expr: &mut Expression) {
    match expr {
        Expression::Identifier(id) => visitor.visit_identifier_mut(id),
        Expression::This(_) | Expression::Literal(_) => {}
        Expression::Array(array) => {
            for element in &mut array.elements {
                visitor.visit_expression_mut(element);
            }
        }
        Expression::Object(object) => {
            for prop in &mut object.properties {
                if let PropertyKey::Computed(key) = &mut prop.key {
                    visitor.visit_expression_mut(key);
                }
                visitor.visit_expression_mut(&mut prop.value);
            }
        }
        Expression::Function(func) => visitor.visit_function_mut(func),
        Expression::Unary(unary) => visitor.visit_expression_mut(&mut unary.operand),
        Expression::Update(update) => visitor.visit_expression_mut(&mut update.target),
        Expression::Binary(binary) => {
            visitor.visit_expression_mut(&mut binary.left);
            visitor.visit_expression_mut(&mut binary.right);
        }
        Expression::Logical(logical) => {
            visitor.visit_expression_mut(&mut logical.left);
            visitor.visit_expression_mut(&mut logical.right);
        }
        Expression::Conditional(cond) => {
            visitor.visit_expression_mut(&mut cond.test);
            visitor.visit_expression_mut(&mut cond.consequent);
            visitor.visit_expression_mut(&mut cond.alternate);
        }
        Expression::Assignment(assign) => {
            visitor.visit_expression_mut(&mut assign.left);
            visitor.visit_expression_mut(&mut assign.right);
        }
        Expression::Sequence(seq) => {
            for e in &mut seq.expressions {
                visitor.visit_expression_mut(e);
            }
        }
        Expression::Call(call) => {
            visitor.visit_expression_mut(&mut call.callee);
            for arg in &mut call.arguments {
                visitor.visit_expression_mut(arg);
            }
        }
        Expression::New(new) => {
            visitor.visit_expression_mut(&mut new.callee);
            for arg in &mut new.arguments {
                visitor.visit_expression_mut(arg);
            }
        }
        Expression::Member(member) => {
            visitor.visit_expression_mut(&mut member.object);
            if let MemberProperty::Computed(property) = &mut member.property {
                visitor.visit_expression_mut(property);
            }
        }
        Expression::Await(await_expr) => visitor.visit_expression_mut(&mut await_expr.argument),
    }
}
