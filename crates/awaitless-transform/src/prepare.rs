//! Per-function preparation before lowering
//!
//! - reject bodies the lowering cannot preserve (direct `eval`)
//! - capture `this` and `arguments` into variables, since the body moves
//!   into synthetic closures that have their own
//! - hoist every `var` to a single declaration at the top of the body, so
//!   the names stay shared by all the closures the body is split into

use awaitless_ast::ast::*;
use awaitless_ast::build::*;
use awaitless_ast::scope::var_declared_names;
use awaitless_ast::{FunctionScope, NameGenerator};
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::analysis::find_eval;
use crate::error::{LowerError, LowerResult};

/// A function body ready for lowering
#[derive(Debug)]
pub(crate) struct Prepared {
    /// `var _this = this, _arguments = arguments;`, kept in front of
    /// everything the lowering produces
    pub captures: Option<Statement>,
    /// Names bound by `captures`
    pub captured: Vec<String>,
    pub body: Vec<Statement>,
}

pub(crate) fn prepare(
    params: &[Identifier],
    body: Vec<Statement>,
    is_arrow: bool,
    names: &mut NameGenerator,
) -> LowerResult<Prepared> {
    if let Some(span) = find_eval(&body) {
        return Err(LowerError::unsupported("eval", span));
    }

    let mut body = body;
    let scope = FunctionScope::analyze_body(params, &body, is_arrow);
    // Captured even in arrows: the body moves into non-arrow closures
    let mut rename = Captures::default();
    if scope.uses_this() {
        rename.this = Some(names.fresh("this"));
    }
    if scope.uses_arguments() {
        rename.arguments = Some(names.fresh("arguments"));
    }

    let mut declarators = Vec::new();
    let mut captured = Vec::new();
    if let Some(this_id) = &rename.this {
        declarators.push(declarator(&this_id.name, Some(this())));
        captured.push(this_id.name.clone());
    }
    if let Some(arguments_id) = &rename.arguments {
        declarators.push(declarator(&arguments_id.name, Some(ident("arguments"))));
        captured.push(arguments_id.name.clone());
    }
    if !declarators.is_empty() {
        trace!(captured = ?captured, "capturing this/arguments");
        walk_statements_mut(&mut rename, &mut body);
    }
    let captures = (!declarators.is_empty()).then(|| declaration(VariableKind::Var, declarators));

    Ok(Prepared {
        captures,
        captured,
        body: hoist_vars(body),
    })
}

// ============================================================================
// this / arguments
// ============================================================================

#[derive(Default)]
struct Captures {
    this: Option<Identifier>,
    arguments: Option<Identifier>,
}

impl VisitorMut for Captures {
    fn visit_expression_mut(&mut self, expr: &mut Expression) {
        if let Expression::This(span) = expr {
            if let Some(this_id) = &self.this {
                *expr = Expression::Identifier(Identifier::new(this_id.name.clone(), *span));
            }
            return;
        }
        walk_expression_mut(self, expr);
    }

    fn visit_identifier_mut(&mut self, id: &mut Identifier) {
        if id.name == "arguments" {
            if let Some(arguments_id) = &self.arguments {
                id.name = arguments_id.name.clone();
            }
        }
    }

    fn visit_function_mut(&mut self, func: &mut Function) {
        // Only arrows see the enclosing `this` and `arguments`
        if func.is_arrow {
            walk_function_mut(self, func);
        }
    }
}

// ============================================================================
// var hoisting
// ============================================================================

/// Replace every `var` declaration by assignments and declare the names once
/// at the top
fn hoist_vars(body: Vec<Statement>) -> Vec<Statement> {
    let mut seen = FxHashSet::default();
    let declarators: Vec<VariableDeclarator> = var_declared_names(&body)
        .into_iter()
        .filter(|id| seen.insert(id.name.clone()))
        .map(|id| VariableDeclarator {
            span: id.span,
            id,
            init: None,
        })
        .collect();
    if declarators.is_empty() {
        return body;
    }
    trace!(count = declarators.len(), "hoisting var declarations");
    let mut hoisted = vec![declaration(VariableKind::Var, declarators)];
    hoisted.extend(unvar_list(body));
    hoisted
}

fn unvar_list(stmts: Vec<Statement>) -> Vec<Statement> {
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        match stmt {
            Statement::VariableDecl(decl) if decl.kind == VariableKind::Var => out.extend(assignments(decl)),
            other => out.push(unvar(other)),
        }
    }
    out
}

/// `var a = 1, b;` as `a = 1;`
fn assignments(decl: VariableDecl) -> Vec<Statement> {
    decl.declarations
        .into_iter()
        .filter_map(|d| {
            let span = d.span;
            d.init.map(|init| {
                Statement::Expression(ExpressionStatement {
                    expression: assign(Expression::Identifier(d.id), init),
                    span,
                })
            })
        })
        .collect()
}

/// Rewrite a statement in a single-statement position
fn unvar(stmt: Statement) -> Statement {
    match stmt {
        Statement::VariableDecl(decl) if decl.kind == VariableKind::Var => {
            let span = decl.span;
            let mut stmts = assignments(decl);
            match stmts.len() {
                0 => Statement::Empty(span),
                1 => stmts.remove(0),
                _ => Statement::Block(BlockStatement { statements: stmts, span }),
            }
        }
        Statement::Block(mut block_stmt) => {
            block_stmt.statements = unvar_list(block_stmt.statements);
            Statement::Block(block_stmt)
        }
        Statement::If(mut if_stmt) => {
            if_stmt.then_branch = Box::new(unvar(*if_stmt.then_branch));
            if_stmt.else_branch = if_stmt.else_branch.map(|branch| Box::new(unvar(*branch)));
            Statement::If(if_stmt)
        }
        Statement::While(mut while_stmt) => {
            while_stmt.body = Box::new(unvar(*while_stmt.body));
            Statement::While(while_stmt)
        }
        Statement::DoWhile(mut do_while_stmt) => {
            do_while_stmt.body = Box::new(unvar(*do_while_stmt.body));
            Statement::DoWhile(do_while_stmt)
        }
        Statement::For(mut for_stmt) => {
            for_stmt.init = match for_stmt.init {
                Some(ForInit::VariableDecl(decl)) if decl.kind == VariableKind::Var => {
                    let mut inits: Vec<Expression> = assignments(decl)
                        .into_iter()
                        .filter_map(|stmt| match stmt {
                            Statement::Expression(expr_stmt) => Some(expr_stmt.expression),
                            _ => None,
                        })
                        .collect();
                    match inits.len() {
                        0 => None,
                        1 => Some(ForInit::Expression(inits.remove(0))),
                        _ => Some(ForInit::Expression(sequence(inits))),
                    }
                }
                init => init,
            };
            for_stmt.body = Box::new(unvar(*for_stmt.body));
            Statement::For(for_stmt)
        }
        Statement::ForIn(mut for_in) => {
            for_in.left = unvar_head(for_in.left);
            for_in.body = Box::new(unvar(*for_in.body));
            Statement::ForIn(for_in)
        }
        Statement::ForOf(mut for_of) => {
            for_of.left = unvar_head(for_of.left);
            for_of.body = Box::new(unvar(*for_of.body));
            Statement::ForOf(for_of)
        }
        Statement::Switch(mut switch_stmt) => {
            for case in &mut switch_stmt.cases {
                case.consequent = unvar_list(std::mem::take(&mut case.consequent));
            }
            Statement::Switch(switch_stmt)
        }
        Statement::Try(mut try_stmt) => {
            try_stmt.body.statements = unvar_list(std::mem::take(&mut try_stmt.body.statements));
            if let Some(catch_clause) = &mut try_stmt.catch_clause {
                catch_clause.body.statements = unvar_list(std::mem::take(&mut catch_clause.body.statements));
            }
            if let Some(finalizer) = &mut try_stmt.finally_clause {
                finalizer.statements = unvar_list(std::mem::take(&mut finalizer.statements));
            }
            Statement::Try(try_stmt)
        }
        Statement::Labeled(mut labeled_stmt) => {
            labeled_stmt.body = Box::new(unvar(*labeled_stmt.body));
            Statement::Labeled(labeled_stmt)
        }
        other => other,
    }
}

fn unvar_head(head: ForHead) -> ForHead {
    match head {
        ForHead::Declaration(VariableKind::Var, id) => ForHead::Target(Expression::Identifier(id)),
        head => head,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awaitless_ast::print_statement;

    fn print(stmts: &[Statement]) -> String {
        stmts.iter().map(print_statement).collect()
    }

    fn prepare_body(body: Vec<Statement>, is_arrow: bool) -> Prepared {
        prepare(&[], body, is_arrow, &mut NameGenerator::new()).unwrap()
    }

    #[test]
    fn test_vars_are_hoisted() {
        let prepared = prepare_body(
            vec![
                expr_stmt(call(ident("f"), vec![])),
                var_decl("a", Some(num(1.0))),
                if_stmt(ident("c"), var_decl("b", None), None),
            ],
            false,
        );
        assert_eq!(print(&prepared.body), "var a, b;\nf();\na = 1;\nif (c) ;\n");
    }

    #[test]
    fn test_for_var_head_becomes_target() {
        let prepared = prepare_body(
            vec![for_of(VariableKind::Var, "x", ident("xs"), block(vec![]))],
            false,
        );
        assert_eq!(print(&prepared.body), "var x;\nfor (x of xs) {}\n");
    }

    #[test]
    fn test_this_and_arguments_are_captured() {
        let prepared = prepare_body(
            vec![
                expr_stmt(call(member(this(), "log"), vec![index(ident("arguments"), num(0.0))])),
                expr_stmt(function_expr(&[], vec![expr_stmt(this())])),
                expr_stmt(arrow(&[], vec![expr_stmt(this())])),
            ],
            false,
        );
        let captures = prepared.captures.map(|s| print_statement(&s));
        assert_eq!(captures.as_deref(), Some("var _this = this, _arguments = arguments;\n"));
        let body = print(&prepared.body);
        assert!(body.contains("_this.log(_arguments[0]);"), "{}", body);
        assert!(body.contains("(function () {\n  this;\n});"), "{}", body);
        assert!(body.contains("() => {\n  _this;\n};"), "{}", body);
        assert_eq!(prepared.captured, vec!["_this", "_arguments"]);
    }

    #[test]
    fn test_arrow_captures_lexical_this() {
        let prepared = prepare_body(vec![expr_stmt(this())], true);
        let captures = prepared.captures.map(|s| print_statement(&s));
        assert_eq!(captures.as_deref(), Some("var _this = this;\n"));
        assert_eq!(print(&prepared.body), "_this;\n");
    }

    #[test]
    fn test_eval_is_rejected() {
        let result = prepare(&[], vec![expr_stmt(call(ident("eval"), vec![string("x")]))], false, &mut NameGenerator::new());
        assert!(matches!(result, Err(LowerError::UnsupportedConstruct { .. })));
    }
}
