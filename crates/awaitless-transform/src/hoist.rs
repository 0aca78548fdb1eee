//! Closure hoisting
//!
//! Synthetic closures that reference no binding of any enclosing function or
//! block are lifted to unit level as named function declarations, so they
//! are created once instead of on every call. Closures that use `this` or
//! `arguments` stay where they are.

use awaitless_ast::ast::*;
use awaitless_ast::scope::lexical_declared_names;
use awaitless_ast::{FunctionScope, NameGenerator};
use rustc_hash::FxHashSet;
use tracing::trace;

/// Lift the closures of `body` that can move, returning their declarations
pub(crate) fn hoist_closures(body: &mut Vec<Statement>, names: &mut NameGenerator) -> Vec<Statement> {
    let mut hoister = Hoister {
        names,
        frames: Vec::new(),
        functions: 0,
        lifted: Vec::new(),
    };
    walk_statements_mut(&mut hoister, body);
    hoister.lifted
}

struct Hoister<'n> {
    names: &'n mut NameGenerator,
    /// Names bound by each enclosing function or block, innermost last
    frames: Vec<FxHashSet<String>>,
    functions: usize,
    lifted: Vec<Statement>,
}

impl Hoister<'_> {
    fn can_lift(&self, func: &Function) -> bool {
        if !func.is_synthetic || func.is_arrow || self.functions == 0 {
            return false;
        }
        let scope = FunctionScope::analyze(func);
        !scope.uses_this()
            && !scope.uses_arguments()
            && !scope
                .free_variables()
                .iter()
                .any(|name| self.frames.iter().any(|frame| frame.contains(name)))
    }
}

impl VisitorMut for Hoister<'_> {
    fn visit_function_mut(&mut self, func: &mut Function) {
        let scope = FunctionScope::analyze(func);
        let mut frame: FxHashSet<String> = scope.bindings().map(|(name, _)| name.to_string()).collect();
        frame.extend(func.params.iter().map(|param| param.name.clone()));
        frame.extend(func.name.iter().map(|name| name.name.clone()));
        self.frames.push(frame);
        self.functions += 1;
        walk_function_mut(self, func);
        self.functions -= 1;
        self.frames.pop();
    }

    fn visit_statement_mut(&mut self, stmt: &mut Statement) {
        let frame = block_frame(stmt);
        if frame.is_empty() {
            walk_statement_mut(self, stmt);
            return;
        }
        self.frames.push(frame);
        walk_statement_mut(self, stmt);
        self.frames.pop();
    }

    fn visit_expression_mut(&mut self, expr: &mut Expression) {
        walk_expression_mut(self, expr);
        let Expression::Function(func) = expr else {
            return;
        };
        if !self.can_lift(func) {
            return;
        }
        let name = self.names.fresh("temp");
        trace!(name = %name.name, "hoisting closure");
        let replacement = Expression::Identifier(name.clone());
        if let Expression::Function(mut func) = std::mem::replace(expr, replacement) {
            func.name = Some(name);
            let span = func.span;
            self.lifted.push(Statement::FunctionDecl(FunctionDecl { function: *func, span }));
        }
    }
}

/// Names `stmt` binds for its nested statements only: block, loop head,
/// switch and catch bindings. The parts of a try share one frame.
fn block_frame(stmt: &Statement) -> FxHashSet<String> {
    fn lexical(stmts: &[Statement], names: &mut Vec<Identifier>) {
        names.extend(lexical_declared_names(stmts).into_iter().map(|(_, id)| id));
    }

    let mut names = Vec::new();
    match stmt {
        Statement::Block(block) => lexical(&block.statements, &mut names),
        Statement::For(ForStatement {
            init: Some(ForInit::VariableDecl(decl)),
            ..
        }) if decl.kind != VariableKind::Var => {
            names.extend(decl.declarations.iter().map(|d| d.id.clone()));
        }
        Statement::ForIn(ForInStatement { left, .. }) | Statement::ForOf(ForOfStatement { left, .. }) => {
            if let ForHead::Declaration(kind, id) = left {
                if *kind != VariableKind::Var {
                    names.push(id.clone());
                }
            }
        }
        Statement::Switch(switch_stmt) => {
            for case in &switch_stmt.cases {
                lexical(&case.consequent, &mut names);
            }
        }
        Statement::Try(try_stmt) => {
            lexical(&try_stmt.body.statements, &mut names);
            if let Some(catch) = &try_stmt.catch_clause {
                names.extend(catch.param.iter().cloned());
                lexical(&catch.body.statements, &mut names);
            }
            if let Some(finally) = &try_stmt.finally_clause {
                lexical(&finally.statements, &mut names);
            }
        }
        _ => {}
    }
    names.into_iter().map(|id| id.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use awaitless_ast::build::*;
    use awaitless_ast::print_statement;

    fn hoist(mut body: Vec<Statement>) -> (String, String) {
        let mut names = NameGenerator::new();
        let lifted = hoist_closures(&mut body, &mut names);
        (
            lifted.iter().map(print_statement).collect(),
            body.iter().map(print_statement).collect(),
        )
    }

    fn outer(body: Vec<Statement>) -> Statement {
        function_decl("f", &["a"], body)
    }

    #[test]
    fn test_closure_without_captures_is_lifted() {
        let closure = synthetic_function(vec![], vec![expr_stmt(call(ident("log"), vec![]))]);
        let (lifted, body) = hoist(vec![outer(vec![ret(Some(call(ident("_call"), vec![closure])))])]);
        assert_eq!(lifted, "function _temp () {\n  log();\n}\n");
        assert!(body.contains("return _call(_temp);"), "{}", body);
    }

    #[test]
    fn test_closure_reading_a_parameter_stays() {
        let closure = synthetic_function(vec![], vec![expr_stmt(call(ident("log"), vec![ident("a")]))]);
        let (lifted, _) = hoist(vec![outer(vec![ret(Some(call(ident("_call"), vec![closure])))])]);
        assert_eq!(lifted, "");
    }

    #[test]
    fn test_closure_own_parameter_is_not_a_capture() {
        let closure = synthetic_function(
            vec![Identifier::synthetic("a")],
            vec![expr_stmt(call(ident("log"), vec![ident("a")]))],
        );
        let (lifted, _) = hoist(vec![outer(vec![ret(Some(call(ident("_await"), vec![ident("p"), closure])))])]);
        assert!(lifted.starts_with("function _temp (a)"), "{}", lifted);
    }

    #[test]
    fn test_user_functions_are_not_lifted() {
        let (lifted, _) = hoist(vec![outer(vec![expr_stmt(function_expr(&[], vec![]))])]);
        assert_eq!(lifted, "");
    }

    #[test]
    fn test_closure_reading_a_program_block_binding_stays() {
        let closure = synthetic_function(vec![], vec![expr_stmt(call(ident("log"), vec![ident("x")]))]);
        let scoped = block(vec![
            const_decl("x", string("ok")),
            outer(vec![ret(Some(call(ident("_call"), vec![closure])))]),
        ]);
        let (lifted, _) = hoist(vec![scoped]);
        assert_eq!(lifted, "");
    }

    #[test]
    fn test_closure_reading_a_catch_parameter_stays() {
        let closure = synthetic_function(vec![], vec![expr_stmt(call(ident("log"), vec![ident("e")]))]);
        let guarded = try_stmt(
            vec![],
            Some((Some("e"), vec![outer(vec![ret(Some(call(ident("_call"), vec![closure])))])])),
            None,
        );
        let (lifted, _) = hoist(vec![guarded]);
        assert_eq!(lifted, "");
    }

    #[test]
    fn test_closure_using_this_stays() {
        let closure = synthetic_function(vec![], vec![expr_stmt(this())]);
        let (lifted, _) = hoist(vec![outer(vec![ret(Some(call(ident("_call"), vec![closure])))])]);
        assert_eq!(lifted, "");
    }
}
