//! Small syntactic queries shared by the lowering passes
//!
//! "Contains await" never looks into nested functions: an `await` there
//! belongs to that function. A `for await` loop counts as a suspension point
//! of the function that contains it.

use awaitless_ast::ast::*;
use awaitless_ast::scope::FunctionScope;

struct AwaitFinder {
    found: bool,
}

impl Visitor for AwaitFinder {
    fn visit_statement(&mut self, stmt: &Statement) {
        if self.found {
            return;
        }
        if let Statement::ForOf(ForOfStatement { is_await: true, .. }) = stmt {
            self.found = true;
            return;
        }
        walk_statement(self, stmt);
    }

    fn visit_expression(&mut self, expr: &Expression) {
        if self.found {
            return;
        }
        if let Expression::Await(_) = expr {
            self.found = true;
            return;
        }
        walk_expression(self, expr);
    }

    fn visit_function(&mut self, _func: &Function) {}
}

pub fn expression_contains_await(expr: &Expression) -> bool {
    let mut finder = AwaitFinder { found: false };
    finder.visit_expression(expr);
    finder.found
}

pub fn statement_contains_await(stmt: &Statement) -> bool {
    let mut finder = AwaitFinder { found: false };
    finder.visit_statement(stmt);
    finder.found
}

pub fn statements_contain_await(stmts: &[Statement]) -> bool {
    stmts.iter().any(statement_contains_await)
}

/// Does any identifier named `name` appear, nested functions included
pub fn references_name(stmts: &[Statement], name: &str) -> bool {
    struct Finder<'a> {
        name: &'a str,
        found: bool,
    }

    impl Visitor for Finder<'_> {
        fn visit_identifier(&mut self, id: &Identifier) {
            if id.name == self.name {
                self.found = true;
            }
        }
    }

    let mut finder = Finder { name, found: false };
    for stmt in stmts {
        finder.visit_statement(stmt);
    }
    finder.found
}

/// Does a function nested in `stmts` read or write `name` from outside
/// itself
pub fn captured_by_closure(stmts: &[Statement], name: &str) -> bool {
    struct Finder<'a> {
        name: &'a str,
        found: bool,
    }

    impl Visitor for Finder<'_> {
        fn visit_function(&mut self, func: &Function) {
            if FunctionScope::analyze(func).free_variables().contains(self.name) {
                self.found = true;
            }
        }
    }

    let mut finder = Finder { name, found: false };
    for stmt in stmts {
        finder.visit_statement(stmt);
    }
    finder.found
}

/// Is `name` the target of an assignment or update anywhere in `stmts`,
/// nested functions included
pub fn assigns_name(stmts: &[Statement], name: &str) -> bool {
    struct Finder<'a> {
        name: &'a str,
        found: bool,
    }

    impl Visitor for Finder<'_> {
        fn visit_statement(&mut self, stmt: &Statement) {
            match stmt {
                Statement::ForIn(ForInStatement { left, .. })
                | Statement::ForOf(ForOfStatement { left, .. }) => {
                    if let ForHead::Target(target) = left {
                        if target.is_identifier_named(self.name) {
                            self.found = true;
                        }
                    }
                }
                _ => {}
            }
            walk_statement(self, stmt);
        }

        fn visit_expression(&mut self, expr: &Expression) {
            match expr {
                Expression::Assignment(assign) if assign.left.is_identifier_named(self.name) => {
                    self.found = true;
                }
                Expression::Update(update) if update.target.is_identifier_named(self.name) => {
                    self.found = true;
                }
                _ => {}
            }
            walk_expression(self, expr);
        }
    }

    let mut finder = Finder { name, found: false };
    for stmt in stmts {
        finder.visit_statement(stmt);
    }
    finder.found
}

/// First direct `eval(...)` call, nested functions included
pub fn find_eval(stmts: &[Statement]) -> Option<awaitless_ast::Span> {
    struct Finder {
        found: Option<awaitless_ast::Span>,
    }

    impl Visitor for Finder {
        fn visit_expression(&mut self, expr: &Expression) {
            if self.found.is_some() {
                return;
            }
            if let Expression::Call(call) = expr {
                if call.callee.is_identifier_named("eval") {
                    self.found = Some(call.span);
                    return;
                }
            }
            walk_expression(self, expr);
        }
    }

    let mut finder = Finder { found: None };
    for stmt in stmts {
        finder.visit_statement(stmt);
    }
    finder.found
}

/// Span of the first `await` outside any async function, nested functions
/// included
pub fn find_stray_await(stmts: &[Statement]) -> Option<awaitless_ast::Span> {
    struct Finder {
        found: Option<awaitless_ast::Span>,
        in_async: bool,
    }

    impl Visitor for Finder {
        fn visit_statement(&mut self, stmt: &Statement) {
            if self.found.is_some() {
                return;
            }
            if let Statement::ForOf(ForOfStatement { is_await: true, span, .. }) = stmt {
                if !self.in_async {
                    self.found = Some(*span);
                    return;
                }
            }
            walk_statement(self, stmt);
        }

        fn visit_expression(&mut self, expr: &Expression) {
            if self.found.is_some() {
                return;
            }
            if let Expression::Await(await_expr) = expr {
                if !self.in_async {
                    self.found = Some(await_expr.span);
                    return;
                }
            }
            walk_expression(self, expr);
        }

        fn visit_function(&mut self, func: &Function) {
            let outer = std::mem::replace(&mut self.in_async, func.is_async);
            walk_function(self, func);
            self.in_async = outer;
        }
    }

    let mut finder = Finder {
        found: None,
        in_async: false,
    };
    for stmt in stmts {
        finder.visit_statement(stmt);
    }
    finder.found
}

#[cfg(test)]
mod tests {
    use super::*;
    use awaitless_ast::build::*;

    #[test]
    fn test_await_in_nested_function_is_not_ours() {
        let stmts = vec![expr_stmt(async_arrow(&[], vec![expr_stmt(await_expr(ident("x")))]))];
        assert!(!statements_contain_await(&stmts));
        let stmts = vec![if_stmt(ident("c"), expr_stmt(await_expr(ident("x"))), None)];
        assert!(statements_contain_await(&stmts));
    }

    #[test]
    fn test_for_await_counts_as_suspension() {
        let stmt = for_await_of(VariableKind::Const, "x", ident("xs"), block(vec![]));
        assert!(statement_contains_await(&stmt));
    }

    #[test]
    fn test_assigns_name() {
        let stmts = vec![expr_stmt(update(UpdateOperator::Increment, false, ident("i")))];
        assert!(assigns_name(&stmts, "i"));
        assert!(!assigns_name(&stmts, "j"));
        let stmts = vec![expr_stmt(assign(member(ident("i"), "x"), num(1.0)))];
        assert!(!assigns_name(&stmts, "i"));
    }

    #[test]
    fn test_captured_by_closure() {
        let stmts = vec![expr_stmt(method_call(ident("fs"), "push", vec![arrow(&[], vec![ret(Some(ident("i")))])]))];
        assert!(captured_by_closure(&stmts, "i"));
        assert!(!captured_by_closure(&stmts, "fs"));

        let shadowed = vec![expr_stmt(arrow(&["i"], vec![ret(Some(ident("i")))]))];
        assert!(!captured_by_closure(&shadowed, "i"));
    }

    #[test]
    fn test_stray_await_skips_async_functions() {
        let stmts = vec![expr_stmt(async_arrow(&[], vec![expr_stmt(await_expr(ident("x")))]))];
        assert!(find_stray_await(&stmts).is_none());
        let stmts = vec![expr_stmt(arrow(&[], vec![expr_stmt(await_expr(ident("x")))]))];
        assert!(find_stray_await(&stmts).is_some());
    }

    #[test]
    fn test_stray_await_inside_async_function() {
        let inner = function_decl("g", &[], vec![expr_stmt(await_expr(ident("x")))]);
        let stmts = vec![async_function_decl("f", &[], vec![inner])];
        assert!(find_stray_await(&stmts).is_some());
    }

    #[test]
    fn test_find_eval() {
        let stmts = vec![expr_stmt(call(ident("eval"), vec![string("1")]))];
        assert!(find_eval(&stmts).is_some());
        let stmts = vec![expr_stmt(method_call(ident("obj"), "eval", vec![]))];
        assert!(find_eval(&stmts).is_none());
    }
}
