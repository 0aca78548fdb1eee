//! Exit reachability
//!
//! Answers two questions about a statement for a set of exit kinds:
//! does *some* path leave through one of them (`any`), and does *every* path
//! (`all`). Control flow is followed structurally:
//! - a statement list stops at the first statement that cannot complete
//! - loops may run zero times unless their test is always truthy
//! - `break`/`continue` are resolved against the loops, switches and labels
//!   inside the analyzed statement; only the ones escaping it count as exits
//! - a `finally` block that always exits overrides the try it guards
//!
//! Nested functions are opaque.

use awaitless_ast::ast::*;
use rustc_hash::FxHashSet;

/// Exit kinds a query is interested in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitKinds {
    pub returns: bool,
    pub throws: bool,
    pub breaks: bool,
    pub continues: bool,
}

impl ExitKinds {
    /// `return` and `throw`: leaving the enclosing function
    pub const FUNCTION: ExitKinds = ExitKinds {
        returns: true,
        throws: true,
        breaks: false,
        continues: false,
    };

    pub const RETURN: ExitKinds = ExitKinds {
        returns: true,
        throws: false,
        breaks: false,
        continues: false,
    };

    /// Everything that stops a switch case from falling through
    pub const STOP: ExitKinds = ExitKinds {
        returns: true,
        throws: true,
        breaks: true,
        continues: true,
    };

    fn includes(&self, exit: &Exit) -> bool {
        match exit {
            Exit::Return => self.returns,
            Exit::Throw => self.throws,
            Exit::Break(_) => self.breaks,
            Exit::Continue(_) => self.continues,
        }
    }
}

/// Answer of a reachability query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reach {
    /// Some path exits through a requested kind
    pub any: bool,
    /// Every path exits through a requested kind
    pub all: bool,
}

pub fn statement_reach(stmt: &Statement, kinds: ExitKinds) -> Reach {
    Flow::of_statement(stmt, &[]).reach(kinds)
}

pub fn statements_reach(stmts: &[Statement], kinds: ExitKinds) -> Reach {
    Flow::of_list(stmts).reach(kinds)
}

/// Can control reach the statement after `stmt`, given the labels attached
/// to it
pub fn completes(stmt: &Statement, labels: &[String]) -> bool {
    Flow::of_statement(stmt, labels).falls
}

/// A loop or switch test that can never be falsy: a missing test, `true`,
/// non-zero numbers, non-empty strings, and object, array or function
/// literals. Identifiers never count, even `undefined` or globals.
pub fn is_always_truthy(test: Option<&Expression>) -> bool {
    match test {
        None => true,
        Some(Expression::Literal(lit)) => lit.value.is_truthy(),
        Some(Expression::Array(_)) | Some(Expression::Object(_)) | Some(Expression::Function(_)) => true,
        Some(_) => false,
    }
}

// ============================================================================
// Flow
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Exit {
    Return,
    Throw,
    Break(Option<String>),
    Continue(Option<String>),
}

/// How control can leave a statement
#[derive(Debug, Clone, Default)]
struct Flow {
    /// Some path completes normally
    falls: bool,
    /// Abrupt completions that escape the statement
    exits: FxHashSet<Exit>,
}

impl Flow {
    fn normal() -> Self {
        Flow {
            falls: true,
            exits: FxHashSet::default(),
        }
    }

    fn abrupt(exit: Exit) -> Self {
        let mut exits = FxHashSet::default();
        exits.insert(exit);
        Flow { falls: false, exits }
    }

    fn reach(&self, kinds: ExitKinds) -> Reach {
        Reach {
            any: self.exits.iter().any(|exit| kinds.includes(exit)),
            all: !self.falls && self.exits.iter().all(|exit| kinds.includes(exit)),
        }
    }

    /// Remove the break/continue exits a construct with `labels` catches;
    /// returns whether a break and whether a continue was caught
    fn catch_jumps(&mut self, labels: &[String], unlabeled_break: bool, unlabeled_continue: bool) -> (bool, bool) {
        let mut caught_break = false;
        let mut caught_continue = false;
        self.exits.retain(|exit| match exit {
            Exit::Break(None) if unlabeled_break => {
                caught_break = true;
                false
            }
            Exit::Break(Some(label)) if labels.contains(label) => {
                caught_break = true;
                false
            }
            Exit::Continue(None) if unlabeled_continue => {
                caught_continue = true;
                false
            }
            Exit::Continue(Some(label)) if unlabeled_continue && labels.contains(label) => {
                caught_continue = true;
                false
            }
            _ => true,
        });
        (caught_break, caught_continue)
    }

    fn of_list(stmts: &[Statement]) -> Flow {
        let mut flow = Flow::normal();
        for stmt in stmts {
            if !flow.falls {
                break;
            }
            let next = Flow::of_statement(stmt, &[]);
            flow.exits.extend(next.exits);
            flow.falls = next.falls;
        }
        flow
    }

    /// `labels` are the labels directly attached to `stmt`
    fn of_statement(stmt: &Statement, labels: &[String]) -> Flow {
        match stmt {
            Statement::Return(_) => Flow::abrupt(Exit::Return),
            Statement::Throw(_) => Flow::abrupt(Exit::Throw),
            Statement::Break(stmt) => {
                Flow::abrupt(Exit::Break(stmt.label.as_ref().map(|l| l.name.clone())))
            }
            Statement::Continue(stmt) => {
                Flow::abrupt(Exit::Continue(stmt.label.as_ref().map(|l| l.name.clone())))
            }
            Statement::Block(block) => Flow::of_list(&block.statements),
            Statement::If(stmt) => {
                let mut flow = Flow::of_statement(&stmt.then_branch, &[]);
                match &stmt.else_branch {
                    Some(else_branch) => {
                        let other = Flow::of_statement(else_branch, &[]);
                        flow.falls |= other.falls;
                        flow.exits.extend(other.exits);
                    }
                    None => flow.falls = true,
                }
                flow
            }
            Statement::While(stmt) => Flow::of_loop(&stmt.body, labels, Some(&stmt.condition), false),
            Statement::For(stmt) => Flow::of_loop(&stmt.body, labels, stmt.test.as_ref(), false),
            Statement::DoWhile(stmt) => Flow::of_loop(&stmt.body, labels, Some(&stmt.condition), true),
            Statement::ForIn(ForInStatement { body, .. })
            | Statement::ForOf(ForOfStatement { body, .. }) => {
                let mut flow = Flow::of_statement(body, &[]);
                flow.catch_jumps(labels, true, true);
                flow.falls = true;
                flow
            }
            Statement::Switch(stmt) => Flow::of_switch(stmt, labels),
            Statement::Try(stmt) => Flow::of_try(stmt),
            Statement::Labeled(stmt) => {
                let mut nested: Vec<String> = labels.to_vec();
                nested.push(stmt.label.name.clone());
                let mut flow = Flow::of_statement(&stmt.body, &nested);
                if !stmt.body.is_loop() && !matches!(stmt.body.as_ref(), Statement::Labeled(_)) {
                    let (caught_break, _) = flow.catch_jumps(&nested, false, false);
                    flow.falls |= caught_break;
                }
                flow
            }
            _ => Flow::normal(),
        }
    }

    fn of_loop(body: &Statement, labels: &[String], test: Option<&Expression>, runs_once: bool) -> Flow {
        let mut flow = Flow::of_statement(body, &[]);
        let body_falls = flow.falls;
        let (caught_break, caught_continue) = flow.catch_jumps(labels, true, true);
        let reaches_test = !runs_once || body_falls || caught_continue;
        flow.falls = caught_break || (reaches_test && !is_always_truthy(test));
        flow
    }

    fn of_switch(stmt: &SwitchStatement, labels: &[String]) -> Flow {
        let mut exits = FxHashSet::default();
        let mut any_case_completes = false;
        // Whether entering at case i can run off the end of the switch
        let mut next_falls_out = true;
        for case in stmt.cases.iter().rev() {
            let mut flow = Flow::of_list(&case.consequent);
            let (caught_break, _) = flow.catch_jumps(labels, true, false);
            let falls_out = caught_break || (flow.falls && next_falls_out);
            any_case_completes |= falls_out;
            exits.extend(flow.exits);
            next_falls_out = falls_out;
        }
        let has_default = stmt.cases.iter().any(|case| case.test.is_none());
        Flow {
            falls: !has_default || any_case_completes,
            exits,
        }
    }

    fn of_try(stmt: &TryStatement) -> Flow {
        let mut flow = Flow::of_list(&stmt.body.statements);
        if let Some(catch) = &stmt.catch_clause {
            flow.exits.remove(&Exit::Throw);
            let handler = Flow::of_list(&catch.body.statements);
            flow.falls |= handler.falls;
            flow.exits.extend(handler.exits);
        }
        if let Some(finally) = &stmt.finally_clause {
            let finalizer = Flow::of_list(&finally.statements);
            if !finalizer.falls {
                return finalizer;
            }
            flow.exits.extend(finalizer.exits);
        }
        flow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awaitless_ast::build::*;

    fn reach(stmt: Statement) -> Reach {
        statement_reach(&stmt, ExitKinds::FUNCTION)
    }

    #[test]
    fn test_if_needs_both_branches() {
        let both = if_stmt(ident("c"), ret(None), Some(throw(ident("e"))));
        assert_eq!(reach(both), Reach { any: true, all: true });
        let one = if_stmt(ident("c"), ret(None), None);
        assert_eq!(reach(one), Reach { any: true, all: false });
    }

    #[test]
    fn test_loop_may_run_zero_times() {
        let stmt = while_stmt(ident("c"), block(vec![ret(None)]));
        assert_eq!(reach(stmt), Reach { any: true, all: false });
        let stmt = while_stmt(boolean(true), block(vec![ret(None)]));
        assert_eq!(reach(stmt), Reach { any: true, all: true });
    }

    #[test]
    fn test_always_true_loop_with_break_completes() {
        let stmt = while_stmt(
            boolean(true),
            block(vec![if_stmt(ident("c"), brk(None), None), ret(None)]),
        );
        assert!(!reach(stmt).all);
    }

    #[test]
    fn test_identifier_test_is_not_always_truthy() {
        assert!(!is_always_truthy(Some(&ident("undefined"))));
        assert!(!is_always_truthy(Some(&ident("x"))));
        assert!(is_always_truthy(Some(&num(1.0))));
        assert!(!is_always_truthy(Some(&string(""))));
        assert!(is_always_truthy(Some(&object(vec![]))));
        assert!(is_always_truthy(None));
    }

    #[test]
    fn test_labeled_break_does_not_escape_its_label() {
        let stmt = labeled(
            "outer",
            block(vec![if_stmt(ident("c"), brk(Some("outer")), None), ret(None)]),
        );
        assert_eq!(reach(stmt), Reach { any: true, all: false });
    }

    #[test]
    fn test_break_to_outer_label_escapes_inner_loop() {
        let stmts = vec![while_stmt(
            ident("c"),
            block(vec![brk(Some("outer"))]),
        )];
        let r = statements_reach(&stmts, ExitKinds::STOP);
        assert!(r.any);
    }

    #[test]
    fn test_switch_with_default_and_fallthrough() {
        let stmt = switch(
            ident("x"),
            vec![
                case(num(1.0), vec![]),
                case(num(2.0), vec![expr_stmt(call(ident("f"), vec![]))]),
                default_case(vec![ret(None)]),
            ],
        );
        assert_eq!(reach(stmt), Reach { any: true, all: true });
    }

    #[test]
    fn test_switch_break_completes() {
        let stmt = switch(
            ident("x"),
            vec![case(num(1.0), vec![brk(None)]), default_case(vec![ret(None)])],
        );
        assert!(!reach(stmt).all);
        let no_default = switch(ident("x"), vec![case(num(1.0), vec![ret(None)])]);
        assert!(!reach(no_default).all);
    }

    #[test]
    fn test_finally_that_exits_dominates() {
        let stmt = try_stmt(
            vec![expr_stmt(call(ident("f"), vec![]))],
            None,
            Some(vec![ret(Some(num(1.0)))]),
        );
        assert_eq!(reach(stmt), Reach { any: true, all: true });
    }

    #[test]
    fn test_catch_absorbs_throw() {
        let stmt = try_stmt(vec![throw(ident("e"))], Some((Some("e"), vec![])), None);
        assert_eq!(reach(stmt), Reach { any: false, all: false });
        let stmt = try_stmt(vec![ret(None)], Some((Some("e"), vec![ret(None)])), None);
        assert!(reach(stmt).all);
    }

    #[test]
    fn test_unreachable_statements_are_ignored() {
        let stmts = vec![ret(None), brk(None)];
        assert_eq!(
            statements_reach(&stmts, ExitKinds::RETURN),
            Reach { any: true, all: true }
        );
    }

    #[test]
    fn test_labeled_loop_break_completes() {
        let stmt = while_stmt(boolean(true), block(vec![brk(Some("outer"))]));
        assert!(!completes(&stmt, &[]));
        assert!(completes(&stmt, &["outer".to_string()]));
    }

    #[test]
    fn test_do_while_body_always_runs() {
        let stmt = do_while(block(vec![ret(None)]), ident("c"));
        assert!(reach(stmt).all);
    }
}
