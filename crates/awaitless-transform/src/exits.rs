//! Early-exit normalization
//!
//! A construct that is rewritten into a combinator call has its body moved
//! into a closure. `return`, `break` and `continue` inside that body can no
//! longer jump directly, so they become a local `return` from the closure,
//! preceded by the sentinel assignment the combinator and the code after it
//! test:
//!
//! ```text
//! return v;      =>  { const _result = v; _exit = true; return _result; }
//! break;         =>  { _interrupt = true; return; }
//! continue;      =>  return;
//! ```
//!
//! Constructs are restructured outside-in, so every jump that escapes the
//! construct has already been turned into a `return` by an enclosing rewrite.
//! The only jumps left to resolve target the construct itself or something
//! nested inside it. Anything else means the rewrite order was violated.

use awaitless_ast::ast::*;
use awaitless_ast::build::*;
use awaitless_ast::NameGenerator;

use crate::error::{LowerError, LowerResult};

/// What `break`/`continue` without a nested target refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpTarget {
    /// A loop: `break` leaves it, `continue` ends the iteration
    Loop,
    /// A switch: `break` leaves it
    Switch,
    /// A labeled statement that is not a loop: only `break label` leaves it
    Labeled,
    /// An `if`, block or `try`: no jump may target it
    Opaque,
}

/// How exits from one restructured construct are rewritten
#[derive(Debug, Clone)]
pub struct ExitPlan {
    pub target: JumpTarget,
    /// Labels attached to the construct
    pub labels: Vec<String>,
    /// Set before a `return` leaves the closure
    pub exit: Option<Identifier>,
    /// Set before a `break` leaves the construct
    pub interrupt: Option<Identifier>,
}

impl ExitPlan {
    pub fn new(target: JumpTarget, labels: Vec<String>) -> Self {
        Self {
            target,
            labels,
            exit: None,
            interrupt: None,
        }
    }
}

/// Which jumps out of a construct its body contains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JumpUsage {
    /// `return` anywhere in the body
    pub returns: bool,
    /// `break` leaving the construct
    pub breaks: bool,
    /// `continue` of the construct (loops only)
    pub continues: bool,
}

// ============================================================================
// Jump resolution
// ============================================================================

enum Resolved {
    /// Targets a statement nested inside the construct
    Inner,
    /// Targets the construct itself
    Construct,
    /// Targets something outside the construct
    Escapes,
}

/// Nesting state while walking a construct body
#[derive(Default)]
struct Nesting {
    /// Loops and switches entered
    breakable: u32,
    /// Loops entered
    loops: u32,
    /// Labels declared inside the construct
    labels: Vec<String>,
}

impl Nesting {
    fn resolve_break(&self, label: Option<&Identifier>, target: JumpTarget, labels: &[String]) -> Resolved {
        match label {
            None if self.breakable > 0 => Resolved::Inner,
            None => match target {
                JumpTarget::Loop | JumpTarget::Switch => Resolved::Construct,
                JumpTarget::Labeled | JumpTarget::Opaque => Resolved::Escapes,
            },
            Some(label) if self.labels.contains(&label.name) => Resolved::Inner,
            Some(label) if labels.contains(&label.name) => Resolved::Construct,
            Some(_) => Resolved::Escapes,
        }
    }

    fn resolve_continue(&self, label: Option<&Identifier>, target: JumpTarget, labels: &[String]) -> Resolved {
        match label {
            None if self.loops > 0 => Resolved::Inner,
            Some(label) if self.labels.contains(&label.name) => Resolved::Inner,
            Some(label) if !labels.contains(&label.name) => Resolved::Escapes,
            _ if target == JumpTarget::Loop => Resolved::Construct,
            _ => Resolved::Escapes,
        }
    }
}

// ============================================================================
// Scan
// ============================================================================

struct Scanner<'p> {
    target: JumpTarget,
    labels: &'p [String],
    nesting: Nesting,
    usage: JumpUsage,
}

impl Visitor for Scanner<'_> {
    fn visit_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Return(_) => self.usage.returns = true,
            Statement::Break(stmt) => {
                if let Resolved::Construct =
                    self.nesting
                        .resolve_break(stmt.label.as_ref(), self.target, self.labels)
                {
                    self.usage.breaks = true;
                }
            }
            Statement::Continue(stmt) => {
                if let Resolved::Construct =
                    self.nesting
                        .resolve_continue(stmt.label.as_ref(), self.target, self.labels)
                {
                    self.usage.continues = true;
                }
            }
            Statement::Labeled(stmt) => {
                self.nesting.labels.push(stmt.label.name.clone());
                self.visit_statement(&stmt.body);
                self.nesting.labels.pop();
            }
            Statement::Switch(_) => {
                self.nesting.breakable += 1;
                walk_statement(self, stmt);
                self.nesting.breakable -= 1;
            }
            stmt if stmt.is_loop() => {
                self.nesting.breakable += 1;
                self.nesting.loops += 1;
                walk_statement(self, stmt);
                self.nesting.breakable -= 1;
                self.nesting.loops -= 1;
            }
            _ => walk_statement(self, stmt),
        }
    }

    fn visit_function(&mut self, _func: &Function) {}
}

/// Find the jumps out of a construct with `target` kind and `labels`
pub fn scan(stmts: &[Statement], target: JumpTarget, labels: &[String]) -> JumpUsage {
    let mut scanner = Scanner {
        target,
        labels,
        nesting: Nesting::default(),
        usage: JumpUsage::default(),
    };
    for stmt in stmts {
        scanner.visit_statement(stmt);
    }
    scanner.usage
}

// ============================================================================
// Rewrite
// ============================================================================

/// A normalized body
#[derive(Debug)]
pub struct Normalized {
    pub statements: Vec<Statement>,
    /// Temporary holding non-trivial return values, when one was needed
    pub result: Option<Identifier>,
}

struct Normalizer<'a> {
    plan: &'a ExitPlan,
    names: &'a mut NameGenerator,
    is_pure: &'a dyn Fn(&Expression) -> bool,
    nesting: Nesting,
    result: Option<Identifier>,
}

/// Rewrite the exits of a construct body according to `plan`
///
/// `is_pure` decides which returned values can be returned as is after the
/// exit sentinel is set; anything else is evaluated into a temporary first.
pub fn normalize(
    stmts: Vec<Statement>,
    plan: &ExitPlan,
    names: &mut NameGenerator,
    is_pure: &dyn Fn(&Expression) -> bool,
) -> LowerResult<Normalized> {
    let mut normalizer = Normalizer {
        plan,
        names,
        is_pure,
        nesting: Nesting::default(),
        result: None,
    };
    let statements = stmts
        .into_iter()
        .map(|stmt| normalizer.statement(stmt))
        .collect::<LowerResult<Vec<_>>>()?;
    Ok(Normalized {
        statements,
        result: normalizer.result,
    })
}

impl Normalizer<'_> {
    fn statements(&mut self, stmts: Vec<Statement>) -> LowerResult<Vec<Statement>> {
        stmts.into_iter().map(|stmt| self.statement(stmt)).collect()
    }

    fn boxed(&mut self, stmt: Box<Statement>) -> LowerResult<Box<Statement>> {
        Ok(Box::new(self.statement(*stmt)?))
    }

    fn block(&mut self, mut block: BlockStatement) -> LowerResult<BlockStatement> {
        block.statements = self.statements(block.statements)?;
        Ok(block)
    }

    fn statement(&mut self, stmt: Statement) -> LowerResult<Statement> {
        Ok(match stmt {
            Statement::Return(stmt) => self.rewrite_return(stmt),
            Statement::Break(stmt) => {
                match self
                    .nesting
                    .resolve_break(stmt.label.as_ref(), self.plan.target, &self.plan.labels)
                {
                    Resolved::Inner => Statement::Break(stmt),
                    Resolved::Construct => self.leave(),
                    Resolved::Escapes => {
                        return Err(LowerError::internal(
                            "break escapes the restructured statement",
                            stmt.span,
                        ))
                    }
                }
            }
            Statement::Continue(stmt) => {
                match self
                    .nesting
                    .resolve_continue(stmt.label.as_ref(), self.plan.target, &self.plan.labels)
                {
                    Resolved::Inner => Statement::Continue(stmt),
                    Resolved::Construct => ret(None),
                    Resolved::Escapes => {
                        return Err(LowerError::internal(
                            "continue escapes the restructured statement",
                            stmt.span,
                        ))
                    }
                }
            }
            Statement::Block(block) => Statement::Block(self.block(block)?),
            Statement::If(mut stmt) => {
                stmt.then_branch = self.boxed(stmt.then_branch)?;
                stmt.else_branch = stmt.else_branch.map(|s| self.boxed(s)).transpose()?;
                Statement::If(stmt)
            }
            Statement::Labeled(mut stmt) => {
                self.nesting.labels.push(stmt.label.name.clone());
                let body = self.boxed(stmt.body);
                self.nesting.labels.pop();
                stmt.body = body?;
                Statement::Labeled(stmt)
            }
            Statement::Switch(mut stmt) => {
                self.nesting.breakable += 1;
                let mut cases = Vec::with_capacity(stmt.cases.len());
                let mut failed = None;
                for mut case in stmt.cases {
                    match self.statements(case.consequent) {
                        Ok(consequent) => {
                            case.consequent = consequent;
                            cases.push(case);
                        }
                        Err(err) => {
                            failed = Some(err);
                            break;
                        }
                    }
                }
                self.nesting.breakable -= 1;
                if let Some(err) = failed {
                    return Err(err);
                }
                stmt.cases = cases;
                Statement::Switch(stmt)
            }
            Statement::Try(mut stmt) => {
                stmt.body = self.block(stmt.body)?;
                if let Some(mut catch) = stmt.catch_clause.take() {
                    catch.body = self.block(catch.body)?;
                    stmt.catch_clause = Some(catch);
                }
                stmt.finally_clause = stmt.finally_clause.map(|b| self.block(b)).transpose()?;
                Statement::Try(stmt)
            }
            stmt if stmt.is_loop() => {
                self.nesting.breakable += 1;
                self.nesting.loops += 1;
                let result = self.loop_body(stmt);
                self.nesting.breakable -= 1;
                self.nesting.loops -= 1;
                result?
            }
            other => other,
        })
    }

    fn loop_body(&mut self, stmt: Statement) -> LowerResult<Statement> {
        Ok(match stmt {
            Statement::While(mut stmt) => {
                stmt.body = self.boxed(stmt.body)?;
                Statement::While(stmt)
            }
            Statement::DoWhile(mut stmt) => {
                stmt.body = self.boxed(stmt.body)?;
                Statement::DoWhile(stmt)
            }
            Statement::For(mut stmt) => {
                stmt.body = self.boxed(stmt.body)?;
                Statement::For(stmt)
            }
            Statement::ForIn(mut stmt) => {
                stmt.body = self.boxed(stmt.body)?;
                Statement::ForIn(stmt)
            }
            Statement::ForOf(mut stmt) => {
                stmt.body = self.boxed(stmt.body)?;
                Statement::ForOf(stmt)
            }
            other => other,
        })
    }

    fn rewrite_return(&mut self, stmt: ReturnStatement) -> Statement {
        let Some(exit) = &self.plan.exit else {
            return Statement::Return(stmt);
        };
        let set_exit = expr_stmt(assign(id_expr(exit), boolean(true)));
        match stmt.value {
            Some(value) if !(self.is_pure)(&value) => {
                let names = &mut *self.names;
                let result = self
                    .result
                    .get_or_insert_with(|| names.fresh("result"))
                    .clone();
                block(vec![
                    const_decl(&result.name, value),
                    set_exit,
                    ret(Some(id_expr(&result))),
                ])
            }
            value => block(vec![set_exit, ret(value)]),
        }
    }

    /// `break` out of the construct
    fn leave(&self) -> Statement {
        match &self.plan.interrupt {
            Some(interrupt) => block(vec![
                expr_stmt(assign(id_expr(interrupt), boolean(true))),
                ret(None),
            ]),
            None => ret(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awaitless_ast::print_statement;

    fn pure(expr: &Expression) -> bool {
        expr.is_literal()
    }

    fn run(stmts: Vec<Statement>, plan: &ExitPlan) -> LowerResult<String> {
        let mut names = NameGenerator::new();
        let normalized = normalize(stmts, plan, &mut names, &pure)?;
        Ok(normalized.statements.iter().map(print_statement).collect())
    }

    fn loop_plan() -> ExitPlan {
        let mut plan = ExitPlan::new(JumpTarget::Loop, vec!["outer".to_string()]);
        plan.exit = Some(Identifier::synthetic("_exit"));
        plan.interrupt = Some(Identifier::synthetic("_interrupt"));
        plan
    }

    #[test]
    fn test_scan_finds_own_jumps_only() {
        let body = vec![
            while_stmt(ident("c"), block(vec![brk(None), cont(None)])),
            if_stmt(ident("d"), cont(None), None),
        ];
        let usage = scan(&body, JumpTarget::Loop, &[]);
        assert!(!usage.breaks);
        assert!(usage.continues);
        assert!(!usage.returns);
    }

    #[test]
    fn test_scan_labeled_break_through_inner_loop() {
        let body = vec![while_stmt(ident("c"), block(vec![brk(Some("outer"))]))];
        let usage = scan(&body, JumpTarget::Loop, &["outer".to_string()]);
        assert!(usage.breaks);
    }

    #[test]
    fn test_scan_ignores_nested_functions() {
        let body = vec![expr_stmt(function_expr(&[], vec![ret(None)]))];
        assert_eq!(scan(&body, JumpTarget::Opaque, &[]), JumpUsage::default());
    }

    #[test]
    fn test_return_sets_exit() {
        let output = run(vec![ret(Some(num(1.0)))], &loop_plan()).unwrap();
        assert_eq!(output, "{\n  _exit = true;\n  return 1;\n}\n");
    }

    #[test]
    fn test_impure_return_value_is_evaluated_first() {
        let output = run(vec![ret(Some(call(ident("f"), vec![])))], &loop_plan()).unwrap();
        assert_eq!(
            output,
            "{\n  const _result = f();\n  _exit = true;\n  return _result;\n}\n"
        );
    }

    #[test]
    fn test_break_and_continue_of_the_loop() {
        let output = run(vec![brk(None), cont(Some("outer"))], &loop_plan()).unwrap();
        assert_eq!(output, "{\n  _interrupt = true;\n  return;\n}\nreturn;\n");
    }

    #[test]
    fn test_inner_jumps_are_kept() {
        let body = vec![
            while_stmt(ident("c"), block(vec![brk(None), cont(None)])),
            labeled("inner", block(vec![brk(Some("inner"))])),
        ];
        let output = run(body.clone(), &loop_plan()).unwrap();
        let expected: String = body.iter().map(print_statement).collect();
        assert_eq!(output, expected);
    }

    #[test]
    fn test_continue_inside_switch_targets_loop() {
        let body = vec![switch(ident("x"), vec![case(num(1.0), vec![cont(None)])])];
        let output = run(body, &loop_plan()).unwrap();
        assert!(output.contains("case 1:\n    return;"));
    }

    #[test]
    fn test_escaping_jump_is_an_internal_error() {
        let plan = ExitPlan::new(JumpTarget::Opaque, vec![]);
        let err = run(vec![brk(None)], &plan).unwrap_err();
        assert!(matches!(err, LowerError::Internal { .. }));
    }

    #[test]
    fn test_labeled_block_break_returns() {
        let plan = ExitPlan::new(JumpTarget::Labeled, vec!["done".to_string()]);
        let output = run(vec![brk(Some("done"))], &plan).unwrap();
        assert_eq!(output, "return;\n");
    }

    #[test]
    fn test_returns_untouched_without_exit_sentinel() {
        let plan = ExitPlan::new(JumpTarget::Opaque, vec![]);
        let output = run(vec![ret(Some(call(ident("f"), vec![])))], &plan).unwrap();
        assert_eq!(output, "return f();\n");
    }
}
