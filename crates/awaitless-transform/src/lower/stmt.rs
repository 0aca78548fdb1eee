//! Statement lowering
//!
//! A suspending statement absorbs the statements that follow it (its
//! *tail*). Simple statements suspend in one expression slot and resume
//! through `_await`; control constructs are restructured into closures run
//! by a combinator, with the tail as the combinator's continuation.

use awaitless_ast::ast::*;
use awaitless_ast::build::*;
use tracing::{debug, trace};

use super::expr::Suspend;
use super::FunctionLowerer;
use crate::analysis::{expression_contains_await, references_name, statement_contains_await};
use crate::error::{LowerError, LowerResult};
use crate::exits::{self, ExitPlan, JumpTarget};
use crate::helpers::Helper;
use crate::reachability::completes;

impl FunctionLowerer<'_> {
    /// Lower `stmt`, which suspends, followed by `tail`
    pub(super) fn lower_statement(&mut self, mut stmt: Statement, tail: Vec<Statement>) -> LowerResult<Vec<Statement>> {
        match &stmt {
            Statement::VariableDecl(decl) if decl.declarations.len() > 1 => {
                return self.split_declaration(stmt, tail);
            }
            Statement::For(for_stmt) if init_suspends(for_stmt) => {
                return self.lower_for_with_suspending_init(stmt, tail);
            }
            _ => {}
        }

        if await_slot(&mut stmt).is_some() {
            return self.lower_suspending_slot(stmt, tail);
        }
        match stmt {
            Statement::If(_) => self.lower_if(stmt, tail),
            Statement::Block(_) => self.lower_nested_block(stmt, tail),
            Statement::Labeled(labeled_stmt) => self.lower_labeled(labeled_stmt, tail),
            Statement::Switch(_) => self.lower_switch(stmt, Vec::new(), tail),
            Statement::Try(_) => self.lower_try(stmt, tail),
            stmt if stmt.is_loop() => self.lower_loop(stmt, Vec::new(), tail),
            other => Err(LowerError::internal("statement cannot suspend", *other.span())),
        }
    }

    /// `let a = await x, b = f(a);` becomes one declaration per binding
    fn split_declaration(&mut self, stmt: Statement, tail: Vec<Statement>) -> LowerResult<Vec<Statement>> {
        let span = *stmt.span();
        let Statement::VariableDecl(decl) = stmt else {
            return Err(LowerError::internal("expected a declaration", span));
        };
        let kind = decl.kind;
        let mut stmts: Vec<Statement> = decl
            .declarations
            .into_iter()
            .map(|declarator| {
                Statement::VariableDecl(VariableDecl {
                    kind,
                    declarations: vec![declarator],
                    span,
                })
            })
            .collect();
        stmts.extend(tail);
        self.lower_block(stmts)
    }

    /// The declarations of the loop head run once, before the loop, in a
    /// block that scopes them
    fn lower_for_with_suspending_init(&mut self, stmt: Statement, tail: Vec<Statement>) -> LowerResult<Vec<Statement>> {
        let span = *stmt.span();
        let Statement::For(mut for_stmt) = stmt else {
            return Err(LowerError::internal("expected a for statement", span));
        };
        let Some(ForInit::VariableDecl(decl)) = for_stmt.init.take() else {
            return Err(LowerError::internal("expected a declared initializer", span));
        };
        let scoped = block(vec![Statement::VariableDecl(decl), Statement::For(for_stmt)]);
        self.lower_statement(scoped, tail)
    }

    // ========================================================================
    // Suspending expressions
    // ========================================================================

    /// The statement suspends in one of its expressions: evaluate up to the
    /// suspension, then resume with the rest of the statement and the tail
    fn lower_suspending_slot(&mut self, mut stmt: Statement, tail: Vec<Statement>) -> LowerResult<Vec<Statement>> {
        let span = *stmt.span();
        let Some(slot) = await_slot(&mut stmt) else {
            return Err(LowerError::internal("no suspending expression", span));
        };
        let flat = self.flatten(std::mem::replace(slot, undefined()))?;
        *slot = flat.rebuilt;

        let mut out = flat.pre;
        let Some(suspend) = flat.suspend else {
            // Restructured into statements that are lowered like any other
            out.push(stmt);
            out.extend(tail);
            return self.lower_block(out);
        };

        let (param, resumed) = self.resumed_binding(stmt, &suspend.hole);
        let mut body = Vec::with_capacity(tail.len() + 1);
        body.extend(resumed);
        body.extend(tail);
        let body = self.lower_block(body)?;
        let resume = self.resume(suspend, param, body);
        out.push(ret(Some(resume)));
        Ok(out)
    }

    /// The parameter of the resume callback and the statement it starts with
    ///
    /// `let x = <hole>;` binds `x` directly, and a statement that only
    /// mentions the resumed value disappears.
    fn resumed_binding(&self, stmt: Statement, hole: &Identifier) -> (Identifier, Option<Statement>) {
        match stmt {
            Statement::VariableDecl(decl)
                if decl.kind != VariableKind::Var
                    && decl.declarations.len() == 1
                    && matches!(&decl.declarations[0].init, Some(init) if init.is_identifier_named(&hole.name)) =>
            {
                let id = decl.declarations.into_iter().next().map(|d| d.id);
                (id.unwrap_or_else(|| hole.clone()), None)
            }
            Statement::Expression(expr_stmt) if self.facts.is_pure(&expr_stmt.expression) => (hole.clone(), None),
            stmt => (hole.clone(), Some(stmt)),
        }
    }

    /// The call that waits for the suspension and runs `body` with the
    /// resumed value bound to `param`
    fn resume(&mut self, suspend: Suspend, param: Identifier, body: Vec<Statement>) -> Expression {
        let Suspend { awaited, direct, .. } = suspend;
        let passthrough = matches!(
            body.as_slice(),
            [Statement::Return(ReturnStatement { value: Some(Expression::Identifier(returned)), .. })]
                if returned.name == param.name
        );
        let ignored = body.is_empty();

        // `await f()` with nothing else to decide: let `_call` invoke `f`
        if direct.is_none() {
            if let Expression::Call(call_expr) = &awaited {
                if call_expr.arguments.is_empty() && matches!(call_expr.callee.as_ref(), Expression::Identifier(_)) {
                    let callee = (*call_expr.callee).clone();
                    return if ignored {
                        call(self.unit.helper(Helper::CallIgnored), vec![callee])
                    } else if passthrough {
                        call(self.unit.helper(Helper::Call), vec![callee])
                    } else {
                        let then = callback(&param, body);
                        call(self.unit.helper(Helper::Call), vec![callee, then])
                    };
                }
            }
        }

        if ignored {
            let mut arguments = vec![awaited];
            arguments.extend(direct);
            return call(self.unit.helper(Helper::AwaitIgnored), arguments);
        }
        let mut arguments = vec![awaited];
        if passthrough {
            if let Some(direct) = direct {
                arguments.push(undefined());
                arguments.push(direct);
            }
        } else {
            arguments.push(callback(&param, body));
            arguments.extend(direct);
        }
        call(self.unit.helper(Helper::Await), arguments)
    }

    // ========================================================================
    // Blocks and conditionals
    // ========================================================================

    /// Lower a branch of an `if` in place
    fn lower_branch(&mut self, branch: Statement) -> LowerResult<Statement> {
        if !statement_contains_await(&branch) {
            return Ok(branch);
        }
        let stmts = match branch {
            Statement::Block(block_stmt) => block_stmt.statements,
            other => vec![other],
        };
        Ok(block(self.lower_block(stmts)?))
    }

    fn lower_if(&mut self, stmt: Statement, tail: Vec<Statement>) -> LowerResult<Vec<Statement>> {
        if tail.is_empty() || !completes(&stmt, &[]) {
            let span = *stmt.span();
            let Statement::If(mut if_stmt) = stmt else {
                return Err(LowerError::internal("expected an if statement", span));
            };
            trace!("if lowered in place");
            if_stmt.then_branch = Box::new(self.lower_branch(*if_stmt.then_branch)?);
            if_stmt.else_branch = match if_stmt.else_branch {
                Some(else_branch) => Some(Box::new(self.lower_branch(*else_branch)?)),
                None => None,
            };
            return Ok(vec![Statement::If(if_stmt)]);
        }
        self.invoke_with_tail(stmt, tail)
    }

    /// A nested block: spliced when it declares nothing, otherwise kept as a
    /// scope of its own
    fn lower_nested_block(&mut self, stmt: Statement, tail: Vec<Statement>) -> LowerResult<Vec<Statement>> {
        let span = *stmt.span();
        let Statement::Block(block_stmt) = stmt else {
            return Err(LowerError::internal("expected a block", span));
        };
        if !block_stmt.statements.iter().any(Statement::is_lexical_declaration) {
            let mut stmts = block_stmt.statements;
            stmts.extend(tail);
            return self.lower_block(stmts);
        }
        let stmt = Statement::Block(block_stmt);
        if tail.is_empty() || !completes(&stmt, &[]) {
            let Statement::Block(block_stmt) = stmt else {
                return Err(LowerError::internal("expected a block", span));
            };
            return Ok(vec![block(self.lower_block(block_stmt.statements)?)]);
        }
        self.invoke_with_tail(stmt, tail)
    }

    /// `return _invoke(function () { stmt }, continuation);`
    fn invoke_with_tail(&mut self, stmt: Statement, tail: Vec<Statement>) -> LowerResult<Vec<Statement>> {
        let span = *stmt.span();
        let body = vec![stmt];
        let usage = exits::scan(&body, JumpTarget::Opaque, &[]);
        let mut plan = ExitPlan::new(JumpTarget::Opaque, Vec::new());
        if usage.returns {
            plan.exit = Some(self.exit_sentinel(span)?);
        }
        debug!(returns = usage.returns, "restructuring construct with continuation");
        let body = synthetic_function(Vec::new(), self.closure_body(body, &plan)?);
        let then = self.continuation(plan.exit.as_ref(), tail)?;
        let invoke = call(self.unit.helper(Helper::Invoke), vec![body, then]);
        Ok(vec![ret(Some(invoke))])
    }

    // ========================================================================
    // Labels
    // ========================================================================

    fn lower_labeled(&mut self, labeled_stmt: LabeledStatement, tail: Vec<Statement>) -> LowerResult<Vec<Statement>> {
        let mut labels = vec![labeled_stmt.label.name];
        let mut body = *labeled_stmt.body;
        let body = loop {
            match body {
                Statement::Labeled(inner) => {
                    labels.push(inner.label.name);
                    body = *inner.body;
                }
                other => break other,
            }
        };
        if body.is_loop() {
            return self.lower_loop(body, labels, tail);
        }
        if let Statement::Switch(_) = body {
            return self.lower_switch(body, labels, tail);
        }

        let span = *body.span();
        let stmts = vec![body];
        let usage = exits::scan(&stmts, JumpTarget::Labeled, &labels);
        if !usage.breaks {
            // Nothing leaves through the label, so it can go
            let mut stmts = stmts;
            stmts.extend(tail);
            return self.lower_block(stmts);
        }

        let mut plan = ExitPlan::new(JumpTarget::Labeled, labels);
        if tail.is_empty() {
            let body = self.closure_body(stmts, &plan)?;
            return Ok(vec![ret(Some(call(synthetic_function(Vec::new(), body), Vec::new())))]);
        }
        if usage.returns {
            plan.exit = Some(self.exit_sentinel(span)?);
        }
        let body = synthetic_function(Vec::new(), self.closure_body(stmts, &plan)?);
        let then = self.continuation(plan.exit.as_ref(), tail)?;
        Ok(vec![ret(Some(call(self.unit.helper(Helper::Invoke), vec![body, then])))])
    }
}

/// `function (param) { body }`, without the parameter when the body never
/// reads it
fn callback(param: &Identifier, body: Vec<Statement>) -> Expression {
    let params = if references_name(&body, &param.name) {
        vec![param.clone()]
    } else {
        Vec::new()
    };
    synthetic_function(params, body)
}

/// A `for` whose declared initializers suspend
fn init_suspends(for_stmt: &ForStatement) -> bool {
    match &for_stmt.init {
        Some(ForInit::VariableDecl(decl)) => decl
            .declarations
            .iter()
            .any(|d| d.init.as_ref().is_some_and(expression_contains_await)),
        _ => false,
    }
}

/// The expression of `stmt` that is evaluated first and suspends, for the
/// statements that suspend in exactly one place before any control flow
pub(super) fn await_slot(stmt: &mut Statement) -> Option<&mut Expression> {
    let slot = match stmt {
        Statement::Expression(expr_stmt) => &mut expr_stmt.expression,
        Statement::Return(ReturnStatement { value: Some(value), .. }) => value,
        Statement::Throw(throw_stmt) => &mut throw_stmt.value,
        Statement::VariableDecl(decl) if decl.declarations.len() == 1 => decl.declarations[0].init.as_mut()?,
        Statement::If(if_stmt) => &mut if_stmt.condition,
        Statement::Switch(switch_stmt) => &mut switch_stmt.discriminant,
        Statement::For(ForStatement { init: Some(ForInit::Expression(init)), .. }) => init,
        Statement::ForIn(for_in) => &mut for_in.right,
        Statement::ForOf(for_of) => &mut for_of.right,
        _ => return None,
    };
    if expression_contains_await(slot) {
        Some(slot)
    } else {
        None
    }
}
