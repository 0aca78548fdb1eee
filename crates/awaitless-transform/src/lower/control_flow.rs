//! Loops, switch and try
//!
//! Each construct becomes one combinator call whose callbacks are the
//! construct's parts. Jumps out of the construct's body are rewritten into
//! sentinel assignments the callbacks test:
//!
//! ```text
//! while (t) { if (a) break; await b; }
//!
//! var _interrupt;
//! return _for(function () {
//!   return !_interrupt && t;
//! }, void 0, function () {
//!   if (a) {
//!     _interrupt = true;
//!     return;
//!   }
//!   return _awaitIgnored(b);
//! });
//! ```

use awaitless_ast::ast::*;
use awaitless_ast::build::*;
use awaitless_ast::scope::lexical_declared_names;
use tracing::debug;

use super::FunctionLowerer;
use crate::analysis::{assigns_name, captured_by_closure, expression_contains_await, references_name};
use crate::error::{LowerError, LowerResult};
use crate::exits::{self, ExitPlan, JumpTarget, JumpUsage};
use crate::helpers::Helper;
use crate::reachability::{completes, statements_reach, ExitKinds};

impl FunctionLowerer<'_> {
    // ========================================================================
    // Loops
    // ========================================================================

    pub(super) fn lower_loop(
        &mut self,
        stmt: Statement,
        labels: Vec<String>,
        tail: Vec<Statement>,
    ) -> LowerResult<Vec<Statement>> {
        let span = *stmt.span();
        let tail = if completes(&stmt, &labels) { tail } else { Vec::new() };
        let usage = match loop_body(&stmt) {
            Some(body) => exits::scan(std::slice::from_ref(body), JumpTarget::Loop, &labels),
            None => return Err(LowerError::internal("expected a loop", span)),
        };

        let mut plan = ExitPlan::new(JumpTarget::Loop, labels);
        if usage.breaks {
            plan.interrupt = Some(self.sentinel("interrupt", span)?);
        }
        if usage.returns {
            plan.exit = Some(self.exit_sentinel(span)?);
        }
        debug!(breaks = usage.breaks, returns = usage.returns, "restructuring loop");

        let mut out = Vec::new();
        let looped = match stmt {
            Statement::While(while_stmt) => {
                self.lower_for_loop(Some(while_stmt.condition), None, *while_stmt.body, Vec::new(), &plan)?
            }
            Statement::DoWhile(do_while_stmt) => {
                let body = self.loop_callback(*do_while_stmt.body, Vec::new(), Vec::new(), &plan)?;
                let test = self.loop_test(Some(do_while_stmt.condition), &plan)?;
                call(self.unit.helper(Helper::Do), vec![body, test])
            }
            Statement::For(mut for_stmt) => match for_to_parts(&for_stmt, usage) {
                Some((counter, array)) => {
                    let body = self.loop_callback(*for_stmt.body, vec![counter], Vec::new(), &plan)?;
                    call(self.unit.helper(Helper::ForTo), vec![array, body])
                }
                None => {
                    let mut test = for_stmt.test.take();
                    let mut update = for_stmt.update.take();
                    let mut body = *for_stmt.body;
                    let mut prefix = Vec::new();
                    match for_stmt.init.take() {
                        Some(ForInit::VariableDecl(decl)) if decl.kind != VariableKind::Var => {
                            let head = LoopHead {
                                test: &mut test,
                                update: &mut update,
                                body: &mut body,
                            };
                            prefix = self.lexical_loop_head(decl, head, &mut out);
                        }
                        Some(ForInit::VariableDecl(decl)) => out.push(Statement::VariableDecl(decl)),
                        Some(ForInit::Expression(init)) => out.push(expr_stmt(init)),
                        None => {}
                    }
                    self.lower_for_loop(test, update, body, prefix, &plan)?
                }
            },
            Statement::ForIn(for_in) => {
                let (param, prefix) = self.loop_binding(for_in.left);
                let mut body = statements_of(*for_in.body);
                let helper = if take_own_property_guard(&mut body, &param, &for_in.right) {
                    Helper::ForOwn
                } else {
                    Helper::ForIn
                };
                let body = self.loop_callback(block(body), vec![param], prefix, &plan)?;
                let mut arguments = vec![for_in.right, body];
                arguments.extend(loop_check(&plan));
                call(self.unit.helper(helper), arguments)
            }
            Statement::ForOf(for_of) => {
                let helper = if for_of.is_await { Helper::ForAwaitOf } else { Helper::ForOf };
                let (param, prefix) = self.loop_binding(for_of.left);
                let body = self.loop_callback(*for_of.body, vec![param], prefix, &plan)?;
                let mut arguments = vec![for_of.right, body];
                arguments.extend(loop_check(&plan));
                call(self.unit.helper(helper), arguments)
            }
            other => return Err(LowerError::internal("expected a loop", *other.span())),
        };

        out.extend(self.chain(looped, plan.exit.clone(), tail)?);
        Ok(out)
    }

    /// `_for(test, update, body)`
    fn lower_for_loop(
        &mut self,
        test: Option<Expression>,
        update: Option<Expression>,
        body: Statement,
        prefix: Vec<Statement>,
        plan: &ExitPlan,
    ) -> LowerResult<Expression> {
        let test = self.loop_test(test, plan)?;
        let update = self.loop_update(update, plan)?;
        let body = self.loop_callback(body, Vec::new(), prefix, plan)?;
        Ok(call(self.unit.helper(Helper::For), vec![test, update, body]))
    }

    /// Moves the bindings of a `for (let ...)` head to fresh names, so the
    /// declaration pushed to `out` cannot clash with the enclosing scope.
    ///
    /// A binding captured by a closure in the body keeps its own name inside
    /// the body callback, copied from the fresh one on each iteration. When
    /// the body also assigns it, the copy is stored back before the update.
    /// Returns the statements that open the body callback.
    fn lexical_loop_head(
        &mut self,
        mut decl: VariableDecl,
        head: LoopHead<'_>,
        out: &mut Vec<Statement>,
    ) -> Vec<Statement> {
        let mut prefix = Vec::new();
        let mut stores = Vec::new();
        let names: Vec<Identifier> = decl.declarations.iter().map(|d| d.id.clone()).collect();
        for name in names {
            let holder = self.unit.names.fresh(&name.name);
            let body = std::slice::from_ref(&*head.body);
            let captured = captured_by_closure(body, &name.name);
            let assigned = assigns_name(body, &name.name);

            let mut rename = Rename {
                from: &name.name,
                to: &holder.name,
            };
            walk_variable_decl_mut(&mut rename, &mut decl);
            for expr in [&mut *head.test, &mut *head.update].into_iter().flatten() {
                rename.visit_expression_mut(expr);
            }
            if !captured {
                rename.visit_statement_mut(head.body);
                continue;
            }

            prefix.push(Statement::VariableDecl(VariableDecl {
                kind: decl.kind,
                declarations: vec![VariableDeclarator {
                    id: name.clone(),
                    init: Some(id_expr(&holder)),
                    span: name.span,
                }],
                span: name.span,
            }));
            if assigned {
                stores.push(expr_stmt(assign(id_expr(&holder), id_expr(&name))));
            }
        }
        debug!(copies = prefix.len(), stores = stores.len(), "renamed lexical loop head");

        if !stores.is_empty() {
            let store = self.unit.names.fresh("store");
            out.push(let_decl(&store.name, None));
            prefix.push(expr_stmt(assign(id_expr(&store), synthetic_function(Vec::new(), stores))));
            let stored = call(id_expr(&store), Vec::new());
            *head.update = Some(match head.update.take() {
                Some(update) => sequence(vec![stored, update]),
                None => stored,
            });
        }
        out.push(Statement::VariableDecl(decl));
        prefix
    }

    /// The test callback: false once a sentinel is set, then the loop test
    fn loop_test(&mut self, test: Option<Expression>, plan: &ExitPlan) -> LowerResult<Expression> {
        let body = match test {
            Some(test) if expression_contains_await(&test) => {
                let mut stmts = Vec::new();
                if let Some(stopped) = stopped(plan) {
                    stmts.push(if_stmt(stopped, ret(Some(boolean(false))), None));
                }
                stmts.push(ret(Some(test)));
                self.lower_level(stmts)?
            }
            Some(test) => {
                let test = match guards(plan) {
                    Some(guards) => and(guards, test),
                    None => test,
                };
                vec![ret(Some(test))]
            }
            None => vec![ret(Some(guards(plan).unwrap_or_else(|| boolean(true))))],
        };
        Ok(synthetic_function(Vec::new(), body))
    }

    /// The update callback, skipped once a sentinel is set; `void 0` without
    /// an update
    fn loop_update(&mut self, update: Option<Expression>, plan: &ExitPlan) -> LowerResult<Expression> {
        let Some(update) = update else {
            return Ok(undefined());
        };
        let suspends = expression_contains_await(&update);
        let mut stmt = expr_stmt(update);
        if let Some(guards) = guards(plan) {
            stmt = if_stmt(guards, block(vec![stmt]), None);
        }
        let body = if suspends {
            self.lower_level(vec![stmt])?
        } else {
            vec![stmt]
        };
        Ok(synthetic_function(Vec::new(), body))
    }

    /// The body callback: `prefix` runs first, then the loop body with its
    /// jumps rewritten
    fn loop_callback(
        &mut self,
        body: Statement,
        params: Vec<Identifier>,
        prefix: Vec<Statement>,
        plan: &ExitPlan,
    ) -> LowerResult<Expression> {
        let mut stmts = prefix;
        stmts.extend(statements_of(body));
        let body = self.closure_body(stmts, plan)?;
        Ok(synthetic_function(params, body))
    }

    /// The callback parameter of a for-in/of loop, and the assignment that
    /// stores it when the head is an existing target
    fn loop_binding(&mut self, head: ForHead) -> (Identifier, Vec<Statement>) {
        match head {
            ForHead::Declaration(_, id) => (id, Vec::new()),
            ForHead::Target(target) => {
                let value = self.unit.names.fresh("value");
                let store = expr_stmt(assign(target, id_expr(&value)));
                (value, vec![store])
            }
        }
    }

    // ========================================================================
    // Switch
    // ========================================================================

    /// `_switch(discriminant, [[test, body, check], ...])`
    ///
    /// A case entry without a body falls through to the next body; one
    /// without a check stops after its body.
    pub(super) fn lower_switch(
        &mut self,
        stmt: Statement,
        labels: Vec<String>,
        tail: Vec<Statement>,
    ) -> LowerResult<Vec<Statement>> {
        let span = *stmt.span();
        let tail = if completes(&stmt, &labels) { tail } else { Vec::new() };
        let Statement::Switch(switch_stmt) = stmt else {
            return Err(LowerError::internal("expected a switch", span));
        };

        let mut cases = Vec::with_capacity(switch_stmt.cases.len());
        let mut usage = JumpUsage::default();
        for case in switch_stmt.cases {
            let mut body = case.consequent;
            let ends_in_break = matches!(
                body.last(),
                Some(Statement::Break(BreakStatement { label, .. }))
                    if label.as_ref().map_or(true, |label| labels.contains(&label.name))
            );
            if ends_in_break {
                body.pop();
            }
            let case_usage = exits::scan(&body, JumpTarget::Switch, &labels);
            usage.breaks |= case_usage.breaks;
            usage.returns |= case_usage.returns;
            cases.push((case.test, body, ends_in_break));
        }
        // Each case body becomes its own closure
        for (i, (_, body, _)) in cases.iter().enumerate() {
            for (_, name) in lexical_declared_names(body) {
                let shared = cases
                    .iter()
                    .enumerate()
                    .any(|(j, (_, other, _))| j != i && references_name(other, &name.name));
                if shared {
                    return Err(LowerError::unsupported(
                        format!("'{}' declared in one switch case and used in another", name.name),
                        name.span,
                    ));
                }
            }
        }

        let mut plan = ExitPlan::new(JumpTarget::Switch, labels);
        if usage.breaks {
            plan.interrupt = Some(self.sentinel("break", span)?);
        }
        if usage.returns {
            plan.exit = Some(self.exit_sentinel(span)?);
        }
        debug!(cases = cases.len(), breaks = usage.breaks, returns = usage.returns, "restructuring switch");

        let last = cases.len().saturating_sub(1);
        let mut entries = Vec::with_capacity(cases.len());
        for (i, (test, body, ends_in_break)) in cases.into_iter().enumerate() {
            let test = match test {
                Some(test) if expression_contains_await(&test) => {
                    synthetic_function(Vec::new(), self.lower_level(vec![ret(Some(test))])?)
                }
                Some(test) => synthetic_function(Vec::new(), vec![ret(Some(test))]),
                None => undefined(),
            };
            let stops = ends_in_break || i == last || statements_reach(&body, ExitKinds::STOP).all;
            let empty = body.is_empty();
            let body = if !empty {
                synthetic_function(Vec::new(), self.closure_body(body, &plan)?)
            } else if ends_in_break || i == last {
                self.unit.helper(Helper::Empty)
            } else {
                undefined()
            };
            let mut entry = vec![test, body];
            if !stops && !empty {
                let check = match stopped(&plan) {
                    Some(stopped) => synthetic_function(Vec::new(), vec![ret(Some(stopped))]),
                    None => self.unit.helper(Helper::Empty),
                };
                entry.push(check);
            }
            while entry.last().is_some_and(Expression::is_undefined) {
                entry.pop();
            }
            entries.push(array(entry));
        }

        let switched = call(
            self.unit.helper(Helper::Switch),
            vec![switch_stmt.discriminant, array(entries)],
        );
        self.chain(switched, plan.exit.clone(), tail)
    }

    // ========================================================================
    // Try
    // ========================================================================

    /// `_catch(body, recover)`, wrapped in `_finally` or `_finallyRethrows`
    /// when there is a finalizer
    pub(super) fn lower_try(&mut self, stmt: Statement, tail: Vec<Statement>) -> LowerResult<Vec<Statement>> {
        let span = *stmt.span();
        let tail = if completes(&stmt, &[]) { tail } else { Vec::new() };
        let usage = exits::scan(std::slice::from_ref(&stmt), JumpTarget::Opaque, &[]);
        let Statement::Try(try_stmt) = stmt else {
            return Err(LowerError::internal("expected a try statement", span));
        };

        let mut plan = ExitPlan::new(JumpTarget::Opaque, Vec::new());
        if usage.returns && !tail.is_empty() {
            plan.exit = Some(self.exit_sentinel(span)?);
        }
        debug!(
            catch = try_stmt.catch_clause.is_some(),
            finally = try_stmt.finally_clause.is_some(),
            "restructuring try"
        );

        let mut guarded = synthetic_function(Vec::new(), self.closure_body(try_stmt.body.statements, &plan)?);
        let caught = try_stmt.catch_clause.is_some();
        if let Some(catch_clause) = try_stmt.catch_clause {
            let params = catch_clause.param.into_iter().collect();
            let recover = synthetic_function(params, self.closure_body(catch_clause.body.statements, &plan)?);
            guarded = call(self.unit.helper(Helper::Catch), vec![guarded, recover]);
        }

        let value = match try_stmt.finally_clause {
            None => guarded,
            Some(finalizer) => {
                let body = if caught {
                    synthetic_function(Vec::new(), vec![ret(Some(guarded))])
                } else {
                    guarded
                };
                if statements_reach(&finalizer.statements, ExitKinds::STOP).all {
                    let finalizer = synthetic_function(Vec::new(), self.closure_body(finalizer.statements, &plan)?);
                    call(self.unit.helper(Helper::Finally), vec![body, finalizer])
                } else {
                    let thrown = self.unit.names.fresh("wasThrown");
                    let result = self.unit.names.fresh("result");
                    let mut stmts = self.normalize(finalizer.statements, &plan)?;
                    let rethrow = call(
                        self.unit.helper(Helper::Rethrow),
                        vec![id_expr(&thrown), id_expr(&result)],
                    );
                    stmts.push(ret(Some(rethrow)));
                    let finalizer = synthetic_function(vec![thrown, result], self.lower_level(stmts)?);
                    call(self.unit.helper(Helper::FinallyRethrows), vec![body, finalizer])
                }
            }
        };
        self.chain(value, plan.exit.clone(), tail)
    }
}

/// The parts of a `for` loop that see its head's bindings
struct LoopHead<'a> {
    test: &'a mut Option<Expression>,
    update: &'a mut Option<Expression>,
    body: &'a mut Statement,
}

/// Renames every occurrence of a name. Only used inside a region that the
/// renamed binding shadows completely.
struct Rename<'a> {
    from: &'a str,
    to: &'a str,
}

impl VisitorMut for Rename<'_> {
    fn visit_identifier_mut(&mut self, id: &mut Identifier) {
        if id.name == self.from {
            id.name = self.to.to_string();
        }
    }
}

fn loop_body(stmt: &Statement) -> Option<&Statement> {
    match stmt {
        Statement::While(while_stmt) => Some(&while_stmt.body),
        Statement::DoWhile(do_while_stmt) => Some(&do_while_stmt.body),
        Statement::For(for_stmt) => Some(&for_stmt.body),
        Statement::ForIn(for_in) => Some(&for_in.body),
        Statement::ForOf(for_of) => Some(&for_of.body),
        _ => None,
    }
}

/// The statements of a loop body, unwrapping its block
fn statements_of(body: Statement) -> Vec<Statement> {
    match body {
        Statement::Block(block_stmt) => block_stmt.statements,
        Statement::Empty(_) => Vec::new(),
        other => vec![other],
    }
}

/// The sentinels of `plan`, as identifier expressions
fn sentinels(plan: &ExitPlan) -> Vec<Expression> {
    plan.interrupt.iter().chain(plan.exit.iter()).map(id_expr).collect()
}

/// `!_interrupt && !_exit`: the loop may go on
fn guards(plan: &ExitPlan) -> Option<Expression> {
    sentinels(plan).into_iter().map(not).reduce(and)
}

/// `_interrupt || _exit`: the construct was left
fn stopped(plan: &ExitPlan) -> Option<Expression> {
    sentinels(plan).into_iter().reduce(or)
}

/// The check callback of the iteration helpers
fn loop_check(plan: &ExitPlan) -> Option<Expression> {
    stopped(plan).map(|stopped| synthetic_function(Vec::new(), vec![ret(Some(stopped))]))
}

/// `for (let i = 0; i < array.length; i++)` over an array and counter the
/// body never reassigns, with no way out of the loop but finishing it
fn for_to_parts(for_stmt: &ForStatement, usage: JumpUsage) -> Option<(Identifier, Expression)> {
    if usage.breaks || usage.returns {
        return None;
    }
    let Some(ForInit::VariableDecl(decl)) = &for_stmt.init else {
        return None;
    };
    let [declarator] = decl.declarations.as_slice() else {
        return None;
    };
    if decl.kind != VariableKind::Let || !matches!(&declarator.init, Some(init) if is_zero(init)) {
        return None;
    }
    let counter = &declarator.id;

    let Some(Expression::Binary(test)) = &for_stmt.test else {
        return None;
    };
    if test.operator != BinaryOperator::LessThan || !test.left.is_identifier_named(&counter.name) {
        return None;
    }
    let Expression::Member(length) = test.right.as_ref() else {
        return None;
    };
    let array = length.object.as_identifier()?;
    if !matches!(&length.property, MemberProperty::Identifier(property) if property.name == "length") {
        return None;
    }

    let increments = match &for_stmt.update {
        Some(Expression::Update(update)) => {
            update.operator == UpdateOperator::Increment && update.target.is_identifier_named(&counter.name)
        }
        Some(Expression::Assignment(assignment)) => {
            assignment.operator == AssignmentOperator::AddAssign
                && assignment.left.is_identifier_named(&counter.name)
                && matches!(assignment.right.as_literal(), Some(LiteralValue::Number(n)) if *n == 1.0)
        }
        _ => false,
    };
    if !increments {
        return None;
    }
    let body = std::slice::from_ref(for_stmt.body.as_ref());
    if assigns_name(body, &counter.name) || assigns_name(body, &array.name) {
        return None;
    }
    Some((counter.clone(), Expression::Identifier(array.clone())))
}

fn is_zero(expr: &Expression) -> bool {
    matches!(expr.as_literal(), Some(LiteralValue::Number(n)) if *n == 0.0)
}

/// Remove a leading `if (!object.hasOwnProperty(key)) continue;`, which
/// `_forOwn` makes redundant
fn take_own_property_guard(body: &mut Vec<Statement>, key: &Identifier, object: &Expression) -> bool {
    let Some(Statement::If(guard)) = body.first() else {
        return false;
    };
    if guard.else_branch.is_some() {
        return false;
    }
    let continues = match guard.then_branch.as_ref() {
        Statement::Continue(ContinueStatement { label: None, .. }) => true,
        Statement::Block(block_stmt) => matches!(
            block_stmt.statements.as_slice(),
            [Statement::Continue(ContinueStatement { label: None, .. })]
        ),
        _ => false,
    };
    let Some(object) = object.as_identifier() else {
        return false;
    };
    let Expression::Unary(negated) = &guard.condition else {
        return false;
    };
    let Expression::Call(check) = negated.operand.as_ref() else {
        return false;
    };
    let Expression::Member(callee) = check.callee.as_ref() else {
        return false;
    };
    let is_own_check = negated.operator == UnaryOperator::Not
        && callee.object.is_identifier_named(&object.name)
        && matches!(&callee.property, MemberProperty::Identifier(p) if p.name == "hasOwnProperty")
        && matches!(check.arguments.as_slice(), [argument] if argument.is_identifier_named(&key.name));
    if continues && is_own_check {
        body.remove(0);
        return true;
    }
    false
}
