//! Async function lowering
//!
//! Rewrites the body of every async function into continuation-passing code
//! built on the runtime helpers. The body is processed as a statement list:
//! everything before the first statement that suspends is kept as is, that
//! statement is rewritten, and the statements after it become its
//! continuation. Control constructs that suspend are restructured
//! outside-in, so a construct's jumps are always resolved against the
//! construct itself.
//!
//! Each restructured body runs in a *level*: a function body or synthetic
//! closure whose sentinel variables (`_exit`, `_interrupt`, `_break`) are
//! declared at its top.

mod control_flow;
mod expr;
mod stmt;

use awaitless_ast::ast::*;
use awaitless_ast::build::*;
use awaitless_ast::{FunctionScope, NameGenerator, Span};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::analysis::{statement_contains_await, statements_contain_await};
use crate::config::Options;
use crate::error::{LowerError, LowerResult};
use crate::exits::{self, ExitPlan};
use crate::helpers::{Helper, HelperRegistry};
use crate::prepare;

// ============================================================================
// Unit state
// ============================================================================

/// State shared by every function of one output unit
pub(crate) struct Unit {
    pub names: NameGenerator,
    pub helpers: HelperRegistry,
}

impl Unit {
    pub fn new(options: &Options, names: NameGenerator) -> Self {
        Self {
            names,
            helpers: HelperRegistry::new(options),
        }
    }

    /// Reference a runtime helper
    pub fn helper(&mut self, helper: Helper) -> Expression {
        self.helpers.reference(helper, &mut self.names)
    }
}

// ============================================================================
// Function facts
// ============================================================================

/// What the lowering knows about the bindings of the function being lowered
pub(crate) struct Facts {
    scope: FunctionScope,
    /// Generated names that are assigned exactly once: hoisted operands,
    /// resumed values and the `this`/`arguments` captures
    stable: FxHashSet<String>,
}

impl Facts {
    pub fn new(scope: FunctionScope, stable: impl IntoIterator<Item = String>) -> Self {
        Self {
            scope,
            stable: stable.into_iter().collect(),
        }
    }

    /// Can `expr` be evaluated later, or more than once, without changing
    /// the program's behavior
    ///
    /// Identifiers qualify only when they are generated temporaries or
    /// bindings of this function that are never reassigned. Free identifiers
    /// may be reassigned by any call, so they never do.
    pub fn is_pure(&self, expr: &Expression) -> bool {
        match expr {
            Expression::Literal(_) | Expression::Function(_) | Expression::This(_) => true,
            Expression::Identifier(id) => {
                id.name == "undefined"
                    || self.stable.contains(&id.name)
                    || self.scope.is_constant(&id.name)
            }
            Expression::Unary(unary) => match unary.operator {
                UnaryOperator::Not | UnaryOperator::Typeof | UnaryOperator::Void => {
                    self.is_pure(&unary.operand)
                }
                UnaryOperator::Plus | UnaryOperator::Minus | UnaryOperator::BitwiseNot => {
                    unary.operand.is_literal()
                }
                UnaryOperator::Delete => false,
            },
            Expression::Array(array) => array.elements.iter().all(|e| self.is_pure(e)),
            Expression::Object(object) => object.properties.iter().all(|prop| {
                !matches!(prop.key, PropertyKey::Computed(_)) && self.is_pure(&prop.value)
            }),
            _ => false,
        }
    }

    /// Evaluating `expr` cannot throw
    fn cannot_throw(&self, expr: &Expression) -> bool {
        matches!(expr, Expression::Identifier(_)) || self.is_pure(expr)
    }

    fn mark_stable(&mut self, id: &Identifier) {
        self.stable.insert(id.name.clone());
    }
}

// ============================================================================
// Function lowering
// ============================================================================

/// Sentinels declared at the top of one level
#[derive(Debug, Default)]
struct Level {
    /// `_exit`, shared by every construct of the level that can return
    exit: Option<Identifier>,
    /// Every sentinel to declare, in creation order
    sentinels: Vec<Identifier>,
}

pub(crate) struct FunctionLowerer<'u> {
    unit: &'u mut Unit,
    facts: Facts,
    levels: Vec<Level>,
}

impl<'u> FunctionLowerer<'u> {
    pub fn new(unit: &'u mut Unit, facts: Facts) -> Self {
        Self {
            unit,
            facts,
            levels: Vec::new(),
        }
    }

    /// Lower a function body or closure body, declaring the sentinels it
    /// needs at its top
    pub fn lower_level(&mut self, stmts: Vec<Statement>) -> LowerResult<Vec<Statement>> {
        self.levels.push(Level::default());
        let lowered = self.lower_block(stmts);
        let level = self.levels.pop().unwrap_or_default();
        let mut body = lowered?;
        if !level.sentinels.is_empty() {
            let declarators = level
                .sentinels
                .iter()
                .map(|id| declarator(&id.name, None))
                .collect();
            body.insert(0, declaration(VariableKind::Var, declarators));
        }
        Ok(body)
    }

    /// Lower a statement list: keep everything up to the first suspending
    /// statement and let that statement absorb the rest
    pub(super) fn lower_block(&mut self, stmts: Vec<Statement>) -> LowerResult<Vec<Statement>> {
        let mut stmts = functions_first(stmts);
        drop_unreachable(&mut stmts);
        let Some(index) = stmts.iter().position(statement_contains_await) else {
            return Ok(stmts);
        };
        let tail = stmts.split_off(index + 1);
        let stmt = stmts.remove(index);
        let lowered = self.lower_statement(stmt, tail)?;
        stmts.extend(lowered);
        Ok(stmts)
    }

    /// `_exit` of the current level, created on first use
    fn exit_sentinel(&mut self, span: Span) -> LowerResult<Identifier> {
        let names = &mut self.unit.names;
        let level = self
            .levels
            .last_mut()
            .ok_or_else(|| LowerError::internal("exit requested outside a level", span))?;
        if let Some(exit) = &level.exit {
            return Ok(exit.clone());
        }
        let exit = names.fresh("exit");
        level.sentinels.push(exit.clone());
        level.exit = Some(exit.clone());
        Ok(exit)
    }

    /// A new sentinel declared in the current level
    fn sentinel(&mut self, hint: &str, span: Span) -> LowerResult<Identifier> {
        let names = &mut self.unit.names;
        let level = self
            .levels
            .last_mut()
            .ok_or_else(|| LowerError::internal("sentinel requested outside a level", span))?;
        let id = names.fresh(hint);
        level.sentinels.push(id.clone());
        Ok(id)
    }

    /// Rewrite the exits of a construct body according to `plan`
    fn normalize(&mut self, stmts: Vec<Statement>, plan: &ExitPlan) -> LowerResult<Vec<Statement>> {
        let facts = &self.facts;
        let is_pure = |expr: &Expression| facts.is_pure(expr);
        let normalized = exits::normalize(stmts, plan, &mut self.unit.names, &is_pure)?;
        if let Some(result) = &normalized.result {
            self.facts.mark_stable(result);
        }
        Ok(normalized.statements)
    }

    /// Normalize a construct body and lower it as a level of its own
    fn closure_body(&mut self, stmts: Vec<Statement>, plan: &ExitPlan) -> LowerResult<Vec<Statement>> {
        let normalized = self.normalize(stmts, plan)?;
        self.lower_level(normalized)
    }

    /// The code after a restructured construct, as the callback its
    /// combinator chains to
    ///
    /// With an exit sentinel, the callback receives the construct's result
    /// and returns it when the construct returned.
    fn continuation(&mut self, exit: Option<&Identifier>, tail: Vec<Statement>) -> LowerResult<Expression> {
        let mut params = Vec::new();
        let mut body = Vec::new();
        if let Some(exit) = exit {
            let result = self.unit.names.fresh("result");
            body.push(if_stmt(id_expr(exit), ret(Some(id_expr(&result))), None));
            params.push(result);
        }
        body.extend(self.lower_block(tail)?);
        Ok(synthetic_function(params, body))
    }

    /// `return value;` when nothing follows, otherwise
    /// `return _continue(value, continuation);`
    fn chain(&mut self, value: Expression, exit: Option<Identifier>, tail: Vec<Statement>) -> LowerResult<Vec<Statement>> {
        if tail.is_empty() {
            return Ok(vec![ret(Some(value))]);
        }
        let then = self.continuation(exit.as_ref(), tail)?;
        let continued = call(self.unit.helper(Helper::Continue), vec![value, then]);
        Ok(vec![ret(Some(continued))])
    }

    /// Wrap a lowered body so the function always returns a promise and
    /// reports synchronous throws as rejections
    ///
    /// Bodies that already end in a promise-producing helper call, with
    /// nothing before it that could throw, are left unwrapped.
    fn finalize(&mut self, body: Vec<Statement>) -> Vec<Statement> {
        if self.is_guarded(&body) {
            return body;
        }
        let wrapped = call(self.unit.helper(Helper::Call), vec![synthetic_function(Vec::new(), body)]);
        vec![ret(Some(wrapped))]
    }

    fn is_guarded(&self, body: &[Statement]) -> bool {
        let Some((last, init)) = body.split_last() else {
            return false;
        };
        let safe_prefix = init.iter().all(|stmt| match stmt {
            Statement::FunctionDecl(_) | Statement::Empty(_) => true,
            Statement::VariableDecl(decl) => {
                decl.kind == VariableKind::Var
                    && decl
                        .declarations
                        .iter()
                        .all(|d| d.init.as_ref().map_or(true, |init| self.facts.is_pure(init)))
            }
            _ => false,
        });
        if !safe_prefix {
            return false;
        }
        let Statement::Return(ReturnStatement { value: Some(Expression::Call(returned)), .. }) = last else {
            return false;
        };
        let guarded_helpers = [Helper::Await, Helper::AwaitIgnored, Helper::Call, Helper::CallIgnored];
        let calls_helper = guarded_helpers.iter().any(|helper| {
            self.unit
                .helpers
                .local_name(*helper)
                .is_some_and(|name| returned.callee.is_identifier_named(name))
        });
        calls_helper && returned.arguments.iter().all(|arg| self.facts.cannot_throw(arg))
    }
}

/// Function declarations first, in their original order
fn functions_first(stmts: Vec<Statement>) -> Vec<Statement> {
    if !stmts.iter().any(|s| matches!(s, Statement::FunctionDecl(_))) {
        return stmts;
    }
    let (mut functions, rest): (Vec<_>, Vec<_>) = stmts
        .into_iter()
        .partition(|s| matches!(s, Statement::FunctionDecl(_)));
    functions.extend(rest);
    functions
}

/// Cut the list after its first unconditional jump
fn drop_unreachable(stmts: &mut Vec<Statement>) {
    let jump = stmts.iter().position(|s| {
        matches!(
            s,
            Statement::Return(_) | Statement::Throw(_) | Statement::Break(_) | Statement::Continue(_)
        )
    });
    if let Some(index) = jump {
        stmts.truncate(index + 1);
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Lower every async function in `stmts`, innermost first
pub(crate) fn lower_async_functions(unit: &mut Unit, stmts: &mut Vec<Statement>) -> LowerResult<()> {
    let mut finder = AsyncFunctions { unit, error: None };
    walk_statements_mut(&mut finder, stmts);
    match finder.error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

struct AsyncFunctions<'a> {
    unit: &'a mut Unit,
    error: Option<LowerError>,
}

impl VisitorMut for AsyncFunctions<'_> {
    fn visit_function_mut(&mut self, func: &mut Function) {
        if self.error.is_some() {
            return;
        }
        walk_function_mut(self, func);
        if self.error.is_none() && func.is_async {
            if let Err(error) = lower_function(self.unit, func) {
                self.error = Some(error);
            }
        }
    }
}

fn lower_function(unit: &mut Unit, func: &mut Function) -> LowerResult<()> {
    let name = func
        .name
        .as_ref()
        .map(|id| id.name.clone())
        .unwrap_or_else(|| "<anonymous>".to_string());
    if func.is_generator {
        return Err(LowerError::unsupported("async generator function", func.span));
    }
    debug!(function = %name, arrow = func.is_arrow, "lowering async function");

    let body = std::mem::take(&mut func.body.statements);
    let prepared = prepare::prepare(&func.params, body, func.is_arrow, &mut unit.names)?;
    let suspends = statements_contain_await(&prepared.body);
    let scope = FunctionScope::analyze_body(&func.params, &prepared.body, func.is_arrow);
    let facts = Facts::new(scope, prepared.captured);

    let mut lowerer = FunctionLowerer::new(unit, facts);
    let lowered = lowerer.lower_level(prepared.body)?;
    let lowered = lowerer.finalize(lowered);

    let mut body = prepared.captures.into_iter().collect::<Vec<_>>();
    body.extend(lowered);
    func.body.statements = body;
    func.is_async = false;
    debug!(function = %name, suspends, "lowered async function");
    Ok(())
}
