//! Expression flattening
//!
//! Splits an expression containing `await` into the statements that must run
//! before the first suspension, the suspension itself and the expression to
//! evaluate once the awaited value is available (the *rebuilt* expression,
//! in which the await is replaced by the resumed value).
//!
//! Evaluation order is preserved by hoisting every operand left of the
//! suspension into a constant unless it is pure. Short-circuiting operators
//! whose right side suspends become an `if` instead, in which case no
//! suspension is reported and the caller lowers the resulting statements.

use awaitless_ast::ast::*;
use awaitless_ast::build::*;
use awaitless_ast::Span;
use tracing::trace;

use super::FunctionLowerer;
use crate::analysis::expression_contains_await;
use crate::error::{LowerError, LowerResult};

/// The first suspension of an expression
#[derive(Debug)]
pub(super) struct Suspend {
    /// Value to wait for
    pub awaited: Expression,
    /// When present and truthy at runtime, `awaited` is used without waiting
    pub direct: Option<Expression>,
    /// Name the resumed value is bound to
    pub hole: Identifier,
}

#[derive(Debug)]
pub(super) struct Flattened {
    /// Statements to run first
    pub pre: Vec<Statement>,
    /// `None` when the expression was restructured into `pre`
    pub suspend: Option<Suspend>,
    pub rebuilt: Expression,
}

impl Flattened {
    fn map(self, rebuild: impl FnOnce(Expression) -> Expression) -> Self {
        Flattened {
            rebuilt: rebuild(self.rebuilt),
            ..self
        }
    }

    /// Run `pre` before everything else
    fn after(mut self, mut pre: Vec<Statement>) -> Self {
        pre.append(&mut self.pre);
        self.pre = pre;
        self
    }
}

impl FunctionLowerer<'_> {
    pub(super) fn flatten(&mut self, expr: Expression) -> LowerResult<Flattened> {
        let span = *expr.span();
        match expr {
            Expression::Await(await_expr) => {
                let argument = *await_expr.argument;
                if expression_contains_await(&argument) {
                    let inner = self.flatten(argument)?;
                    return Ok(inner.map(|argument| Expression::Await(AwaitExpression {
                        argument: Box::new(argument),
                        span,
                    })));
                }
                let hole = self.temporary(&argument);
                trace!(hole = %hole.name, "suspension");
                Ok(Flattened {
                    pre: Vec::new(),
                    rebuilt: id_expr(&hole),
                    suspend: Some(Suspend {
                        awaited: argument,
                        direct: None,
                        hole,
                    }),
                })
            }
            Expression::Unary(unary) => {
                let operator = unary.operator;
                Ok(self.flatten(*unary.operand)?.map(|operand| {
                    Expression::Unary(UnaryExpression {
                        operator,
                        operand: Box::new(operand),
                        span,
                    })
                }))
            }
            Expression::Update(update_expr) => {
                let (operator, prefix) = (update_expr.operator, update_expr.prefix);
                Ok(self.flatten(*update_expr.target)?.map(|target| {
                    Expression::Update(UpdateExpression {
                        operator,
                        prefix,
                        target: Box::new(target),
                        span,
                    })
                }))
            }
            Expression::Binary(binary_expr) => {
                let operator = binary_expr.operator;
                self.flatten_pair(*binary_expr.left, *binary_expr.right, |left, right| {
                    Expression::Binary(BinaryExpression {
                        operator,
                        left: Box::new(left),
                        right: Box::new(right),
                        span,
                    })
                })
            }
            Expression::Array(array_expr) => self.flatten_list(array_expr.elements, |elements| {
                Expression::Array(ArrayExpression { elements, span })
            }),
            Expression::Object(object_expr) => self.flatten_object(object_expr),
            Expression::Member(member_expr) => self.flatten_member(member_expr),
            Expression::Call(call_expr) => {
                let arguments = call_expr.arguments;
                let callee = *call_expr.callee;
                if expression_contains_await(&callee) {
                    return Ok(self.flatten(callee)?.map(|callee| {
                        Expression::Call(CallExpression {
                            callee: Box::new(callee),
                            arguments,
                            span,
                        })
                    }));
                }
                let mut pre = Vec::new();
                let callee = self.hoist_callee(callee, &mut pre);
                let flat = self.flatten_list(arguments, |arguments| {
                    Expression::Call(CallExpression {
                        callee: Box::new(callee),
                        arguments,
                        span,
                    })
                })?;
                Ok(flat.after(pre))
            }
            Expression::New(new_expr) => {
                let arguments = new_expr.arguments;
                let callee = *new_expr.callee;
                if expression_contains_await(&callee) {
                    return Ok(self.flatten(callee)?.map(|callee| {
                        Expression::New(NewExpression {
                            callee: Box::new(callee),
                            arguments,
                            span,
                        })
                    }));
                }
                let mut pre = Vec::new();
                let callee = self.hoist(callee, &mut pre);
                let flat = self.flatten_list(arguments, |arguments| {
                    Expression::New(NewExpression {
                        callee: Box::new(callee),
                        arguments,
                        span,
                    })
                })?;
                Ok(flat.after(pre))
            }
            Expression::Assignment(assignment) => self.flatten_assignment(assignment),
            Expression::Logical(logical_expr) => self.flatten_logical(logical_expr),
            Expression::Conditional(conditional_expr) => self.flatten_conditional(conditional_expr),
            Expression::Sequence(sequence_expr) => self.flatten_sequence(sequence_expr),
            Expression::Identifier(_)
            | Expression::This(_)
            | Expression::Literal(_)
            | Expression::Function(_) => Err(LowerError::internal("expression does not suspend", span)),
        }
    }

    // ========================================================================
    // Operands
    // ========================================================================

    /// A fresh temporary named after what `expr` computes
    pub(super) fn temporary(&mut self, expr: &Expression) -> Identifier {
        let id = self.unit.names.fresh(hint(expr));
        self.facts.mark_stable(&id);
        id
    }

    /// Evaluate `expr` now: pure expressions are used as is, anything else is
    /// stored in a constant
    fn hoist(&mut self, expr: Expression, pre: &mut Vec<Statement>) -> Expression {
        if self.facts.is_pure(&expr) {
            return expr;
        }
        let temp = self.temporary(&expr);
        pre.push(const_decl(&temp.name, expr));
        id_expr(&temp)
    }

    /// Hoist a callee that does not suspend. Method calls keep their receiver
    /// by hoisting only the object and the computed key.
    fn hoist_callee(&mut self, callee: Expression, pre: &mut Vec<Statement>) -> Expression {
        match callee {
            Expression::Member(member_expr) => {
                let object = self.hoist(*member_expr.object, pre);
                let property = match member_expr.property {
                    MemberProperty::Computed(key) => MemberProperty::Computed(Box::new(self.hoist(*key, pre))),
                    property => property,
                };
                Expression::Member(MemberExpression {
                    object: Box::new(object),
                    property,
                    span: member_expr.span,
                })
            }
            callee => self.hoist(callee, pre),
        }
    }

    fn flatten_pair(
        &mut self,
        left: Expression,
        right: Expression,
        rebuild: impl FnOnce(Expression, Expression) -> Expression,
    ) -> LowerResult<Flattened> {
        if expression_contains_await(&left) {
            return Ok(self.flatten(left)?.map(|left| rebuild(left, right)));
        }
        let mut pre = Vec::new();
        let left = self.hoist(left, &mut pre);
        Ok(self.flatten(right)?.after(pre).map(|right| rebuild(left, right)))
    }

    /// Flatten the first suspending item of a list of operands evaluated left
    /// to right
    fn flatten_list(
        &mut self,
        items: Vec<Expression>,
        rebuild: impl FnOnce(Vec<Expression>) -> Expression,
    ) -> LowerResult<Flattened> {
        let mut pre = Vec::new();
        let mut before = Vec::with_capacity(items.len());
        let mut items = items.into_iter();
        while let Some(item) = items.next() {
            if expression_contains_await(&item) {
                let rest: Vec<Expression> = items.by_ref().collect();
                let flat = self.flatten(item)?.after(pre);
                return Ok(flat.map(|item| {
                    before.push(item);
                    before.extend(rest);
                    rebuild(before)
                }));
            }
            before.push(self.hoist(item, &mut pre));
        }
        Err(LowerError::internal("no operand suspends", Span::default()))
    }

    fn flatten_object(&mut self, object_expr: ObjectExpression) -> LowerResult<Flattened> {
        // Keys and values in evaluation order; `None` marks a computed key
        let mut keys = Vec::with_capacity(object_expr.properties.len());
        let mut items = Vec::new();
        for prop in object_expr.properties {
            match prop.key {
                PropertyKey::Computed(key) => {
                    items.push(key);
                    keys.push((None, prop.span));
                }
                key => keys.push((Some(key), prop.span)),
            }
            items.push(prop.value);
        }
        let span = object_expr.span;
        self.flatten_list(items, |items| {
            let mut items = items.into_iter();
            let properties = keys
                .into_iter()
                .map(|(key, span)| {
                    let key = key.unwrap_or_else(|| PropertyKey::Computed(next_operand(&mut items)));
                    Property {
                        key,
                        value: next_operand(&mut items),
                        span,
                    }
                })
                .collect();
            Expression::Object(ObjectExpression { properties, span })
        })
    }

    fn flatten_member(&mut self, member_expr: MemberExpression) -> LowerResult<Flattened> {
        let span = member_expr.span;
        let object = *member_expr.object;
        match member_expr.property {
            MemberProperty::Computed(key) => self.flatten_pair(object, *key, |object, key| {
                Expression::Member(MemberExpression {
                    object: Box::new(object),
                    property: MemberProperty::Computed(Box::new(key)),
                    span,
                })
            }),
            property => Ok(self.flatten(object)?.map(|object| {
                Expression::Member(MemberExpression {
                    object: Box::new(object),
                    property,
                    span,
                })
            })),
        }
    }

    // ========================================================================
    // Assignments
    // ========================================================================

    fn flatten_assignment(&mut self, assignment: AssignmentExpression) -> LowerResult<Flattened> {
        let operator = assignment.operator;
        let span = assignment.span;
        let right = *assignment.right;
        match *assignment.left {
            Expression::Member(member_expr) => {
                let target_suspends = expression_contains_await(&member_expr.object)
                    || matches!(&member_expr.property, MemberProperty::Computed(key) if expression_contains_await(key));
                if target_suspends {
                    let flat = self.flatten_member(member_expr)?;
                    return Ok(flat.map(|target| rebuild_assignment(operator, target, right, span)));
                }
                let mut pre = Vec::new();
                let target = self.hoist_callee(Expression::Member(member_expr), &mut pre);
                self.flatten_assigned_value(operator, target, right, pre, span)
            }
            target => self.flatten_assigned_value(operator, target, right, Vec::new(), span),
        }
    }

    /// The target is settled; a compound operator reads its current value
    /// before the right side suspends
    fn flatten_assigned_value(
        &mut self,
        operator: AssignmentOperator,
        target: Expression,
        right: Expression,
        mut pre: Vec<Statement>,
        span: Span,
    ) -> LowerResult<Flattened> {
        match operator.binary_operator() {
            None => Ok(self
                .flatten(right)?
                .after(pre)
                .map(|right| rebuild_assignment(operator, target, right, span))),
            Some(binary_operator) => {
                let current = self.hoist(target.clone(), &mut pre);
                Ok(self.flatten(right)?.after(pre).map(|right| {
                    rebuild_assignment(
                        AssignmentOperator::Assign,
                        target,
                        binary(binary_operator, current, right),
                        span,
                    )
                }))
            }
        }
    }

    // ========================================================================
    // Short-circuiting
    // ========================================================================

    fn flatten_logical(&mut self, logical_expr: LogicalExpression) -> LowerResult<Flattened> {
        let operator = logical_expr.operator;
        let span = logical_expr.span;
        let left = *logical_expr.left;
        let right = *logical_expr.right;
        if expression_contains_await(&left) {
            return Ok(self.flatten(left)?.map(|left| {
                Expression::Logical(LogicalExpression {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                })
            }));
        }
        match right {
            // `l && await a`: wait for `l && a`, unless `l` already decides
            Expression::Await(await_expr) if !expression_contains_await(&await_expr.argument) => {
                let mut pre = Vec::new();
                let left = self.hoist(left, &mut pre);
                let direct = match operator {
                    LogicalOperator::And => not(left.clone()),
                    LogicalOperator::Or => left.clone(),
                    LogicalOperator::NullishCoalescing => binary(BinaryOperator::NotEqual, left.clone(), null()),
                };
                let argument = *await_expr.argument;
                let hole = self.temporary(&argument);
                Ok(Flattened {
                    pre,
                    rebuilt: id_expr(&hole),
                    suspend: Some(Suspend {
                        awaited: logical(operator, left, argument),
                        direct: Some(direct),
                        hole,
                    }),
                })
            }
            right => {
                let temp = self.unit.names.fresh("temp");
                let test = match operator {
                    LogicalOperator::And => id_expr(&temp),
                    LogicalOperator::Or => not(id_expr(&temp)),
                    LogicalOperator::NullishCoalescing => binary(BinaryOperator::Equal, id_expr(&temp), null()),
                };
                trace!(temp = %temp.name, operator = operator.as_str(), "short-circuit split");
                Ok(Flattened {
                    pre: vec![
                        let_decl(&temp.name, Some(left)),
                        if_stmt(test, block(vec![expr_stmt(assign(id_expr(&temp), right))]), None),
                    ],
                    suspend: None,
                    rebuilt: id_expr(&temp),
                })
            }
        }
    }

    fn flatten_conditional(&mut self, conditional_expr: ConditionalExpression) -> LowerResult<Flattened> {
        let span = conditional_expr.span;
        let test = *conditional_expr.test;
        let consequent = *conditional_expr.consequent;
        let alternate = *conditional_expr.alternate;
        if expression_contains_await(&test) {
            return Ok(self.flatten(test)?.map(|test| {
                Expression::Conditional(ConditionalExpression {
                    test: Box::new(test),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                    span,
                })
            }));
        }
        let consequent_suspends = expression_contains_await(&consequent);
        let alternate_suspends = expression_contains_await(&alternate);
        let simple = (!consequent_suspends || is_simple_await(&consequent))
            && (!alternate_suspends || is_simple_await(&alternate));

        if !simple {
            let temp = self.unit.names.fresh("temp");
            trace!(temp = %temp.name, "conditional split");
            let branch = |value: Expression| block(vec![expr_stmt(assign(id_expr(&temp), value))]);
            let split = if_stmt(test, branch(consequent), Some(branch(alternate)));
            return Ok(Flattened {
                pre: vec![let_decl(&temp.name, None), split],
                suspend: None,
                rebuilt: id_expr(&temp),
            });
        }

        let mut pre = Vec::new();
        let test = self.hoist(test, &mut pre);
        let direct = match (consequent_suspends, alternate_suspends) {
            (true, true) => None,
            (true, false) => Some(not(test.clone())),
            (false, true) => Some(test.clone()),
            (false, false) => return Err(LowerError::internal("conditional does not suspend", span)),
        };
        let consequent = awaited_value(consequent);
        let alternate = awaited_value(alternate);
        let hole = if consequent_suspends {
            self.temporary(&consequent)
        } else {
            self.temporary(&alternate)
        };
        Ok(Flattened {
            pre,
            rebuilt: id_expr(&hole),
            suspend: Some(Suspend {
                awaited: conditional(test, consequent, alternate),
                direct,
                hole,
            }),
        })
    }

    fn flatten_sequence(&mut self, sequence_expr: SequenceExpression) -> LowerResult<Flattened> {
        let mut pre = Vec::new();
        let mut items = sequence_expr.expressions.into_iter();
        while let Some(item) = items.next() {
            if expression_contains_await(&item) {
                let rest: Vec<Expression> = items.by_ref().collect();
                let flat = self.flatten(item)?.after(pre);
                let facts = &self.facts;
                return Ok(flat.map(|item| {
                    if rest.is_empty() {
                        return item;
                    }
                    let mut expressions = Vec::with_capacity(rest.len() + 1);
                    if !facts.is_pure(&item) {
                        expressions.push(item);
                    }
                    expressions.extend(rest);
                    if expressions.len() == 1 {
                        expressions.remove(0)
                    } else {
                        sequence(expressions)
                    }
                }));
            }
            if !self.facts.is_pure(&item) {
                pre.push(expr_stmt(item));
            }
        }
        Err(LowerError::internal("no sequence element suspends", sequence_expr.span))
    }
}

/// Name hint for a temporary holding `expr`: the called function, the
/// accessed property or the identifier itself
fn hint(expr: &Expression) -> &str {
    match expr {
        Expression::Identifier(id) => &id.name,
        Expression::Call(call_expr) => hint(&call_expr.callee),
        Expression::New(new_expr) => hint(&new_expr.callee),
        Expression::Member(member_expr) => match &member_expr.property {
            MemberProperty::Identifier(property) => &property.name,
            MemberProperty::Computed(_) => "temp",
        },
        _ => "temp",
    }
}

fn is_simple_await(expr: &Expression) -> bool {
    matches!(expr, Expression::Await(await_expr) if !expression_contains_await(&await_expr.argument))
}

/// The argument of an `await`, or the expression itself
fn awaited_value(expr: Expression) -> Expression {
    match expr {
        Expression::Await(await_expr) => *await_expr.argument,
        expr => expr,
    }
}

fn rebuild_assignment(operator: AssignmentOperator, target: Expression, value: Expression, span: Span) -> Expression {
    Expression::Assignment(AssignmentExpression {
        operator,
        left: Box::new(target),
        right: Box::new(value),
        span,
    })
}

fn next_operand(items: &mut impl Iterator<Item = Expression>) -> Expression {
    items.next().unwrap_or_else(undefined)
}
