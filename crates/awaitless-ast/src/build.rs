//! Terse node constructors
//!
//! Every constructor produces nodes with `Span::default()`. The lowering uses
//! them to synthesize code, and tests use them in place of a parser:
//!
//! ```
//! use awaitless_ast::build::*;
//!
//! // async function f() { return await x(); }
//! let f = async_function_decl("f", &[], vec![ret(Some(await_expr(call(ident("x"), vec![]))))]);
//! let program = program(vec![f]);
//! assert_eq!(program.body.len(), 1);
//! ```

use crate::ast::*;
use crate::span::Span;

fn span() -> Span {
    Span::default()
}

fn params(names: &[&str]) -> Vec<Identifier> {
    names.iter().map(|name| Identifier::synthetic(*name)).collect()
}

pub fn program(body: Vec<Statement>) -> Program {
    Program::new(body, span())
}

// ============================================================================
// Expressions
// ============================================================================

pub fn ident(name: &str) -> Expression {
    Expression::Identifier(Identifier::synthetic(name))
}

pub fn id_expr(id: &Identifier) -> Expression {
    Expression::Identifier(Identifier::synthetic(id.name.clone()))
}

pub fn this() -> Expression {
    Expression::This(span())
}

pub fn literal(value: LiteralValue) -> Expression {
    Expression::Literal(Literal {
        value,
        span: span(),
    })
}

pub fn num(value: f64) -> Expression {
    literal(LiteralValue::Number(value))
}

pub fn string(value: &str) -> Expression {
    literal(LiteralValue::String(value.to_string()))
}

pub fn boolean(value: bool) -> Expression {
    literal(LiteralValue::Boolean(value))
}

pub fn null() -> Expression {
    literal(LiteralValue::Null)
}

/// `void 0`
pub fn undefined() -> Expression {
    literal(LiteralValue::Undefined)
}

pub fn array(elements: Vec<Expression>) -> Expression {
    Expression::Array(ArrayExpression {
        elements,
        span: span(),
    })
}

pub fn object(properties: Vec<(&str, Expression)>) -> Expression {
    Expression::Object(ObjectExpression {
        properties: properties
            .into_iter()
            .map(|(key, value)| Property {
                key: PropertyKey::Identifier(Identifier::synthetic(key)),
                value,
                span: span(),
            })
            .collect(),
        span: span(),
    })
}

pub fn unary(operator: UnaryOperator, operand: Expression) -> Expression {
    Expression::Unary(UnaryExpression {
        operator,
        operand: Box::new(operand),
        span: span(),
    })
}

/// `!operand`
pub fn not(operand: Expression) -> Expression {
    unary(UnaryOperator::Not, operand)
}

pub fn typeof_(operand: Expression) -> Expression {
    unary(UnaryOperator::Typeof, operand)
}

pub fn update(operator: UpdateOperator, prefix: bool, target: Expression) -> Expression {
    Expression::Update(UpdateExpression {
        operator,
        prefix,
        target: Box::new(target),
        span: span(),
    })
}

pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary(BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
        span: span(),
    })
}

pub fn logical(operator: LogicalOperator, left: Expression, right: Expression) -> Expression {
    Expression::Logical(LogicalExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
        span: span(),
    })
}

pub fn and(left: Expression, right: Expression) -> Expression {
    logical(LogicalOperator::And, left, right)
}

pub fn or(left: Expression, right: Expression) -> Expression {
    logical(LogicalOperator::Or, left, right)
}

pub fn conditional(test: Expression, consequent: Expression, alternate: Expression) -> Expression {
    Expression::Conditional(ConditionalExpression {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
        span: span(),
    })
}

pub fn assign(left: Expression, right: Expression) -> Expression {
    assign_op(AssignmentOperator::Assign, left, right)
}

pub fn assign_op(operator: AssignmentOperator, left: Expression, right: Expression) -> Expression {
    Expression::Assignment(AssignmentExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
        span: span(),
    })
}

pub fn sequence(expressions: Vec<Expression>) -> Expression {
    Expression::Sequence(SequenceExpression {
        expressions,
        span: span(),
    })
}

pub fn call(callee: Expression, arguments: Vec<Expression>) -> Expression {
    Expression::Call(CallExpression {
        callee: Box::new(callee),
        arguments,
        span: span(),
    })
}

pub fn new(callee: Expression, arguments: Vec<Expression>) -> Expression {
    Expression::New(NewExpression {
        callee: Box::new(callee),
        arguments,
        span: span(),
    })
}

/// Static member access: `object.property`
pub fn member(object: Expression, property: &str) -> Expression {
    Expression::Member(MemberExpression {
        object: Box::new(object),
        property: MemberProperty::Identifier(Identifier::synthetic(property)),
        span: span(),
    })
}

/// Computed member access: `object[property]`
pub fn index(object: Expression, property: Expression) -> Expression {
    Expression::Member(MemberExpression {
        object: Box::new(object),
        property: MemberProperty::Computed(Box::new(property)),
        span: span(),
    })
}

/// Method call: `object.method(arguments)`
pub fn method_call(object: Expression, method: &str, arguments: Vec<Expression>) -> Expression {
    call(member(object, method), arguments)
}

pub fn await_expr(argument: Expression) -> Expression {
    Expression::Await(AwaitExpression {
        argument: Box::new(argument),
        span: span(),
    })
}

// ============================================================================
// Functions
// ============================================================================

pub fn function(name: Option<&str>, param_names: &[&str], body: Vec<Statement>) -> Function {
    Function {
        name: name.map(Identifier::synthetic),
        params: params(param_names),
        body: BlockStatement::new(body),
        is_async: false,
        is_arrow: false,
        is_generator: false,
        is_synthetic: false,
        span: span(),
    }
}

/// `function (params) { body }`
pub fn function_expr(param_names: &[&str], body: Vec<Statement>) -> Expression {
    Expression::Function(Box::new(function(None, param_names, body)))
}

/// `async function (params) { body }`
pub fn async_function_expr(param_names: &[&str], body: Vec<Statement>) -> Expression {
    let mut func = function(None, param_names, body);
    func.is_async = true;
    Expression::Function(Box::new(func))
}

/// `(params) => { body }`
pub fn arrow(param_names: &[&str], body: Vec<Statement>) -> Expression {
    let mut func = function(None, param_names, body);
    func.is_arrow = true;
    Expression::Function(Box::new(func))
}

/// `async (params) => { body }`
pub fn async_arrow(param_names: &[&str], body: Vec<Statement>) -> Expression {
    let mut func = function(None, param_names, body);
    func.is_arrow = true;
    func.is_async = true;
    Expression::Function(Box::new(func))
}

/// A closure created by the lowering
pub fn synthetic_function(params: Vec<Identifier>, body: Vec<Statement>) -> Expression {
    Expression::Function(Box::new(Function {
        name: None,
        params,
        body: BlockStatement::new(body),
        is_async: false,
        is_arrow: false,
        is_generator: false,
        is_synthetic: true,
        span: span(),
    }))
}

pub fn function_decl(name: &str, param_names: &[&str], body: Vec<Statement>) -> Statement {
    Statement::FunctionDecl(FunctionDecl {
        function: function(Some(name), param_names, body),
        span: span(),
    })
}

pub fn async_function_decl(name: &str, param_names: &[&str], body: Vec<Statement>) -> Statement {
    let mut func = function(Some(name), param_names, body);
    func.is_async = true;
    Statement::FunctionDecl(FunctionDecl {
        function: func,
        span: span(),
    })
}

// ============================================================================
// Statements
// ============================================================================

pub fn expr_stmt(expression: Expression) -> Statement {
    Statement::Expression(ExpressionStatement {
        expression,
        span: span(),
    })
}

pub fn declarator(name: &str, init: Option<Expression>) -> VariableDeclarator {
    VariableDeclarator {
        id: Identifier::synthetic(name),
        init,
        span: span(),
    }
}

pub fn declaration(kind: VariableKind, declarations: Vec<VariableDeclarator>) -> Statement {
    Statement::VariableDecl(VariableDecl {
        kind,
        declarations,
        span: span(),
    })
}

pub fn var_decl(name: &str, init: Option<Expression>) -> Statement {
    declaration(VariableKind::Var, vec![declarator(name, init)])
}

pub fn let_decl(name: &str, init: Option<Expression>) -> Statement {
    declaration(VariableKind::Let, vec![declarator(name, init)])
}

pub fn const_decl(name: &str, init: Expression) -> Statement {
    declaration(VariableKind::Const, vec![declarator(name, Some(init))])
}

pub fn block(statements: Vec<Statement>) -> Statement {
    Statement::Block(BlockStatement::new(statements))
}

pub fn if_stmt(condition: Expression, then_branch: Statement, else_branch: Option<Statement>) -> Statement {
    Statement::If(IfStatement {
        condition,
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
        span: span(),
    })
}

pub fn while_stmt(condition: Expression, body: Statement) -> Statement {
    Statement::While(WhileStatement {
        condition,
        body: Box::new(body),
        span: span(),
    })
}

pub fn do_while(body: Statement, condition: Expression) -> Statement {
    Statement::DoWhile(DoWhileStatement {
        body: Box::new(body),
        condition,
        span: span(),
    })
}

pub fn for_stmt(
    init: Option<ForInit>,
    test: Option<Expression>,
    update: Option<Expression>,
    body: Statement,
) -> Statement {
    Statement::For(ForStatement {
        init,
        test,
        update,
        body: Box::new(body),
        span: span(),
    })
}

/// `let name = init` as a for-loop initializer
pub fn for_let(name: &str, init: Expression) -> Option<ForInit> {
    Some(ForInit::VariableDecl(VariableDecl {
        kind: VariableKind::Let,
        declarations: vec![declarator(name, Some(init))],
        span: span(),
    }))
}

pub fn for_in(kind: VariableKind, name: &str, right: Expression, body: Statement) -> Statement {
    Statement::ForIn(ForInStatement {
        left: ForHead::Declaration(kind, Identifier::synthetic(name)),
        right,
        body: Box::new(body),
        span: span(),
    })
}

pub fn for_of(kind: VariableKind, name: &str, right: Expression, body: Statement) -> Statement {
    Statement::ForOf(ForOfStatement {
        left: ForHead::Declaration(kind, Identifier::synthetic(name)),
        right,
        body: Box::new(body),
        is_await: false,
        span: span(),
    })
}

pub fn for_await_of(kind: VariableKind, name: &str, right: Expression, body: Statement) -> Statement {
    Statement::ForOf(ForOfStatement {
        left: ForHead::Declaration(kind, Identifier::synthetic(name)),
        right,
        body: Box::new(body),
        is_await: true,
        span: span(),
    })
}

pub fn switch(discriminant: Expression, cases: Vec<SwitchCase>) -> Statement {
    Statement::Switch(SwitchStatement {
        discriminant,
        cases,
        span: span(),
    })
}

pub fn case(test: Expression, consequent: Vec<Statement>) -> SwitchCase {
    SwitchCase {
        test: Some(test),
        consequent,
        span: span(),
    }
}

pub fn default_case(consequent: Vec<Statement>) -> SwitchCase {
    SwitchCase {
        test: None,
        consequent,
        span: span(),
    }
}

pub fn try_stmt(
    body: Vec<Statement>,
    handler: Option<(Option<&str>, Vec<Statement>)>,
    finalizer: Option<Vec<Statement>>,
) -> Statement {
    Statement::Try(TryStatement {
        body: BlockStatement::new(body),
        catch_clause: handler.map(|(param, body)| CatchClause {
            param: param.map(Identifier::synthetic),
            body: BlockStatement::new(body),
            span: span(),
        }),
        finally_clause: finalizer.map(BlockStatement::new),
        span: span(),
    })
}

pub fn labeled(label: &str, body: Statement) -> Statement {
    Statement::Labeled(LabeledStatement {
        label: Identifier::synthetic(label),
        body: Box::new(body),
        span: span(),
    })
}

pub fn ret(value: Option<Expression>) -> Statement {
    Statement::Return(ReturnStatement { value, span: span() })
}

pub fn brk(label: Option<&str>) -> Statement {
    Statement::Break(BreakStatement {
        label: label.map(Identifier::synthetic),
        span: span(),
    })
}

pub fn cont(label: Option<&str>) -> Statement {
    Statement::Continue(ContinueStatement {
        label: label.map(Identifier::synthetic),
        span: span(),
    })
}

pub fn throw(value: Expression) -> Statement {
    Statement::Throw(ThrowStatement { value, span: span() })
}

/// `import { imported as local, ... } from "source"`
pub fn import(specifiers: Vec<(&str, &str)>, source: &str) -> Statement {
    Statement::Import(ImportDecl {
        specifiers: specifiers
            .into_iter()
            .map(|(imported, local)| ImportSpecifier {
                imported: Identifier::synthetic(imported),
                local: Identifier::synthetic(local),
            })
            .collect(),
        source: source.to_string(),
        span: span(),
    })
}
