//! Expression AST nodes
//!
//! This module defines all expression kinds the lowering understands:
//! - Literals, identifiers and `this`
//! - Array and object literals
//! - Unary, update, binary, logical and conditional operators
//! - Assignments and sequences
//! - Calls, `new` and member access
//! - Function expressions (including arrows)
//! - `await`

use super::*;
use crate::span::Span;

/// Expression (produces a value)
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Identifier reference
    Identifier(Identifier),

    /// This expression: this
    This(Span),

    /// Literal: 42, "hello", true, null, void 0
    Literal(Literal),

    /// Array literal: [1, 2, 3]
    Array(ArrayExpression),

    /// Object literal: { x: 1, [key]: 2 }
    Object(ObjectExpression),

    /// Function expression or arrow function
    Function(Box<Function>),

    /// Unary expression: !x, -y, typeof z
    Unary(UnaryExpression),

    /// Update expression: i++, --j
    Update(UpdateExpression),

    /// Binary expression: x + y, a < b
    Binary(BinaryExpression),

    /// Logical expression: x && y, a || b, c ?? d
    Logical(LogicalExpression),

    /// Ternary: x ? y : z
    Conditional(ConditionalExpression),

    /// Assignment: x = 42, y += 1
    Assignment(AssignmentExpression),

    /// Comma sequence: (a, b, c)
    Sequence(SequenceExpression),

    /// Function call: foo(1, 2, 3)
    Call(CallExpression),

    /// New expression: new Error("x")
    New(NewExpression),

    /// Member access: obj.prop, obj[key]
    Member(MemberExpression),

    /// Await expression: await promise
    Await(AwaitExpression),
}

impl Expression {
    /// Get the span of this expression
    pub fn span(&self) -> &Span {
        match self {
            Expression::Identifier(e) => &e.span,
            Expression::This(span) => span,
            Expression::Literal(e) => &e.span,
            Expression::Array(e) => &e.span,
            Expression::Object(e) => &e.span,
            Expression::Function(e) => &e.span,
            Expression::Unary(e) => &e.span,
            Expression::Update(e) => &e.span,
            Expression::Binary(e) => &e.span,
            Expression::Logical(e) => &e.span,
            Expression::Conditional(e) => &e.span,
            Expression::Assignment(e) => &e.span,
            Expression::Sequence(e) => &e.span,
            Expression::Call(e) => &e.span,
            Expression::New(e) => &e.span,
            Expression::Member(e) => &e.span,
            Expression::Await(e) => &e.span,
        }
    }

    /// Check if this expression is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, Expression::Literal(_))
    }

    /// Check if this expression is an identifier with the given name
    pub fn is_identifier_named(&self, name: &str) -> bool {
        matches!(self, Expression::Identifier(id) if id.name == name)
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            Expression::Identifier(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&LiteralValue> {
        match self {
            Expression::Literal(lit) => Some(&lit.value),
            _ => None,
        }
    }

    /// Check if this expression is a function expression or arrow
    pub fn is_function(&self) -> bool {
        matches!(self, Expression::Function(_))
    }

    /// `undefined` in any of its spellings: `void 0`, the literal, the global
    pub fn is_undefined(&self) -> bool {
        match self {
            Expression::Literal(lit) => matches!(lit.value, LiteralValue::Undefined),
            Expression::Identifier(id) => id.name == "undefined",
            Expression::Unary(unary) => {
                unary.operator == UnaryOperator::Void && unary.operand.is_literal()
            }
            _ => false,
        }
    }
}

// ============================================================================
// Literals
// ============================================================================

/// Literal expression
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: LiteralValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    /// Printed as `void 0`
    Undefined,
}

impl LiteralValue {
    /// Truthiness of the literal, as a condition would see it
    pub fn is_truthy(&self) -> bool {
        match self {
            LiteralValue::Number(n) => *n != 0.0 && !n.is_nan(),
            LiteralValue::String(s) => !s.is_empty(),
            LiteralValue::Boolean(b) => *b,
            LiteralValue::Null | LiteralValue::Undefined => false,
        }
    }
}

// ============================================================================
// Array and Object Expressions
// ============================================================================

/// Array expression: [1, 2, 3]
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayExpression {
    pub elements: Vec<Expression>,
    pub span: Span,
}

/// Object expression: { x: 1, y: 2 }
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectExpression {
    pub properties: Vec<Property>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: PropertyKey,
    pub value: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Identifier(Identifier),
    String(String),
    /// Computed property name: [expr]
    Computed(Expression),
}

// ============================================================================
// Functions
// ============================================================================

/// Function expression, arrow function, or the function part of a
/// declaration.
///
/// Arrow functions always carry a block body; an expression-bodied arrow is
/// represented as `{ return expr; }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Option<Identifier>,
    pub params: Vec<Identifier>,
    pub body: BlockStatement,
    pub is_async: bool,
    pub is_arrow: bool,
    pub is_generator: bool,
    /// Created by a rewrite rather than written by the user
    pub is_synthetic: bool,
    pub span: Span,
}

impl Function {
    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

// ============================================================================
// Unary & Binary Expressions
// ============================================================================

/// Unary expression: !x, -y, typeof z
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub operand: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,       // +x
    Minus,      // -x
    Not,        // !x
    BitwiseNot, // ~x
    Typeof,     // typeof x
    Void,       // void x
    Delete,     // delete x.y
}

/// Update expression: i++, --j
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateExpression {
    pub operator: UpdateOperator,
    pub prefix: bool,
    pub target: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    Increment, // ++
    Decrement, // --
}

/// Binary expression: x + y, a * b
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    pub operator: BinaryOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,      // +
    Subtract, // -
    Multiply, // *
    Divide,   // /
    Modulo,   // %
    Exponent, // **

    // Comparison
    Equal,          // ==
    NotEqual,       // !=
    StrictEqual,    // ===
    StrictNotEqual, // !==
    LessThan,       // <
    LessEqual,      // <=
    GreaterThan,    // >
    GreaterEqual,   // >=

    // Bitwise
    BitwiseAnd,         // &
    BitwiseOr,          // |
    BitwiseXor,         // ^
    LeftShift,          // <<
    RightShift,         // >>
    UnsignedRightShift, // >>>

    // Relational
    In,         // in
    InstanceOf, // instanceof
}

impl BinaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Exponent => "**",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::StrictEqual => "===",
            BinaryOperator::StrictNotEqual => "!==",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::BitwiseAnd => "&",
            BinaryOperator::BitwiseOr => "|",
            BinaryOperator::BitwiseXor => "^",
            BinaryOperator::LeftShift => "<<",
            BinaryOperator::RightShift => ">>",
            BinaryOperator::UnsignedRightShift => ">>>",
            BinaryOperator::In => "in",
            BinaryOperator::InstanceOf => "instanceof",
        }
    }
}

/// Logical expression: x && y, a || b
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalExpression {
    pub operator: LogicalOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,               // &&
    Or,                // ||
    NullishCoalescing, // ??
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "&&",
            LogicalOperator::Or => "||",
            LogicalOperator::NullishCoalescing => "??",
        }
    }
}

/// Assignment expression: x = 42, y += 1
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentExpression {
    pub operator: AssignmentOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    Assign,                   // =
    AddAssign,                // +=
    SubAssign,                // -=
    MulAssign,                // *=
    DivAssign,                // /=
    ModAssign,                // %=
    AndAssign,                // &=
    OrAssign,                 // |=
    XorAssign,                // ^=
    LeftShiftAssign,          // <<=
    RightShiftAssign,         // >>=
    UnsignedRightShiftAssign, // >>>=
}

impl AssignmentOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentOperator::Assign => "=",
            AssignmentOperator::AddAssign => "+=",
            AssignmentOperator::SubAssign => "-=",
            AssignmentOperator::MulAssign => "*=",
            AssignmentOperator::DivAssign => "/=",
            AssignmentOperator::ModAssign => "%=",
            AssignmentOperator::AndAssign => "&=",
            AssignmentOperator::OrAssign => "|=",
            AssignmentOperator::XorAssign => "^=",
            AssignmentOperator::LeftShiftAssign => "<<=",
            AssignmentOperator::RightShiftAssign => ">>=",
            AssignmentOperator::UnsignedRightShiftAssign => ">>>=",
        }
    }

    /// The binary operator a compound assignment applies, `None` for `=`
    pub fn binary_operator(&self) -> Option<BinaryOperator> {
        match self {
            AssignmentOperator::Assign => None,
            AssignmentOperator::AddAssign => Some(BinaryOperator::Add),
            AssignmentOperator::SubAssign => Some(BinaryOperator::Subtract),
            AssignmentOperator::MulAssign => Some(BinaryOperator::Multiply),
            AssignmentOperator::DivAssign => Some(BinaryOperator::Divide),
            AssignmentOperator::ModAssign => Some(BinaryOperator::Modulo),
            AssignmentOperator::AndAssign => Some(BinaryOperator::BitwiseAnd),
            AssignmentOperator::OrAssign => Some(BinaryOperator::BitwiseOr),
            AssignmentOperator::XorAssign => Some(BinaryOperator::BitwiseXor),
            AssignmentOperator::LeftShiftAssign => Some(BinaryOperator::LeftShift),
            AssignmentOperator::RightShiftAssign => Some(BinaryOperator::RightShift),
            AssignmentOperator::UnsignedRightShiftAssign => {
                Some(BinaryOperator::UnsignedRightShift)
            }
        }
    }
}

// ============================================================================
// Complex Expressions
// ============================================================================

/// Conditional (ternary): x ? y : z
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpression {
    pub test: Box<Expression>,
    pub consequent: Box<Expression>,
    pub alternate: Box<Expression>,
    pub span: Span,
}

/// Comma sequence: (a, b, c)
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceExpression {
    pub expressions: Vec<Expression>,
    pub span: Span,
}

/// Function call: foo(1, 2, 3)
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
    pub span: Span,
}

/// New expression: new Point(1, 2)
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpression {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
    pub span: Span,
}

/// Member access: obj.prop, obj[key]
#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpression {
    pub object: Box<Expression>,
    pub property: MemberProperty,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberProperty {
    /// obj.prop
    Identifier(Identifier),
    /// obj[expr]
    Computed(Box<Expression>),
}

/// Await expression: await promise
#[derive(Debug, Clone, PartialEq)]
pub struct AwaitExpression {
    pub argument: Box<Expression>,
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_truthiness() {
        assert!(LiteralValue::Number(1.0).is_truthy());
        assert!(!LiteralValue::Number(0.0).is_truthy());
        assert!(!LiteralValue::Number(f64::NAN).is_truthy());
        assert!(LiteralValue::String("a".into()).is_truthy());
        assert!(!LiteralValue::String(String::new()).is_truthy());
        assert!(!LiteralValue::Null.is_truthy());
        assert!(!LiteralValue::Undefined.is_truthy());
    }

    #[test]
    fn test_compound_assignment_operator() {
        assert_eq!(AssignmentOperator::Assign.binary_operator(), None);
        assert_eq!(
            AssignmentOperator::AddAssign.binary_operator(),
            Some(BinaryOperator::Add)
        );
        assert_eq!(
            AssignmentOperator::UnsignedRightShiftAssign.binary_operator(),
            Some(BinaryOperator::UnsignedRightShift)
        );
    }
}
