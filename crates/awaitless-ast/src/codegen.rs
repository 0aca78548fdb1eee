//! JavaScript code emitter
//!
//! Prints a tree back to source text with two-space indentation. Parentheses
//! are inserted from operator precedence only, so any tree the lowering
//! builds prints to text that parses back into the same tree.

use crate::ast::*;

/// Print a whole program
pub fn print_program(program: &Program) -> String {
    let mut printer = Printer::new();
    for stmt in &program.body {
        printer.statement(stmt);
    }
    printer.finish()
}

/// Print a single statement (with trailing newline)
pub fn print_statement(stmt: &Statement) -> String {
    let mut printer = Printer::new();
    printer.statement(stmt);
    printer.finish()
}

/// Print a single expression
pub fn print_expression(expr: &Expression) -> String {
    let mut printer = Printer::new();
    printer.expression(expr, Precedence::Sequence);
    printer.finish()
}

// ============================================================================
// Precedence
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Sequence,
    Assignment,
    Conditional,
    Nullish,
    LogicalOr,
    LogicalAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    Equality,
    Relational,
    Shift,
    Additive,
    Multiplicative,
    Exponent,
    Unary,
    Postfix,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Self {
        match self {
            Precedence::Sequence => Precedence::Assignment,
            Precedence::Assignment => Precedence::Conditional,
            Precedence::Conditional => Precedence::Nullish,
            Precedence::Nullish => Precedence::LogicalOr,
            Precedence::LogicalOr => Precedence::LogicalAnd,
            Precedence::LogicalAnd => Precedence::BitwiseOr,
            Precedence::BitwiseOr => Precedence::BitwiseXor,
            Precedence::BitwiseXor => Precedence::BitwiseAnd,
            Precedence::BitwiseAnd => Precedence::Equality,
            Precedence::Equality => Precedence::Relational,
            Precedence::Relational => Precedence::Shift,
            Precedence::Shift => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Exponent,
            Precedence::Exponent => Precedence::Unary,
            Precedence::Unary => Precedence::Postfix,
            Precedence::Postfix => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

fn binary_precedence(op: BinaryOperator) -> Precedence {
    use BinaryOperator::*;
    match op {
        BitwiseOr => Precedence::BitwiseOr,
        BitwiseXor => Precedence::BitwiseXor,
        BitwiseAnd => Precedence::BitwiseAnd,
        Equal | NotEqual | StrictEqual | StrictNotEqual => Precedence::Equality,
        LessThan | LessEqual | GreaterThan | GreaterEqual | In | InstanceOf => {
            Precedence::Relational
        }
        LeftShift | RightShift | UnsignedRightShift => Precedence::Shift,
        Add | Subtract => Precedence::Additive,
        Multiply | Divide | Modulo => Precedence::Multiplicative,
        Exponent => Precedence::Exponent,
    }
}

fn logical_precedence(op: LogicalOperator) -> Precedence {
    match op {
        LogicalOperator::NullishCoalescing => Precedence::Nullish,
        LogicalOperator::Or => Precedence::LogicalOr,
        LogicalOperator::And => Precedence::LogicalAnd,
    }
}

fn precedence(expr: &Expression) -> Precedence {
    match expr {
        Expression::Sequence(_) => Precedence::Sequence,
        Expression::Assignment(_) => Precedence::Assignment,
        Expression::Function(func) if func.is_arrow => Precedence::Assignment,
        Expression::Conditional(_) => Precedence::Conditional,
        Expression::Logical(logical) => logical_precedence(logical.operator),
        Expression::Binary(binary) => binary_precedence(binary.operator),
        Expression::Unary(_) | Expression::Await(_) => Precedence::Unary,
        Expression::Update(update) if update.prefix => Precedence::Unary,
        Expression::Update(_) => Precedence::Postfix,
        Expression::Literal(lit) => match lit.value {
            LiteralValue::Undefined => Precedence::Unary,
            LiteralValue::Number(n) if n < 0.0 || (n == 0.0 && n.is_sign_negative()) => {
                Precedence::Unary
            }
            _ => Precedence::Primary,
        },
        Expression::Call(_) | Expression::New(_) | Expression::Member(_) => Precedence::Call,
        _ => Precedence::Primary,
    }
}

/// An expression statement must not begin with `function` or `{`
fn starts_with_ambiguous_token(expr: &Expression) -> bool {
    match expr {
        Expression::Function(func) => !func.is_arrow,
        Expression::Object(_) => true,
        Expression::Call(call) => starts_with_ambiguous_token(&call.callee),
        Expression::Member(member) => starts_with_ambiguous_token(&member.object),
        Expression::Binary(binary) => starts_with_ambiguous_token(&binary.left),
        Expression::Logical(logical) => starts_with_ambiguous_token(&logical.left),
        Expression::Assignment(assign) => starts_with_ambiguous_token(&assign.left),
        Expression::Conditional(cond) => starts_with_ambiguous_token(&cond.test),
        Expression::Sequence(seq) => seq
            .expressions
            .first()
            .map(starts_with_ambiguous_token)
            .unwrap_or(false),
        Expression::Update(update) if !update.prefix => starts_with_ambiguous_token(&update.target),
        _ => false,
    }
}

// ============================================================================
// Printer
// ============================================================================

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    fn finish(self) -> String {
        self.out
    }

    fn write(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn newline(&mut self) {
        self.out.push('\n');
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn statement(&mut self, stmt: &Statement) {
        self.write_indent();
        self.statement_inline(stmt);
        self.newline();
    }

    /// Print a statement starting at the current position, without the
    /// trailing newline
    fn statement_inline(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Expression(stmt) => {
                if starts_with_ambiguous_token(&stmt.expression) {
                    self.write("(");
                    self.expression(&stmt.expression, Precedence::Sequence);
                    self.write(")");
                } else {
                    self.expression(&stmt.expression, Precedence::Sequence);
                }
                self.write(";");
            }
            Statement::VariableDecl(decl) => {
                self.variable_decl(decl);
                self.write(";");
            }
            Statement::FunctionDecl(decl) => self.function(&decl.function),
            Statement::Block(block) => self.block(&block.statements),
            Statement::If(stmt) => {
                self.write("if (");
                self.expression(&stmt.condition, Precedence::Sequence);
                self.write(") ");
                let then_is_open_if = matches!(
                    stmt.then_branch.as_ref(),
                    Statement::If(inner) if inner.else_branch.is_none()
                );
                if then_is_open_if && stmt.else_branch.is_some() {
                    self.block(std::slice::from_ref(stmt.then_branch.as_ref()));
                } else {
                    self.statement_inline(&stmt.then_branch);
                }
                if let Some(else_branch) = &stmt.else_branch {
                    if matches!(stmt.then_branch.as_ref(), Statement::Block(_)) || then_is_open_if {
                        self.write(" else ");
                    } else {
                        self.newline();
                        self.write_indent();
                        self.write("else ");
                    }
                    self.statement_inline(else_branch);
                }
            }
            Statement::While(stmt) => {
                self.write("while (");
                self.expression(&stmt.condition, Precedence::Sequence);
                self.write(") ");
                self.statement_inline(&stmt.body);
            }
            Statement::DoWhile(stmt) => {
                self.write("do ");
                self.statement_inline(&stmt.body);
                if matches!(stmt.body.as_ref(), Statement::Block(_)) {
                    self.write(" ");
                } else {
                    self.newline();
                    self.write_indent();
                }
                self.write("while (");
                self.expression(&stmt.condition, Precedence::Sequence);
                self.write(");");
            }
            Statement::For(stmt) => {
                self.write("for (");
                match &stmt.init {
                    Some(ForInit::VariableDecl(decl)) => self.variable_decl(decl),
                    Some(ForInit::Expression(expr)) => self.expression(expr, Precedence::Sequence),
                    None => {}
                }
                self.write(";");
                if let Some(test) = &stmt.test {
                    self.write(" ");
                    self.expression(test, Precedence::Sequence);
                }
                self.write(";");
                if let Some(update) = &stmt.update {
                    self.write(" ");
                    self.expression(update, Precedence::Sequence);
                }
                self.write(") ");
                self.statement_inline(&stmt.body);
            }
            Statement::ForIn(stmt) => {
                self.write("for (");
                self.for_head(&stmt.left);
                self.write(" in ");
                self.expression(&stmt.right, Precedence::Sequence);
                self.write(") ");
                self.statement_inline(&stmt.body);
            }
            Statement::ForOf(stmt) => {
                self.write(if stmt.is_await { "for await (" } else { "for (" });
                self.for_head(&stmt.left);
                self.write(" of ");
                self.expression(&stmt.right, Precedence::Assignment);
                self.write(") ");
                self.statement_inline(&stmt.body);
            }
            Statement::Switch(stmt) => {
                self.write("switch (");
                self.expression(&stmt.discriminant, Precedence::Sequence);
                self.write(") {");
                self.newline();
                self.indent += 1;
                for case in &stmt.cases {
                    self.write_indent();
                    match &case.test {
                        Some(test) => {
                            self.write("case ");
                            self.expression(test, Precedence::Sequence);
                            self.write(":");
                        }
                        None => self.write("default:"),
                    }
                    self.newline();
                    self.indent += 1;
                    for s in &case.consequent {
                        self.statement(s);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.write_indent();
                self.write("}");
            }
            Statement::Try(stmt) => {
                self.write("try ");
                self.block(&stmt.body.statements);
                if let Some(catch) = &stmt.catch_clause {
                    match &catch.param {
                        Some(param) => {
                            self.write(" catch (");
                            self.write(&param.name);
                            self.write(") ");
                        }
                        None => self.write(" catch "),
                    }
                    self.block(&catch.body.statements);
                }
                if let Some(finally) = &stmt.finally_clause {
                    self.write(" finally ");
                    self.block(&finally.statements);
                }
            }
            Statement::Labeled(stmt) => {
                self.write(&stmt.label.name);
                self.write(": ");
                self.statement_inline(&stmt.body);
            }
            Statement::Return(stmt) => match &stmt.value {
                Some(value) => {
                    self.write("return ");
                    self.expression(value, Precedence::Sequence);
                    self.write(";");
                }
                None => self.write("return;"),
            },
            Statement::Break(stmt) => match &stmt.label {
                Some(label) => {
                    self.write("break ");
                    self.write(&label.name);
                    self.write(";");
                }
                None => self.write("break;"),
            },
            Statement::Continue(stmt) => match &stmt.label {
                Some(label) => {
                    self.write("continue ");
                    self.write(&label.name);
                    self.write(";");
                }
                None => self.write("continue;"),
            },
            Statement::Throw(stmt) => {
                self.write("throw ");
                self.expression(&stmt.value, Precedence::Sequence);
                self.write(";");
            }
            Statement::Import(decl) => {
                let names: Vec<String> = decl
                    .specifiers
                    .iter()
                    .map(|spec| {
                        if spec.imported.name == spec.local.name {
                            spec.local.name.clone()
                        } else {
                            format!("{} as {}", spec.imported.name, spec.local.name)
                        }
                    })
                    .collect();
                self.write("import { ");
                self.write(&names.join(", "));
                self.write(" } from ");
                self.string_literal(&decl.source);
                self.write(";");
            }
            Statement::Empty(_) => self.write(";"),
        }
    }

    fn block(&mut self, statements: &[Statement]) {
        if statements.is_empty() {
            self.write("{}");
            return;
        }
        self.write("{");
        self.newline();
        self.indent += 1;
        for stmt in statements {
            self.statement(stmt);
        }
        self.indent -= 1;
        self.write_indent();
        self.write("}");
    }

    fn variable_decl(&mut self, decl: &VariableDecl) {
        self.write(decl.kind.as_str());
        self.write(" ");
        for (i, declarator) in decl.declarations.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&declarator.id.name);
            if let Some(init) = &declarator.init {
                self.write(" = ");
                self.expression(init, Precedence::Assignment);
            }
        }
    }

    fn for_head(&mut self, head: &ForHead) {
        match head {
            ForHead::Declaration(kind, id) => {
                self.write(kind.as_str());
                self.write(" ");
                self.write(&id.name);
            }
            ForHead::Target(expr) => self.expression(expr, Precedence::Call),
        }
    }

    fn function(&mut self, func: &Function) {
        if func.is_async {
            self.write("async ");
        }
        if func.is_arrow {
            self.write("(");
            self.params(&func.params);
            self.write(") => ");
        } else {
            self.write("function");
            if func.is_generator {
                self.write("*");
            }
            if let Some(name) = &func.name {
                self.write(" ");
                self.write(&name.name);
            }
            self.write(" (");
            self.params(&func.params);
            self.write(") ");
        }
        self.block(&func.body.statements);
    }

    fn params(&mut self, params: &[Identifier]) {
        let names: Vec<&str> = params.iter().map(|id| id.name.as_str()).collect();
        self.write(&names.join(", "));
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn expression(&mut self, expr: &Expression, min: Precedence) {
        let needs_parens = precedence(expr) < min;
        if needs_parens {
            self.write("(");
        }
        self.expression_inner(expr);
        if needs_parens {
            self.write(")");
        }
    }

    fn expression_inner(&mut self, expr: &Expression) {
        match expr {
            Expression::Identifier(id) => self.write(&id.name),
            Expression::This(_) => self.write("this"),
            Expression::Literal(lit) => self.literal(&lit.value),
            Expression::Array(array) => {
                self.write("[");
                for (i, element) in array.elements.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.expression(element, Precedence::Assignment);
                }
                self.write("]");
            }
            Expression::Object(object) => {
                if object.properties.is_empty() {
                    self.write("{}");
                    return;
                }
                self.write("{ ");
                for (i, prop) in object.properties.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    match &prop.key {
                        PropertyKey::Identifier(id) => self.write(&id.name),
                        PropertyKey::String(s) => self.string_literal(s),
                        PropertyKey::Computed(key) => {
                            self.write("[");
                            self.expression(key, Precedence::Assignment);
                            self.write("]");
                        }
                    }
                    self.write(": ");
                    self.expression(&prop.value, Precedence::Assignment);
                }
                self.write(" }");
            }
            Expression::Function(func) => self.function(func),
            Expression::Unary(unary) => {
                let op = match unary.operator {
                    UnaryOperator::Plus => "+",
                    UnaryOperator::Minus => "-",
                    UnaryOperator::Not => "!",
                    UnaryOperator::BitwiseNot => "~",
                    UnaryOperator::Typeof => "typeof ",
                    UnaryOperator::Void => "void ",
                    UnaryOperator::Delete => "delete ",
                };
                self.write(op);
                let sign_clash = matches!(unary.operator, UnaryOperator::Plus | UnaryOperator::Minus)
                    && starts_with_sign(&unary.operand);
                if sign_clash {
                    self.write("(");
                    self.expression(&unary.operand, Precedence::Sequence);
                    self.write(")");
                } else {
                    self.expression(&unary.operand, Precedence::Unary);
                }
            }
            Expression::Update(update) => {
                let op = match update.operator {
                    UpdateOperator::Increment => "++",
                    UpdateOperator::Decrement => "--",
                };
                if update.prefix {
                    self.write(op);
                    self.expression(&update.target, Precedence::Unary);
                } else {
                    self.expression(&update.target, Precedence::Call);
                    self.write(op);
                }
            }
            Expression::Binary(binary) => {
                let prec = binary_precedence(binary.operator);
                let (left_min, right_min) = if binary.operator == BinaryOperator::Exponent {
                    (prec.next(), prec)
                } else {
                    (prec, prec.next())
                };
                self.expression(&binary.left, left_min);
                self.write(" ");
                self.write(binary.operator.as_str());
                self.write(" ");
                self.expression(&binary.right, right_min);
            }
            Expression::Logical(logical) => {
                let prec = logical_precedence(logical.operator);
                self.logical_operand(&logical.left, logical.operator, prec);
                self.write(" ");
                self.write(logical.operator.as_str());
                self.write(" ");
                self.logical_operand(&logical.right, logical.operator, prec.next());
            }
            Expression::Conditional(cond) => {
                self.expression(&cond.test, Precedence::Nullish);
                self.write(" ? ");
                self.expression(&cond.consequent, Precedence::Assignment);
                self.write(" : ");
                self.expression(&cond.alternate, Precedence::Assignment);
            }
            Expression::Assignment(assign) => {
                self.expression(&assign.left, Precedence::Call);
                self.write(" ");
                self.write(assign.operator.as_str());
                self.write(" ");
                self.expression(&assign.right, Precedence::Assignment);
            }
            Expression::Sequence(seq) => {
                for (i, e) in seq.expressions.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.expression(e, Precedence::Assignment);
                }
            }
            Expression::Call(call) => {
                self.expression(&call.callee, Precedence::Call);
                self.arguments(&call.arguments);
            }
            Expression::New(new) => {
                self.write("new ");
                if is_plain_member_chain(&new.callee) {
                    self.expression(&new.callee, Precedence::Call);
                } else {
                    self.write("(");
                    self.expression(&new.callee, Precedence::Sequence);
                    self.write(")");
                }
                self.arguments(&new.arguments);
            }
            Expression::Member(member) => {
                let numeric_object = matches!(
                    member.object.as_ref(),
                    Expression::Literal(Literal {
                        value: LiteralValue::Number(_),
                        ..
                    })
                );
                if numeric_object {
                    self.write("(");
                    self.expression(&member.object, Precedence::Sequence);
                    self.write(")");
                } else {
                    self.expression(&member.object, Precedence::Call);
                }
                match &member.property {
                    MemberProperty::Identifier(id) => {
                        self.write(".");
                        self.write(&id.name);
                    }
                    MemberProperty::Computed(property) => {
                        self.write("[");
                        self.expression(property, Precedence::Sequence);
                        self.write("]");
                    }
                }
            }
            Expression::Await(await_expr) => {
                self.write("await ");
                self.expression(&await_expr.argument, Precedence::Unary);
            }
        }
    }

    /// `??` cannot be mixed with `&&`/`||` without parentheses
    fn logical_operand(&mut self, operand: &Expression, parent: LogicalOperator, min: Precedence) {
        let mixes_nullish = match operand {
            Expression::Logical(inner) => {
                (parent == LogicalOperator::NullishCoalescing)
                    != (inner.operator == LogicalOperator::NullishCoalescing)
            }
            _ => false,
        };
        if mixes_nullish {
            self.write("(");
            self.expression(operand, Precedence::Sequence);
            self.write(")");
        } else {
            self.expression(operand, min);
        }
    }

    fn arguments(&mut self, arguments: &[Expression]) {
        self.write("(");
        for (i, arg) in arguments.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.expression(arg, Precedence::Assignment);
        }
        self.write(")");
    }

    fn literal(&mut self, value: &LiteralValue) {
        match value {
            LiteralValue::Number(n) => {
                let text = format_number(*n);
                self.write(&text);
            }
            LiteralValue::String(s) => self.string_literal(s),
            LiteralValue::Boolean(b) => self.write(if *b { "true" } else { "false" }),
            LiteralValue::Null => self.write("null"),
            LiteralValue::Undefined => self.write("void 0"),
        }
    }

    fn string_literal(&mut self, value: &str) {
        self.out.push('"');
        for c in value.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                c if (c as u32) < 0x20 => {
                    self.out.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }
}

/// Operand would print with a leading `+`/`-` and fuse with a sign operator
fn starts_with_sign(expr: &Expression) -> bool {
    match expr {
        Expression::Unary(unary) => {
            matches!(unary.operator, UnaryOperator::Plus | UnaryOperator::Minus)
        }
        Expression::Update(update) => update.prefix,
        Expression::Literal(Literal {
            value: LiteralValue::Number(n),
            ..
        }) => n.is_sign_negative(),
        _ => false,
    }
}

fn is_plain_member_chain(expr: &Expression) -> bool {
    match expr {
        Expression::Identifier(_) | Expression::This(_) => true,
        Expression::Member(member) => is_plain_member_chain(&member.object),
        _ => false,
    }
}

/// Format a number the way JavaScript's `String(n)` does for the common cases
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::*;

    #[test]
    fn test_binary_precedence() {
        let expr = binary(
            BinaryOperator::Multiply,
            binary(BinaryOperator::Add, ident("a"), ident("b")),
            ident("c"),
        );
        assert_eq!(print_expression(&expr), "(a + b) * c");

        let expr = binary(
            BinaryOperator::Subtract,
            ident("a"),
            binary(BinaryOperator::Subtract, ident("b"), ident("c")),
        );
        assert_eq!(print_expression(&expr), "a - (b - c)");
    }

    #[test]
    fn test_nullish_mixing_gets_parens() {
        let expr = logical(
            LogicalOperator::NullishCoalescing,
            or(ident("a"), ident("b")),
            ident("c"),
        );
        assert_eq!(print_expression(&expr), "(a || b) ?? c");
    }

    #[test]
    fn test_function_expression_statement() {
        let stmt = expr_stmt(call(function_expr(&[], vec![]), vec![]));
        assert_eq!(print_statement(&stmt), "(function () {}());\n");
    }

    #[test]
    fn test_nested_blocks_indent() {
        let stmt = if_stmt(
            ident("a"),
            block(vec![expr_stmt(call(ident("f"), vec![]))]),
            Some(block(vec![ret(Some(num(1.0)))])),
        );
        assert_eq!(
            print_statement(&stmt),
            "if (a) {\n  f();\n} else {\n  return 1;\n}\n"
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(print_expression(&num(3.0)), "3");
        assert_eq!(print_expression(&num(0.5)), "0.5");
        assert_eq!(print_expression(&string("a\"b\n")), "\"a\\\"b\\n\"");
        assert_eq!(print_expression(&undefined()), "void 0");
        assert_eq!(
            print_expression(&member(undefined(), "x")),
            "(void 0).x"
        );
    }

    #[test]
    fn test_arrow_as_callee() {
        let expr = call(arrow(&["x"], vec![ret(Some(ident("x")))]), vec![num(1.0)]);
        assert_eq!(print_expression(&expr), "((x) => {\n  return x;\n})(1)");
    }

    #[test]
    fn test_conditional_and_assignment() {
        let expr = assign(
            ident("x"),
            conditional(ident("a"), ident("b"), sequence(vec![ident("c"), ident("d")])),
        );
        assert_eq!(print_expression(&expr), "x = a ? b : (c, d)");
    }
}
