//! Test harness for lowering and running programs
//!
//! Programs are built as trees, lowered, then executed by the reference
//! evaluator. Scenarios record their progress with the host `log` function
//! and are checked against the order a native async runtime produces.

use awaitless_ast::ast::{Expression, Program, Statement};
use awaitless_ast::build::*;
use awaitless_ast::print_program;
use awaitless_runtime::{Interpreter, RuntimeError};
use awaitless_transform::{transform_program, LowerError, Options};

/// Error type for e2e tests
#[derive(Debug)]
pub enum E2EError {
    /// Lowering failed
    Lower(LowerError),
    /// The lowered program failed to run
    Runtime(RuntimeError, String),
}

impl std::fmt::Display for E2EError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            E2EError::Lower(e) => write!(f, "Lowering error: {}", e),
            E2EError::Runtime(e, output) => write!(f, "Runtime error: {}\nLowered:\n{}", e, output),
        }
    }
}

impl std::error::Error for E2EError {}

pub type E2EResult<T> = Result<T, E2EError>;

pub fn lower_with(body: Vec<Statement>, options: &Options) -> E2EResult<Program> {
    transform_program(&program(body), options).map_err(E2EError::Lower)
}

/// Lower and run `body`, draining every queued job, and return the log
pub fn run_with(body: Vec<Statement>, options: &Options) -> E2EResult<Vec<String>> {
    let lowered = lower_with(body, options)?;
    let mut interpreter = Interpreter::new();
    interpreter
        .run(&lowered)
        .map_err(|e| E2EError::Runtime(e, print_program(&lowered)))?;
    Ok(interpreter.log().to_vec())
}

pub fn expect_log_with(body: Vec<Statement>, options: &Options, expected: &[&str]) {
    match run_with(body, options) {
        Ok(log) => assert_eq!(log, expected),
        Err(e) => panic!("{}", e),
    }
}

/// Check a scenario under every option combination that changes the output
pub fn expect_log(body: Vec<Statement>, expected: &[&str]) {
    expect_log_with(body.clone(), &Options::default(), expected);
    expect_log_with(body.clone(), &Options::default().with_hoist(true), expected);
    expect_log_with(
        body,
        &Options::default().with_target(awaitless_transform::Target::Es5),
        expected,
    );
}

// ============================================================================
// Program pieces
// ============================================================================

/// `log(args...);`
pub fn log(args: Vec<Expression>) -> Statement {
    expr_stmt(call(ident("log"), args))
}

/// `function tick(value) { return Promise.resolve(value); }`
pub fn tick_decl() -> Statement {
    function_decl(
        "tick",
        &["value"],
        vec![ret(Some(method_call(ident("Promise"), "resolve", vec![ident("value")])))],
    )
}

/// `await tick(value)`
pub fn tick(value: Expression) -> Expression {
    await_expr(call(ident("tick"), vec![value]))
}

/// `main().then(v => log("done", v), e => log("error", "" + e));`
pub fn report(entry: &str) -> Statement {
    expr_stmt(method_call(
        call(ident(entry), vec![]),
        "then",
        vec![
            function_expr(&["v"], vec![log(vec![string("done"), ident("v")])]),
            function_expr(
                &["e"],
                vec![log(vec![
                    string("error"),
                    binary(awaitless_ast::ast::BinaryOperator::Add, string(""), ident("e")),
                ])],
            ),
        ],
    ))
}

/// A scenario: `tick`, the declarations under test and a reported call of
/// `main`
pub fn scenario(declarations: Vec<Statement>) -> Vec<Statement> {
    let mut body = vec![tick_decl()];
    body.extend(declarations);
    body.push(report("main"));
    body
}
