//! Evaluator integration tests
//!
//! Programs are built with the tree builders and run to completion, with
//! the host `log` function recording what happened and in which order.

use awaitless_ast::ast::{BinaryOperator, Statement, UpdateOperator, VariableKind};
use awaitless_ast::build::*;
use awaitless_runtime::{Interpreter, RuntimeError, Value};

fn run(body: Vec<Statement>) -> Result<Interpreter, RuntimeError> {
    let mut interpreter = Interpreter::new();
    interpreter.run(&program(body))?;
    Ok(interpreter)
}

fn log_of(body: Vec<Statement>) -> Vec<String> {
    match run(body) {
        Ok(interpreter) => interpreter.log().to_vec(),
        Err(error) => panic!("program failed: {}", error),
    }
}

fn log(args: Vec<awaitless_ast::Expression>) -> Statement {
    expr_stmt(call(ident("log"), args))
}

fn strict_eq(left: awaitless_ast::Expression, right: awaitless_ast::Expression) -> awaitless_ast::Expression {
    binary(BinaryOperator::StrictEqual, left, right)
}

// ============================================================================
// Promises
// ============================================================================

#[test]
fn test_reactions_run_after_script() {
    let lines = log_of(vec![
        log(vec![string("a")]),
        expr_stmt(method_call(
            method_call(ident("Promise"), "resolve", vec![num(1.0)]),
            "then",
            vec![function_expr(&["v"], vec![log(vec![string("then"), ident("v")])])],
        )),
        expr_stmt(method_call(
            new(
                ident("Promise"),
                vec![function_expr(
                    &["resolve"],
                    vec![
                        log(vec![string("executor")]),
                        expr_stmt(call(ident("resolve"), vec![num(2.0)])),
                    ],
                )],
            ),
            "then",
            vec![function_expr(&["v"], vec![log(vec![string("second"), ident("v")])])],
        )),
        log(vec![string("b")]),
    ]);
    assert_eq!(lines, ["a", "executor", "b", "then 1", "second 2"]);
}

#[test]
fn test_adopting_a_promise_takes_two_extra_turns() {
    let step = |label: &str| function_expr(&[], vec![log(vec![string(label)])]);
    let lines = log_of(vec![
        var_decl("p", Some(method_call(ident("Promise"), "resolve", vec![num(1.0)]))),
        var_decl(
            "q",
            Some(new(
                ident("Promise"),
                vec![function_expr(&["r"], vec![expr_stmt(call(ident("r"), vec![ident("p")]))])],
            )),
        ),
        expr_stmt(method_call(ident("q"), "then", vec![step("q")])),
        expr_stmt(method_call(
            method_call(
                method_call(method_call(ident("Promise"), "resolve", vec![]), "then", vec![step("one")]),
                "then",
                vec![step("two")],
            ),
            "then",
            vec![step("three")],
        )),
    ]);
    assert_eq!(lines, ["one", "two", "q", "three"]);
}

#[test]
fn test_rejection_skips_fulfillment_handlers() {
    let lines = log_of(vec![expr_stmt(method_call(
        method_call(
            method_call(ident("Promise"), "reject", vec![new(ident("Error"), vec![string("no")])]),
            "then",
            vec![function_expr(&[], vec![log(vec![string("unreachable")])])],
        ),
        "catch",
        vec![function_expr(&["e"], vec![log(vec![member(ident("e"), "message")])])],
    ))]);
    assert_eq!(lines, ["no"]);
}

#[test]
fn test_executor_throw_rejects() {
    let lines = log_of(vec![expr_stmt(method_call(
        new(
            ident("Promise"),
            vec![function_expr(&[], vec![throw(new(ident("TypeError"), vec![string("bad")]))])],
        ),
        "then",
        vec![
            undefined(),
            function_expr(&["e"], vec![log(vec![binary(BinaryOperator::Add, string(""), ident("e"))])]),
        ],
    ))]);
    assert_eq!(lines, ["TypeError: bad"]);
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_try_catch_finally_ordering() {
    let lines = log_of(vec![
        function_decl(
            "f",
            &[],
            vec![try_stmt(
                vec![throw(new(ident("Error"), vec![string("boom")]))],
                Some((
                    Some("e"),
                    vec![log(vec![member(ident("e"), "message")]), ret(Some(num(1.0)))],
                )),
                Some(vec![log(vec![string("finally")])]),
            )],
        ),
        log(vec![call(ident("f"), vec![])]),
    ]);
    assert_eq!(lines, ["boom", "finally", "1"]);
}

#[test]
fn test_for_of_closes_iterator_on_break() {
    let next = function_expr(
        &[],
        vec![
            expr_stmt(update(UpdateOperator::Increment, false, ident("i"))),
            ret(Some(object(vec![
                ("value", ident("i")),
                ("done", binary(BinaryOperator::GreaterThan, ident("i"), num(3.0))),
            ]))),
        ],
    );
    let close = function_expr(&[], vec![log(vec![string("closed")]), ret(Some(object(vec![])))]);
    let lines = log_of(vec![
        var_decl("iterable", Some(object(vec![]))),
        expr_stmt(assign(
            index(ident("iterable"), member(ident("Symbol"), "iterator")),
            function_expr(
                &[],
                vec![
                    var_decl("i", Some(num(0.0))),
                    ret(Some(object(vec![("next", next), ("return", close)]))),
                ],
            ),
        )),
        for_of(
            VariableKind::Const,
            "x",
            ident("iterable"),
            block(vec![
                log(vec![ident("x")]),
                if_stmt(strict_eq(ident("x"), num(2.0)), brk(None), None),
            ]),
        ),
    ]);
    assert_eq!(lines, ["1", "2", "closed"]);
}

#[test]
fn test_for_let_binds_per_iteration() {
    let lines = log_of(vec![
        var_decl("fns", Some(array(vec![]))),
        for_stmt(
            for_let("i", num(0.0)),
            Some(binary(BinaryOperator::LessThan, ident("i"), num(3.0))),
            Some(update(UpdateOperator::Increment, false, ident("i"))),
            block(vec![expr_stmt(method_call(
                ident("fns"),
                "push",
                vec![function_expr(&[], vec![ret(Some(ident("i")))])],
            ))]),
        ),
        log(vec![
            call(index(ident("fns"), num(0.0)), vec![]),
            call(index(ident("fns"), num(1.0)), vec![]),
            call(index(ident("fns"), num(2.0)), vec![]),
        ]),
    ]);
    assert_eq!(lines, ["0 1 2"]);
}

#[test]
fn test_labeled_continue_targets_outer_loop() {
    let counting = |name: &str, body: Statement| {
        for_stmt(
            Some(awaitless_ast::ast::ForInit::Expression(assign(ident(name), num(0.0)))),
            Some(binary(BinaryOperator::LessThan, ident(name), num(3.0))),
            Some(update(UpdateOperator::Increment, false, ident(name))),
            body,
        )
    };
    let lines = log_of(vec![
        var_decl("i", None),
        var_decl("j", None),
        labeled(
            "outer",
            counting(
                "i",
                block(vec![counting(
                    "j",
                    block(vec![
                        if_stmt(strict_eq(ident("j"), num(1.0)), cont(Some("outer")), None),
                        log(vec![ident("i"), ident("j")]),
                    ]),
                )]),
            ),
        ),
    ]);
    assert_eq!(lines, ["0 0", "1 0", "2 0"]);
}

#[test]
fn test_switch_falls_through_until_break() {
    let lines = log_of(vec![
        function_decl(
            "g",
            &["x"],
            vec![switch(
                ident("x"),
                vec![
                    case(num(1.0), vec![log(vec![string("one")])]),
                    case(num(2.0), vec![log(vec![string("two")]), brk(None)]),
                    default_case(vec![log(vec![string("other")])]),
                ],
            )],
        ),
        expr_stmt(call(ident("g"), vec![num(1.0)])),
        expr_stmt(call(ident("g"), vec![num(3.0)])),
    ]);
    assert_eq!(lines, ["one", "two", "other"]);
}

#[test]
fn test_for_in_and_own_properties() {
    let lines = log_of(vec![
        var_decl("o", Some(object(vec![("a", num(1.0)), ("b", num(2.0))]))),
        var_decl("keys", Some(array(vec![]))),
        for_in(
            VariableKind::Var,
            "k",
            ident("o"),
            expr_stmt(method_call(ident("keys"), "push", vec![ident("k")])),
        ),
        log(vec![
            ident("keys"),
            method_call(ident("o"), "hasOwnProperty", vec![string("a")]),
            method_call(ident("o"), "hasOwnProperty", vec![string("toString")]),
        ]),
    ]);
    assert_eq!(lines, ["a,b true false"]);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_uncaught_error_is_reported() {
    let result = run(vec![throw(new(ident("TypeError"), vec![string("bad")]))]);
    assert!(matches!(result, Err(RuntimeError::Uncaught(ref message)) if message == "TypeError: bad"));
}

#[test]
fn test_unbound_name_throws_reference_error() {
    let result = run(vec![expr_stmt(ident("missing"))]);
    assert!(matches!(result, Err(RuntimeError::Uncaught(ref message)) if message.starts_with("ReferenceError")));
}

#[test]
fn test_async_functions_are_rejected() {
    let result = run(vec![
        async_function_decl("f", &[], vec![]),
        expr_stmt(call(ident("f"), vec![])),
    ]);
    assert!(matches!(result, Err(RuntimeError::Unsupported(_))));

    let result = run(vec![expr_stmt(await_expr(num(1.0)))]);
    assert!(matches!(result, Err(RuntimeError::Unsupported(_))));
}

#[test]
fn test_step_limit_stops_endless_loops() {
    let mut interpreter = Interpreter::new().with_step_limit(1_000);
    let result = interpreter.run(&program(vec![while_stmt(boolean(true), block(vec![]))]));
    assert_eq!(result, Err(RuntimeError::StepLimit(1_000)));
}

#[test]
fn test_host_calls_global_function() {
    let mut interpreter = Interpreter::new();
    let body = vec![function_decl(
        "double",
        &["x"],
        vec![ret(Some(binary(BinaryOperator::Multiply, ident("x"), num(2.0))))],
    )];
    assert!(interpreter.run(&program(body)).is_ok());
    let double = interpreter.global("double").unwrap_or(Value::Undefined);
    let result = interpreter.call_function(&double, vec![Value::Number(21.0)]);
    assert_eq!(result.ok().and_then(|v| v.as_number()), Some(42.0));
}
