//! Straight-line async functions
//!
//! Suspension points in declarations, expression statements, arguments and
//! returns, and the order in which the code around them runs.

use awaitless_ast::ast::BinaryOperator;
use awaitless_ast::build::*;

use super::harness::*;

#[test]
fn test_sequential_awaits() {
    let body = vec![
        tick_decl(),
        async_function_decl(
            "main",
            &[],
            vec![
                log(vec![string("start")]),
                const_decl("a", tick(num(1.0))),
                log(vec![string("a"), ident("a")]),
                const_decl("b", tick(num(2.0))),
                log(vec![string("b"), ident("b")]),
                ret(Some(binary(BinaryOperator::Add, ident("a"), ident("b")))),
            ],
        ),
        report("main"),
        log(vec![string("sync")]),
    ];
    expect_log(body, &["start", "sync", "a 1", "b 2", "done 3"]);
}

#[test]
fn test_await_in_call_arguments() {
    let body = scenario(vec![async_function_decl(
        "main",
        &[],
        vec![
            log(vec![string("sum"), binary(BinaryOperator::Add, tick(num(20.0)), tick(num(22.0)))]),
            ret(Some(string("ok"))),
        ],
    )]);
    expect_log(body, &["sum 42", "done ok"]);
}

#[test]
fn test_await_plain_value() {
    let body = scenario(vec![async_function_decl(
        "main",
        &[],
        vec![
            const_decl("a", await_expr(num(5.0))),
            let_decl("b", Some(await_expr(string("x")))),
            ret(Some(binary(BinaryOperator::Add, ident("b"), ident("a")))),
        ],
    )]);
    expect_log(body, &["done x5"]);
}

#[test]
fn test_return_await_passthrough() {
    let body = scenario(vec![async_function_decl(
        "main",
        &[],
        vec![ret(Some(tick(string("through"))))],
    )]);
    expect_log(body, &["done through"]);
}

#[test]
fn test_nested_async_calls() {
    let body = scenario(vec![
        async_function_decl(
            "double",
            &["x"],
            vec![ret(Some(binary(BinaryOperator::Multiply, tick(ident("x")), num(2.0))))],
        ),
        async_function_decl(
            "main",
            &[],
            vec![
                const_decl("first", await_expr(call(ident("double"), vec![num(10.0)]))),
                const_decl("second", await_expr(call(ident("double"), vec![num(11.0)]))),
                ret(Some(binary(BinaryOperator::Add, ident("first"), ident("second")))),
            ],
        ),
    ]);
    expect_log(body, &["done 42"]);
}

#[test]
fn test_async_function_without_await_still_defers() {
    let body = scenario(vec![async_function_decl(
        "main",
        &[],
        vec![log(vec![string("body")]), ret(Some(num(1.0)))],
    )]);
    // The report handler is queued, so nothing after the call is needed to
    // see the body run first
    expect_log(body, &["body", "done 1"]);
}

#[test]
fn test_this_and_arguments_survive_suspension() {
    let counter = object(vec![
        ("count", num(41.0)),
        (
            "bump",
            async_function_expr(
                &[],
                vec![
                    expr_stmt(tick(null())),
                    expr_stmt(update(
                        awaitless_ast::ast::UpdateOperator::Increment,
                        false,
                        member(this(), "count"),
                    )),
                    ret(Some(member(ident("arguments"), "length"))),
                ],
            ),
        ),
    ]);
    let body = vec![
        tick_decl(),
        var_decl("counter", Some(counter)),
        expr_stmt(method_call(
            method_call(ident("counter"), "bump", vec![num(1.0), num(2.0)]),
            "then",
            vec![function_expr(
                &["n"],
                vec![log(vec![member(ident("counter"), "count"), ident("n")])],
            )],
        )),
    ];
    expect_log(body, &["42 2"]);
}

#[test]
fn test_async_arrow_captures_enclosing_this() {
    let method = function_expr(
        &[],
        vec![
            const_decl(
                "read",
                async_arrow(&[], vec![expr_stmt(tick(null())), ret(Some(member(this(), "name")))]),
            ),
            ret(Some(call(ident("read"), vec![]))),
        ],
    );
    let body = vec![
        tick_decl(),
        var_decl("holder", Some(object(vec![("name", string("holder")), ("get", method)]))),
        expr_stmt(method_call(
            method_call(ident("holder"), "get", vec![]),
            "then",
            vec![function_expr(&["v"], vec![log(vec![ident("v")])])],
        )),
    ];
    expect_log(body, &["holder"]);
}

#[test]
fn test_lowered_function_returns_a_promise() {
    let body = vec![
        async_function_decl("main", &[], vec![ret(Some(num(1.0)))]),
        log(vec![binary(
            BinaryOperator::InstanceOf,
            call(ident("main"), vec![]),
            ident("Promise"),
        )]),
    ];
    expect_log(body, &["true"]);
}

#[test]
fn test_two_functions_interleave_with_a_then_chain() {
    let step = |suffix: &str| log(vec![binary(BinaryOperator::Add, ident("name"), string(suffix))]);
    let worker = async_function_decl(
        "worker",
        &["name"],
        vec![
            step("1"),
            expr_stmt(tick(num(1.0))),
            step("2"),
            expr_stmt(await_expr(ident("name"))),
            step("3"),
        ],
    );
    let logger = |message: &str| function_expr(&[], vec![log(vec![string(message)])]);
    let chain = ["p1", "p2", "p3"].iter().fold(
        method_call(ident("Promise"), "resolve", vec![]),
        |promise, message| method_call(promise, "then", vec![logger(message)]),
    );
    let body = vec![
        tick_decl(),
        worker,
        expr_stmt(call(ident("worker"), vec![string("a")])),
        expr_stmt(call(ident("worker"), vec![string("b")])),
        expr_stmt(chain),
        log(vec![string("sync")]),
    ];
    expect_log(
        body,
        &["a1", "b1", "sync", "a2", "b2", "p1", "a3", "b3", "p2", "p3"],
    );
}
