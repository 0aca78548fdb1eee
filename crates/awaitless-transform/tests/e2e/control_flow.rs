//! Conditionals, short-circuiting, switch and labeled blocks

use awaitless_ast::ast::{BinaryOperator, LogicalOperator, Statement};
use awaitless_ast::build::*;

use super::harness::*;

/// `async function traced(v) { log("traced", v); return v; }`
fn traced_decl() -> Statement {
    async_function_decl(
        "traced",
        &["v"],
        vec![log(vec![string("traced"), ident("v")]), ret(Some(ident("v")))],
    )
}

fn traced(value: awaitless_ast::Expression) -> awaitless_ast::Expression {
    await_expr(call(ident("traced"), vec![value]))
}

#[test]
fn test_if_else_with_tail() {
    let check = async_function_decl(
        "check",
        &["x"],
        vec![
            if_stmt(
                binary(BinaryOperator::GreaterThan, ident("x"), num(1.0)),
                block(vec![
                    log(vec![string("big")]),
                    expr_stmt(tick(null())),
                    log(vec![string("after")]),
                ]),
                Some(block(vec![log(vec![string("small")])])),
            ),
            ret(Some(ident("x"))),
        ],
    );
    let main = async_function_decl(
        "main",
        &[],
        vec![
            log(vec![string("r"), await_expr(call(ident("check"), vec![num(1.0)]))]),
            log(vec![string("r"), await_expr(call(ident("check"), vec![num(2.0)]))]),
            ret(Some(string("ok"))),
        ],
    );
    expect_log(
        scenario(vec![check, main]),
        &["small", "r 1", "big", "after", "r 2", "done ok"],
    );
}

#[test]
fn test_return_from_branch_skips_tail() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            const_decl("flag", tick(boolean(true))),
            if_stmt(
                ident("flag"),
                block(vec![
                    expr_stmt(tick(null())),
                    ret(Some(string("early"))),
                ]),
                None,
            ),
            log(vec![string("unreachable")]),
            ret(Some(string("late"))),
        ],
    );
    expect_log(scenario(vec![main]), &["done early"]);
}

#[test]
fn test_short_circuit_skips_awaits() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            const_decl("a", and(boolean(false), traced(num(1.0)))),
            const_decl("b", or(boolean(true), traced(num(2.0)))),
            const_decl(
                "c",
                logical(LogicalOperator::NullishCoalescing, null(), traced(num(3.0))),
            ),
            const_decl("d", conditional(traced(num(0.0)), string("yes"), traced(string("no")))),
            log(vec![ident("a"), ident("b"), ident("c"), ident("d")]),
            ret(Some(string("ok"))),
        ],
    );
    expect_log(
        scenario(vec![traced_decl(), main]),
        &["traced 3", "traced 0", "traced no", "false true 3 no", "done ok"],
    );
}

#[test]
fn test_switch_fallthrough_with_await() {
    let pick = async_function_decl(
        "pick",
        &["x"],
        vec![
            switch(
                ident("x"),
                vec![
                    case(num(1.0), vec![log(vec![string("one")]), expr_stmt(tick(null()))]),
                    case(num(2.0), vec![log(vec![string("two")]), brk(None)]),
                    default_case(vec![log(vec![string("other")])]),
                ],
            ),
            ret(Some(ident("x"))),
        ],
    );
    let main = async_function_decl(
        "main",
        &[],
        vec![
            log(vec![string("picked"), await_expr(call(ident("pick"), vec![num(1.0)]))]),
            log(vec![string("picked"), await_expr(call(ident("pick"), vec![num(3.0)]))]),
            ret(Some(string("ok"))),
        ],
    );
    expect_log(
        scenario(vec![pick, main]),
        &["one", "two", "picked 1", "other", "picked 3", "done ok"],
    );
}

#[test]
fn test_switch_on_awaited_discriminant_with_return() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            switch(
                tick(string("b")),
                vec![
                    case(string("a"), vec![ret(Some(string("was a")))]),
                    case(string("b"), vec![expr_stmt(tick(null())), ret(Some(string("was b")))]),
                ],
            ),
            ret(Some(string("none"))),
        ],
    );
    expect_log(scenario(vec![main]), &["done was b"]);
}

#[test]
fn test_labeled_block_break() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            labeled(
                "found",
                block(vec![
                    const_decl("v", tick(num(1.0))),
                    if_stmt(strict_eq(ident("v"), num(1.0)), brk(Some("found")), None),
                    log(vec![string("skipped")]),
                ]),
            ),
            log(vec![string("after label")]),
            ret(Some(string("ok"))),
        ],
    );
    expect_log(scenario(vec![main]), &["after label", "done ok"]);
}

fn strict_eq(left: awaitless_ast::Expression, right: awaitless_ast::Expression) -> awaitless_ast::Expression {
    binary(BinaryOperator::StrictEqual, left, right)
}
