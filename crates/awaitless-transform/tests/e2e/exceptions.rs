//! Throwing, catching and finalizers around suspension points

use awaitless_ast::ast::{AssignmentOperator, BinaryOperator, Expression, Statement};
use awaitless_ast::build::*;

use super::harness::*;

fn error(message: Expression) -> Expression {
    new(ident("Error"), vec![message])
}

/// `async function risky(fail) { await tick(null); if (fail) throw ...; return "fine"; }`
fn risky_decl() -> Statement {
    async_function_decl(
        "risky",
        &["fail"],
        vec![
            expr_stmt(tick(null())),
            if_stmt(ident("fail"), throw(error(string("boom"))), None),
            ret(Some(string("fine"))),
        ],
    )
}

#[test]
fn test_try_catch_finally_with_rejection() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            try_stmt(
                vec![
                    log(vec![await_expr(call(ident("risky"), vec![boolean(false)]))]),
                    expr_stmt(await_expr(call(ident("risky"), vec![boolean(true)]))),
                    log(vec![string("unreachable")]),
                ],
                Some((Some("e"), vec![log(vec![string("caught"), member(ident("e"), "message")])])),
                Some(vec![log(vec![string("cleanup")])]),
            ),
            ret(Some(string("after"))),
        ],
    );
    expect_log(
        scenario(vec![risky_decl(), main]),
        &["fine", "caught boom", "cleanup", "done after"],
    );
}

#[test]
fn test_synchronous_throw_becomes_rejection() {
    let body = vec![
        async_function_decl("main", &[], vec![throw(error(string("sync")))]),
        report("main"),
        log(vec![string("after call")]),
    ];
    expect_log(body, &["after call", "error Error: sync"]);
}

#[test]
fn test_finally_runs_on_both_paths() {
    let guarded = async_function_decl(
        "guarded",
        &["fail"],
        vec![try_stmt(
            vec![
                expr_stmt(tick(null())),
                if_stmt(ident("fail"), throw(error(string("bad"))), None),
                ret(Some(string("ok"))),
            ],
            None,
            Some(vec![log(vec![string("finally"), ident("fail")])]),
        )],
    );
    let main = async_function_decl(
        "main",
        &[],
        vec![
            log(vec![await_expr(call(ident("guarded"), vec![boolean(false)]))]),
            try_stmt(
                vec![expr_stmt(await_expr(call(ident("guarded"), vec![boolean(true)])))],
                Some((Some("e"), vec![log(vec![string("caught"), member(ident("e"), "message")])])),
                None,
            ),
            ret(Some(string("end"))),
        ],
    );
    expect_log(
        scenario(vec![guarded, main]),
        &["finally false", "ok", "finally true", "caught bad", "done end"],
    );
}

#[test]
fn test_catch_rethrows() {
    let main = async_function_decl(
        "main",
        &[],
        vec![try_stmt(
            vec![expr_stmt(tick(null())), throw(error(string("inner")))],
            Some((
                Some("e"),
                vec![throw(error(binary(
                    BinaryOperator::Add,
                    string("wrapped "),
                    member(ident("e"), "message"),
                )))],
            )),
            None,
        )],
    );
    expect_log(scenario(vec![main]), &["error Error: wrapped inner"]);
}

#[test]
fn test_await_inside_catch_and_finally() {
    let append = |value: &str| {
        expr_stmt(assign_op(AssignmentOperator::AddAssign, ident("steps"), tick(string(value))))
    };
    let main = async_function_decl(
        "main",
        &[],
        vec![
            let_decl("steps", Some(string(""))),
            try_stmt(
                vec![expr_stmt(await_expr(method_call(
                    ident("Promise"),
                    "reject",
                    vec![error(string("x"))],
                )))],
                Some((Some("e"), vec![append("c")])),
                Some(vec![append("f")]),
            ),
            ret(Some(ident("steps"))),
        ],
    );
    expect_log(scenario(vec![main]), &["done cf"]);
}

#[test]
fn test_uncaught_rejection_skips_the_rest() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            const_decl("value", await_expr(call(ident("risky"), vec![boolean(true)]))),
            log(vec![string("unreachable"), ident("value")]),
            ret(Some(ident("value"))),
        ],
    );
    expect_log(scenario(vec![risky_decl(), main]), &["error Error: boom"]);
}
