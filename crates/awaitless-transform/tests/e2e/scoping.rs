//! Bindings from blocks around an async function stay visible after the
//! function is lowered, with and without closure hoisting

use awaitless_ast::build::*;

use super::harness::*;

#[test]
fn test_block_constant_read_after_await() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            expr_stmt(tick(num(1.0))),
            log(vec![ident("x")]),
            ret(Some(ident("x"))),
        ],
    );
    let body = vec![
        tick_decl(),
        block(vec![const_decl("x", string("ok")), main, report("main")]),
    ];
    expect_log(body, &["ok", "done ok"]);
}

#[test]
fn test_catch_parameter_read_after_await() {
    let main = async_function_decl(
        "main",
        &[],
        vec![expr_stmt(tick(null())), ret(Some(ident("e")))],
    );
    let body = vec![
        tick_decl(),
        try_stmt(
            vec![throw(string("boom"))],
            Some((Some("e"), vec![main, report("main")])),
            None,
        ),
    ];
    expect_log(body, &["done boom"]);
}

#[test]
fn test_loop_binding_read_after_await() {
    let main = async_function_decl(
        "main",
        &[],
        vec![expr_stmt(tick(null())), ret(Some(ident("item")))],
    );
    let body = vec![
        tick_decl(),
        for_of(
            awaitless_ast::ast::VariableKind::Const,
            "item",
            array(vec![string("first"), string("second")]),
            block(vec![main, report("main")]),
        ),
    ];
    expect_log(body, &["done first", "done second"]);
}
