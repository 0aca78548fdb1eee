//! Loops with suspension points in their bodies, tests and heads

use awaitless_ast::ast::{AssignmentOperator, BinaryOperator, Expression, Statement, UpdateOperator, VariableKind};
use awaitless_ast::build::*;

use super::harness::*;

fn strict_eq(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::StrictEqual, left, right)
}

fn less(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::LessThan, left, right)
}

fn increment(name: &str) -> Expression {
    update(UpdateOperator::Increment, false, ident(name))
}

#[test]
fn test_while_with_break_and_continue() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            let_decl("i", Some(num(0.0))),
            while_stmt(
                boolean(true),
                block(vec![
                    expr_stmt(increment("i")),
                    if_stmt(strict_eq(ident("i"), num(2.0)), cont(None), None),
                    if_stmt(binary(BinaryOperator::GreaterThan, ident("i"), num(4.0)), brk(None), None),
                    expr_stmt(tick(null())),
                    log(vec![string("i"), ident("i")]),
                ]),
            ),
            ret(Some(ident("i"))),
        ],
    );
    expect_log(scenario(vec![main]), &["i 1", "i 3", "i 4", "done 5"]);
}

#[test]
fn test_await_in_loop_test() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            let_decl("n", Some(num(0.0))),
            while_stmt(
                less(tick(ident("n")), num(3.0)),
                block(vec![expr_stmt(increment("n"))]),
            ),
            ret(Some(ident("n"))),
        ],
    );
    expect_log(scenario(vec![main]), &["done 3"]);
}

#[test]
fn test_do_while_runs_body_first() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            let_decl("count", Some(num(0.0))),
            do_while(
                block(vec![
                    expr_stmt(assign_op(AssignmentOperator::AddAssign, ident("count"), tick(num(1.0)))),
                    log(vec![string("count"), ident("count")]),
                ]),
                boolean(false),
            ),
            ret(Some(ident("count"))),
        ],
    );
    expect_log(scenario(vec![main]), &["count 1", "done 1"]);
}

#[test]
fn test_counting_for_loop() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            let_decl("total", Some(num(0.0))),
            for_stmt(
                for_let("i", num(1.0)),
                Some(binary(BinaryOperator::LessEqual, ident("i"), num(3.0))),
                Some(increment("i")),
                block(vec![expr_stmt(assign(
                    ident("total"),
                    binary(BinaryOperator::Add, ident("total"), tick(ident("i"))),
                ))]),
            ),
            ret(Some(ident("total"))),
        ],
    );
    expect_log(scenario(vec![main]), &["done 6"]);
}

#[test]
fn test_array_index_loop() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            const_decl("items", array(vec![string("a"), string("b"), string("c")])),
            for_stmt(
                for_let("i", num(0.0)),
                Some(less(ident("i"), member(ident("items"), "length"))),
                Some(increment("i")),
                block(vec![log(vec![ident("i"), tick(index(ident("items"), ident("i")))])]),
            ),
            ret(Some(string("end"))),
        ],
    );
    expect_log(scenario(vec![main]), &["0 a", "1 b", "2 c", "done end"]);
}

#[test]
fn test_for_of_array() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            let_decl("sum", Some(num(0.0))),
            for_of(
                VariableKind::Const,
                "x",
                array(vec![num(1.0), num(2.0), num(3.0)]),
                block(vec![
                    const_decl("v", tick(ident("x"))),
                    expr_stmt(assign(ident("sum"), binary(BinaryOperator::Add, ident("sum"), ident("v")))),
                    log(vec![string("x"), ident("v")]),
                ]),
            ),
            ret(Some(ident("sum"))),
        ],
    );
    expect_log(scenario(vec![main]), &["x 1", "x 2", "x 3", "done 6"]);
}

#[test]
fn test_for_of_break_closes_iterator() {
    let next = function_expr(
        &[],
        vec![
            expr_stmt(increment("i")),
            ret(Some(object(vec![("value", ident("i")), ("done", boolean(false))]))),
        ],
    );
    let close = function_expr(&[], vec![log(vec![string("closed")]), ret(Some(object(vec![])))]);
    let counter = function_decl(
        "counter",
        &[],
        vec![
            var_decl("i", Some(num(0.0))),
            var_decl("iterable", Some(object(vec![]))),
            expr_stmt(assign(
                index(ident("iterable"), member(ident("Symbol"), "iterator")),
                function_expr(&[], vec![ret(Some(object(vec![("next", next), ("return", close)])))]),
            )),
            ret(Some(ident("iterable"))),
        ],
    );
    let main = async_function_decl(
        "main",
        &[],
        vec![
            for_of(
                VariableKind::Const,
                "n",
                call(ident("counter"), vec![]),
                block(vec![
                    expr_stmt(tick(null())),
                    log(vec![string("n"), ident("n")]),
                    if_stmt(strict_eq(ident("n"), num(2.0)), brk(None), None),
                ]),
            ),
            ret(Some(string("stopped"))),
        ],
    );
    expect_log(scenario(vec![counter, main]), &["n 1", "n 2", "closed", "done stopped"]);
}

#[test]
fn test_return_from_inside_loop() {
    let find = async_function_decl(
        "find",
        &["items", "target"],
        vec![
            for_of(
                VariableKind::Const,
                "item",
                ident("items"),
                block(vec![
                    expr_stmt(tick(null())),
                    if_stmt(
                        strict_eq(ident("item"), ident("target")),
                        ret(Some(binary(BinaryOperator::Add, string("found "), ident("item")))),
                        None,
                    ),
                ]),
            ),
            ret(Some(string("missing"))),
        ],
    );
    let main = async_function_decl(
        "main",
        &[],
        vec![
            log(vec![await_expr(call(
                ident("find"),
                vec![array(vec![num(1.0), num(2.0), num(3.0)]), num(2.0)],
            ))]),
            log(vec![await_expr(call(ident("find"), vec![array(vec![num(1.0)]), num(5.0)]))]),
            ret(Some(string("ok"))),
        ],
    );
    expect_log(scenario(vec![find, main]), &["found 2", "missing", "done ok"]);
}

#[test]
fn test_for_in_keys() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            const_decl("scores", object(vec![("ann", num(1.0)), ("bob", num(2.0))])),
            for_in(
                VariableKind::Const,
                "name",
                ident("scores"),
                block(vec![log(vec![ident("name"), tick(index(ident("scores"), ident("name")))])]),
            ),
            ret(Some(string("end"))),
        ],
    );
    expect_log(scenario(vec![main]), &["ann 1", "bob 2", "done end"]);
}

#[test]
fn test_for_await_of_mixed_values() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            for_await_of(
                VariableKind::Const,
                "v",
                array(vec![call(ident("tick"), vec![string("a")]), string("b")]),
                block(vec![log(vec![ident("v")])]),
            ),
            ret(Some(string("end"))),
        ],
    );
    expect_log(scenario(vec![main]), &["a", "b", "done end"]);
}

#[test]
fn test_for_await_of_async_iterator() {
    let next = function_expr(
        &[],
        vec![
            expr_stmt(increment("i")),
            ret(Some(call(
                ident("tick"),
                vec![object(vec![
                    ("value", binary(BinaryOperator::Multiply, ident("i"), num(10.0))),
                    ("done", binary(BinaryOperator::GreaterThan, ident("i"), num(2.0))),
                ])],
            ))),
        ],
    );
    let source = function_decl(
        "source",
        &[],
        vec![
            var_decl("i", Some(num(0.0))),
            var_decl("iterable", Some(object(vec![]))),
            expr_stmt(assign(
                index(ident("iterable"), member(ident("Symbol"), "asyncIterator")),
                function_expr(&[], vec![ret(Some(object(vec![("next", next)])))]),
            )),
            ret(Some(ident("iterable"))),
        ],
    );
    let main = async_function_decl(
        "main",
        &[],
        vec![
            for_await_of(
                VariableKind::Const,
                "v",
                call(ident("source"), vec![]),
                block(vec![log(vec![ident("v")])]),
            ),
            ret(Some(string("end"))),
        ],
    );
    expect_log(scenario(vec![source, main]), &["10", "20", "done end"]);
}

#[test]
fn test_for_let_shadows_outer_binding() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            let_decl("i", Some(num(10.0))),
            for_stmt(
                for_let("i", num(0.0)),
                Some(less(ident("i"), num(3.0))),
                Some(increment("i")),
                block(vec![
                    if_stmt(strict_eq(ident("i"), num(1.0)), brk(None), None),
                    expr_stmt(tick(ident("i"))),
                    log(vec![string("i"), ident("i")]),
                ]),
            ),
            ret(Some(ident("i"))),
        ],
    );
    expect_log(scenario(vec![main]), &["i 0", "done 10"]);
}

/// `const fs = []; for (let i = 0; i < limit; i++) { fs.push(() => i); <extra>; await tick(null); }`
/// then logs what each closure sees
fn collect_closures(limit: f64, extra: Vec<Statement>) -> Statement {
    let read = |n: f64| call(index(ident("fs"), num(n)), vec![]);
    let mut body = vec![expr_stmt(method_call(
        ident("fs"),
        "push",
        vec![function_expr(&[], vec![ret(Some(ident("i")))])],
    ))];
    body.extend(extra);
    body.push(expr_stmt(tick(null())));
    async_function_decl(
        "main",
        &[],
        vec![
            const_decl("fs", array(vec![])),
            for_stmt(
                for_let("i", num(0.0)),
                Some(less(ident("i"), num(limit))),
                Some(increment("i")),
                block(body),
            ),
            log(vec![read(0.0), read(1.0), read(2.0)]),
            ret(Some(member(ident("fs"), "length"))),
        ],
    )
}

#[test]
fn test_for_let_closures_see_their_own_iteration() {
    expect_log(scenario(vec![collect_closures(3.0, vec![])]), &["0 1 2", "done 3"]);
}

#[test]
fn test_for_let_body_assignment_carries_to_next_iteration() {
    let main = collect_closures(6.0, vec![expr_stmt(increment("i"))]);
    expect_log(scenario(vec![main]), &["1 3 5", "done 3"]);
}

#[test]
fn test_for_await_of_waits_for_close_before_rejecting() {
    let next = function_expr(
        &[],
        vec![
            expr_stmt(increment("i")),
            ret(Some(call(
                ident("tick"),
                vec![object(vec![("value", ident("i")), ("done", boolean(false))])],
            ))),
        ],
    );
    let finish = function_expr(&[], vec![log(vec![string("closed")]), ret(Some(object(vec![])))]);
    let close = function_expr(
        &[],
        vec![
            log(vec![string("closing")]),
            ret(Some(method_call(call(ident("tick"), vec![null()]), "then", vec![finish]))),
        ],
    );
    let source = function_decl(
        "source",
        &[],
        vec![
            var_decl("i", Some(num(0.0))),
            var_decl("iterable", Some(object(vec![]))),
            expr_stmt(assign(
                index(ident("iterable"), member(ident("Symbol"), "asyncIterator")),
                function_expr(&[], vec![ret(Some(object(vec![("next", next), ("return", close)])))]),
            )),
            ret(Some(ident("iterable"))),
        ],
    );
    let main = async_function_decl(
        "main",
        &[],
        vec![
            try_stmt(
                vec![for_await_of(
                    VariableKind::Const,
                    "v",
                    call(ident("source"), vec![]),
                    block(vec![
                        log(vec![string("v"), ident("v")]),
                        throw(new(ident("Error"), vec![string("stop")])),
                    ]),
                )],
                Some((
                    Some("e"),
                    vec![log(vec![string("caught"), binary(BinaryOperator::Add, string(""), ident("e"))])],
                )),
                None,
            ),
            ret(Some(string("end"))),
        ],
    );
    expect_log(
        scenario(vec![source, main]),
        &["v 1", "closing", "closed", "caught Error: stop", "done end"],
    );
}

#[test]
fn test_labeled_continue_and_break() {
    let counting = |name: &str, body: Statement| {
        for_stmt(
            for_let(name, num(0.0)),
            Some(less(ident(name), num(3.0))),
            Some(increment(name)),
            body,
        )
    };
    let main = async_function_decl(
        "main",
        &[],
        vec![
            labeled(
                "outer",
                counting(
                    "i",
                    block(vec![counting(
                        "j",
                        block(vec![
                            expr_stmt(tick(null())),
                            if_stmt(strict_eq(ident("j"), num(1.0)), cont(Some("outer")), None),
                            if_stmt(strict_eq(ident("i"), num(2.0)), brk(Some("outer")), None),
                            log(vec![ident("i"), ident("j")]),
                        ]),
                    )]),
                ),
            ),
            ret(Some(string("end"))),
        ],
    );
    expect_log(scenario(vec![main]), &["0 0", "1 0", "done end"]);
}

#[test]
fn test_long_loop_does_not_grow_the_stack() {
    let main = async_function_decl(
        "main",
        &[],
        vec![
            let_decl("i", Some(num(0.0))),
            while_stmt(
                less(ident("i"), num(500.0)),
                block(vec![expr_stmt(assign(ident("i"), binary(BinaryOperator::Add, tick(ident("i")), num(1.0))))]),
            ),
            ret(Some(ident("i"))),
        ],
    );
    expect_log(scenario(vec![main]), &["done 500"]);
}
