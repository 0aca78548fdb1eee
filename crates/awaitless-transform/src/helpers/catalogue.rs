//! Helper declarations, built as trees
//!
//! Sequencing helpers (`_await`, `_call`) always resume through a promise
//! reaction unless told the value is direct. Structural helpers run their
//! closures synchronously until one of them returns a thenable and only then
//! chain the remaining work onto it. Loop helpers keep a single outer promise
//! and resume a flat state machine from each reaction, so long asynchronous
//! loops never nest promises or grow the stack.

use awaitless_ast::ast::{BinaryOperator, Expression, Statement, UpdateOperator, VariableKind};
use awaitless_ast::build::*;

use super::{Helper, HelperNames};
use crate::config::Target;

/// Declaration of `helper` under its resolved name
pub(super) fn declare(helper: Helper, target: Target, names: &HelperNames) -> Statement {
    let body = match helper {
        Helper::Empty => vec![],
        Helper::Await => await_body(),
        Helper::AwaitIgnored => await_ignored_body(names),
        Helper::Call => call_body(),
        Helper::CallIgnored => call_ignored_body(names),
        Helper::Invoke => invoke_body(),
        Helper::Continue => continue_body(),
        Helper::Catch => catch_body(),
        Helper::Finally => finally_body(),
        Helper::FinallyRethrows => finally_rethrows_body(),
        Helper::Rethrow => rethrow_body(),
        Helper::For => for_body(),
        Helper::Do => do_body(names),
        Helper::ForTo => for_to_body(names),
        Helper::ForIn => for_keys_body(names, false),
        Helper::ForOwn => for_keys_body(names, true),
        Helper::ForOf => for_of_body(names, target),
        Helper::ForAwaitOf => for_await_of_body(names, target),
        Helper::Switch => switch_body(),
    };
    function_decl(names.name(helper), parameters(helper), body)
}

fn parameters(helper: Helper) -> &'static [&'static str] {
    match helper {
        Helper::Empty => &[],
        Helper::Await => &["value", "then", "direct"],
        Helper::Call => &["body", "then", "direct"],
        Helper::AwaitIgnored => &["value", "direct"],
        Helper::CallIgnored => &["body", "direct"],
        Helper::Invoke => &["body", "then"],
        Helper::Continue => &["value", "then"],
        Helper::Catch => &["body", "recover"],
        Helper::Finally | Helper::FinallyRethrows => &["body", "finalizer"],
        Helper::Rethrow => &["thrown", "value"],
        Helper::For => &["test", "update", "body"],
        Helper::Do => &["body", "test"],
        Helper::ForTo => &["array", "body", "check"],
        Helper::ForIn
        | Helper::ForOwn
        | Helper::ForOf
        | Helper::ForAwaitOf => &["target", "body", "check"],
        Helper::Switch => &["discriminant", "cases"],
    }
}

// ============================================================================
// Shorthands
// ============================================================================

fn id(name: &str) -> Expression {
    ident(name)
}

fn call0(name: &str) -> Expression {
    call(ident(name), vec![])
}

/// `value && value.then`
fn is_thenable(name: &str) -> Expression {
    and(id(name), member(id(name), "then"))
}

/// `value.then(args...)`
fn then(name: &str, args: Vec<Expression>) -> Expression {
    method_call(id(name), "then", args)
}

fn when(condition: Expression, body: Vec<Statement>) -> Statement {
    if_stmt(condition, block(body), None)
}

fn when_else(condition: Expression, body: Vec<Statement>, otherwise: Vec<Statement>) -> Statement {
    if_stmt(condition, block(body), Some(block(otherwise)))
}

fn vars(declarations: Vec<(&str, Option<Expression>)>) -> Statement {
    declaration(
        VariableKind::Var,
        declarations
            .into_iter()
            .map(|(name, init)| declarator(name, init))
            .collect(),
    )
}

fn set(name: &str, value: Expression) -> Statement {
    expr_stmt(assign(id(name), value))
}

fn strict_eq(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::StrictEqual, left, right)
}

fn promise(method: &str, args: Vec<Expression>) -> Expression {
    method_call(id("Promise"), method, args)
}

fn symbol(name: &str) -> Expression {
    member(id("Symbol"), name)
}

/// `for (;;) { body }`
fn forever(body: Vec<Statement>) -> Statement {
    for_stmt(None, None, None, block(body))
}

/// `name.then(resume).then(void 0, reject); return;`
fn suspend_on(name: &str) -> Vec<Statement> {
    vec![
        expr_stmt(method_call(
            then(name, vec![id("resume")]),
            "then",
            vec![undefined(), id("reject")],
        )),
        ret(None),
    ]
}

/// `if (check && check()) { ... }`
fn requested_exit() -> Expression {
    and(id("check"), call0("check"))
}

// ============================================================================
// Sequencing
// ============================================================================

fn await_body() -> Vec<Statement> {
    vec![
        when(
            id("direct"),
            vec![ret(Some(conditional(
                id("then"),
                call(id("then"), vec![id("value")]),
                id("value"),
            )))],
        ),
        when(
            or(not(id("value")), not(member(id("value"), "then"))),
            vec![set("value", promise("resolve", vec![id("value")]))],
        ),
        ret(Some(conditional(
            id("then"),
            then("value", vec![id("then")]),
            id("value"),
        ))),
    ]
}

fn await_ignored_body(names: &HelperNames) -> Vec<Statement> {
    vec![when(
        not(id("direct")),
        vec![ret(Some(conditional(
            is_thenable("value"),
            then("value", vec![names.expr(Helper::Empty)]),
            promise("resolve", vec![]),
        )))],
    )]
}

fn call_body() -> Vec<Statement> {
    vec![
        when(
            id("direct"),
            vec![ret(Some(conditional(
                id("then"),
                call(id("then"), vec![call0("body")]),
                call0("body"),
            )))],
        ),
        try_stmt(
            vec![
                vars(vec![("result", Some(promise("resolve", vec![call0("body")])))]),
                ret(Some(conditional(
                    id("then"),
                    then("result", vec![id("then")]),
                    id("result"),
                ))),
            ],
            Some((Some("e"), vec![ret(Some(promise("reject", vec![id("e")])))])),
            None,
        ),
    ]
}

fn call_ignored_body(names: &HelperNames) -> Vec<Statement> {
    vec![ret(Some(call(
        names.expr(Helper::Call),
        vec![id("body"), names.expr(Helper::Empty), id("direct")],
    )))]
}

// ============================================================================
// Structure
// ============================================================================

fn invoke_body() -> Vec<Statement> {
    vec![
        vars(vec![("result", Some(call0("body")))]),
        when(
            is_thenable("result"),
            vec![ret(Some(then("result", vec![id("then")])))],
        ),
        ret(Some(call(id("then"), vec![id("result")]))),
    ]
}

fn continue_body() -> Vec<Statement> {
    vec![ret(Some(conditional(
        is_thenable("value"),
        then("value", vec![id("then")]),
        call(id("then"), vec![id("value")]),
    )))]
}

/// `try { var result = body(); } catch (e) { <on_throw> }`
fn run_body(on_throw: Vec<Statement>) -> Statement {
    try_stmt(
        vec![vars(vec![("result", Some(call0("body")))])],
        Some((Some("e"), on_throw)),
        None,
    )
}

fn catch_body() -> Vec<Statement> {
    vec![
        run_body(vec![ret(Some(call(id("recover"), vec![id("e")])))]),
        when(
            is_thenable("result"),
            vec![ret(Some(then("result", vec![undefined(), id("recover")])))],
        ),
        ret(Some(id("result"))),
    ]
}

fn finally_body() -> Vec<Statement> {
    vec![
        run_body(vec![ret(Some(call0("finalizer")))]),
        when(
            is_thenable("result"),
            vec![ret(Some(then("result", vec![id("finalizer"), id("finalizer")])))],
        ),
        ret(Some(call0("finalizer"))),
    ]
}

fn finally_rethrows_body() -> Vec<Statement> {
    let settle = |thrown: bool, param: &str| {
        function_expr(
            &[param],
            vec![ret(Some(call(id("finalizer"), vec![boolean(thrown), id(param)])))],
        )
    };
    vec![
        run_body(vec![ret(Some(call(id("finalizer"), vec![boolean(true), id("e")])))]),
        when(
            is_thenable("result"),
            vec![ret(Some(then(
                "result",
                vec![settle(false, "value"), settle(true, "error")],
            )))],
        ),
        ret(Some(call(id("finalizer"), vec![boolean(false), id("result")]))),
    ]
}

fn rethrow_body() -> Vec<Statement> {
    vec![
        when(id("thrown"), vec![throw(id("value"))]),
        ret(Some(id("value"))),
    ]
}

// ============================================================================
// Loops
// ============================================================================

/// Stages: 0 waits on a test, 1 on a body, 2 on an update
fn for_body() -> Vec<Statement> {
    let stage = |n: f64| set("stage", num(n));
    let is_stage = |n: f64| strict_eq(id("stage"), num(n));

    let sync_phase = forever(vec![
        set("value", call0("test")),
        when(is_thenable("value"), vec![stage(0.0), brk(None)]),
        when(not(id("value")), vec![ret(Some(id("result")))]),
        set("value", call0("body")),
        when(is_thenable("value"), vec![stage(1.0), brk(None)]),
        set("result", id("value")),
        when(
            id("update"),
            vec![
                set("value", call0("update")),
                when(is_thenable("value"), vec![stage(2.0), brk(None)]),
            ],
        ),
    ]);

    let resume = function_decl(
        "resume",
        &["next"],
        vec![forever(vec![
            when(
                is_stage(0.0),
                vec![
                    when(
                        not(id("next")),
                        vec![expr_stmt(call(id("resolve"), vec![id("result")])), ret(None)],
                    ),
                    set("next", call0("body")),
                    stage(1.0),
                    when(is_thenable("next"), suspend_on("next")),
                ],
            ),
            when(
                is_stage(1.0),
                vec![
                    set("result", id("next")),
                    stage(2.0),
                    when(
                        id("update"),
                        vec![
                            set("next", call0("update")),
                            when(is_thenable("next"), suspend_on("next")),
                        ],
                    ),
                ],
            ),
            stage(0.0),
            set("next", call0("test")),
            when(is_thenable("next"), suspend_on("next")),
        ])],
    );

    vec![
        vars(vec![("stage", None), ("value", None), ("result", None)]),
        sync_phase,
        ret(Some(new(
            id("Promise"),
            vec![function_expr(
                &["resolve", "reject"],
                vec![
                    resume,
                    expr_stmt(method_call(
                        then("value", vec![id("resume")]),
                        "then",
                        vec![undefined(), id("reject")],
                    )),
                ],
            )],
        ))),
    ]
}

fn do_body(names: &HelperNames) -> Vec<Statement> {
    vec![
        vars(vec![("started", None)]),
        ret(Some(call(
            names.expr(Helper::For),
            vec![
                function_expr(
                    &[],
                    vec![ret(Some(conditional(
                        id("started"),
                        call0("test"),
                        assign(id("started"), boolean(true)),
                    )))],
                ),
                undefined(),
                id("body"),
            ],
        ))),
    ]
}

fn for_to_body(names: &HelperNames) -> Vec<Statement> {
    vec![
        vars(vec![("i", Some(num(-1.0)))]),
        ret(Some(call(
            names.expr(Helper::For),
            vec![
                function_expr(
                    &[],
                    vec![ret(Some(and(
                        or(not(id("check")), not(call0("check"))),
                        binary(
                            BinaryOperator::LessThan,
                            update(UpdateOperator::Increment, true, id("i")),
                            member(id("array"), "length"),
                        ),
                    )))],
                ),
                undefined(),
                function_expr(&[], vec![ret(Some(call(id("body"), vec![id("i")])))]),
            ],
        ))),
    ]
}

/// `_forIn` and `_forOwn`: snapshot the keys, then iterate them by index
fn for_keys_body(names: &HelperNames, own_only: bool) -> Vec<Statement> {
    let push = expr_stmt(method_call(id("keys"), "push", vec![id("key")]));
    let collect = if own_only {
        when(
            method_call(
                member(member(id("Object"), "prototype"), "hasOwnProperty"),
                "call",
                vec![id("target"), id("key")],
            ),
            vec![push],
        )
    } else {
        push
    };
    vec![
        vars(vec![("keys", Some(array(vec![])))]),
        for_in(VariableKind::Var, "key", id("target"), block(vec![collect])),
        ret(Some(call(
            names.expr(Helper::ForTo),
            vec![
                id("keys"),
                function_expr(
                    &["i"],
                    vec![ret(Some(call(id("body"), vec![index(id("keys"), id("i"))])))],
                ),
                id("check"),
            ],
        ))),
    ]
}

/// `close()`: calls the iterator's `return` at most once, returning its result
fn close_declaration() -> Statement {
    function_decl(
        "close",
        &[],
        vec![when(
            not(id("done")),
            vec![
                set("done", boolean(true)),
                when(
                    member(id("iterator"), "return"),
                    vec![ret(Some(method_call(id("iterator"), "return", vec![])))],
                ),
            ],
        )],
    )
}

/// Runs `_for(test, void 0, loop_body)`, closing the iterator when the loop
/// throws or rejects. An async iterator's `return` result is awaited before
/// the error is passed on.
fn guarded_iteration(
    names: &HelperNames,
    test: Expression,
    loop_body: Expression,
    awaits_close: bool,
) -> Vec<Statement> {
    let rethrow_after_close = if awaits_close {
        let rethrow = function_expr(&[], vec![throw(id("e"))]);
        vec![
            vars(vec![("closing", Some(call0("close")))]),
            when(
                is_thenable("closing"),
                vec![ret(Some(then("closing", vec![rethrow.clone(), rethrow])))],
            ),
            throw(id("e")),
        ]
    } else {
        vec![expr_stmt(call0("close")), throw(id("e"))]
    };
    vec![
        try_stmt(
            vec![vars(vec![(
                "result",
                Some(call(names.expr(Helper::For), vec![test, undefined(), loop_body])),
            )])],
            Some((Some("e"), rethrow_after_close.clone())),
            None,
        ),
        when(
            is_thenable("result"),
            vec![ret(Some(then(
                "result",
                vec![undefined(), function_expr(&["e"], rethrow_after_close)],
            )))],
        ),
        ret(Some(id("result"))),
    ]
}

fn not_iterable(message: &str) -> Statement {
    throw(new(id("TypeError"), vec![string(message)]))
}

fn for_of_body(names: &HelperNames, target: Target) -> Vec<Statement> {
    let mut body = Vec::new();
    if target == Target::Es5 {
        body.push(when(
            method_call(id("Array"), "isArray", vec![id("target")]),
            vec![ret(Some(call(
                names.expr(Helper::ForTo),
                vec![
                    id("target"),
                    function_expr(
                        &["i"],
                        vec![ret(Some(call(id("body"), vec![index(id("target"), id("i"))])))],
                    ),
                    id("check"),
                ],
            )))],
        ));
        body.push(when(
            or(
                strict_eq(typeof_(id("Symbol")), string("undefined")),
                not(index(id("target"), symbol("iterator"))),
            ),
            vec![not_iterable("Object is not iterable")],
        ));
    }
    body.push(vars(vec![
        ("iterator", Some(call(index(id("target"), symbol("iterator")), vec![]))),
        ("step", None),
        ("done", Some(boolean(false))),
    ]));
    body.push(close_declaration());

    let test = function_expr(
        &[],
        vec![
            when(requested_exit(), vec![expr_stmt(call0("close")), ret(Some(boolean(false)))]),
            set("done", boolean(true)),
            set("step", method_call(id("iterator"), "next", vec![])),
            set("done", member(id("step"), "done")),
            ret(Some(not(id("done")))),
        ],
    );
    let loop_body = function_expr(
        &[],
        vec![ret(Some(call(id("body"), vec![member(id("step"), "value")])))],
    );
    body.extend(guarded_iteration(names, test, loop_body, false));
    body
}

fn for_await_of_body(names: &HelperNames, target: Target) -> Vec<Statement> {
    let mut body = Vec::new();
    match target {
        Target::Es2015 => {
            body.push(vars(vec![
                ("sync", Some(not(index(id("target"), symbol("asyncIterator"))))),
                (
                    "iterator",
                    Some(conditional(
                        id("sync"),
                        call(index(id("target"), symbol("iterator")), vec![]),
                        call(index(id("target"), symbol("asyncIterator")), vec![]),
                    )),
                ),
            ]));
        }
        Target::Es5 => {
            let has_symbol = not(strict_eq(typeof_(id("Symbol")), string("undefined")));
            body.push(vars(vec![
                ("hasSymbol", Some(has_symbol)),
                (
                    "sync",
                    Some(not(and(
                        and(id("hasSymbol"), symbol("asyncIterator")),
                        index(id("target"), symbol("asyncIterator")),
                    ))),
                ),
                ("iterator", None),
                ("index", Some(num(0.0))),
            ]));
            let array_iterator = object(vec![(
                "next",
                function_expr(
                    &[],
                    vec![ret(Some(conditional(
                        binary(
                            BinaryOperator::LessThan,
                            id("index"),
                            member(id("target"), "length"),
                        ),
                        object(vec![
                            (
                                "value",
                                index(
                                    id("target"),
                                    update(UpdateOperator::Increment, false, id("index")),
                                ),
                            ),
                            ("done", boolean(false)),
                        ]),
                        object(vec![("value", undefined()), ("done", boolean(true))]),
                    )))],
                ),
            )]);
            body.push(if_stmt(
                not(id("sync")),
                block(vec![set(
                    "iterator",
                    call(index(id("target"), symbol("asyncIterator")), vec![]),
                )]),
                Some(if_stmt(
                    method_call(id("Array"), "isArray", vec![id("target")]),
                    block(vec![set("iterator", array_iterator)]),
                    Some(when_else(
                        and(id("hasSymbol"), index(id("target"), symbol("iterator"))),
                        vec![set("iterator", call(index(id("target"), symbol("iterator")), vec![]))],
                        vec![not_iterable("Object is not async iterable")],
                    )),
                )),
            ));
        }
    }
    body.push(vars(vec![("step", None), ("done", Some(boolean(false)))]));
    body.push(close_declaration());

    // Sync iterators yield values that still have to be awaited
    let on_next = function_expr(
        &["next"],
        vec![
            set("done", member(id("next"), "done")),
            when(id("done"), vec![ret(Some(boolean(false)))]),
            when(
                id("sync"),
                vec![ret(Some(method_call(
                    promise("resolve", vec![member(id("next"), "value")]),
                    "then",
                    vec![function_expr(
                        &["value"],
                        vec![set("step", id("value")), ret(Some(boolean(true)))],
                    )],
                )))],
            ),
            set("step", member(id("next"), "value")),
            ret(Some(boolean(true))),
        ],
    );
    let test = function_expr(
        &[],
        vec![
            when(
                requested_exit(),
                vec![
                    vars(vec![("closing", Some(call0("close")))]),
                    ret(Some(conditional(
                        is_thenable("closing"),
                        then(
                            "closing",
                            vec![function_expr(&[], vec![ret(Some(boolean(false)))])],
                        ),
                        boolean(false),
                    ))),
                ],
            ),
            set("done", boolean(true)),
            ret(Some(method_call(
                promise("resolve", vec![method_call(id("iterator"), "next", vec![])]),
                "then",
                vec![on_next],
            ))),
        ],
    );
    let loop_body = function_expr(&[], vec![ret(Some(call(id("body"), vec![id("step")])))]);
    body.extend(guarded_iteration(names, test, loop_body, true));
    body
}

// ============================================================================
// Switch
// ============================================================================

/// Tests run in order with the default case remembered for last; matched
/// bodies run until one has no fallthrough check or its check reports a stop
fn switch_body() -> Vec<Statement> {
    let case_part = |i: Expression, part: f64| index(index(id("cases"), i), num(part));
    let inc_i = || update(UpdateOperator::Increment, false, id("i"));

    let match_from = function_decl(
        "matchFrom",
        &["i"],
        vec![
            for_stmt(
                None,
                Some(binary(
                    BinaryOperator::LessThan,
                    id("i"),
                    member(id("cases"), "length"),
                )),
                Some(inc_i()),
                block(vec![
                    vars(vec![("test", Some(case_part(id("i"), 0.0)))]),
                    when(not(id("test")), vec![set("fallback", id("i")), cont(None)]),
                    vars(vec![("value", Some(call0("test")))]),
                    when(
                        is_thenable("value"),
                        vec![ret(Some(then(
                            "value",
                            vec![function_expr(
                                &["value"],
                                vec![ret(Some(conditional(
                                    strict_eq(id("value"), id("discriminant")),
                                    call(id("runFrom"), vec![id("i")]),
                                    call(
                                        id("matchFrom"),
                                        vec![binary(BinaryOperator::Add, id("i"), num(1.0))],
                                    ),
                                )))],
                            )],
                        )))],
                    ),
                    when(
                        strict_eq(id("value"), id("discriminant")),
                        vec![ret(Some(call(id("runFrom"), vec![id("i")])))],
                    ),
                ]),
            ),
            ret(Some(conditional(
                strict_eq(id("fallback"), num(-1.0)),
                undefined(),
                call(id("runFrom"), vec![id("fallback")]),
            ))),
        ],
    );

    let run_from = function_decl(
        "runFrom",
        &["i"],
        vec![forever(vec![
            vars(vec![("body", Some(case_part(id("i"), 1.0)))]),
            while_stmt(
                not(id("body")),
                block(vec![set(
                    "body",
                    case_part(update(UpdateOperator::Increment, true, id("i")), 1.0),
                )]),
            ),
            vars(vec![("result", Some(call0("body")))]),
            when(
                is_thenable("result"),
                vec![ret(Some(then(
                    "result",
                    vec![function_expr(
                        &["result"],
                        vec![
                            vars(vec![("check", Some(case_part(id("i"), 2.0)))]),
                            ret(Some(conditional(
                                or(not(id("check")), call0("check")),
                                id("result"),
                                call(
                                    id("runFrom"),
                                    vec![binary(BinaryOperator::Add, id("i"), num(1.0))],
                                ),
                            ))),
                        ],
                    )],
                )))],
            ),
            vars(vec![("check", Some(case_part(id("i"), 2.0)))]),
            when(or(not(id("check")), call0("check")), vec![ret(Some(id("result")))]),
            expr_stmt(inc_i()),
        ])],
    );

    vec![
        vars(vec![("fallback", Some(num(-1.0)))]),
        match_from,
        run_from,
        ret(Some(call(id("matchFrom"), vec![num(0.0)]))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use awaitless_ast::print_statement;

    fn print(helper: Helper, target: Target) -> String {
        print_statement(&declare(helper, target, &HelperNames::default()))
    }

    #[test]
    fn test_empty_helper() {
        assert_eq!(print(Helper::Empty, Target::Es2015), "function _empty () {}\n");
    }

    #[test]
    fn test_await_helper_shape() {
        let output = print(Helper::Await, Target::Es2015);
        assert!(output.starts_with("function _await (value, then, direct) {"));
        assert!(output.contains("value = Promise.resolve(value);"));
        assert!(output.contains("return then ? value.then(then) : value;"));
    }

    #[test]
    fn test_rethrow_helper() {
        assert_eq!(
            print(Helper::Rethrow, Target::Es2015),
            "function _rethrow (thrown, value) {\n  if (thrown) {\n    throw value;\n  }\n  return value;\n}\n"
        );
    }

    #[test]
    fn test_for_of_targets_differ() {
        let modern = print(Helper::ForOf, Target::Es2015);
        let compatible = print(Helper::ForOf, Target::Es5);
        assert!(!modern.contains("Array.isArray"));
        assert!(compatible.contains("Array.isArray(target)"));
        assert!(compatible.contains("typeof Symbol === \"undefined\""));
        assert!(modern.contains("target[Symbol.iterator]()"));
    }

    #[test]
    fn test_for_await_of_es5_guards_symbol() {
        let output = print(Helper::ForAwaitOf, Target::Es5);
        assert!(output.contains("typeof Symbol === \"undefined\""));
        assert!(output.contains("Symbol.asyncIterator"));
    }

    #[test]
    fn test_for_own_filters_inherited_keys() {
        let output = print(Helper::ForOwn, Target::Es2015);
        assert!(output.contains("Object.prototype.hasOwnProperty.call(target, key)"));
        assert!(!print(Helper::ForIn, Target::Es2015).contains("hasOwnProperty"));
    }
}
