use awaitless_ast::ast::*;
use awaitless_ast::build::*;
use awaitless_ast::{print_program, FunctionScope, NameGenerator, Span};

// ============================================================================
// Program Tests
// ============================================================================

#[test]
fn test_empty_program() {
    let program = Program::new(vec![], Span::new(0, 0, 1, 1));

    assert!(program.is_empty());
    assert_eq!(program.len(), 0);
}

#[test]
fn test_statement_spans() {
    let stmt = Statement::Empty(Span::new(2, 3, 2, 1));
    assert_eq!(stmt.span().start, 2);
    assert!(expr_stmt(ident("x")).span().is_synthetic());
}

// ============================================================================
// Node Queries
// ============================================================================

#[test]
fn test_loop_and_lexical_queries() {
    assert!(while_stmt(boolean(true), block(vec![])).is_loop());
    assert!(!labeled("a", block(vec![])).is_loop());
    assert!(let_decl("x", None).is_lexical_declaration());
    assert!(!var_decl("x", None).is_lexical_declaration());
    assert!(function_decl("f", &[], vec![]).is_lexical_declaration());
}

#[test]
fn test_undefined_spellings() {
    assert!(undefined().is_undefined());
    assert!(ident("undefined").is_undefined());
    assert!(unary(UnaryOperator::Void, num(0.0)).is_undefined());
    assert!(!null().is_undefined());
}

// ============================================================================
// Printing
// ============================================================================

#[test]
fn test_print_async_function() {
    let program = program(vec![async_function_decl(
        "f",
        &["a"],
        vec![
            var_decl("b", Some(await_expr(call(ident("x"), vec![ident("a")])))),
            ret(Some(binary(BinaryOperator::Add, ident("a"), ident("b")))),
        ],
    )]);
    assert_eq!(
        print_program(&program),
        "async function f (a) {\n  var b = await x(a);\n  return a + b;\n}\n"
    );
}

#[test]
fn test_print_loops_and_switch() {
    let program = program(vec![
        for_stmt(
            for_let("i", num(0.0)),
            Some(binary(BinaryOperator::LessThan, ident("i"), num(3.0))),
            Some(update(UpdateOperator::Increment, false, ident("i"))),
            block(vec![cont(None)]),
        ),
        switch(
            ident("x"),
            vec![case(num(1.0), vec![brk(None)]), default_case(vec![])],
        ),
        for_await_of(VariableKind::Const, "v", ident("items"), block(vec![])),
    ]);
    assert_eq!(
        print_program(&program),
        "for (let i = 0; i < 3; i++) {\n  continue;\n}\n\
         switch (x) {\n  case 1:\n    break;\n  default:\n}\n\
         for await (const v of items) {}\n"
    );
}

#[test]
fn test_print_try_and_labels() {
    let program = program(vec![labeled(
        "outer",
        try_stmt(
            vec![throw(new(ident("Error"), vec![string("boom")]))],
            Some((Some("e"), vec![brk(Some("outer"))])),
            Some(vec![]),
        ),
    )]);
    assert_eq!(
        print_program(&program),
        "outer: try {\n  throw new Error(\"boom\");\n} catch (e) {\n  break outer;\n} finally {}\n"
    );
}

// ============================================================================
// Scope & Names
// ============================================================================

#[test]
fn test_catch_param_is_scoped() {
    let func = function(
        None,
        &[],
        vec![
            try_stmt(vec![], Some((Some("e"), vec![expr_stmt(ident("e"))])), None),
            expr_stmt(ident("e")),
        ],
    );
    let scope = FunctionScope::analyze(&func);
    assert!(scope.free_variables().contains("e"));
    assert!(scope.is_bound("e"));
}

#[test]
fn test_name_generator_respects_program() {
    let program = program(vec![var_decl("_temp", None)]);
    let mut names = NameGenerator::for_program(&program);
    assert_eq!(names.fresh("temp").name, "_temp2");
    assert_eq!(names.fresh("result").name, "_result");
}
