//! Binding and free-variable analysis
//!
//! [`FunctionScope::analyze`] resolves every identifier reference inside a
//! function against the scopes the language defines:
//! - function scope: parameters, `var` declarations, the implicit `arguments`
//! - block scope: `let`, `const` and function declarations of a block
//! - loop heads declaring `let`/`const`, and catch parameters
//!
//! The result answers the queries the lowering needs: is a name bound by the
//! function, is that binding constant (declared once and never assigned),
//! which names are free, and does the function observe its own `this` or
//! `arguments`.

use crate::ast::*;
use rustc_hash::{FxHashMap, FxHashSet};

/// How a name was introduced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Param,
    Var,
    Let,
    Const,
    Function,
    CatchParam,
}

impl From<VariableKind> for BindingKind {
    fn from(kind: VariableKind) -> Self {
        match kind {
            VariableKind::Var => BindingKind::Var,
            VariableKind::Let => BindingKind::Let,
            VariableKind::Const => BindingKind::Const,
        }
    }
}

/// One name bound by the analyzed function (nested functions excluded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub kind: BindingKind,
    /// Number of declaration sites
    pub declarations: u32,
    /// Number of assignments after declaration, from any nested function too
    pub assignments: u32,
    /// Number of read references
    pub references: u32,
}

impl Binding {
    fn new(kind: BindingKind) -> Self {
        Self {
            kind,
            declarations: 0,
            assignments: 0,
            references: 0,
        }
    }

    /// Declared once and never reassigned
    pub fn is_constant(&self) -> bool {
        self.declarations == 1 && self.assignments == 0
    }
}

/// Result of analyzing one function
#[derive(Debug, Clone, Default)]
pub struct FunctionScope {
    bindings: FxHashMap<String, Binding>,
    free: FxHashSet<String>,
    uses_this: bool,
    uses_arguments: bool,
}

impl FunctionScope {
    /// Analyze a function, including everything nested inside it
    pub fn analyze(func: &Function) -> Self {
        Self::analyze_body(&func.params, &func.body.statements, func.is_arrow)
    }

    /// Analyze a function given its parts
    pub fn analyze_body(params: &[Identifier], body: &[Statement], is_arrow: bool) -> Self {
        let mut resolver = Resolver {
            frames: Vec::new(),
            depth: 0,
            non_arrow_depth: 0,
            scope: FunctionScope::default(),
        };
        resolver.enter_function(None, params, body, is_arrow);
        for stmt in body {
            resolver.visit_statement(stmt);
        }
        resolver.frames.pop();
        resolver.scope
    }

    /// Analyze loose statements as if they were a function body
    pub fn analyze_statements(body: &[Statement]) -> Self {
        Self::analyze_body(&[], body, true)
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.bindings.iter().map(|(name, binding)| (name.as_str(), binding))
    }

    /// Check if the function itself binds `name`
    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Check if `name` is bound by the function and never reassigned
    pub fn is_constant(&self, name: &str) -> bool {
        self.bindings
            .get(name)
            .map(Binding::is_constant)
            .unwrap_or(false)
    }

    /// Names referenced but not bound anywhere inside the function
    pub fn free_variables(&self) -> &FxHashSet<String> {
        &self.free
    }

    /// `this` is used outside of nested non-arrow functions
    pub fn uses_this(&self) -> bool {
        self.uses_this
    }

    /// `arguments` is used outside of nested non-arrow functions
    pub fn uses_arguments(&self) -> bool {
        self.uses_arguments
    }
}

// ============================================================================
// Declaration collection
// ============================================================================

/// Names declared with `var` in `stmts`, looking through nested statements
/// but not nested functions. Order is first occurrence, duplicates kept.
pub fn var_declared_names(stmts: &[Statement]) -> Vec<Identifier> {
    let mut names = Vec::new();
    for stmt in stmts {
        collect_var_names(stmt, &mut names);
    }
    names
}

fn collect_var_names(stmt: &Statement, names: &mut Vec<Identifier>) {
    match stmt {
        Statement::VariableDecl(decl) if decl.kind == VariableKind::Var => {
            names.extend(decl.declarations.iter().map(|d| d.id.clone()));
        }
        Statement::Block(block) => {
            for s in &block.statements {
                collect_var_names(s, names);
            }
        }
        Statement::If(stmt) => {
            collect_var_names(&stmt.then_branch, names);
            if let Some(else_branch) = &stmt.else_branch {
                collect_var_names(else_branch, names);
            }
        }
        Statement::While(stmt) => collect_var_names(&stmt.body, names),
        Statement::DoWhile(stmt) => collect_var_names(&stmt.body, names),
        Statement::For(stmt) => {
            if let Some(ForInit::VariableDecl(decl)) = &stmt.init {
                if decl.kind == VariableKind::Var {
                    names.extend(decl.declarations.iter().map(|d| d.id.clone()));
                }
            }
            collect_var_names(&stmt.body, names);
        }
        Statement::ForIn(ForInStatement { left, body, .. })
        | Statement::ForOf(ForOfStatement { left, body, .. }) => {
            if let ForHead::Declaration(VariableKind::Var, id) = left {
                names.push(id.clone());
            }
            collect_var_names(body, names);
        }
        Statement::Switch(stmt) => {
            for case in &stmt.cases {
                for s in &case.consequent {
                    collect_var_names(s, names);
                }
            }
        }
        Statement::Try(stmt) => {
            for s in &stmt.body.statements {
                collect_var_names(s, names);
            }
            if let Some(catch) = &stmt.catch_clause {
                for s in &catch.body.statements {
                    collect_var_names(s, names);
                }
            }
            if let Some(finally) = &stmt.finally_clause {
                for s in &finally.statements {
                    collect_var_names(s, names);
                }
            }
        }
        Statement::Labeled(stmt) => collect_var_names(&stmt.body, names),
        _ => {}
    }
}

/// Block-scoped names declared directly in `stmts`
pub fn lexical_declared_names(stmts: &[Statement]) -> Vec<(BindingKind, Identifier)> {
    let mut names = Vec::new();
    for stmt in stmts {
        match stmt {
            Statement::VariableDecl(decl) if decl.kind != VariableKind::Var => {
                for d in &decl.declarations {
                    names.push((decl.kind.into(), d.id.clone()));
                }
            }
            Statement::FunctionDecl(decl) => {
                if let Some(name) = &decl.function.name {
                    names.push((BindingKind::Function, name.clone()));
                }
            }
            _ => {}
        }
    }
    names
}

/// Every identifier spelled anywhere in the program, including labels
pub fn collect_names(program: &Program) -> FxHashSet<String> {
    struct Names(FxHashSet<String>);

    impl Visitor for Names {
        fn visit_identifier(&mut self, id: &Identifier) {
            self.0.insert(id.name.clone());
        }

        fn visit_statement(&mut self, stmt: &Statement) {
            match stmt {
                Statement::Labeled(labeled) => {
                    self.0.insert(labeled.label.name.clone());
                }
                Statement::Break(BreakStatement { label: Some(label), .. })
                | Statement::Continue(ContinueStatement { label: Some(label), .. }) => {
                    self.0.insert(label.name.clone());
                }
                _ => {}
            }
            walk_statement(self, stmt);
        }
    }

    let mut names = Names(FxHashSet::default());
    names.visit_program(program);
    names.0
}

// ============================================================================
// Resolver
// ============================================================================

struct Frame {
    names: FxHashSet<String>,
    /// Function nesting depth that owns this frame, 0 is the analyzed function
    depth: usize,
}

struct Resolver {
    frames: Vec<Frame>,
    depth: usize,
    non_arrow_depth: usize,
    scope: FunctionScope,
}

impl Resolver {
    fn declare(&mut self, frame: &mut Frame, kind: BindingKind, name: &str) {
        frame.names.insert(name.to_string());
        if frame.depth == 0 {
            self.scope
                .bindings
                .entry(name.to_string())
                .or_insert_with(|| Binding::new(kind))
                .declarations += 1;
        }
    }

    fn enter_function(
        &mut self,
        name: Option<&Identifier>,
        params: &[Identifier],
        body: &[Statement],
        is_arrow: bool,
    ) {
        let mut frame = Frame {
            names: FxHashSet::default(),
            depth: self.depth,
        };
        if let Some(name) = name {
            frame.names.insert(name.name.clone());
        }
        if !is_arrow {
            frame.names.insert("arguments".to_string());
        }
        for param in params {
            self.declare(&mut frame, BindingKind::Param, &param.name);
        }
        for id in var_declared_names(body) {
            self.declare(&mut frame, BindingKind::Var, &id.name);
        }
        for (kind, id) in lexical_declared_names(body) {
            self.declare(&mut frame, kind, &id.name);
        }
        self.frames.push(frame);
    }

    fn with_frame(&mut self, names: Vec<(BindingKind, Identifier)>, f: impl FnOnce(&mut Self)) {
        let mut frame = Frame {
            names: FxHashSet::default(),
            depth: self.depth,
        };
        for (kind, id) in &names {
            self.declare(&mut frame, *kind, &id.name);
        }
        self.frames.push(frame);
        f(self);
        self.frames.pop();
    }

    fn resolve(&self, name: &str) -> Option<usize> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.names.contains(name))
            .map(|frame| frame.depth)
    }

    fn reference(&mut self, name: &str) {
        if name == "arguments" && self.non_arrow_depth == 0 {
            self.scope.uses_arguments = true;
            return;
        }
        match self.resolve(name) {
            None => {
                self.scope.free.insert(name.to_string());
            }
            Some(0) => {
                if let Some(binding) = self.scope.bindings.get_mut(name) {
                    binding.references += 1;
                }
            }
            Some(_) => {}
        }
    }

    fn assignment(&mut self, name: &str) {
        match self.resolve(name) {
            None => {
                self.scope.free.insert(name.to_string());
            }
            Some(0) => {
                if let Some(binding) = self.scope.bindings.get_mut(name) {
                    binding.assignments += 1;
                }
            }
            Some(_) => {}
        }
    }

    fn visit_for_head(&mut self, head: &ForHead) {
        match head {
            ForHead::Declaration(VariableKind::Var, id) => self.assignment(&id.name),
            ForHead::Declaration(..) => {}
            ForHead::Target(Expression::Identifier(id)) => self.assignment(&id.name),
            ForHead::Target(expr) => self.visit_expression(expr),
        }
    }
}

impl Visitor for Resolver {
    fn visit_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Block(block) => self.visit_block_statement(block),
            Statement::For(for_stmt) => {
                let names = match &for_stmt.init {
                    Some(ForInit::VariableDecl(decl)) if decl.kind != VariableKind::Var => decl
                        .declarations
                        .iter()
                        .map(|d| (decl.kind.into(), d.id.clone()))
                        .collect(),
                    _ => Vec::new(),
                };
                self.with_frame(names, |this| walk_statement(this, stmt));
            }
            Statement::ForIn(ForInStatement { left, right, body, .. })
            | Statement::ForOf(ForOfStatement { left, right, body, .. }) => {
                self.visit_expression(right);
                let names = match left {
                    ForHead::Declaration(kind, id) if *kind != VariableKind::Var => {
                        vec![((*kind).into(), id.clone())]
                    }
                    _ => Vec::new(),
                };
                self.with_frame(names, |this| {
                    this.visit_for_head(left);
                    this.visit_statement(body);
                });
            }
            Statement::Switch(switch) => {
                self.visit_expression(&switch.discriminant);
                let names = switch
                    .cases
                    .iter()
                    .flat_map(|case| lexical_declared_names(&case.consequent))
                    .collect();
                self.with_frame(names, |this| {
                    for case in &switch.cases {
                        if let Some(test) = &case.test {
                            this.visit_expression(test);
                        }
                        for s in &case.consequent {
                            this.visit_statement(s);
                        }
                    }
                });
            }
            Statement::Try(try_stmt) => {
                self.visit_block_statement(&try_stmt.body);
                if let Some(catch) = &try_stmt.catch_clause {
                    let names = catch
                        .param
                        .iter()
                        .map(|param| (BindingKind::CatchParam, param.clone()))
                        .collect();
                    self.with_frame(names, |this| this.visit_block_statement(&catch.body));
                }
                if let Some(finally) = &try_stmt.finally_clause {
                    self.visit_block_statement(finally);
                }
            }
            _ => walk_statement(self, stmt),
        }
    }

    fn visit_block_statement(&mut self, block: &BlockStatement) {
        let names = lexical_declared_names(&block.statements);
        self.with_frame(names, |this| walk_block_statement(this, block));
    }

    fn visit_variable_decl(&mut self, decl: &VariableDecl) {
        for declarator in &decl.declarations {
            if let Some(init) = &declarator.init {
                self.visit_expression(init);
            }
        }
    }

    fn visit_expression(&mut self, expr: &Expression) {
        match expr {
            Expression::Identifier(id) => self.reference(&id.name),
            Expression::This(_) => {
                if self.non_arrow_depth == 0 {
                    self.scope.uses_this = true;
                }
            }
            Expression::Assignment(assign) => {
                if let Expression::Identifier(id) = assign.left.as_ref() {
                    if assign.operator != AssignmentOperator::Assign {
                        self.reference(&id.name);
                    }
                    self.assignment(&id.name);
                } else {
                    self.visit_expression(&assign.left);
                }
                self.visit_expression(&assign.right);
            }
            Expression::Update(update) => {
                if let Expression::Identifier(id) = update.target.as_ref() {
                    self.reference(&id.name);
                    self.assignment(&id.name);
                } else {
                    self.visit_expression(&update.target);
                }
            }
            _ => walk_expression(self, expr),
        }
    }

    fn visit_function(&mut self, func: &Function) {
        self.depth += 1;
        if !func.is_arrow {
            self.non_arrow_depth += 1;
        }
        self.enter_function(func.name.as_ref(), &func.params, &func.body.statements, func.is_arrow);
        for stmt in &func.body.statements {
            self.visit_statement(stmt);
        }
        self.frames.pop();
        if !func.is_arrow {
            self.non_arrow_depth -= 1;
        }
        self.depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::*;

    fn analyze(params: &[&str], body: Vec<Statement>) -> FunctionScope {
        let func = function(Some("f"), params, body);
        FunctionScope::analyze(&func)
    }

    #[test]
    fn test_constant_binding() {
        let scope = analyze(
            &["a"],
            vec![
                var_decl("x", Some(num(1.0))),
                let_decl("y", None),
                expr_stmt(assign(ident("y"), ident("a"))),
                ret(Some(binary(BinaryOperator::Add, ident("x"), ident("y")))),
            ],
        );
        assert!(scope.is_constant("x"));
        assert!(scope.is_constant("a"));
        assert!(!scope.is_constant("y"));
        assert_eq!(scope.binding("x").map(|b| b.references), Some(1));
    }

    #[test]
    fn test_assignment_in_nested_function_breaks_constness() {
        let scope = analyze(
            &[],
            vec![
                var_decl("x", Some(num(1.0))),
                expr_stmt(function_expr(&[], vec![expr_stmt(update(
                    UpdateOperator::Increment,
                    false,
                    ident("x"),
                ))])),
            ],
        );
        assert!(!scope.is_constant("x"));
    }

    #[test]
    fn test_shadowed_assignment_does_not_count() {
        let scope = analyze(
            &[],
            vec![
                var_decl("x", Some(num(1.0))),
                expr_stmt(function_expr(&[], vec![
                    var_decl("x", None),
                    expr_stmt(assign(ident("x"), num(2.0))),
                ])),
            ],
        );
        assert!(scope.is_constant("x"));
    }

    #[test]
    fn test_free_variables() {
        let scope = analyze(
            &["a"],
            vec![
                block(vec![let_decl("inner", Some(ident("a")))]),
                expr_stmt(call(ident("log"), vec![ident("inner")])),
                expr_stmt(arrow(&["b"], vec![ret(Some(binary(
                    BinaryOperator::Add,
                    ident("b"),
                    ident("c"),
                )))])),
            ],
        );
        let free = scope.free_variables();
        assert!(free.contains("log"));
        assert!(free.contains("inner"));
        assert!(free.contains("c"));
        assert!(!free.contains("a"));
        assert!(!free.contains("b"));
    }

    #[test]
    fn test_this_and_arguments_through_arrows_only() {
        let scope = analyze(
            &[],
            vec![expr_stmt(arrow(&[], vec![expr_stmt(this())]))],
        );
        assert!(scope.uses_this());
        assert!(!scope.uses_arguments());

        let scope = analyze(
            &[],
            vec![expr_stmt(function_expr(&[], vec![
                expr_stmt(this()),
                expr_stmt(ident("arguments")),
            ]))],
        );
        assert!(!scope.uses_this());
        assert!(!scope.uses_arguments());
        assert!(!scope.free_variables().contains("arguments"));
    }

    #[test]
    fn test_var_names_skip_nested_functions() {
        let body = vec![
            if_stmt(ident("c"), block(vec![var_decl("a", None)]), None),
            for_stmt(
                Some(ForInit::VariableDecl(VariableDecl {
                    kind: VariableKind::Var,
                    declarations: vec![declarator("i", Some(num(0.0)))],
                    span: Default::default(),
                })),
                None,
                None,
                block(vec![]),
            ),
            function_decl("g", &[], vec![var_decl("hidden", None)]),
        ];
        let names: Vec<String> = var_declared_names(&body).into_iter().map(|id| id.name).collect();
        assert_eq!(names, vec!["a".to_string(), "i".to_string()]);
    }

    #[test]
    fn test_collect_names_includes_labels() {
        let program = program(vec![labeled("outer", while_stmt(
            boolean(true),
            brk(Some("outer")),
        ))]);
        let names = collect_names(&program);
        assert!(names.contains("outer"));
    }
}
