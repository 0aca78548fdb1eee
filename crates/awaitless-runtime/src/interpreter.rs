//! Tree-walking evaluator
//!
//! Runs lowered programs: ordinary functions, closures and the helper
//! library they call. Statements produce a [`Completion`]; exceptions thrown
//! by the program travel as `Err(Interrupt::Throw)` so `?` unwinds them to
//! the nearest `try`. Evaluator failures travel as `Interrupt::Fatal` and are
//! never caught by the program.

use std::collections::VecDeque;
use std::rc::Rc;

use awaitless_ast::ast::*;
use awaitless_ast::scope::{lexical_declared_names, var_declared_names, BindingKind};
use tracing::{debug, trace};

use crate::builtins::{ErrorKind, Native, Realm};
use crate::environment::{AssignError, EnvRef, Environment};
use crate::error::{RuntimeError, RuntimeResult};
use crate::promise::Job;
use crate::value::{Closure, Object, ObjectKind, ObjectRef, PropertyKey, Value};

/// Default number of statements and jobs a run may execute
pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

/// Nested calls allowed before a `RangeError` is thrown
const MAX_CALL_DEPTH: usize = 256;

pub(crate) enum Interrupt {
    Throw(Value),
    Fatal(RuntimeError),
}

impl From<RuntimeError> for Interrupt {
    fn from(error: RuntimeError) -> Self {
        Interrupt::Fatal(error)
    }
}

pub(crate) type Exec<T> = Result<T, Interrupt>;

/// How a statement finished
#[derive(Debug)]
pub(crate) enum Completion {
    Normal,
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
}

/// What a loop does after its body completed
enum LoopStep {
    Next,
    Exit(Completion),
}

fn loop_step(completion: Completion, labels: &[String]) -> LoopStep {
    match completion {
        Completion::Normal | Completion::Continue(None) => LoopStep::Next,
        Completion::Continue(Some(label)) if labels.contains(&label) => LoopStep::Next,
        Completion::Break(None) => LoopStep::Exit(Completion::Normal),
        Completion::Break(Some(label)) if labels.contains(&label) => LoopStep::Exit(Completion::Normal),
        other => LoopStep::Exit(other),
    }
}

/// Assignable location
enum Reference {
    Name(String),
    Property(Value, PropertyKey),
}

/// The evaluator and its microtask queue
pub struct Interpreter {
    pub(crate) realm: Realm,
    pub(crate) jobs: VecDeque<Job>,
    pub(crate) log: Vec<String>,
    steps: u64,
    step_limit: u64,
    depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            realm: Realm::new(),
            jobs: VecDeque::new(),
            log: Vec::new(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
            depth: 0,
        }
    }

    pub fn with_step_limit(mut self, step_limit: u64) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Lines recorded by the host `log` function
    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.realm.global.lookup(name)
    }

    /// Number of queued microtasks
    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Run a script's top-level statements, leaving queued jobs in place
    pub fn run_script(&mut self, program: &Program) -> RuntimeResult<()> {
        let global = self.realm.global.clone();
        for id in var_declared_names(&program.body) {
            if !global.has_own(&id.name) {
                global.declare(&id.name, Value::Undefined, true);
            }
        }
        let completion = self.exec_statements(&program.body, &global);
        match self.uncaught(completion)? {
            Completion::Normal => Ok(()),
            other => Err(RuntimeError::InvalidCompletion(format!("{:?} at top level", other))),
        }
    }

    /// Drain the microtask queue, returning the number of jobs run
    pub fn run_microtasks(&mut self) -> RuntimeResult<usize> {
        let mut count = 0;
        while let Some(job) = self.jobs.pop_front() {
            let result = self.run_job(job);
            self.uncaught(result)?;
            count += 1;
        }
        debug!(jobs = count, "drained microtasks");
        Ok(count)
    }

    /// Run a script, then every job it queued
    pub fn run(&mut self, program: &Program) -> RuntimeResult<()> {
        self.run_script(program)?;
        self.run_microtasks()?;
        Ok(())
    }

    /// Call a function value from the host
    pub fn call_function(&mut self, callee: &Value, args: Vec<Value>) -> RuntimeResult<Value> {
        let result = self.call(callee, Value::Undefined, args);
        self.uncaught(result)
    }

    fn uncaught<T>(&self, result: Exec<T>) -> RuntimeResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(Interrupt::Throw(value)) => Err(RuntimeError::Uncaught(value.to_js_string())),
            Err(Interrupt::Fatal(error)) => Err(error),
        }
    }

    pub(crate) fn tick(&mut self) -> Exec<()> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(RuntimeError::StepLimit(self.step_limit).into());
        }
        Ok(())
    }

    pub(crate) fn throw_error<T>(&self, kind: ErrorKind, message: &str) -> Exec<T> {
        Err(Interrupt::Throw(self.make_error(kind, message)))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Declare the block-scoped names of `stmts` in `env`, then run them
    fn exec_statements(&mut self, stmts: &[Statement], env: &EnvRef) -> Exec<Completion> {
        self.declare_block(stmts, env);
        for stmt in stmts {
            match self.exec_statement(stmt, env)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn declare_block(&mut self, stmts: &[Statement], env: &EnvRef) {
        for (kind, id) in lexical_declared_names(stmts) {
            if kind != BindingKind::Function {
                env.declare(&id.name, Value::Undefined, true);
            }
        }
        for stmt in stmts {
            if let Statement::FunctionDecl(decl) = stmt {
                let closure = self.make_closure(&decl.function, env);
                env.declare(decl.name(), closure, true);
            }
        }
    }

    fn exec_statement(&mut self, stmt: &Statement, env: &EnvRef) -> Exec<Completion> {
        self.tick()?;
        match stmt {
            Statement::Expression(expr_stmt) => {
                self.eval(&expr_stmt.expression, env)?;
                Ok(Completion::Normal)
            }
            Statement::VariableDecl(decl) => {
                self.exec_declaration(decl, env)?;
                Ok(Completion::Normal)
            }
            Statement::FunctionDecl(_) | Statement::Empty(_) => Ok(Completion::Normal),
            Statement::Block(block) => {
                let inner = Environment::child(env);
                self.exec_statements(&block.statements, &inner)
            }
            Statement::If(if_stmt) => {
                if self.eval(&if_stmt.condition, env)?.is_truthy() {
                    self.exec_statement(&if_stmt.then_branch, env)
                } else if let Some(else_branch) = &if_stmt.else_branch {
                    self.exec_statement(else_branch, env)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Statement::While(_)
            | Statement::DoWhile(_)
            | Statement::For(_)
            | Statement::ForIn(_)
            | Statement::ForOf(_) => self.exec_loop(stmt, env, &[]),
            Statement::Switch(switch_stmt) => self.exec_switch(switch_stmt, env),
            Statement::Try(try_stmt) => self.exec_try(try_stmt, env),
            Statement::Labeled(_) => self.exec_labeled(stmt, env),
            Statement::Return(ret) => {
                let value = match &ret.value {
                    Some(value) => self.eval(value, env)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Statement::Break(brk) => Ok(Completion::Break(brk.label.as_ref().map(|l| l.name.clone()))),
            Statement::Continue(cont) => Ok(Completion::Continue(cont.label.as_ref().map(|l| l.name.clone()))),
            Statement::Throw(throw) => {
                let value = self.eval(&throw.value, env)?;
                Err(Interrupt::Throw(value))
            }
            Statement::Import(_) => Err(RuntimeError::Unsupported("import declaration".to_string()).into()),
        }
    }

    fn exec_declaration(&mut self, decl: &VariableDecl, env: &EnvRef) -> Exec<()> {
        for declarator in &decl.declarations {
            match decl.kind {
                VariableKind::Var => {
                    if let Some(init) = &declarator.init {
                        let value = self.eval(init, env)?;
                        self.assign_name(&declarator.id.name, value, env)?;
                    }
                }
                VariableKind::Let | VariableKind::Const => {
                    let value = match &declarator.init {
                        Some(init) => self.eval(init, env)?,
                        None => Value::Undefined,
                    };
                    env.declare(&declarator.id.name, value, decl.kind == VariableKind::Let);
                }
            }
        }
        Ok(())
    }

    fn exec_labeled(&mut self, stmt: &Statement, env: &EnvRef) -> Exec<Completion> {
        let mut labels = Vec::new();
        let mut body = stmt;
        while let Statement::Labeled(labeled) = body {
            labels.push(labeled.label.name.clone());
            body = labeled.body.as_ref();
        }
        let completion = if body.is_loop() {
            self.exec_loop(body, env, &labels)?
        } else {
            self.exec_statement(body, env)?
        };
        match completion {
            Completion::Break(Some(label)) if labels.contains(&label) => Ok(Completion::Normal),
            other => Ok(other),
        }
    }

    fn exec_loop(&mut self, stmt: &Statement, env: &EnvRef, labels: &[String]) -> Exec<Completion> {
        match stmt {
            Statement::While(while_stmt) => {
                while self.eval(&while_stmt.condition, env)?.is_truthy() {
                    self.tick()?;
                    if let LoopStep::Exit(completion) = loop_step(self.exec_statement(&while_stmt.body, env)?, labels) {
                        return Ok(completion);
                    }
                }
                Ok(Completion::Normal)
            }
            Statement::DoWhile(do_while) => {
                loop {
                    self.tick()?;
                    if let LoopStep::Exit(completion) = loop_step(self.exec_statement(&do_while.body, env)?, labels) {
                        return Ok(completion);
                    }
                    if !self.eval(&do_while.condition, env)?.is_truthy() {
                        return Ok(Completion::Normal);
                    }
                }
            }
            Statement::For(for_stmt) => self.exec_for(for_stmt, env, labels),
            Statement::ForIn(for_in) => {
                let target = self.eval(&for_in.right, env)?;
                let Value::Object(object) = target else {
                    return Ok(Completion::Normal);
                };
                for name in object.enumerable_keys() {
                    self.tick()?;
                    // Keys deleted during iteration are skipped
                    if !object.has_property(&PropertyKey::String(name.clone())) {
                        continue;
                    }
                    let iteration = self.bind_head(&for_in.left, Value::from(name), env)?;
                    if let LoopStep::Exit(completion) = loop_step(self.exec_statement(&for_in.body, &iteration)?, labels) {
                        return Ok(completion);
                    }
                }
                Ok(Completion::Normal)
            }
            Statement::ForOf(for_of) => self.exec_for_of(for_of, env, labels),
            _ => self.exec_statement(stmt, env),
        }
    }

    fn exec_for(&mut self, for_stmt: &ForStatement, env: &EnvRef, labels: &[String]) -> Exec<Completion> {
        let loop_env = Environment::child(env);
        let mut per_iteration = false;
        match &for_stmt.init {
            Some(ForInit::VariableDecl(decl)) => {
                per_iteration = decl.kind != VariableKind::Var;
                self.exec_declaration(decl, &loop_env)?;
            }
            Some(ForInit::Expression(init)) => {
                self.eval(init, &loop_env)?;
            }
            None => {}
        }
        let mut iteration = if per_iteration { loop_env.copy() } else { loop_env };
        loop {
            self.tick()?;
            if let Some(test) = &for_stmt.test {
                if !self.eval(test, &iteration)?.is_truthy() {
                    return Ok(Completion::Normal);
                }
            }
            if let LoopStep::Exit(completion) = loop_step(self.exec_statement(&for_stmt.body, &iteration)?, labels) {
                return Ok(completion);
            }
            if per_iteration {
                iteration = iteration.copy();
            }
            if let Some(update) = &for_stmt.update {
                self.eval(update, &iteration)?;
            }
        }
    }

    fn exec_for_of(&mut self, for_of: &ForOfStatement, env: &EnvRef, labels: &[String]) -> Exec<Completion> {
        if for_of.is_await {
            return Err(RuntimeError::Unsupported("for await".to_string()).into());
        }
        let iterable = self.eval(&for_of.right, env)?;
        let iterator = self.get_iterator(&iterable)?;
        let next = self.get_property(&iterator, &PropertyKey::from("next"))?;
        loop {
            self.tick()?;
            let step = self.call(&next, iterator.clone(), Vec::new())?;
            if self.get_property(&step, &PropertyKey::from("done"))?.is_truthy() {
                return Ok(Completion::Normal);
            }
            let value = self.get_property(&step, &PropertyKey::from("value"))?;
            let result = self
                .bind_head(&for_of.left, value, env)
                .and_then(|iteration| self.exec_statement(&for_of.body, &iteration));
            match result {
                Ok(completion) => {
                    if let LoopStep::Exit(completion) = loop_step(completion, labels) {
                        self.close_iterator(&iterator)?;
                        return Ok(completion);
                    }
                }
                Err(Interrupt::Throw(error)) => {
                    // The original exception wins over one thrown by `return`
                    if let Err(Interrupt::Fatal(fatal)) = self.close_iterator(&iterator) {
                        return Err(Interrupt::Fatal(fatal));
                    }
                    return Err(Interrupt::Throw(error));
                }
                Err(fatal) => return Err(fatal),
            }
        }
    }

    fn get_iterator(&mut self, iterable: &Value) -> Exec<Value> {
        let method = self.get_property(iterable, &PropertyKey::Symbol(crate::value::WellKnownSymbol::Iterator))?;
        if !method.is_callable() {
            return self.throw_error(ErrorKind::TypeError, "object is not iterable");
        }
        self.call(&method, iterable.clone(), Vec::new())
    }

    fn close_iterator(&mut self, iterator: &Value) -> Exec<()> {
        let method = self.get_property(iterator, &PropertyKey::from("return"))?;
        if method.is_callable() {
            self.call(&method, iterator.clone(), Vec::new())?;
        }
        Ok(())
    }

    /// Environment for one iteration of a for-in/for-of body with the head
    /// bound to `value`
    fn bind_head(&mut self, head: &ForHead, value: Value, env: &EnvRef) -> Exec<EnvRef> {
        match head {
            ForHead::Declaration(VariableKind::Var, id) => {
                self.assign_name(&id.name, value, env)?;
                Ok(env.clone())
            }
            ForHead::Declaration(kind, id) => {
                let iteration = Environment::child(env);
                iteration.declare(&id.name, value, *kind == VariableKind::Let);
                Ok(iteration)
            }
            ForHead::Target(target) => {
                let reference = self.reference(target, env)?;
                self.put(reference, value, env)?;
                Ok(env.clone())
            }
        }
    }

    fn exec_switch(&mut self, switch_stmt: &SwitchStatement, env: &EnvRef) -> Exec<Completion> {
        let discriminant = self.eval(&switch_stmt.discriminant, env)?;
        let scope = Environment::child(env);
        for case in &switch_stmt.cases {
            self.declare_block(&case.consequent, &scope);
        }
        let mut start = None;
        for (i, case) in switch_stmt.cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval(test, &scope)?.strict_equals(&discriminant) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = start.or_else(|| switch_stmt.cases.iter().position(|case| case.test.is_none()));
        let Some(start) = start else {
            return Ok(Completion::Normal);
        };
        for case in &switch_stmt.cases[start..] {
            for stmt in &case.consequent {
                match self.exec_statement(stmt, &scope)? {
                    Completion::Normal => {}
                    Completion::Break(None) => return Ok(Completion::Normal),
                    abrupt => return Ok(abrupt),
                }
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_try(&mut self, try_stmt: &TryStatement, env: &EnvRef) -> Exec<Completion> {
        let outcome = {
            let scope = Environment::child(env);
            self.exec_statements(&try_stmt.body.statements, &scope)
        };
        let outcome = match (outcome, &try_stmt.catch_clause) {
            (Err(Interrupt::Throw(thrown)), Some(catch)) => {
                let scope = Environment::child(env);
                if let Some(param) = &catch.param {
                    scope.declare(&param.name, thrown, true);
                }
                self.exec_statements(&catch.body.statements, &scope)
            }
            (outcome, _) => outcome,
        };
        if let Some(finalizer) = &try_stmt.finally_clause {
            if let Err(Interrupt::Fatal(_)) = outcome {
                return outcome;
            }
            let scope = Environment::child(env);
            match self.exec_statements(&finalizer.statements, &scope)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        outcome
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(crate) fn eval(&mut self, expr: &Expression, env: &EnvRef) -> Exec<Value> {
        match expr {
            Expression::Identifier(id) => self.lookup(&id.name, env),
            Expression::This(_) => Ok(env.this_value()),
            Expression::Literal(lit) => Ok(match &lit.value {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::String(s) => Value::from(s.as_str()),
                LiteralValue::Boolean(b) => Value::Boolean(*b),
                LiteralValue::Null => Value::Null,
                LiteralValue::Undefined => Value::Undefined,
            }),
            Expression::Array(array) => {
                let mut items = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    items.push(self.eval(element, env)?);
                }
                Ok(self.new_array(items))
            }
            Expression::Object(object) => {
                let result = self.new_object();
                for property in &object.properties {
                    let key = match &property.key {
                        PropertyKey_::Identifier(id) => PropertyKey::from(id.name.as_str()),
                        PropertyKey_::String(s) => PropertyKey::from(s.as_str()),
                        PropertyKey_::Computed(key) => self.eval(key, env)?.to_property_key(),
                    };
                    let value = self.eval(&property.value, env)?;
                    result.set(key, value);
                }
                Ok(Value::Object(result))
            }
            Expression::Function(func) => Ok(self.make_closure(func, env)),
            Expression::Unary(unary) => self.eval_unary(unary, env),
            Expression::Update(update) => {
                let reference = self.reference(&update.target, env)?;
                let old = self.get(&reference, env)?.to_number();
                let new = match update.operator {
                    UpdateOperator::Increment => old + 1.0,
                    UpdateOperator::Decrement => old - 1.0,
                };
                self.put(reference, Value::Number(new), env)?;
                Ok(Value::Number(if update.prefix { new } else { old }))
            }
            Expression::Binary(binary) => {
                let left = self.eval(&binary.left, env)?;
                let right = self.eval(&binary.right, env)?;
                self.binary(binary.operator, left, right)
            }
            Expression::Logical(logical) => {
                let left = self.eval(&logical.left, env)?;
                let short_circuit = match logical.operator {
                    LogicalOperator::And => !left.is_truthy(),
                    LogicalOperator::Or => left.is_truthy(),
                    LogicalOperator::NullishCoalescing => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(&logical.right, env)
                }
            }
            Expression::Conditional(conditional) => {
                if self.eval(&conditional.test, env)?.is_truthy() {
                    self.eval(&conditional.consequent, env)
                } else {
                    self.eval(&conditional.alternate, env)
                }
            }
            Expression::Assignment(assignment) => {
                let reference = self.reference(&assignment.left, env)?;
                let value = match assignment.operator.binary_operator() {
                    None => self.eval(&assignment.right, env)?,
                    Some(operator) => {
                        let current = self.get(&reference, env)?;
                        let right = self.eval(&assignment.right, env)?;
                        self.binary(operator, current, right)?
                    }
                };
                self.put(reference, value.clone(), env)?;
                Ok(value)
            }
            Expression::Sequence(sequence) => {
                let mut last = Value::Undefined;
                for expr in &sequence.expressions {
                    last = self.eval(expr, env)?;
                }
                Ok(last)
            }
            Expression::Call(call) => {
                let (callee, this) = match call.callee.as_ref() {
                    Expression::Member(member) => {
                        let object = self.eval(&member.object, env)?;
                        let key = self.member_key(&member.property, env)?;
                        (self.get_property(&object, &key)?, object)
                    }
                    callee => (self.eval(callee, env)?, Value::Undefined),
                };
                let args = self.eval_arguments(&call.arguments, env)?;
                if !callee.is_callable() {
                    let name = awaitless_ast::print_expression(&call.callee);
                    return self.throw_error(ErrorKind::TypeError, &format!("{} is not a function", name));
                }
                self.call(&callee, this, args)
            }
            Expression::New(new) => {
                let callee = self.eval(&new.callee, env)?;
                let args = self.eval_arguments(&new.arguments, env)?;
                self.construct(&callee, args)
            }
            Expression::Member(member) => {
                let object = self.eval(&member.object, env)?;
                let key = self.member_key(&member.property, env)?;
                self.get_property(&object, &key)
            }
            Expression::Await(_) => Err(RuntimeError::Unsupported("await expression".to_string()).into()),
        }
    }

    fn eval_arguments(&mut self, arguments: &[Expression], env: &EnvRef) -> Exec<Vec<Value>> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(self.eval(argument, env)?);
        }
        Ok(values)
    }

    fn member_key(&mut self, property: &MemberProperty, env: &EnvRef) -> Exec<PropertyKey> {
        match property {
            MemberProperty::Identifier(id) => Ok(PropertyKey::from(id.name.as_str())),
            MemberProperty::Computed(key) => Ok(self.eval(key, env)?.to_property_key()),
        }
    }

    fn eval_unary(&mut self, unary: &UnaryExpression, env: &EnvRef) -> Exec<Value> {
        match unary.operator {
            UnaryOperator::Typeof => {
                if let Expression::Identifier(id) = unary.operand.as_ref() {
                    if env.lookup(&id.name).is_none() {
                        return Ok(Value::from("undefined"));
                    }
                }
                let value = self.eval(&unary.operand, env)?;
                Ok(Value::from(value.type_of()))
            }
            UnaryOperator::Delete => {
                if let Expression::Member(member) = unary.operand.as_ref() {
                    let object = self.eval(&member.object, env)?;
                    let key = self.member_key(&member.property, env)?;
                    if let Value::Object(object) = object {
                        object.borrow_mut().delete(&key);
                    }
                }
                Ok(Value::Boolean(true))
            }
            operator => {
                let value = self.eval(&unary.operand, env)?;
                Ok(match operator {
                    UnaryOperator::Not => Value::Boolean(!value.is_truthy()),
                    UnaryOperator::Minus => Value::Number(-value.to_number()),
                    UnaryOperator::Plus => Value::Number(value.to_number()),
                    UnaryOperator::BitwiseNot => Value::Number(f64::from(!value.to_int32())),
                    _ => Value::Undefined,
                })
            }
        }
    }

    fn binary(&mut self, operator: BinaryOperator, left: Value, right: Value) -> Exec<Value> {
        use BinaryOperator::*;
        Ok(match operator {
            Add => {
                let left = to_primitive(left);
                let right = to_primitive(right);
                match (&left, &right) {
                    (Value::String(_), _) | (_, Value::String(_)) => {
                        Value::from(format!("{}{}", left.to_js_string(), right.to_js_string()))
                    }
                    _ => Value::Number(left.to_number() + right.to_number()),
                }
            }
            Subtract => Value::Number(left.to_number() - right.to_number()),
            Multiply => Value::Number(left.to_number() * right.to_number()),
            Divide => Value::Number(left.to_number() / right.to_number()),
            Modulo => Value::Number(left.to_number() % right.to_number()),
            Exponent => Value::Number(left.to_number().powf(right.to_number())),
            Equal => Value::Boolean(left.loose_equals(&right)),
            NotEqual => Value::Boolean(!left.loose_equals(&right)),
            StrictEqual => Value::Boolean(left.strict_equals(&right)),
            StrictNotEqual => Value::Boolean(!left.strict_equals(&right)),
            LessThan => Value::Boolean(compare(left, right, |o| o.is_lt())),
            LessEqual => Value::Boolean(compare(left, right, |o| o.is_le())),
            GreaterThan => Value::Boolean(compare(left, right, |o| o.is_gt())),
            GreaterEqual => Value::Boolean(compare(left, right, |o| o.is_ge())),
            BitwiseAnd => Value::Number(f64::from(left.to_int32() & right.to_int32())),
            BitwiseOr => Value::Number(f64::from(left.to_int32() | right.to_int32())),
            BitwiseXor => Value::Number(f64::from(left.to_int32() ^ right.to_int32())),
            LeftShift => Value::Number(f64::from(left.to_int32().wrapping_shl(right.to_uint32() & 31))),
            RightShift => Value::Number(f64::from(left.to_int32().wrapping_shr(right.to_uint32() & 31))),
            UnsignedRightShift => Value::Number(f64::from(left.to_uint32().wrapping_shr(right.to_uint32() & 31))),
            In => match &right {
                Value::Object(object) => Value::Boolean(object.has_property(&left.to_property_key())),
                _ => return self.throw_error(ErrorKind::TypeError, "Cannot use 'in' operator on a primitive"),
            },
            InstanceOf => {
                if !right.is_callable() {
                    return self.throw_error(ErrorKind::TypeError, "Right-hand side of 'instanceof' is not callable");
                }
                let prototype = self.get_property(&right, &PropertyKey::from("prototype"))?;
                Value::Boolean(match (&left, &prototype) {
                    (Value::Object(object), Value::Object(prototype)) => inherits_from(object, prototype),
                    _ => false,
                })
            }
        })
    }

    // ========================================================================
    // Names and properties
    // ========================================================================

    fn lookup(&mut self, name: &str, env: &EnvRef) -> Exec<Value> {
        match env.lookup(name) {
            Some(value) => Ok(value),
            None => self.throw_error(ErrorKind::ReferenceError, &format!("{} is not defined", name)),
        }
    }

    fn assign_name(&mut self, name: &str, value: Value, env: &EnvRef) -> Exec<()> {
        match env.assign(name, value.clone()) {
            Ok(()) => Ok(()),
            Err(AssignError::Unbound) => {
                self.realm.global.declare(name, value, true);
                Ok(())
            }
            Err(AssignError::Constant) => self.throw_error(ErrorKind::TypeError, "Assignment to constant variable."),
        }
    }

    fn reference(&mut self, target: &Expression, env: &EnvRef) -> Exec<Reference> {
        match target {
            Expression::Identifier(id) => Ok(Reference::Name(id.name.clone())),
            Expression::Member(member) => {
                let object = self.eval(&member.object, env)?;
                let key = self.member_key(&member.property, env)?;
                Ok(Reference::Property(object, key))
            }
            _ => self.throw_error(ErrorKind::ReferenceError, "Invalid assignment target"),
        }
    }

    fn get(&mut self, reference: &Reference, env: &EnvRef) -> Exec<Value> {
        match reference {
            Reference::Name(name) => self.lookup(name, env),
            Reference::Property(object, key) => self.get_property(object, key),
        }
    }

    fn put(&mut self, reference: Reference, value: Value, env: &EnvRef) -> Exec<()> {
        match reference {
            Reference::Name(name) => self.assign_name(&name, value, env),
            Reference::Property(Value::Object(object), key) => {
                object.set(key, value);
                Ok(())
            }
            Reference::Property(object, key) if object.is_nullish() => self.throw_error(
                ErrorKind::TypeError,
                &format!("Cannot set properties of {} (setting '{}')", object.to_js_string(), key_name(&key)),
            ),
            Reference::Property(..) => Ok(()),
        }
    }

    pub(crate) fn get_property(&mut self, object: &Value, key: &PropertyKey) -> Exec<Value> {
        match object {
            Value::Object(object) => Ok(object.get(key)),
            Value::String(s) => Ok(match key {
                PropertyKey::String(name) if name == "length" => Value::Number(s.chars().count() as f64),
                PropertyKey::String(name) => name
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| s.chars().nth(index))
                    .map(|c| Value::from(c.to_string()))
                    .unwrap_or(Value::Undefined),
                PropertyKey::Symbol(_) => Value::Undefined,
            }),
            Value::Undefined | Value::Null => self.throw_error(
                ErrorKind::TypeError,
                &format!("Cannot read properties of {} (reading '{}')", object.to_js_string(), key_name(key)),
            ),
            _ => Ok(Value::Undefined),
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    pub(crate) fn make_closure(&self, function: &Function, env: &EnvRef) -> Value {
        let closure = Closure {
            function: Rc::new(function.clone()),
            env: env.clone(),
        };
        Value::Object(ObjectRef::new(Object::new(
            ObjectKind::Closure(closure),
            Some(self.realm.function_prototype.clone()),
        )))
    }

    pub(crate) fn call(&mut self, callee: &Value, this: Value, args: Vec<Value>) -> Exec<Value> {
        enum Target {
            Closure(Closure),
            Native(Native),
        }
        let target = match callee {
            Value::Object(object) => match &object.borrow().kind {
                ObjectKind::Closure(closure) => Some(Target::Closure(closure.clone())),
                ObjectKind::Native(native) => Some(Target::Native(native.clone())),
                _ => None,
            },
            _ => None,
        };
        let Some(target) = target else {
            return self.throw_error(ErrorKind::TypeError, &format!("{} is not a function", callee.type_of()));
        };
        if self.depth >= MAX_CALL_DEPTH {
            return self.throw_error(ErrorKind::RangeError, "Maximum call stack size exceeded");
        }
        self.depth += 1;
        let result = match target {
            Target::Closure(closure) => self.call_closure(&closure, this, args),
            Target::Native(native) => self.call_native(&native, this, args),
        };
        self.depth -= 1;
        result
    }

    fn call_closure(&mut self, closure: &Closure, this: Value, args: Vec<Value>) -> Exec<Value> {
        let function = closure.function.clone();
        if function.is_async || function.is_generator {
            return Err(RuntimeError::Unsupported("async or generator function call".to_string()).into());
        }
        let env = if function.is_arrow {
            Environment::function(&closure.env, None)
        } else {
            let env = Environment::function(&closure.env, Some(this));
            env.declare("arguments", self.new_array(args.clone()), true);
            env
        };
        let mut args = args.into_iter();
        for param in &function.params {
            env.declare(&param.name, args.next().unwrap_or(Value::Undefined), true);
        }
        for id in var_declared_names(&function.body.statements) {
            if !env.has_own(&id.name) {
                env.declare(&id.name, Value::Undefined, true);
            }
        }
        trace!(name = ?function.name.as_ref().map(|n| n.name.as_str()), "call");
        match self.exec_statements(&function.body.statements, &env)? {
            Completion::Return(value) => Ok(value),
            Completion::Normal => Ok(Value::Undefined),
            other => Err(RuntimeError::InvalidCompletion(format!("{:?} escaped a function body", other)).into()),
        }
    }

    fn construct(&mut self, callee: &Value, args: Vec<Value>) -> Exec<Value> {
        let native = match callee {
            Value::Object(object) => match &object.borrow().kind {
                ObjectKind::Native(native) => Some(Some(native.clone())),
                ObjectKind::Closure(_) => Some(None),
                _ => None,
            },
            _ => None,
        };
        match native {
            None => self.throw_error(ErrorKind::TypeError, "not a constructor"),
            Some(Some(native)) => self.construct_native(&native, args),
            Some(None) => {
                let prototype = match self.get_property(callee, &PropertyKey::from("prototype"))? {
                    Value::Object(prototype) => prototype,
                    _ => self.realm.object_prototype.clone(),
                };
                let instance = Value::Object(ObjectRef::new(Object::new(ObjectKind::Ordinary, Some(prototype))));
                let result = self.call(callee, instance.clone(), args)?;
                Ok(match result {
                    Value::Object(_) => result,
                    _ => instance,
                })
            }
        }
    }
}

// The AST's property key type, renamed to avoid the clash with ours
use awaitless_ast::ast::PropertyKey as PropertyKey_;

fn to_primitive(value: Value) -> Value {
    match value {
        Value::Object(_) => Value::from(value.to_js_string()),
        other => other,
    }
}

/// Relational comparison; `false` whenever a number comparison involves NaN
fn compare(left: Value, right: Value, accept: fn(std::cmp::Ordering) -> bool) -> bool {
    let left = to_primitive(left);
    let right = to_primitive(right);
    let ordering = match (&left, &right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    ordering.is_some_and(accept)
}

fn inherits_from(object: &ObjectRef, prototype: &ObjectRef) -> bool {
    let mut current = object.borrow().prototype.clone();
    while let Some(candidate) = current {
        if candidate.ptr_eq(prototype) {
            return true;
        }
        current = candidate.borrow().prototype.clone();
    }
    false
}

fn key_name(key: &PropertyKey) -> String {
    match key {
        PropertyKey::String(s) => s.clone(),
        PropertyKey::Symbol(symbol) => symbol.description().to_string(),
    }
}
