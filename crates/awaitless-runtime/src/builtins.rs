//! Global objects and native functions
//!
//! Only what lowered code and its tests touch: `Promise`, `Symbol`,
//! `Array.isArray`, array iteration and `push`, `hasOwnProperty`,
//! `Function.prototype.call`, the error constructors and a host `log`.

use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use crate::environment::{EnvRef, Environment};
use crate::interpreter::{Exec, Interpreter};
use crate::value::{Object, ObjectKind, ObjectRef, PropertyKey, Value, WellKnownSymbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
        }
    }
}

/// A function implemented by the evaluator
#[derive(Clone)]
pub enum Native {
    Log,
    PromiseConstructor,
    PromiseResolve,
    PromiseReject,
    PromiseThen,
    PromiseCatch,
    Resolve { promise: ObjectRef, settled: Rc<Cell<bool>> },
    Reject { promise: ObjectRef, settled: Rc<Cell<bool>> },
    ArrayIsArray,
    ArrayPush,
    ArrayValues,
    ArrayIteratorNext { array: ObjectRef, index: Rc<Cell<usize>> },
    HasOwnProperty,
    FunctionCall,
    ErrorConstructor(ErrorKind),
}

/// Prototypes and the global environment
pub(crate) struct Realm {
    pub global: EnvRef,
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
    pub promise_prototype: ObjectRef,
    error_prototypes: Vec<(ErrorKind, ObjectRef)>,
}

fn ordinary(prototype: Option<&ObjectRef>) -> ObjectRef {
    ObjectRef::new(Object::new(ObjectKind::Ordinary, prototype.cloned()))
}

fn hide(object: &ObjectRef, key: impl Into<PropertyKey>, value: Value) {
    object.borrow_mut().define_hidden(key.into(), value);
}

impl From<WellKnownSymbol> for PropertyKey {
    fn from(symbol: WellKnownSymbol) -> Self {
        PropertyKey::Symbol(symbol)
    }
}

impl Realm {
    pub fn new() -> Self {
        let object_prototype = ordinary(None);
        let function_prototype = ordinary(Some(&object_prototype));
        let native = |native: Native| {
            Value::Object(ObjectRef::new(Object::new(
                ObjectKind::Native(native),
                Some(function_prototype.clone()),
            )))
        };

        hide(&object_prototype, "hasOwnProperty", native(Native::HasOwnProperty));
        hide(&function_prototype, "call", native(Native::FunctionCall));

        let array_prototype = ordinary(Some(&object_prototype));
        hide(&array_prototype, "push", native(Native::ArrayPush));
        hide(&array_prototype, WellKnownSymbol::Iterator, native(Native::ArrayValues));

        let promise_prototype = ordinary(Some(&object_prototype));
        hide(&promise_prototype, "then", native(Native::PromiseThen));
        hide(&promise_prototype, "catch", native(Native::PromiseCatch));

        let global = Environment::global();
        global.declare("undefined", Value::Undefined, false);
        global.declare("NaN", Value::Number(f64::NAN), false);
        global.declare("Infinity", Value::Number(f64::INFINITY), false);
        global.declare("log", native(Native::Log), true);

        let promise = native(Native::PromiseConstructor);
        if let Value::Object(constructor) = &promise {
            hide(constructor, "resolve", native(Native::PromiseResolve));
            hide(constructor, "reject", native(Native::PromiseReject));
            hide(constructor, "prototype", Value::Object(promise_prototype.clone()));
        }
        global.declare("Promise", promise, true);

        let symbol = ordinary(Some(&object_prototype));
        hide(&symbol, "iterator", Value::Symbol(WellKnownSymbol::Iterator));
        hide(&symbol, "asyncIterator", Value::Symbol(WellKnownSymbol::AsyncIterator));
        global.declare("Symbol", Value::Object(symbol), true);

        let array = ordinary(Some(&object_prototype));
        hide(&array, "isArray", native(Native::ArrayIsArray));
        hide(&array, "prototype", Value::Object(array_prototype.clone()));
        global.declare("Array", Value::Object(array), true);

        let object = ordinary(Some(&object_prototype));
        hide(&object, "prototype", Value::Object(object_prototype.clone()));
        global.declare("Object", Value::Object(object), true);

        let base_error = ordinary(Some(&object_prototype));
        hide(&base_error, "name", Value::from("Error"));
        hide(&base_error, "message", Value::from(""));
        let mut error_prototypes = vec![(ErrorKind::Error, base_error.clone())];
        for kind in [ErrorKind::TypeError, ErrorKind::RangeError, ErrorKind::ReferenceError] {
            let prototype = ordinary(Some(&base_error));
            hide(&prototype, "name", Value::from(kind.name()));
            error_prototypes.push((kind, prototype));
        }
        for (kind, prototype) in &error_prototypes {
            let constructor = native(Native::ErrorConstructor(*kind));
            if let Value::Object(constructor) = &constructor {
                hide(constructor, "prototype", Value::Object(prototype.clone()));
            }
            global.declare(kind.name(), constructor, true);
        }

        Realm {
            global,
            object_prototype,
            function_prototype,
            array_prototype,
            promise_prototype,
            error_prototypes,
        }
    }

    pub fn error_prototype(&self, kind: ErrorKind) -> ObjectRef {
        self.error_prototypes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, prototype)| prototype.clone())
            .unwrap_or_else(|| self.object_prototype.clone())
    }
}

// ============================================================================
// Native calls
// ============================================================================

fn argument(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

impl Interpreter {
    pub(crate) fn native(&self, native: Native) -> Value {
        Value::Object(ObjectRef::new(Object::new(
            ObjectKind::Native(native),
            Some(self.realm.function_prototype.clone()),
        )))
    }

    pub(crate) fn new_array(&self, items: Vec<Value>) -> Value {
        Value::Object(ObjectRef::new(Object::new(
            ObjectKind::Array(items),
            Some(self.realm.array_prototype.clone()),
        )))
    }

    pub(crate) fn new_object(&self) -> ObjectRef {
        ordinary(Some(&self.realm.object_prototype))
    }

    /// `{ value, done }`
    fn iterator_result(&self, value: Value, done: bool) -> Value {
        let result = self.new_object();
        result.set(PropertyKey::from("value"), value);
        result.set(PropertyKey::from("done"), Value::Boolean(done));
        Value::Object(result)
    }

    pub(crate) fn make_error(&self, kind: ErrorKind, message: &str) -> Value {
        let error = ObjectRef::new(Object::new(
            ObjectKind::Ordinary,
            Some(self.realm.error_prototype(kind)),
        ));
        hide(&error, "message", Value::from(message));
        Value::Object(error)
    }

    fn this_promise(&mut self, this: &Value) -> Exec<ObjectRef> {
        match this {
            Value::Object(obj) if obj.is_promise() => Ok(obj.clone()),
            _ => self.throw_error(ErrorKind::TypeError, "Method Promise.prototype.then called on incompatible receiver"),
        }
    }

    pub(crate) fn call_native(&mut self, native: &Native, this: Value, args: Vec<Value>) -> Exec<Value> {
        match native {
            Native::Log => {
                let line = args.iter().map(Value::to_js_string).collect::<Vec<_>>().join(" ");
                debug!(line = %line, "log");
                self.log.push(line);
                Ok(Value::Undefined)
            }
            Native::PromiseConstructor => {
                self.throw_error(ErrorKind::TypeError, "Promise constructor cannot be invoked without 'new'")
            }
            Native::PromiseResolve => Ok(Value::Object(self.promise_resolve(argument(&args, 0)))),
            Native::PromiseReject => {
                let promise = self.new_promise();
                self.reject_promise(&promise, argument(&args, 0));
                Ok(Value::Object(promise))
            }
            Native::PromiseThen => {
                let promise = self.this_promise(&this)?;
                let derived = self.promise_then(&promise, argument(&args, 0), argument(&args, 1));
                Ok(Value::Object(derived))
            }
            Native::PromiseCatch => {
                let promise = self.this_promise(&this)?;
                let derived = self.promise_then(&promise, Value::Undefined, argument(&args, 0));
                Ok(Value::Object(derived))
            }
            Native::Resolve { promise, settled } => {
                if !settled.replace(true) {
                    self.resolve_promise(promise, argument(&args, 0));
                }
                Ok(Value::Undefined)
            }
            Native::Reject { promise, settled } => {
                if !settled.replace(true) {
                    self.reject_promise(promise, argument(&args, 0));
                }
                Ok(Value::Undefined)
            }
            Native::ArrayIsArray => Ok(Value::Boolean(matches!(
                argument(&args, 0),
                Value::Object(obj) if obj.is_array()
            ))),
            Native::ArrayPush => {
                let length = match &this {
                    Value::Object(obj) => match &mut obj.borrow_mut().kind {
                        ObjectKind::Array(items) => {
                            items.extend(args);
                            Some(items.len())
                        }
                        _ => None,
                    },
                    _ => None,
                };
                match length {
                    Some(length) => Ok(Value::Number(length as f64)),
                    None => self.throw_error(ErrorKind::TypeError, "push called on a non-array"),
                }
            }
            Native::ArrayValues => match &this {
                Value::Object(array) if array.is_array() => {
                    let iterator = self.new_object();
                    let next = self.native(Native::ArrayIteratorNext {
                        array: array.clone(),
                        index: Rc::new(Cell::new(0)),
                    });
                    hide(&iterator, "next", next);
                    Ok(Value::Object(iterator))
                }
                _ => self.throw_error(ErrorKind::TypeError, "values called on a non-array"),
            },
            Native::ArrayIteratorNext { array, index } => {
                let item = match &array.borrow().kind {
                    ObjectKind::Array(items) => items.get(index.get()).cloned(),
                    _ => None,
                };
                Ok(match item {
                    Some(value) => {
                        index.set(index.get() + 1);
                        self.iterator_result(value, false)
                    }
                    None => self.iterator_result(Value::Undefined, true),
                })
            }
            Native::HasOwnProperty => {
                let key = argument(&args, 0).to_property_key();
                Ok(Value::Boolean(match &this {
                    Value::Object(obj) => obj.borrow().has_own(&key),
                    _ => false,
                }))
            }
            Native::FunctionCall => {
                let mut args = args;
                let receiver = if args.is_empty() {
                    Value::Undefined
                } else {
                    args.remove(0)
                };
                self.call(&this, receiver, args)
            }
            Native::ErrorConstructor(kind) => {
                let message = argument(&args, 0);
                let message = if message.is_nullish() {
                    String::new()
                } else {
                    message.to_js_string()
                };
                Ok(self.make_error(*kind, &message))
            }
        }
    }

    /// `new` on a native function
    pub(crate) fn construct_native(&mut self, native: &Native, args: Vec<Value>) -> Exec<Value> {
        match native {
            Native::PromiseConstructor => self.construct_promise(argument(&args, 0)),
            Native::ErrorConstructor(_) => self.call_native(native, Value::Undefined, args),
            _ => self.throw_error(ErrorKind::TypeError, "not a constructor"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realm_globals() {
        let realm = Realm::new();
        for name in ["Promise", "Symbol", "Array", "Object", "Error", "TypeError", "log"] {
            assert!(realm.global.lookup(name).is_some(), "missing {}", name);
        }
        assert!(realm.global.lookup("undefined").is_some_and(|v| matches!(v, Value::Undefined)));
    }

    #[test]
    fn test_builtin_methods_are_not_enumerable() {
        let realm = Realm::new();
        assert!(realm.object_prototype.enumerable_keys().is_empty());
        assert!(realm.array_prototype.enumerable_keys().is_empty());
    }

    #[test]
    fn test_error_prototypes_chain() {
        let realm = Realm::new();
        let type_error = realm.error_prototype(ErrorKind::TypeError);
        assert_eq!(type_error.get(&PropertyKey::from("name")).as_str(), Some("TypeError"));
        assert_eq!(type_error.get(&PropertyKey::from("message")).as_str(), Some(""));
    }
}
