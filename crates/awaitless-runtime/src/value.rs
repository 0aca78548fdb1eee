//! Values and objects of the evaluated program
//!
//! Objects are reference-counted and shared; the evaluator is
//! single-threaded, so interior mutability goes through `RefCell`.
//!
//! ```text
//! Value ── Undefined | Null | Boolean | Number | String | Symbol
//!       └─ Object ──▶ ObjectRef ──▶ Object { kind, prototype, properties }
//! ```

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use awaitless_ast::ast::Function;
use awaitless_ast::codegen::format_number;

use crate::builtins::Native;
use crate::environment::EnvRef;
use crate::promise::PromiseState;

/// The well-known symbols the evaluated code can observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownSymbol {
    Iterator,
    AsyncIterator,
}

impl WellKnownSymbol {
    pub fn description(self) -> &'static str {
        match self {
            WellKnownSymbol::Iterator => "Symbol.iterator",
            WellKnownSymbol::AsyncIterator => "Symbol.asyncIterator",
        }
    }
}

/// A JavaScript value
#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(WellKnownSymbol),
    Object(ObjectRef),
}

impl Value {
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Symbol(_) | Value::Object(_) => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        match self {
            Value::Object(obj) => obj.is_callable(),
            _ => false,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Result of the `typeof` operator
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(obj) if obj.is_callable() => "function",
            Value::Object(_) => "object",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined | Value::Symbol(_) => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Object(_) => string_to_number(&self.to_js_string()),
        }
    }

    /// `ToInt32`
    pub fn to_int32(&self) -> i32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        (n.trunc() as i64) as i32
    }

    pub fn to_uint32(&self) -> u32 {
        self.to_int32() as u32
    }

    /// `String(value)`
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Symbol(symbol) => format!("Symbol({})", symbol.description()),
            Value::Object(obj) => obj.to_js_string(),
        }
    }

    pub fn to_property_key(&self) -> PropertyKey {
        match self {
            Value::Symbol(symbol) => PropertyKey::Symbol(*symbol),
            other => PropertyKey::String(other.to_js_string()),
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Value::Boolean(_), _) => Value::Number(self.to_number()).loose_equals(other),
            (_, Value::Boolean(_)) => self.loose_equals(&Value::Number(other.to_number())),
            (Value::Object(_), Value::Number(_) | Value::String(_)) => {
                Value::from(self.to_js_string()).loose_equals(other)
            }
            (Value::Number(_) | Value::String(_), Value::Object(_)) => {
                self.loose_equals(&Value::from(other.to_js_string()))
            }
            _ => self.strict_equals(other),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

// ============================================================================
// Property keys
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(String),
    Symbol(WellKnownSymbol),
}

impl PropertyKey {
    /// Array index named by this key, if it is one
    fn as_index(&self) -> Option<usize> {
        let PropertyKey::String(s) = self else {
            return None;
        };
        if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
            return None;
        }
        s.parse::<usize>().ok()
    }

    fn is(&self, name: &str) -> bool {
        matches!(self, PropertyKey::String(s) if s == name)
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::String(s.to_string())
    }
}

// ============================================================================
// Objects
// ============================================================================

/// A user function closed over its defining environment
#[derive(Clone)]
pub struct Closure {
    pub function: Rc<Function>,
    pub env: EnvRef,
}

pub enum ObjectKind {
    Ordinary,
    Array(Vec<Value>),
    Closure(Closure),
    Native(Native),
    Promise(PromiseState),
}

struct Property {
    key: PropertyKey,
    value: Value,
    enumerable: bool,
}

pub struct Object {
    pub kind: ObjectKind,
    pub prototype: Option<ObjectRef>,
    properties: Vec<Property>,
}

impl Object {
    pub fn new(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self {
            kind,
            prototype,
            properties: Vec::new(),
        }
    }

    pub fn get_own(&self, key: &PropertyKey) -> Option<Value> {
        if let ObjectKind::Array(items) = &self.kind {
            if key.is("length") {
                return Some(Value::Number(items.len() as f64));
            }
            if let Some(index) = key.as_index() {
                return items.get(index).cloned();
            }
        }
        self.properties
            .iter()
            .find(|p| &p.key == key)
            .map(|p| p.value.clone())
    }

    pub fn has_own(&self, key: &PropertyKey) -> bool {
        if let ObjectKind::Array(items) = &self.kind {
            if key.is("length") {
                return true;
            }
            if let Some(index) = key.as_index() {
                return index < items.len();
            }
        }
        self.properties.iter().any(|p| &p.key == key)
    }

    /// Assignment: create an enumerable property or overwrite one
    pub fn set(&mut self, key: PropertyKey, value: Value) {
        if let ObjectKind::Array(items) = &mut self.kind {
            if key.is("length") {
                let len = value.to_number();
                if len >= 0.0 && len.is_finite() {
                    items.resize(len as usize, Value::Undefined);
                }
                return;
            }
            if let Some(index) = key.as_index() {
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                return;
            }
        }
        match self.properties.iter_mut().find(|p| p.key == key) {
            Some(property) => property.value = value,
            None => self.properties.push(Property {
                key,
                value,
                enumerable: true,
            }),
        }
    }

    /// Define a property that `for...in` does not see
    pub fn define_hidden(&mut self, key: PropertyKey, value: Value) {
        self.properties.retain(|p| p.key != key);
        self.properties.push(Property {
            key,
            value,
            enumerable: false,
        });
    }

    pub fn delete(&mut self, key: &PropertyKey) -> bool {
        if let ObjectKind::Array(items) = &mut self.kind {
            if let Some(index) = key.as_index() {
                if let Some(slot) = items.get_mut(index) {
                    *slot = Value::Undefined;
                }
                return true;
            }
        }
        self.properties.retain(|p| &p.key != key);
        true
    }

    /// String keys in insertion order (array indices first), with their
    /// enumerability
    pub fn own_string_keys(&self) -> Vec<(String, bool)> {
        let mut keys = Vec::new();
        if let ObjectKind::Array(items) = &self.kind {
            keys.extend((0..items.len()).map(|i| (i.to_string(), true)));
        }
        keys.extend(self.properties.iter().filter_map(|p| match &p.key {
            PropertyKey::String(s) => Some((s.clone(), p.enumerable)),
            PropertyKey::Symbol(_) => None,
        }));
        keys
    }
}

/// Shared handle to an object
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    pub fn new(object: Object) -> Self {
        ObjectRef(Rc::new(RefCell::new(object)))
    }

    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Object> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Closure(_) | ObjectKind::Native(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Array(_))
    }

    pub fn is_promise(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Promise(_))
    }

    /// Property lookup along the prototype chain
    pub fn get(&self, key: &PropertyKey) -> Value {
        let mut current = self.clone();
        loop {
            let (found, prototype) = {
                let object = current.borrow();
                (object.get_own(key), object.prototype.clone())
            };
            if let Some(value) = found {
                return value;
            }
            match prototype {
                Some(prototype) => current = prototype,
                None => return Value::Undefined,
            }
        }
    }

    pub fn has_property(&self, key: &PropertyKey) -> bool {
        let mut current = self.clone();
        loop {
            let (found, prototype) = {
                let object = current.borrow();
                (object.has_own(key), object.prototype.clone())
            };
            if found {
                return true;
            }
            match prototype {
                Some(prototype) => current = prototype,
                None => return false,
            }
        }
    }

    pub fn set(&self, key: PropertyKey, value: Value) {
        self.borrow_mut().set(key, value);
    }

    /// Keys `for...in` visits: enumerable string keys of the object and its
    /// prototypes, shadowed keys once
    pub fn enumerable_keys(&self) -> Vec<String> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut keys = Vec::new();
        let mut current = Some(self.clone());
        while let Some(object) = current {
            let (own, prototype) = {
                let borrowed = object.borrow();
                (borrowed.own_string_keys(), borrowed.prototype.clone())
            };
            for (key, enumerable) in own {
                if seen.insert(key.clone()) && enumerable {
                    keys.push(key);
                }
            }
            current = prototype;
        }
        keys
    }

    fn to_js_string(&self) -> String {
        let items = match &self.borrow().kind {
            ObjectKind::Array(items) => Some(items.clone()),
            ObjectKind::Closure(_) | ObjectKind::Native(_) => return "function () { [native code] }".to_string(),
            ObjectKind::Promise(_) => return "[object Promise]".to_string(),
            ObjectKind::Ordinary => None,
        };
        if let Some(items) = items {
            return items
                .iter()
                .map(|item| if item.is_nullish() { String::new() } else { item.to_js_string() })
                .collect::<Vec<_>>()
                .join(",");
        }
        let name = self.get(&PropertyKey::from("name"));
        let message = self.get(&PropertyKey::from("message"));
        match (name, message) {
            (Value::String(name), Value::String(message)) if message.is_empty() => name.to_string(),
            (Value::String(name), Value::String(message)) => format!("{}: {}", name, message),
            _ => "[object Object]".to_string(),
        }
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.0.try_borrow() {
            Ok(object) => match &object.kind {
                ObjectKind::Ordinary => "Object",
                ObjectKind::Array(_) => "Array",
                ObjectKind::Closure(_) => "Function",
                ObjectKind::Native(_) => "NativeFunction",
                ObjectKind::Promise(_) => "Promise",
            },
            Err(_) => "Object",
        };
        write!(f, "[{} {:p}]", kind, Rc::as_ptr(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(items: Vec<Value>) -> ObjectRef {
        ObjectRef::new(Object::new(ObjectKind::Array(items), None))
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(Value::Object(array(vec![])).is_truthy());
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
        assert!(Value::from("1").loose_equals(&Value::Number(1.0)));
        assert!(Value::Boolean(true).loose_equals(&Value::Number(1.0)));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
    }

    #[test]
    fn test_array_properties() {
        let items = array(vec![Value::Number(1.0)]);
        assert_eq!(items.get(&PropertyKey::from("length")).as_number(), Some(1.0));
        items.set(PropertyKey::from("2"), Value::from("c"));
        assert_eq!(items.get(&PropertyKey::from("length")).as_number(), Some(3.0));
        assert!(items.get(&PropertyKey::from("1")).is_nullish());
        assert_eq!(Value::Object(items).to_js_string(), "1,,c");
    }

    #[test]
    fn test_enumerable_keys_follow_prototypes() {
        let base = ObjectRef::new(Object::new(ObjectKind::Ordinary, None));
        base.set(PropertyKey::from("inherited"), Value::Number(1.0));
        base.borrow_mut().define_hidden(PropertyKey::from("hidden"), Value::Null);
        let derived = ObjectRef::new(Object::new(ObjectKind::Ordinary, Some(base)));
        derived.set(PropertyKey::from("own"), Value::Number(2.0));
        derived.set(PropertyKey::from("inherited"), Value::Number(3.0));
        assert_eq!(derived.enumerable_keys(), vec!["own", "inherited"]);
    }

    #[test]
    fn test_number_conversion() {
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("x").to_number().is_nan());
        assert_eq!(Value::Number(-1.0).to_uint32(), u32::MAX);
    }
}
