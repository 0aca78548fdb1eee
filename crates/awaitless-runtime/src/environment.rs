//! Lexical environments
//!
//! One environment per function activation (holding `this`, `arguments`,
//! parameters and hoisted `var`s) and one per block that declares `let`,
//! `const` or functions. Arrow functions get an environment without `this`,
//! so lookups reach the enclosing function's.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::value::Value;

pub type EnvRef = Rc<Environment>;

#[derive(Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

/// Why an assignment to a name failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    Unbound,
    Constant,
}

pub struct Environment {
    bindings: RefCell<FxHashMap<String, Binding>>,
    parent: Option<EnvRef>,
    this: Option<Value>,
}

impl Environment {
    /// The script environment; `this` is `undefined`
    pub fn global() -> EnvRef {
        Rc::new(Environment {
            bindings: RefCell::new(FxHashMap::default()),
            parent: None,
            this: Some(Value::Undefined),
        })
    }

    /// Block scope inside `parent`
    pub fn child(parent: &EnvRef) -> EnvRef {
        Self::function(parent, None)
    }

    /// Activation of a function; `this` is `None` for arrows
    pub fn function(parent: &EnvRef, this: Option<Value>) -> EnvRef {
        Rc::new(Environment {
            bindings: RefCell::new(FxHashMap::default()),
            parent: Some(parent.clone()),
            this,
        })
    }

    /// A sibling holding copies of this environment's bindings, used for the
    /// per-iteration bindings of `for (let ...)`
    pub fn copy(&self) -> EnvRef {
        Rc::new(Environment {
            bindings: RefCell::new(self.bindings.borrow().clone()),
            parent: self.parent.clone(),
            this: self.this.clone(),
        })
    }

    /// Create or replace a binding in this environment
    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.bindings
            .borrow_mut()
            .insert(name.to_string(), Binding { value, mutable });
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    pub fn assign(&self, name: &str, value: Value) -> Result<(), AssignError> {
        if let Some(binding) = self.bindings.borrow_mut().get_mut(name) {
            if !binding.mutable {
                return Err(AssignError::Constant);
            }
            binding.value = value;
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(AssignError::Unbound),
        }
    }

    /// `this` of the nearest non-arrow function
    pub fn this_value(&self) -> Value {
        match (&self.this, &self.parent) {
            (Some(this), _) => this.clone(),
            (None, Some(parent)) => parent.this_value(),
            (None, None) => Value::Undefined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_parents() {
        let global = Environment::global();
        global.declare("a", Value::Number(1.0), true);
        let inner = Environment::child(&global);
        inner.declare("b", Value::Number(2.0), true);
        assert_eq!(inner.lookup("a").and_then(|v| v.as_number()), Some(1.0));
        assert!(global.lookup("b").is_none());
    }

    #[test]
    fn test_constant_rejects_assignment() {
        let global = Environment::global();
        global.declare("c", Value::Null, false);
        assert_eq!(global.assign("c", Value::Null), Err(AssignError::Constant));
        assert_eq!(global.assign("missing", Value::Null), Err(AssignError::Unbound));
    }

    #[test]
    fn test_copy_detaches_bindings() {
        let global = Environment::global();
        let first = Environment::child(&global);
        first.declare("i", Value::Number(0.0), true);
        let second = first.copy();
        assert!(second.assign("i", Value::Number(1.0)).is_ok());
        assert_eq!(first.lookup("i").and_then(|v| v.as_number()), Some(0.0));
    }

    #[test]
    fn test_arrow_sees_enclosing_this() {
        let global = Environment::global();
        let function = Environment::function(&global, Some(Value::from("self")));
        let arrow = Environment::function(&function, None);
        assert_eq!(arrow.this_value().as_str(), Some("self"));
    }
}
