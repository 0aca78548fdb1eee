//! Promises and the microtask queue
//!
//! Settling a promise never runs code directly: every reaction, and every
//! adoption of a thenable, is queued as a [`Job`] and runs when the queue is
//! drained, in FIFO order.

use std::cell::Cell;
use std::rc::Rc;

use tracing::trace;

use crate::builtins::{ErrorKind, Native};
use crate::interpreter::{Exec, Interpreter, Interrupt};
use crate::value::{Object, ObjectKind, ObjectRef, PropertyKey, Value};

pub enum PromiseState {
    Pending(Vec<Reaction>),
    Fulfilled(Value),
    Rejected(Value),
}

/// Handlers registered by one `then` call
pub struct Reaction {
    on_fulfilled: Option<Value>,
    on_rejected: Option<Value>,
    derived: ObjectRef,
}

#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Fulfilled(Value),
    Rejected(Value),
}

pub(crate) enum Job {
    /// Run a handler with a settled value and settle the derived promise
    Reaction {
        handler: Option<Value>,
        outcome: Outcome,
        derived: ObjectRef,
    },
    /// Call `then` of a thenable a promise was resolved with
    ResolveThenable {
        promise: ObjectRef,
        thenable: Value,
        then: Value,
    },
}

impl Interpreter {
    pub(crate) fn new_promise(&self) -> ObjectRef {
        ObjectRef::new(Object::new(
            ObjectKind::Promise(PromiseState::Pending(Vec::new())),
            Some(self.realm.promise_prototype.clone()),
        ))
    }

    /// `Promise.resolve(value)`
    pub(crate) fn promise_resolve(&mut self, value: Value) -> ObjectRef {
        if let Value::Object(obj) = &value {
            if obj.is_promise() {
                return obj.clone();
            }
        }
        let promise = self.new_promise();
        self.resolve_promise(&promise, value);
        promise
    }

    /// Resolve `promise` with `value`, adopting the state of thenables
    pub(crate) fn resolve_promise(&mut self, promise: &ObjectRef, value: Value) {
        if let Value::Object(obj) = &value {
            if obj.ptr_eq(promise) {
                let error = self.make_error(ErrorKind::TypeError, "Chaining cycle detected for promise");
                self.reject_promise(promise, error);
                return;
            }
            let then = obj.get(&PropertyKey::from("then"));
            if then.is_callable() {
                trace!("adopting thenable");
                self.jobs.push_back(Job::ResolveThenable {
                    promise: promise.clone(),
                    thenable: value.clone(),
                    then,
                });
                return;
            }
        }
        self.settle(promise, Outcome::Fulfilled(value));
    }

    pub(crate) fn reject_promise(&mut self, promise: &ObjectRef, reason: Value) {
        self.settle(promise, Outcome::Rejected(reason));
    }

    fn settle(&mut self, promise: &ObjectRef, outcome: Outcome) {
        let reactions = {
            let mut object = promise.borrow_mut();
            let ObjectKind::Promise(state) = &mut object.kind else {
                return;
            };
            if !matches!(state, PromiseState::Pending(_)) {
                return;
            }
            let settled = match &outcome {
                Outcome::Fulfilled(value) => PromiseState::Fulfilled(value.clone()),
                Outcome::Rejected(reason) => PromiseState::Rejected(reason.clone()),
            };
            match std::mem::replace(state, settled) {
                PromiseState::Pending(reactions) => reactions,
                _ => Vec::new(),
            }
        };
        for reaction in reactions {
            self.enqueue_reaction(reaction, outcome.clone());
        }
    }

    fn enqueue_reaction(&mut self, reaction: Reaction, outcome: Outcome) {
        let handler = match &outcome {
            Outcome::Fulfilled(_) => reaction.on_fulfilled,
            Outcome::Rejected(_) => reaction.on_rejected,
        };
        self.jobs.push_back(Job::Reaction {
            handler,
            outcome,
            derived: reaction.derived,
        });
    }

    /// `promise.then(on_fulfilled, on_rejected)`
    pub(crate) fn promise_then(&mut self, promise: &ObjectRef, on_fulfilled: Value, on_rejected: Value) -> ObjectRef {
        let derived = self.new_promise();
        let mut reaction = Some(Reaction {
            on_fulfilled: on_fulfilled.is_callable().then_some(on_fulfilled),
            on_rejected: on_rejected.is_callable().then_some(on_rejected),
            derived: derived.clone(),
        });
        let settled = {
            let mut object = promise.borrow_mut();
            match &mut object.kind {
                ObjectKind::Promise(PromiseState::Pending(reactions)) => {
                    reactions.extend(reaction.take());
                    None
                }
                ObjectKind::Promise(PromiseState::Fulfilled(value)) => Some(Outcome::Fulfilled(value.clone())),
                ObjectKind::Promise(PromiseState::Rejected(reason)) => Some(Outcome::Rejected(reason.clone())),
                _ => None,
            }
        };
        if let (Some(outcome), Some(reaction)) = (settled, reaction) {
            self.enqueue_reaction(reaction, outcome);
        }
        derived
    }

    /// The `resolve` and `reject` functions handed to an executor or a
    /// thenable's `then`; only the first call of either has an effect
    pub(crate) fn resolving_functions(&self, promise: &ObjectRef) -> (Value, Value) {
        let settled = Rc::new(Cell::new(false));
        let resolve = self.native(Native::Resolve {
            promise: promise.clone(),
            settled: settled.clone(),
        });
        let reject = self.native(Native::Reject {
            promise: promise.clone(),
            settled,
        });
        (resolve, reject)
    }

    /// `new Promise(executor)`
    pub(crate) fn construct_promise(&mut self, executor: Value) -> Exec<Value> {
        if !executor.is_callable() {
            return self.throw_error(ErrorKind::TypeError, "Promise resolver is not a function");
        }
        let promise = self.new_promise();
        let (resolve, reject) = self.resolving_functions(&promise);
        match self.call(&executor, Value::Undefined, vec![resolve, reject.clone()]) {
            Ok(_) => {}
            Err(Interrupt::Throw(error)) => {
                self.call(&reject, Value::Undefined, vec![error])?;
            }
            Err(fatal) => return Err(fatal),
        }
        Ok(Value::Object(promise))
    }

    pub(crate) fn run_job(&mut self, job: Job) -> Exec<()> {
        self.tick()?;
        match job {
            Job::Reaction {
                handler,
                outcome,
                derived,
            } => {
                let result = match (handler, outcome) {
                    (Some(handler), Outcome::Fulfilled(value) | Outcome::Rejected(value)) => {
                        self.call(&handler, Value::Undefined, vec![value])
                    }
                    (None, Outcome::Fulfilled(value)) => Ok(value),
                    (None, Outcome::Rejected(reason)) => Err(Interrupt::Throw(reason)),
                };
                match result {
                    Ok(value) => self.resolve_promise(&derived, value),
                    Err(Interrupt::Throw(reason)) => self.reject_promise(&derived, reason),
                    Err(fatal) => return Err(fatal),
                }
            }
            Job::ResolveThenable {
                promise,
                thenable,
                then,
            } => {
                let (resolve, reject) = self.resolving_functions(&promise);
                match self.call(&then, thenable, vec![resolve, reject.clone()]) {
                    Ok(_) => {}
                    Err(Interrupt::Throw(error)) => {
                        self.call(&reject, Value::Undefined, vec![error])?;
                    }
                    Err(fatal) => return Err(fatal),
                }
            }
        }
        Ok(())
    }
}
