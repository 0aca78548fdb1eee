//! Awaitless Runtime
//!
//! A small evaluator for the code the lowering emits: ordinary functions,
//! closures, objects, arrays, exceptions and promises with a FIFO microtask
//! queue. It exists to check lowered programs by running them; `await`,
//! async functions and generators are rejected with
//! [`RuntimeError::Unsupported`].
//!
//! # Usage
//!
//! ```ignore
//! use awaitless_runtime::Interpreter;
//!
//! let mut interpreter = Interpreter::new();
//! interpreter.run(&lowered)?;
//! assert_eq!(interpreter.log(), ["1", "2"]);
//! ```

mod builtins;
mod environment;
pub mod error;
mod interpreter;
mod promise;
pub mod value;

pub use error::{RuntimeError, RuntimeResult};
pub use interpreter::{Interpreter, DEFAULT_STEP_LIMIT};
pub use value::{ObjectRef, PropertyKey, Value, WellKnownSymbol};
