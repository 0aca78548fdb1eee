//! End-to-end tests for async lowering
//!
//! These tests lower programs with async functions and run the output on
//! the reference evaluator, checking that side effects happen in the same
//! order as under a native async runtime.

mod harness;
mod sequencing;
mod control_flow;
mod loops;
mod exceptions;
mod scoping;
