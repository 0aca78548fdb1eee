//! Awaitless Transform
//!
//! Lowers async functions into ordinary functions that return promises.
//!
//! This crate provides:
//! - Reachability and exit analysis of statement lists
//! - Expression flattening around suspension points
//! - Restructuring of conditionals, loops, switches, try statements and
//!   labeled statements into runtime helper calls
//! - The helper catalogue and a per-unit helper registry
//! - Optional hoisting of closures that capture nothing
//!
//! # Usage
//!
//! ```ignore
//! use awaitless_ast::{print_program, Program};
//! use awaitless_transform::{transform_program, Options};
//!
//! let lowered = transform_program(&program, &Options::default())?;
//! println!("{}", print_program(&lowered));
//! ```

pub mod analysis;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod helpers;
pub mod reachability;

mod exits;
mod hoist;
mod lower;
mod prepare;

use awaitless_ast::{NameGenerator, Program};
use tracing::debug;

// Re-export main types
pub use config::{Options, Target};
pub use diagnostic::Diagnostic;
pub use error::{ConfigError, LowerError, LowerResult};
pub use helpers::{Helper, HelperRegistry};

/// Lower every async function of `program`
///
/// The result starts with the helpers the lowered code references (inline
/// declarations or one import, depending on `options`), followed by hoisted
/// closures when `options.hoist` is set, followed by the program itself.
pub fn transform_program(program: &Program, options: &Options) -> LowerResult<Program> {
    if let Some(span) = analysis::find_stray_await(&program.body) {
        return Err(LowerError::AwaitOutsideAsync { span });
    }

    let names = NameGenerator::for_program(program);
    let mut unit = lower::Unit::new(options, names);
    let mut body = program.body.clone();
    lower::lower_async_functions(&mut unit, &mut body)?;

    let lifted = if options.hoist {
        hoist::hoist_closures(&mut body, &mut unit.names)
    } else {
        Vec::new()
    };
    debug!(
        helpers = unit.helpers.used().len(),
        hoisted = lifted.len(),
        "transformed program"
    );

    let mut output = unit.helpers.finish();
    output.extend(lifted);
    output.extend(body);
    Ok(Program::new(output, program.span))
}
