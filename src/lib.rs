//! aw-lower
//!
//! Lowers C++ sources written with `async` functions, `async` lambdas and
//! `await` expressions into standard C++ built on `std::async` and
//! `std::future`:
//!
//! ```text
//! source -> frontend::parse -> middle::Lowerer -> backend::CppCodeGen -> source
//! ```
//!
//! Every run is a pure function of its input; nothing is shared between
//! calls.

pub mod backend;
pub mod feedback;
pub mod frontend;
pub mod middle;
pub mod utils;

use backend::{CodeGen, CppCodeGen};
use middle::{Census, Lowerer};

pub use middle::{LowerOptions, LoweringStats};
pub use utils::{Error, Result};

/// Result of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct Lowered {
    /// Transformed source text
    pub source: String,
    pub stats: LoweringStats,
}

/// Parse, lower and re-emit `source`
pub fn transform(source: &str, options: &LowerOptions) -> Result<Lowered> {
    let program = frontend::parse(source)?;
    let (program, stats) = Lowerer::new(options).lower(program)?;
    debug_assert!(middle::is_fully_lowered(&program));

    let source = CppCodeGen::new().generate_source(&program);
    Ok(Lowered { source, stats })
}

/// Parse and validate `source` without lowering it
pub fn check(source: &str, options: &LowerOptions) -> Result<Census> {
    let program = frontend::parse(source)?;
    middle::check_await_placement(&program, &options.entry_point)?;
    Ok(Census::of(&program))
}
