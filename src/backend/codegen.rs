//! Code Generation trait - Backend abstraction
//!
//! A backend turns a (lowered) program back into source text.

use crate::frontend::ast::Program;

/// Source generation backend trait
pub trait CodeGen {
    /// Render the whole program
    fn generate_source(&mut self, program: &Program) -> String;

    /// Get the backend name
    fn name(&self) -> &str;
}
