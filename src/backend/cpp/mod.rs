//! C++ Backend - Render the AST as C++ source
//!
//! The output uses only standard C++ (`<future>`), so any C++11 compiler
//! can build the lowered program.

mod cpp_codegen;

pub use cpp_codegen::CppCodeGen;
