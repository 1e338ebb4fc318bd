//! Backend module - Code generation

pub mod codegen;

pub mod cpp;

pub use codegen::CodeGen;
pub use cpp::CppCodeGen;
