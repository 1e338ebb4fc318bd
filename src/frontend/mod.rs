//! Frontend module - Lexer, Parser, AST

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod visit;

use crate::utils::Result;

/// Parse a whole translation unit
pub fn parse(source: &str) -> Result<ast::Program> {
    parser::Parser::new(source)?.parse_program()
}
