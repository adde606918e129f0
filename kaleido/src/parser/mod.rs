pub mod lexer;
pub mod parser;

use crate::error::CompileError;
use crate::ir::ast;

pub use lexer::{Lexeme, Token};

/// Из текста в AST: лексер отдаёт все токены, затем парсер строит программу
pub fn parse(source: &str) -> Result<ast::Program, CompileError> {
    let lexemes = lexer::tokenize(source)?;
    parser::parse_tokens(lexemes)
}
