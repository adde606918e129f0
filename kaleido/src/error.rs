use thiserror::Error;

use crate::parser::lexer::Token;
use crate::span::Span;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Lexer error at {span}: invalid number literal '{literal}'")]
    InvalidNumber { literal: String, span: Span },

    #[error("Syntax error at {span}: expected {expected}, found {found}")]
    UnexpectedToken {
        found: Token,
        expected: String,
        span: Span,
    },

    #[error("Syntax error: expected {expected}, but reached end of file")]
    UnexpectedEof { expected: String },

    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("Function '{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Unknown variable: {name}")]
    UnknownVariable { name: String },

    #[error("Invalid module: {message}")]
    InvalidModule { message: String },

    #[error("Unknown target: {name}")]
    UnknownTarget { name: String },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl CompileError {
    /// Код выхода процесса (в стиле sysexits.h)
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidNumber { .. } => 65,
            Self::UnexpectedToken { .. } | Self::UnexpectedEof { .. } => 66,
            Self::UnknownFunction { .. }
            | Self::ArityMismatch { .. }
            | Self::UnknownVariable { .. } => 67,
            Self::UnknownTarget { .. } => 64,
            Self::InvalidModule { .. } => 70,
            Self::IoError { .. } => 74,
        }
    }
}
