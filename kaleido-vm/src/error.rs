use thiserror::Error;

use kaleido::CompileError;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Entry function '{name}' not found")]
    MissingEntry { name: String },

    #[error("Call to '{name}' which has no body and no builtin implementation")]
    UnresolvedExternal { name: String },

    #[error("Builtin '{name}' expects {expected} argument(s), got {got}")]
    BuiltinArity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Call depth limit of {limit} exceeded in '{function}'")]
    CallDepthExceeded { function: String, limit: usize },

    #[error("Step limit of {limit} instructions exhausted")]
    StepLimitExceeded { limit: u64 },

    #[error("Malformed IR in '{function}': {message}")]
    MalformedIr { function: String, message: String },
}

#[derive(Error, Debug)]
pub enum VmError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl VmError {
    pub fn exit_code(&self) -> i32 {
        match self {
            VmError::Compile(e) => e.exit_code(),
            VmError::Runtime(_) => 70,
        }
    }
}
