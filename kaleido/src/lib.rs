//! Frontend for a small expression language: source text is lexed, parsed
//! into an AST and lowered to an SSA module with explicit basic blocks.
//!
//! ```text
//! extern sin(x);
//! def twice(x) x * 2;
//! if sin(0) then 1 else twice(21);
//! ```

pub mod backends;
pub mod codegen;
pub mod error;
pub mod ir;
pub mod parser;
pub mod span;

pub use error::CompileError;
pub use ir::Module;

/// Полный конвейер: лексер, парсер, генерация и проверка модуля
pub fn compile(source: &str) -> Result<Module, CompileError> {
    let program = parser::parse(source)?;
    let module = codegen::generate(&program)?;
    ir::verify::verify(&module)?;
    Ok(module)
}
