//! Executor for modules produced by `kaleido`: interprets the SSA blocks
//! directly and resolves extern declarations against a small builtin library.

pub mod builtins;
pub mod console;
pub mod constants;
pub mod error;
pub mod machine;

pub use error::{RuntimeError, VmError};
pub use machine::{Limits, Machine};

/// Компилирует исходник и выполняет его, возвращая напечатанные значения
pub fn run_source(source: &str, limits: Limits) -> Result<Vec<f64>, VmError> {
    let module = kaleido::compile(source)?;
    let mut machine = Machine::new(&module, limits);
    Ok(machine.run()?)
}
