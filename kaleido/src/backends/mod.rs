pub mod llvm;
pub mod text;

use crate::codegen;
use crate::error::CompileError;
use crate::ir::ast;
use crate::ir::verify::verify;
use crate::ir::Module;

pub trait Backend {
    /// Рендерит проверенный модуль в текст для внешнего исполнителя
    fn render(&self, module: &Module) -> String;

    fn compile(&mut self, program: &ast::Program) -> Result<Vec<u8>, CompileError> {
        let module = codegen::generate(program)?;
        verify(&module)?;
        Ok(self.render(&module).into_bytes())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BackendType {
    Ir,
    Llvm,
}

impl BackendType {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Ir,
            Self::Llvm,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ir => "ir",
            Self::Llvm => "llvm",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Ir => "Kaleido SSA listing",
            Self::Llvm => "LLVM assembly (.ll), runnable with lli",
        }
    }

    /// Расширение выходного файла по умолчанию
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ir => "kir",
            Self::Llvm => "ll",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CompileError> {
        Self::all()
            .into_iter()
            .find(|backend| backend.name() == name)
            .ok_or_else(|| CompileError::UnknownTarget {
                name: name.to_string(),
            })
    }

    pub fn create(&self) -> Box<dyn Backend> {
        match self {
            Self::Ir => Box::new(text::TextBackend),
            Self::Llvm => Box::new(llvm::LlvmBackend),
        }
    }
}
