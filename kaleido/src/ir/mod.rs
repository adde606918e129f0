pub mod ast;
pub mod builder;
pub mod module;
pub mod verify;

pub use module::{
    BinaryOp, Block, BlockId, Function, Global, InstrKind, Instruction, Module, Param,
    Terminator, Type, Value, ValueId,
};
