use log::{trace, warn};

use super::module::{
    BinaryOp, Block, BlockId, Function, InstrKind, Instruction, Terminator, Value, ValueId,
};

/// Builds the body of one function. Owns the insertion point, so nothing
/// outside the builder can append to the wrong block.
pub struct FunctionBuilder {
    blocks: Vec<Block>,
    current: Option<BlockId>,
    next_value: u32,
}

impl FunctionBuilder {
    /// Номера `0..param_count` уже заняты параметрами
    pub fn new(param_count: usize) -> Self {
        Self {
            blocks: Vec::new(),
            current: None,
            next_value: param_count as u32,
        }
    }

    pub fn append_block(&mut self, name: &str) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        trace!("append block {}{}", name, id.0);
        self.blocks.push(Block::new(id, name));
        id
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.current = Some(block);
    }

    /// Блок, в который сейчас идёт вставка
    pub fn current_block(&self) -> Option<BlockId> {
        self.current
    }

    pub fn build_binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value {
        self.push_value(InstrKind::Binary(op, lhs, rhs))
    }

    pub fn build_fcmp_one(&mut self, lhs: Value, rhs: Value) -> Value {
        self.push_value(InstrKind::FCmpOne(lhs, rhs))
    }

    pub fn build_call(&mut self, callee: &str, args: Vec<Value>) -> Value {
        self.push_value(InstrKind::Call {
            callee: callee.to_string(),
            args,
        })
    }

    pub fn build_phi(&mut self, incoming: Vec<(Value, BlockId)>) -> Value {
        self.push_value(InstrKind::Phi(incoming))
    }

    pub fn build_br(&mut self, target: BlockId) {
        self.terminate(Terminator::Br(target));
    }

    pub fn build_cond_br(&mut self, cond: Value, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn build_ret(&mut self, value: Value) {
        self.terminate(Terminator::Ret(Some(value)));
    }

    pub fn build_ret_void(&mut self) {
        self.terminate(Terminator::Ret(None));
    }

    /// Переносит построенные блоки в функцию
    pub fn finish(self, function: &mut Function) {
        function.blocks = self.blocks;
    }

    fn push_value(&mut self, kind: InstrKind) -> Value {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        self.push(Instruction {
            result: Some(id),
            kind,
        });
        Value::Local(id)
    }

    fn push(&mut self, instruction: Instruction) {
        debug_assert!(self.current.is_some(), "no insertion block for {:?}", instruction);
        match self.current_mut() {
            Some(block) => block.instructions.push(instruction),
            None => warn!("instruction {:?} dropped: no insertion block", instruction),
        }
    }

    fn terminate(&mut self, terminator: Terminator) {
        debug_assert!(self.current.is_some(), "no insertion block for {:?}", terminator);
        match self.current_mut() {
            Some(block) => block.terminator = Some(terminator),
            None => warn!("terminator {:?} dropped: no insertion block", terminator),
        }
    }

    fn current_mut(&mut self) -> Option<&mut Block> {
        let current = self.current?;
        self.blocks.get_mut(current.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_numbered_after_params() {
        let mut function = Function::numeric("f", &["a".to_string(), "b".to_string()]);
        let mut builder = FunctionBuilder::new(function.arity());
        let entry = builder.append_block("entry");
        builder.position_at_end(entry);
        let sum = builder.build_binary(
            BinaryOp::FAdd,
            Value::Local(ValueId(0)),
            Value::Local(ValueId(1)),
        );
        builder.build_ret(sum);
        builder.finish(&mut function);

        assert_eq!(sum, Value::Local(ValueId(2)));
        assert_eq!(function.blocks.len(), 1);
        assert_eq!(function.blocks[0].terminator, Some(Terminator::Ret(Some(sum))));
    }

    #[test]
    fn insertion_follows_position() {
        let mut function = Function::numeric("g", &[]);
        let mut builder = FunctionBuilder::new(0);
        let first = builder.append_block("entry");
        let second = builder.append_block("merge");
        builder.position_at_end(second);
        builder.build_fcmp_one(Value::Const(1.0), Value::Const(0.0));
        builder.position_at_end(first);
        builder.build_br(second);
        builder.finish(&mut function);

        assert!(function.blocks[0].instructions.is_empty());
        assert_eq!(function.blocks[1].instructions.len(), 1);
        assert_eq!(function.blocks[1].label(), "merge1");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "no insertion block")]
    fn building_without_position_is_caught() {
        let mut builder = FunctionBuilder::new(0);
        builder.append_block("entry");
        builder.build_ret_void();
    }
}
