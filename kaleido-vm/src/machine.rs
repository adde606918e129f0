use std::collections::HashMap;

use log::{debug, trace, warn};

use kaleido::ir::{
    BinaryOp, BlockId, Function, InstrKind, Instruction, Module, Terminator, Value, ValueId,
};

use crate::builtins;
use crate::console::Console;
use crate::constants::{MAX_CALL_DEPTH, MAX_STEPS};
use crate::error::RuntimeError;

/// Значение в регистре кадра
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot {
    Number(f64),
    Flag(bool),
    /// Указатель на глобальную строку модуля
    Global(usize),
}

impl Slot {
    pub fn as_number(&self) -> f64 {
        match self {
            Slot::Number(value) => *value,
            Slot::Flag(flag) => if *flag { 1.0 } else { 0.0 },
            Slot::Global(_) => f64::NAN,
        }
    }

    fn is_true(&self) -> bool {
        match self {
            Slot::Flag(flag) => *flag,
            other => other.as_number() != 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_depth: usize,
    pub max_steps: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: MAX_CALL_DEPTH,
            max_steps: MAX_STEPS,
        }
    }
}

/// Исполняет SSA-модуль, начиная с точки входа
pub struct Machine<'m> {
    module: &'m Module,
    limits: Limits,
    pub console: Console,
    /// Стек вызовов; вызов не уходит в рекурсию на стеке Rust
    stack: Vec<Frame<'m>>,
    steps: u64,
}

/// Регистры и позиция одного вызова
struct Frame<'f> {
    function: &'f Function,
    registers: HashMap<ValueId, Slot>,
    block: BlockId,
    /// Откуда пришли в текущий блок, для phi
    previous: Option<BlockId>,
    /// Следующая инструкция в блоке; после последней идёт терминатор
    index: usize,
    /// Регистр вызывающего кадра, куда положить результат
    result: Option<ValueId>,
}

impl<'f> Frame<'f> {
    fn new(function: &'f Function, args: Vec<Slot>, result: Option<ValueId>) -> Self {
        let registers = function
            .params
            .iter()
            .map(|param| param.id)
            .zip(args)
            .collect();
        Self {
            function,
            registers,
            block: BlockId(0),
            previous: None,
            index: 0,
            result,
        }
    }

    fn load(&self, value: Value) -> Result<Slot, RuntimeError> {
        match value {
            Value::Const(number) => Ok(Slot::Number(number)),
            Value::Global(index) => Ok(Slot::Global(index)),
            Value::Local(id) => self
                .registers
                .get(&id)
                .copied()
                .ok_or_else(|| malformed(self.function, format!("use of undefined value {}", id))),
        }
    }
}

impl<'m> Machine<'m> {
    pub fn new(module: &'m Module, limits: Limits) -> Self {
        Self {
            module,
            limits,
            console: Console::new(false),
            stack: Vec::new(),
            steps: 0,
        }
    }

    /// Печатать вывод программы сразу в stdout
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.console = Console::new(echo);
        self
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Запускает точку входа; возвращает напечатанные числа по порядку
    pub fn run(&mut self) -> Result<Vec<f64>, RuntimeError> {
        let module = self.module;
        let entry = module
            .entry_function()
            .ok_or_else(|| RuntimeError::MissingEntry {
                name: module.entry.clone(),
            })?;

        for function in module.functions.iter().filter(|f| f.is_declaration()) {
            if !builtins::is_builtin(&function.name) {
                warn!("extern '{}' has no builtin implementation", function.name);
            }
        }

        self.call(entry, Vec::new())?;
        debug!("executed {} instruction(s)", self.steps);
        Ok(self.console.values().to_vec())
    }

    /// Вызов функции по имени с числовыми аргументами
    pub fn call_function(&mut self, name: &str, args: &[f64]) -> Result<Option<f64>, RuntimeError> {
        let module = self.module;
        let function = module
            .function(name)
            .ok_or_else(|| RuntimeError::UnresolvedExternal {
                name: name.to_string(),
            })?;
        let args = args.iter().map(|value| Slot::Number(*value)).collect();
        self.call(function, args)
    }

    fn call(&mut self, function: &'m Function, args: Vec<Slot>) -> Result<Option<f64>, RuntimeError> {
        if function.is_declaration() {
            let result = builtins::call(&function.name, &args, self.module, &mut self.console)?;
            return Ok(Some(result));
        }

        let base = self.stack.len();
        let result = self
            .push_frame(function, args, None)
            .and_then(|()| self.execute(base));
        // После ошибки в стеке остаются кадры прерванных вызовов
        self.stack.truncate(base);
        result
    }

    fn push_frame(
        &mut self,
        function: &'m Function,
        args: Vec<Slot>,
        result: Option<ValueId>,
    ) -> Result<(), RuntimeError> {
        if args.len() != function.arity() {
            return Err(malformed(
                function,
                format!("called with {} argument(s), expects {}", args.len(), function.arity()),
            ));
        }

        if self.stack.len() >= self.limits.max_depth {
            return Err(RuntimeError::CallDepthExceeded {
                function: function.name.clone(),
                limit: self.limits.max_depth,
            });
        }

        trace!("call {}({:?})", function.name, args);
        self.stack.push(Frame::new(function, args, result));
        Ok(())
    }

    /// FETCH / EXECUTE, пока кадр с глубины `base` не выполнит ret
    fn execute(&mut self, base: usize) -> Result<Option<f64>, RuntimeError> {
        loop {
            let (function, block_id, index) = match self.stack.last() {
                Some(frame) => (frame.function, frame.block, frame.index),
                None => return Ok(None),
            };
            let block = function
                .block(block_id)
                .ok_or_else(|| malformed(function, format!("missing block bb{}", block_id.0)))?;

            self.tick()?;

            if let Some(instruction) = block.instructions.get(index) {
                self.advance();
                self.execute_instruction(instruction)?;
                continue;
            }

            let terminator = block
                .terminator
                .as_ref()
                .ok_or_else(|| malformed(function, format!("block '{}' has no terminator", block.label())))?;

            match terminator {
                Terminator::Ret(value) => {
                    let value = match value {
                        Some(value) => Some(self.load(*value)?.as_number()),
                        None => None,
                    };
                    let Some(frame) = self.stack.pop() else {
                        return Ok(value);
                    };
                    if self.stack.len() <= base {
                        return Ok(value);
                    }
                    if let Some(result) = frame.result {
                        self.store(result, Slot::Number(value.unwrap_or(0.0)));
                    }
                }
                Terminator::Br(target) => self.jump(*target),
                Terminator::CondBr { cond, then_block, else_block } => {
                    let target = if self.load(*cond)?.is_true() {
                        *then_block
                    } else {
                        *else_block
                    };
                    self.jump(target);
                }
            }
        }
    }

    fn execute_instruction(&mut self, instruction: &'m Instruction) -> Result<(), RuntimeError> {
        let value = match &instruction.kind {
            InstrKind::Binary(op, lhs, rhs) => {
                let lhs = self.load(*lhs)?.as_number();
                let rhs = self.load(*rhs)?.as_number();
                Slot::Number(match op {
                    BinaryOp::FAdd => lhs + rhs,
                    BinaryOp::FSub => lhs - rhs,
                    BinaryOp::FMul => lhs * rhs,
                    BinaryOp::FDiv => lhs / rhs,
                    // Остаток как у fmod: знак делимого
                    BinaryOp::FRem => lhs % rhs,
                })
            }
            InstrKind::FCmpOne(lhs, rhs) => {
                let lhs = self.load(*lhs)?.as_number();
                let rhs = self.load(*rhs)?.as_number();
                // ordered: NaN с любой стороны даёт false
                Slot::Flag(!lhs.is_nan() && !rhs.is_nan() && lhs != rhs)
            }
            InstrKind::Call { callee, args } => {
                let module = self.module;
                let target = module
                    .function(callee)
                    .ok_or_else(|| self.malformed_here(format!("call to unknown '{}'", callee)))?;
                let args = args
                    .iter()
                    .map(|arg| self.load(*arg))
                    .collect::<Result<Vec<_>, _>>()?;

                if !target.is_declaration() {
                    // Результат запишет ret вызванной функции
                    return self.push_frame(target, args, instruction.result);
                }
                Slot::Number(builtins::call(&target.name, &args, module, &mut self.console)?)
            }
            InstrKind::Phi(incoming) => {
                let previous = self.stack.last().and_then(|frame| frame.previous);
                let (value, _) = incoming
                    .iter()
                    .find(|(_, from)| Some(*from) == previous)
                    .ok_or_else(|| self.malformed_here("phi has no incoming value for predecessor".to_string()))?;
                self.load(*value)?
            }
        };

        if let Some(result) = instruction.result {
            self.store(result, value);
        }
        Ok(())
    }

    fn load(&self, value: Value) -> Result<Slot, RuntimeError> {
        match self.stack.last() {
            Some(frame) => frame.load(value),
            None => Err(RuntimeError::MalformedIr {
                function: self.module.entry.clone(),
                message: "no active call".to_string(),
            }),
        }
    }

    fn store(&mut self, id: ValueId, value: Slot) {
        if let Some(frame) = self.stack.last_mut() {
            frame.registers.insert(id, value);
        }
    }

    fn advance(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.index += 1;
        }
    }

    fn jump(&mut self, target: BlockId) {
        if let Some(frame) = self.stack.last_mut() {
            frame.previous = Some(frame.block);
            frame.block = target;
            frame.index = 0;
        }
    }

    fn malformed_here(&self, message: String) -> RuntimeError {
        let function = self
            .stack
            .last()
            .map_or_else(|| self.module.entry.clone(), |frame| frame.function.name.clone());
        RuntimeError::MalformedIr { function, message }
    }

    fn tick(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(RuntimeError::StepLimitExceeded {
                limit: self.limits.max_steps,
            });
        }
        Ok(())
    }
}

fn malformed(function: &Function, message: String) -> RuntimeError {
    RuntimeError::MalformedIr {
        function: function.name.clone(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Result<Vec<f64>, RuntimeError> {
        let module = kaleido::compile(source).unwrap();
        Machine::new(&module, Limits::default()).run()
    }

    #[test]
    fn prints_each_top_level_value() {
        assert_eq!(run("1; 2 + 3; 7 % 4;").unwrap(), vec![1.0, 5.0, 3.0]);
    }

    #[test]
    fn nan_condition_takes_else_branch() {
        assert_eq!(run("if 0 / 0 then 1 else 2;").unwrap(), vec![2.0]);
    }

    #[test]
    fn calls_defined_function_directly() {
        let module = kaleido::compile("def hyp(a, b) sqrt((a * a) + (b * b)); extern sqrt(x);").unwrap();
        let mut machine = Machine::new(&module, Limits::default());
        assert_eq!(machine.call_function("hyp", &[3.0, 4.0]).unwrap(), Some(5.0));
    }

    #[test]
    fn runaway_recursion_hits_depth_limit() {
        let module = kaleido::compile("def f(x) f(x + 1); f(0);").unwrap();
        let limits = Limits { max_depth: 64, max_steps: MAX_STEPS };
        let err = Machine::new(&module, limits).run().unwrap_err();
        assert!(matches!(err, RuntimeError::CallDepthExceeded { limit: 64, .. }));
    }

    #[test]
    fn step_budget_is_enforced() {
        let module = kaleido::compile("1 + 2 + 3 + 4;").unwrap();
        let limits = Limits { max_depth: MAX_CALL_DEPTH, max_steps: 2 };
        let err = Machine::new(&module, limits).run().unwrap_err();
        assert!(matches!(err, RuntimeError::StepLimitExceeded { limit: 2 }));
    }

    #[test]
    fn default_depth_limit_holds_on_a_small_thread() {
        // Глубина вызовов не зависит от размера стека потока
        let handle = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| run("def f(x) f(x + 1); f(0);"))
            .unwrap();
        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::CallDepthExceeded { limit: MAX_CALL_DEPTH, .. }
        ));
    }

    #[test]
    fn machine_is_reusable_after_an_error() {
        let module = kaleido::compile("def f(x) f(x); def g(x) x * 2;").unwrap();
        let mut machine = Machine::new(&module, Limits::default());
        assert!(machine.call_function("f", &[1.0]).is_err());
        assert_eq!(machine.call_function("g", &[21.0]).unwrap(), Some(42.0));
    }
}
