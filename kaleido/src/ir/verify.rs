use std::collections::HashSet;

use log::debug;

use crate::error::CompileError;
use super::module::{BlockId, Function, InstrKind, Module, Terminator, Type, Value, ValueId};

/// Structural checks run before a module leaves the compiler.
pub fn verify(module: &Module) -> Result<(), CompileError> {
    let mut names = HashSet::new();
    for function in &module.functions {
        if !names.insert(function.name.as_str()) {
            return invalid(format!("function '{}' is declared twice", function.name));
        }
    }

    let entry = match module.entry_function() {
        Some(entry) => entry,
        None => return invalid(format!("entry function '{}' is missing", module.entry)),
    };
    if entry.is_declaration() || entry.arity() != 0 || entry.ret != Type::Void {
        return invalid(format!(
            "entry function '{}' must be defined as void() with a body",
            entry.name
        ));
    }

    for function in module.functions.iter().filter(|f| !f.is_declaration()) {
        verify_function(module, function)?;
    }

    debug!("module '{}' verified", module.name);
    Ok(())
}

fn verify_function(module: &Module, function: &Function) -> Result<(), CompileError> {
    let defined = defined_values(function)?;

    for (index, block) in function.blocks.iter().enumerate() {
        let context = || format!("'{}' block '{}'", function.name, block.label());

        if block.id.index() != index {
            return invalid(format!("{}: block id out of order", context()));
        }

        let Some(terminator) = &block.terminator else {
            return invalid(format!("{}: missing terminator", context()));
        };

        let predecessors = predecessors(function, block.id);
        let mut phis_done = false;
        for instruction in &block.instructions {
            for operand in instruction.kind.operands() {
                check_operand(module, &defined, operand, &context)?;
            }
            match &instruction.kind {
                InstrKind::Phi(incoming) => {
                    if phis_done {
                        return invalid(format!("{}: phi after a non-phi instruction", context()));
                    }
                    for (_, from) in incoming {
                        if !predecessors.contains(from) {
                            return invalid(format!(
                                "{}: phi incoming block bb{} is not a predecessor",
                                context(),
                                from.0
                            ));
                        }
                    }
                }
                InstrKind::Call { callee, args } => {
                    phis_done = true;
                    let Some(target) = module.function(callee) else {
                        return invalid(format!("{}: call to undeclared '{}'", context(), callee));
                    };
                    let arity_ok = if target.variadic {
                        args.len() >= target.arity()
                    } else {
                        args.len() == target.arity()
                    };
                    if !arity_ok {
                        return invalid(format!(
                            "{}: '{}' called with {} argument(s), declared with {}",
                            context(),
                            callee,
                            args.len(),
                            target.arity()
                        ));
                    }
                }
                _ => phis_done = true,
            }
        }

        match terminator {
            Terminator::Ret(value) => {
                if value.is_some() != (function.ret != Type::Void) {
                    return invalid(format!("{}: return does not match '{}'", context(), function.ret));
                }
                if let Some(value) = value {
                    check_operand(module, &defined, *value, &context)?;
                }
            }
            Terminator::Br(target) => check_target(function, *target, &context)?,
            Terminator::CondBr { cond, then_block, else_block } => {
                check_operand(module, &defined, *cond, &context)?;
                check_target(function, *then_block, &context)?;
                check_target(function, *else_block, &context)?;
            }
        }
    }

    Ok(())
}

fn defined_values(function: &Function) -> Result<HashSet<ValueId>, CompileError> {
    let mut defined: HashSet<ValueId> = function.params.iter().map(|param| param.id).collect();

    for block in &function.blocks {
        for result in block.instructions.iter().filter_map(|i| i.result) {
            if !defined.insert(result) {
                return invalid(format!("'{}': value {} defined twice", function.name, result));
            }
        }
    }

    Ok(defined)
}

fn predecessors(function: &Function, block: BlockId) -> Vec<BlockId> {
    function
        .blocks
        .iter()
        .filter(|candidate| {
            candidate
                .terminator
                .as_ref()
                .is_some_and(|t| t.successors().contains(&block))
        })
        .map(|candidate| candidate.id)
        .collect()
}

fn check_operand(
    module: &Module,
    defined: &HashSet<ValueId>,
    operand: Value,
    context: &dyn Fn() -> String,
) -> Result<(), CompileError> {
    match operand {
        Value::Const(_) => Ok(()),
        Value::Local(id) if defined.contains(&id) => Ok(()),
        Value::Local(id) => invalid(format!("{}: use of undefined value {}", context(), id)),
        Value::Global(index) if index < module.globals.len() => Ok(()),
        Value::Global(index) => invalid(format!("{}: unknown global {}", context(), index)),
    }
}

fn check_target(
    function: &Function,
    target: BlockId,
    context: &dyn Fn() -> String,
) -> Result<(), CompileError> {
    if function.block(target).is_none() {
        return invalid(format!("{}: branch to missing block bb{}", context(), target.0));
    }
    Ok(())
}

fn invalid<T>(message: String) -> Result<T, CompileError> {
    Err(CompileError::InvalidModule { message })
}
