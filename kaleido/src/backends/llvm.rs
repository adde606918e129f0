use std::collections::HashMap;
use std::fmt::Write;

use crate::ir::{Block, BlockId, Function, InstrKind, Module, Terminator, Type, Value, ValueId};

use super::Backend;

/// Textual LLVM IR with opaque pointers, accepted by `lli` / `llc` 15+.
pub struct LlvmBackend;

impl Backend for LlvmBackend {
    fn render(&self, module: &Module) -> String {
        let mut out = String::new();
        // Запись в String не может завершиться ошибкой
        let _ = write_module(&mut out, module);
        out
    }
}

fn write_module(out: &mut String, module: &Module) -> std::fmt::Result {
    writeln!(out, "; ModuleID = '{}'", module.name)?;
    writeln!(out, "source_filename = \"{}\"", module.name)?;

    if !module.globals.is_empty() {
        writeln!(out)?;
    }
    for global in &module.globals {
        writeln!(
            out,
            "@{} = private unnamed_addr constant [{} x i8] c\"{}\\00\"",
            global_name(&global.name),
            global.bytes.len() + 1,
            escape_bytes(&global.bytes)
        )?;
    }

    for function in &module.functions {
        writeln!(out)?;
        if function.is_declaration() {
            write_declaration(out, function)?;
        } else {
            FunctionWriter::new(module, function).write(out)?;
        }
    }

    Ok(())
}

fn write_declaration(out: &mut String, function: &Function) -> std::fmt::Result {
    writeln!(
        out,
        "declare {} @{}({})",
        function.ret,
        function.name,
        signature_params(function)
    )
}

/// `double, double` или `ptr, ...`
fn signature_params(function: &Function) -> String {
    let mut params: Vec<String> = function.params.iter().map(|p| p.ty.to_string()).collect();
    if function.variadic {
        params.push("...".to_string());
    }
    params.join(", ")
}

struct FunctionWriter<'a> {
    module: &'a Module,
    function: &'a Function,
    names: HashMap<ValueId, String>,
    types: HashMap<ValueId, Type>,
}

impl<'a> FunctionWriter<'a> {
    fn new(module: &'a Module, function: &'a Function) -> Self {
        let mut names = HashMap::new();
        let mut types = HashMap::new();

        // Параметры, временные значения и метки делят одно пространство имён.
        // Точки нет ни в идентификаторах, ни в метках, поэтому `x.0` ни с чем не совпадёт.
        for (index, param) in function.params.iter().enumerate() {
            names.insert(param.id, format!("{}.{}", param.name, index));
            types.insert(param.id, param.ty);
        }

        for instruction in function.blocks.iter().flat_map(|b| &b.instructions) {
            let Some(result) = instruction.result else {
                continue;
            };
            let ty = match &instruction.kind {
                InstrKind::FCmpOne(..) => Type::Bool,
                InstrKind::Call { callee, .. } => {
                    module.function(callee).map_or(Type::Double, |f| f.ret)
                }
                InstrKind::Binary(..) | InstrKind::Phi(_) => Type::Double,
            };
            names.insert(result, format!("v{}", result.0));
            types.insert(result, ty);
        }

        Self {
            module,
            function,
            names,
            types,
        }
    }

    fn write(&self, out: &mut String) -> std::fmt::Result {
        let params: Vec<String> = self
            .function
            .params
            .iter()
            .map(|p| format!("{} %{}", p.ty, self.names[&p.id]))
            .collect();
        writeln!(
            out,
            "define {} @{}({}) {{",
            self.function.ret,
            self.function.name,
            params.join(", ")
        )?;

        for (index, block) in self.function.blocks.iter().enumerate() {
            if index > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{}:", block.label())?;
            for instruction in &block.instructions {
                write!(out, "  ")?;
                if let Some(result) = instruction.result {
                    write!(out, "%{} = ", self.names[&result])?;
                }
                self.write_instruction(out, &instruction.kind)?;
                writeln!(out)?;
            }
            if let Some(terminator) = &block.terminator {
                write!(out, "  ")?;
                self.write_terminator(out, terminator)?;
                writeln!(out)?;
            }
        }

        writeln!(out, "}}")
    }

    fn write_instruction(&self, out: &mut String, kind: &InstrKind) -> std::fmt::Result {
        match kind {
            InstrKind::Binary(op, lhs, rhs) => write!(
                out,
                "{} double {}, {}",
                op.mnemonic(),
                self.operand(*lhs),
                self.operand(*rhs)
            ),
            InstrKind::FCmpOne(lhs, rhs) => write!(
                out,
                "fcmp one double {}, {}",
                self.operand(*lhs),
                self.operand(*rhs)
            ),
            InstrKind::Call { callee, args } => {
                let args: Vec<String> = args
                    .iter()
                    .map(|arg| format!("{} {}", self.type_of(*arg), self.operand(*arg)))
                    .collect();
                match self.module.function(callee) {
                    Some(target) if target.variadic => write!(
                        out,
                        "call {} ({}) @{}({})",
                        target.ret,
                        signature_params(target),
                        callee,
                        args.join(", ")
                    ),
                    target => write!(
                        out,
                        "call {} @{}({})",
                        target.map_or(Type::Double, |f| f.ret),
                        callee,
                        args.join(", ")
                    ),
                }
            }
            InstrKind::Phi(incoming) => {
                let incoming: Vec<String> = incoming
                    .iter()
                    .map(|(value, block)| {
                        format!("[ {}, %{} ]", self.operand(*value), self.label(*block))
                    })
                    .collect();
                write!(out, "phi double {}", incoming.join(", "))
            }
        }
    }

    fn write_terminator(&self, out: &mut String, terminator: &Terminator) -> std::fmt::Result {
        match terminator {
            Terminator::Ret(None) => write!(out, "ret void"),
            Terminator::Ret(Some(value)) => {
                write!(out, "ret {} {}", self.type_of(*value), self.operand(*value))
            }
            Terminator::Br(target) => write!(out, "br label %{}", self.label(*target)),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => write!(
                out,
                "br i1 {}, label %{}, label %{}",
                self.operand(*cond),
                self.label(*then_block),
                self.label(*else_block)
            ),
        }
    }

    fn operand(&self, value: Value) -> String {
        match value {
            // Точное представление double в hex, как в выводе самого LLVM
            Value::Const(number) => format!("0x{:016X}", number.to_bits()),
            Value::Local(id) => match self.names.get(&id) {
                Some(name) => format!("%{}", name),
                None => format!("%v{}", id.0),
            },
            Value::Global(index) => match self.module.globals.get(index) {
                Some(global) => format!("@{}", global_name(&global.name)),
                None => format!("@global.{}", index),
            },
        }
    }

    fn type_of(&self, value: Value) -> Type {
        match value {
            Value::Const(_) => Type::Double,
            Value::Local(id) => self.types.get(&id).copied().unwrap_or(Type::Double),
            Value::Global(_) => Type::Ptr,
        }
    }

    fn label(&self, block: BlockId) -> String {
        self.function
            .block(block)
            .map_or_else(|| format!("bb{}", block.0), Block::label)
    }
}

/// Глобальные строки начинаются с точки, чтобы не совпасть с именем функции
fn global_name(name: &str) -> String {
    format!(".{}", name)
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut escaped = String::new();
    for &byte in bytes {
        if (byte.is_ascii_graphic() && byte != b'"' && byte != b'\\') || byte == b' ' {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("\\{:02X}", byte));
        }
    }
    escaped
}
