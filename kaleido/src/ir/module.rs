//! SSA module: functions made of basic blocks, each block closed by exactly
//! one terminator. Every value is a `double` except comparison results (`i1`)
//! and the pointer to the format string handed to `printf`.

use std::fmt;

/// SSA-значение внутри функции (параметры получают первые номера)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Номер блока совпадает с его индексом в `Function::blocks`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Double,
    Bool,
    I32,
    Ptr,
    Void,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Double => write!(f, "double"),
            Type::Bool => write!(f, "i1"),
            Type::I32 => write!(f, "i32"),
            Type::Ptr => write!(f, "ptr"),
            Type::Void => write!(f, "void"),
        }
    }
}

/// Operand of an instruction or terminator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Const(f64),
    Local(ValueId),
    /// Index into `Module::globals`
    Global(usize),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Const(value) => write!(f, "{:?}", value),
            Value::Local(id) => write!(f, "{}", id),
            Value::Global(index) => write!(f, "@global.{}", index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
}

impl BinaryOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            BinaryOp::FAdd => "fadd",
            BinaryOp::FSub => "fsub",
            BinaryOp::FMul => "fmul",
            BinaryOp::FDiv => "fdiv",
            BinaryOp::FRem => "frem",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// None для call без значения
    pub result: Option<ValueId>,
    pub kind: InstrKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstrKind {
    Binary(BinaryOp, Value, Value),
    /// Ordered not-equal: false when either operand is NaN.
    FCmpOne(Value, Value),
    Call { callee: String, args: Vec<Value> },
    Phi(Vec<(Value, BlockId)>),
}

impl InstrKind {
    pub fn operands(&self) -> Vec<Value> {
        match self {
            InstrKind::Binary(_, lhs, rhs) | InstrKind::FCmpOne(lhs, rhs) => vec![*lhs, *rhs],
            InstrKind::Call { args, .. } => args.clone(),
            InstrKind::Phi(incoming) => incoming.iter().map(|(value, _)| *value).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Ret(Option<Value>),
    Br(BlockId),
    CondBr {
        cond: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Ret(_) => Vec::new(),
            Terminator::Br(target) => vec![*target],
            Terminator::CondBr { then_block, else_block, .. } => vec![*then_block, *else_block],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    pub instructions: Vec<Instruction>,
    /// None только пока блок строится
    pub terminator: Option<Terminator>,
}

impl Block {
    pub fn new(id: BlockId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            instructions: Vec::new(),
            terminator: None,
        }
    }

    /// Unique label inside the function: `entry`, `then1`, `merge3`.
    pub fn label(&self) -> String {
        if self.id.0 == 0 {
            self.name.clone()
        } else {
            format!("{}{}", self.name, self.id.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub id: ValueId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Type,
    pub variadic: bool,
    /// Пусто у объявлений (extern, printf)
    pub blocks: Vec<Block>,
}

impl Function {
    /// `double name(double, ...)` with one parameter per name.
    pub fn numeric(name: &str, params: &[String]) -> Self {
        let params = params
            .iter()
            .enumerate()
            .map(|(index, name)| Param {
                name: name.clone(),
                ty: Type::Double,
                id: ValueId(index as u32),
            })
            .collect();

        Self {
            name: name.to_string(),
            params,
            ret: Type::Double,
            variadic: false,
            blocks: Vec::new(),
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|block| block.instructions.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    /// Без завершающего нуля
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
    /// Единственная точка входа
    pub entry: String,
}

impl Module {
    pub fn new(name: &str, entry: &str) -> Self {
        Self {
            name: name.to_string(),
            globals: Vec::new(),
            functions: Vec::new(),
            entry: entry.to_string(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|function| function.name == name)
    }

    pub fn add_function(&mut self, function: Function) -> &Function {
        self.functions.push(function);
        &self.functions[self.functions.len() - 1]
    }

    pub fn add_global_string(&mut self, name: &str, text: &str) -> Value {
        if let Some(index) = self.globals.iter().position(|global| global.name == name) {
            return Value::Global(index);
        }
        self.globals.push(Global {
            name: name.to_string(),
            bytes: text.as_bytes().to_vec(),
        });
        Value::Global(self.globals.len() - 1)
    }

    pub fn entry_function(&self) -> Option<&Function> {
        self.function(&self.entry)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.name)?;
        for (index, global) in self.globals.iter().enumerate() {
            writeln!(
                f,
                "@global.{} = \"{}\" ; {}",
                index,
                global.bytes.escape_ascii(),
                global.name
            )?;
        }
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{}", function)?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.is_declaration() { "declare" } else { "define" };
        write!(f, "{} {} @{}(", keyword, self.ret, self.name)?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", param.ty, param.id)?;
        }
        if self.variadic {
            write!(f, ", ...")?;
        }
        write!(f, ")")?;

        if self.is_declaration() {
            return writeln!(f);
        }

        writeln!(f, " {{")?;
        for block in &self.blocks {
            writeln!(f, "{}:", block.label())?;
            for instruction in &block.instructions {
                writeln!(f, "  {}", DisplayInstr(instruction, self))?;
            }
            match &block.terminator {
                Some(terminator) => writeln!(f, "  {}", DisplayTerm(terminator, self))?,
                None => writeln!(f, "  <unterminated>")?,
            }
        }
        writeln!(f, "}}")
    }
}

struct DisplayInstr<'a>(&'a Instruction, &'a Function);

impl fmt::Display for DisplayInstr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let DisplayInstr(instruction, function) = self;
        if let Some(result) = instruction.result {
            write!(f, "{} = ", result)?;
        }
        match &instruction.kind {
            InstrKind::Binary(op, lhs, rhs) => write!(f, "{} {}, {}", op.mnemonic(), lhs, rhs),
            InstrKind::FCmpOne(lhs, rhs) => write!(f, "fcmp one {}, {}", lhs, rhs),
            InstrKind::Call { callee, args } => {
                write!(f, "call @{}(", callee)?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            InstrKind::Phi(incoming) => {
                write!(f, "phi ")?;
                for (index, (value, block)) in incoming.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    let label = function
                        .block(*block)
                        .map_or_else(|| format!("bb{}", block.0), Block::label);
                    write!(f, "[{}, %{}]", value, label)?;
                }
                Ok(())
            }
        }
    }
}

struct DisplayTerm<'a>(&'a Terminator, &'a Function);

impl fmt::Display for DisplayTerm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let DisplayTerm(terminator, function) = self;
        let label = |block: &BlockId| {
            function
                .block(*block)
                .map_or_else(|| format!("bb{}", block.0), Block::label)
        };
        match terminator {
            Terminator::Ret(None) => write!(f, "ret void"),
            Terminator::Ret(Some(value)) => write!(f, "ret {}", value),
            Terminator::Br(target) => write!(f, "br %{}", label(target)),
            Terminator::CondBr { cond, then_block, else_block } => write!(
                f,
                "br {}, %{}, %{}",
                cond,
                label(then_block),
                label(else_block)
            ),
        }
    }
}
