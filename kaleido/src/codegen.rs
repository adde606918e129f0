use std::collections::HashMap;

use log::{debug, trace};

use crate::error::CompileError;
use crate::ir::ast;
use crate::ir::builder::FunctionBuilder;
use crate::ir::{BinaryOp, Function, Module, Param, Type, Value, ValueId};

pub const MODULE_NAME: &str = "main";
/// Синтетическая функция, которая вычисляет и печатает выражения верхнего уровня
pub const ENTRY_FUNCTION: &str = "main";
pub const PRINTF: &str = "printf";
pub const PRINT_FORMAT: &str = "%f\n";
const PRINT_FORMAT_GLOBAL: &str = "fmt";

pub fn generate(program: &ast::Program) -> Result<Module, CompileError> {
    CodeGenerator::new(program).generate()
}

/// Параметры текущей функции. Живёт ровно одну функцию, вложенных областей нет.
#[derive(Debug, Default)]
struct Scope {
    values: HashMap<String, Value>,
}

impl Scope {
    fn for_prototype(prototype: &ast::Prototype) -> Self {
        let values = prototype
            .params
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), Value::Local(ValueId(index as u32))))
            .collect();
        Self { values }
    }

    fn lookup(&self, name: &str) -> Result<Value, CompileError> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::UnknownVariable {
                name: name.to_string(),
            })
    }
}

pub struct CodeGenerator<'a> {
    program: &'a ast::Program,
    module: Module,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(program: &'a ast::Program) -> Self {
        Self {
            program,
            module: Module::new(MODULE_NAME, ENTRY_FUNCTION),
        }
    }

    pub fn generate(mut self) -> Result<Module, CompileError> {
        let program = self.program;

        for prototype in &program.externs {
            self.emit_prototype(prototype)?;
        }
        for definition in &program.definitions {
            self.emit_definition(definition)?;
        }
        self.emit_main()?;

        debug!(
            "generated module '{}' with {} function(s)",
            self.module.name,
            self.module.functions.len()
        );
        Ok(self.module)
    }

    /// Объявляет функцию один раз; повторный запрос возвращает уже объявленную
    fn emit_prototype(&mut self, prototype: &ast::Prototype) -> Result<(), CompileError> {
        if prototype.name == ENTRY_FUNCTION {
            return Err(CompileError::InvalidModule {
                message: format!("'{}' is reserved for the entry routine", ENTRY_FUNCTION),
            });
        }
        // printf объявляется самим генератором как i32 (ptr, ...)
        if prototype.name == PRINTF {
            return Err(CompileError::InvalidModule {
                message: format!("'{}' is reserved for printing top-level values", PRINTF),
            });
        }

        if let Some(existing) = self.module.function(&prototype.name) {
            if existing.arity() != prototype.params.len() {
                return Err(CompileError::ArityMismatch {
                    name: prototype.name.clone(),
                    expected: existing.arity(),
                    got: prototype.params.len(),
                });
            }
            return Ok(());
        }

        trace!("declare {}({})", prototype.name, prototype.params.join(", "));
        self.module
            .add_function(Function::numeric(&prototype.name, &prototype.params));
        Ok(())
    }

    fn emit_definition(&mut self, definition: &ast::Definition) -> Result<(), CompileError> {
        let prototype = &definition.prototype;
        self.emit_prototype(prototype)?;

        let already_defined = self
            .module
            .function(&prototype.name)
            .is_some_and(|function| !function.is_declaration());
        if already_defined {
            return Err(CompileError::InvalidModule {
                message: format!("function '{}' is defined more than once", prototype.name),
            });
        }

        let scope = Scope::for_prototype(prototype);
        let mut builder = FunctionBuilder::new(prototype.params.len());
        let entry = builder.append_block("entry");
        builder.position_at_end(entry);

        let body = self.emit_expr(&definition.body, &scope, &mut builder)?;
        builder.build_ret(body);

        match self.module.function_mut(&prototype.name) {
            Some(function) => {
                builder.finish(function);
                debug!(
                    "emitted {} with {} block(s)",
                    prototype.name,
                    function.blocks.len()
                );
                Ok(())
            }
            None => Err(CompileError::UnknownFunction {
                name: prototype.name.clone(),
            }),
        }
    }

    fn emit_main(&mut self) -> Result<(), CompileError> {
        if self.module.function(ENTRY_FUNCTION).is_some() {
            return Err(CompileError::InvalidModule {
                message: format!("'{}' is reserved for the entry routine", ENTRY_FUNCTION),
            });
        }

        let format = self
            .module
            .add_global_string(PRINT_FORMAT_GLOBAL, PRINT_FORMAT);
        self.emit_printf();

        let scope = Scope::default();
        let mut builder = FunctionBuilder::new(0);
        let entry = builder.append_block("entry");
        builder.position_at_end(entry);

        let program = self.program;
        for expr in &program.expressions {
            let value = self.emit_expr(expr, &scope, &mut builder)?;
            builder.build_call(PRINTF, vec![format, value]);
        }
        builder.build_ret_void();

        let mut main = Function::numeric(ENTRY_FUNCTION, &[]);
        main.ret = Type::Void;
        builder.finish(&mut main);
        self.module.add_function(main);

        debug!("emitted entry with {} top-level expression(s)", program.expressions.len());
        Ok(())
    }

    fn emit_printf(&mut self) {
        if self.module.function(PRINTF).is_some() {
            return;
        }

        self.module.add_function(Function {
            name: PRINTF.to_string(),
            params: vec![Param {
                name: "format".to_string(),
                ty: Type::Ptr,
                id: ValueId(0),
            }],
            ret: Type::I32,
            variadic: true,
            blocks: Vec::new(),
        });
    }

    fn emit_expr(
        &mut self,
        expr: &ast::Expression,
        scope: &Scope,
        builder: &mut FunctionBuilder,
    ) -> Result<Value, CompileError> {
        match expr {
            ast::Expression::Number(value) => Ok(Value::Const(*value)),
            ast::Expression::Variable(name) => scope.lookup(name),
            ast::Expression::Call { callee, args } => self.emit_call(callee, args, scope, builder),
            ast::Expression::BinaryOp { left, op, right } => {
                let lhs = self.emit_expr(left, scope, builder)?;
                let rhs = self.emit_expr(right, scope, builder)?;
                Ok(builder.build_binary(binary_op(*op), lhs, rhs))
            }
            ast::Expression::IfElse {
                condition,
                then_branch,
                else_branch,
            } => self.emit_if_else(condition, then_branch, else_branch, scope, builder),
        }
    }

    fn emit_call(
        &mut self,
        callee: &str,
        args: &[ast::Expression],
        scope: &Scope,
        builder: &mut FunctionBuilder,
    ) -> Result<Value, CompileError> {
        let program = self.program;
        let prototype = program
            .prototype(callee)
            .ok_or_else(|| CompileError::UnknownFunction {
                name: callee.to_string(),
            })?;

        if prototype.params.len() != args.len() {
            return Err(CompileError::ArityMismatch {
                name: callee.to_string(),
                expected: prototype.params.len(),
                got: args.len(),
            });
        }

        self.emit_prototype(prototype)?;

        // Аргументы слева направо
        let values = args
            .iter()
            .map(|arg| self.emit_expr(arg, scope, builder))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(builder.build_call(callee, values))
    }

    /// cond != 0 -> then / else -> merge с phi. В phi попадают блоки, которыми
    /// закончились ветки: вложенный if уводит ветку в свой merge.
    fn emit_if_else(
        &mut self,
        condition: &ast::Expression,
        then_branch: &ast::Expression,
        else_branch: &ast::Expression,
        scope: &Scope,
        builder: &mut FunctionBuilder,
    ) -> Result<Value, CompileError> {
        let cond = self.emit_expr(condition, scope, builder)?;
        let not_zero = builder.build_fcmp_one(cond, Value::Const(0.0));

        let then_block = builder.append_block("then");
        let else_block = builder.append_block("else");
        let merge_block = builder.append_block("merge");

        builder.build_cond_br(not_zero, then_block, else_block);

        builder.position_at_end(then_block);
        let then_value = self.emit_expr(then_branch, scope, builder)?;
        let then_end = builder.current_block().unwrap_or(then_block);
        builder.build_br(merge_block);

        builder.position_at_end(else_block);
        let else_value = self.emit_expr(else_branch, scope, builder)?;
        let else_end = builder.current_block().unwrap_or(else_block);
        builder.build_br(merge_block);

        builder.position_at_end(merge_block);
        Ok(builder.build_phi(vec![(then_value, then_end), (else_value, else_end)]))
    }
}

fn binary_op(op: ast::BinaryOperator) -> BinaryOp {
    match op {
        ast::BinaryOperator::Add => BinaryOp::FAdd,
        ast::BinaryOperator::Subtract => BinaryOp::FSub,
        ast::BinaryOperator::Multiply => BinaryOp::FMul,
        ast::BinaryOperator::Divide => BinaryOp::FDiv,
        ast::BinaryOperator::Remainder => BinaryOp::FRem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{InstrKind, Terminator};
    use crate::parser::parse;

    fn generate_source(source: &str) -> Result<Module, CompileError> {
        generate(&parse(source)?)
    }

    #[test]
    fn definition_returns_body_value() {
        let module = generate_source("def add(a, b) a + b;").unwrap();
        let add = module.function("add").unwrap();
        assert_eq!(add.blocks.len(), 1);
        let block = &add.blocks[0];
        assert_eq!(
            block.instructions[0].kind,
            InstrKind::Binary(
                BinaryOp::FAdd,
                Value::Local(ValueId(0)),
                Value::Local(ValueId(1))
            )
        );
        assert_eq!(
            block.terminator,
            Some(Terminator::Ret(Some(Value::Local(ValueId(2)))))
        );
    }

    #[test]
    fn parameters_do_not_leak_between_functions() {
        let err = generate_source("def f(x) x; def g(y) x;").unwrap_err();
        assert!(matches!(err, CompileError::UnknownVariable { ref name } if name == "x"));
    }

    #[test]
    fn top_level_cannot_see_parameters() {
        let err = generate_source("def f(x) x; x;").unwrap_err();
        assert!(matches!(err, CompileError::UnknownVariable { .. }));
    }

    #[test]
    fn if_else_creates_blocks_in_order() {
        let module = generate_source("def f(x) if x then 1 else 2;").unwrap();
        let f = module.function("f").unwrap();
        let names: Vec<_> = f.blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["entry", "then", "else", "merge"]);

        let merge = &f.blocks[3];
        assert_eq!(
            merge.instructions[0].kind,
            InstrKind::Phi(vec![
                (Value::Const(1.0), f.blocks[1].id),
                (Value::Const(2.0), f.blocks[2].id),
            ])
        );
    }

    #[test]
    fn nested_if_phi_uses_inner_merge_block() {
        let module =
            generate_source("def f(x) if x then (if x then 1 else 2) else 3;").unwrap();
        let f = module.function("f").unwrap();
        let outer_merge = f.blocks.iter().find(|b| b.label() == "merge3").unwrap();
        match &outer_merge.instructions[0].kind {
            InstrKind::Phi(incoming) => {
                assert_eq!(f.block(incoming[0].1).unwrap().label(), "merge6");
                assert_eq!(f.block(incoming[1].1).unwrap().label(), "else2");
            }
            other => panic!("expected phi, got {other:?}"),
        }
    }

    #[test]
    fn main_name_is_reserved() {
        let err = generate_source("def main() 1;").unwrap_err();
        assert!(matches!(err, CompileError::InvalidModule { .. }));
    }

    #[test]
    fn printf_name_is_reserved() {
        let err = generate_source("extern printf(a, b); printf(1, 2);").unwrap_err();
        assert!(matches!(err, CompileError::InvalidModule { ref message } if message.contains("printf")));
        let err = generate_source("def printf(x) x;").unwrap_err();
        assert!(matches!(err, CompileError::InvalidModule { .. }));
    }

    #[test]
    fn extern_and_definition_disagreeing_on_arity() {
        let err = generate_source("extern foo(x); def foo(a, b) a;").unwrap_err();
        assert!(matches!(
            err,
            CompileError::ArityMismatch { expected: 1, got: 2, .. }
        ));
    }

    #[test]
    fn extern_then_definition_defines_once() {
        let module = generate_source("extern foo(x); def foo(y) y * 2; foo(3);").unwrap();
        let count = module.functions.iter().filter(|f| f.name == "foo").count();
        assert_eq!(count, 1);
        assert!(!module.function("foo").unwrap().is_declaration());
    }

    #[test]
    fn duplicate_definition_is_rejected() {
        let err = generate_source("def f(x) x; def f(y) y;").unwrap_err();
        assert!(matches!(err, CompileError::InvalidModule { .. }));
    }
}
