use log::trace;

use kaleido::Module;

use crate::console::{Console, format_float};
use crate::constants::PRINTF_PRECISION;
use crate::error::RuntimeError;
use crate::machine::Slot;

/// Внешние функции, доступные без тела в модуле
pub const BUILTINS: [&str; 15] = [
    "printf", "sin", "cos", "tan", "sqrt", "exp", "log", "fabs", "floor", "ceil", "pow", "fmod",
    "atan2", "putchard", "printd",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Вызов встроенной функции по имени
pub fn call(
    name: &str,
    args: &[Slot],
    module: &Module,
    console: &mut Console,
) -> Result<f64, RuntimeError> {
    trace!("builtin {}({:?})", name, args);

    if name == "printf" {
        return printf(args, module, console);
    }

    let numbers: Vec<f64> = args.iter().map(|slot| slot.as_number()).collect();
    let unary = |f: fn(f64) -> f64| -> Result<f64, RuntimeError> {
        expect_arity(name, &numbers, 1)?;
        Ok(f(numbers[0]))
    };
    let binary = |f: fn(f64, f64) -> f64| -> Result<f64, RuntimeError> {
        expect_arity(name, &numbers, 2)?;
        Ok(f(numbers[0], numbers[1]))
    };

    match name {
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "sqrt" => unary(f64::sqrt),
        "exp" => unary(f64::exp),
        "log" => unary(f64::ln),
        "fabs" => unary(f64::abs),
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        "pow" => binary(f64::powf),
        "fmod" => binary(|a, b| a % b),
        "atan2" => binary(f64::atan2),
        "putchard" => {
            expect_arity(name, &numbers, 1)?;
            let ch = char::from(numbers[0] as u8);
            console.write(&ch.to_string());
            Ok(0.0)
        }
        "printd" => {
            expect_arity(name, &numbers, 1)?;
            console.write(&format!("{}\n", format_float(numbers[0], PRINTF_PRECISION)));
            console.record_value(numbers[0]);
            Ok(0.0)
        }
        _ => Err(RuntimeError::UnresolvedExternal {
            name: name.to_string(),
        }),
    }
}

/// Минимальный printf: `%f`, `%%`, остальное печатается как есть
fn printf(args: &[Slot], module: &Module, console: &mut Console) -> Result<f64, RuntimeError> {
    let format = match args.first() {
        Some(Slot::Global(index)) => module.globals.get(*index),
        _ => None,
    };
    let Some(format) = format else {
        return Err(RuntimeError::MalformedIr {
            function: "printf".to_string(),
            message: "first argument must be a format string".to_string(),
        });
    };

    let template = String::from_utf8_lossy(&format.bytes);
    let mut numbers = args[1..].iter().map(|slot| slot.as_number());
    let mut text = String::new();
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            text.push(ch);
            continue;
        }
        match chars.next() {
            Some('f') => {
                let value = numbers.next().ok_or_else(|| RuntimeError::BuiltinArity {
                    name: "printf".to_string(),
                    expected: args.len(),
                    got: args.len() - 1,
                })?;
                text.push_str(&format_float(value, PRINTF_PRECISION));
                console.record_value(value);
            }
            Some('%') => text.push('%'),
            Some(other) => {
                text.push('%');
                text.push(other);
            }
            None => text.push('%'),
        }
    }

    console.write(&text);
    Ok(text.len() as f64)
}

fn expect_arity(name: &str, args: &[f64], expected: usize) -> Result<(), RuntimeError> {
    if args.len() != expected {
        return Err(RuntimeError::BuiltinArity {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_with_format(format: &str) -> Module {
        let mut module = Module::new("test", "main");
        module.add_global_string("fmt", format);
        module
    }

    #[test]
    fn printf_formats_each_value() {
        let module = module_with_format("%f and %f%%\n");
        let mut console = Console::new(false);
        let written = call(
            "printf",
            &[Slot::Global(0), Slot::Number(1.0), Slot::Number(0.5)],
            &module,
            &mut console,
        )
        .unwrap();
        assert_eq!(console.text(), "1.000000 and 0.500000%\n");
        assert_eq!(console.values(), &[1.0, 0.5]);
        assert_eq!(written, 23.0);
    }

    #[test]
    fn math_builtins() {
        let module = module_with_format("");
        let mut console = Console::new(false);
        let pow = call("pow", &[Slot::Number(2.0), Slot::Number(10.0)], &module, &mut console);
        assert_eq!(pow.unwrap(), 1024.0);
        let fmod = call("fmod", &[Slot::Number(-7.0), Slot::Number(3.0)], &module, &mut console);
        assert_eq!(fmod.unwrap(), -1.0);
    }

    #[test]
    fn wrong_builtin_arity() {
        let module = module_with_format("");
        let mut console = Console::new(false);
        let err = call("sqrt", &[], &module, &mut console).unwrap_err();
        assert!(matches!(err, RuntimeError::BuiltinArity { expected: 1, got: 0, .. }));
    }

    #[test]
    fn putchard_writes_a_character() {
        let module = module_with_format("");
        let mut console = Console::new(false);
        call("putchard", &[Slot::Number(65.0)], &module, &mut console).unwrap();
        assert_eq!(console.text(), "A");
        assert!(console.values().is_empty());
    }

    #[test]
    fn unknown_external() {
        let module = module_with_format("");
        let mut console = Console::new(false);
        let err = call("launch", &[], &module, &mut console).unwrap_err();
        assert!(matches!(err, RuntimeError::UnresolvedExternal { .. }));
        assert!(!is_builtin("launch"));
    }
}
