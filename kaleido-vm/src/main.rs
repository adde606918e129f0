use std::fs;
use std::process;

use clap::Parser;
use log::info;

use kaleido::CompileError;
use kaleido_vm::constants::{MAX_CALL_DEPTH, MAX_STEPS};
use kaleido_vm::{Limits, Machine, VmError};

#[derive(Parser)]
#[command(name = "kaleido-vm")]
#[command(about = "Compiles a Kaleido source file and executes the resulting IR", version)]
struct Args {
    /// Исходник
    input: String,

    /// Максимальная глубина вызовов
    #[arg(long, default_value_t = MAX_CALL_DEPTH)]
    max_depth: usize,

    /// Максимум выполненных инструкций
    #[arg(long, default_value_t = MAX_STEPS)]
    max_steps: u64,

    /// Напечатать IR перед запуском
    #[arg(long)]
    emit_ir: bool,

    /// Подробный лог (то же, что RUST_LOG=debug)
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    // Без аргумента clap печатает usage и завершает процесс с ненулевым кодом
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn run(args: &Args) -> Result<(), VmError> {
    let source = fs::read_to_string(&args.input).map_err(CompileError::from)?;
    info!("source '{}' loaded: {} bytes", args.input, source.len());

    let module = kaleido::compile(&source)?;
    if args.emit_ir {
        println!("{}", module);
    }

    let limits = Limits {
        max_depth: args.max_depth,
        max_steps: args.max_steps,
    };
    let mut machine = Machine::new(&module, limits).with_echo(true);
    machine.run()?;

    info!("execution finished after {} instruction(s)", machine.steps());
    Ok(())
}
