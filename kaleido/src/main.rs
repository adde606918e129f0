use std::fs;
use std::process;

use clap::{Parser, Subcommand};
use log::info;

use kaleido::backends::BackendType;
use kaleido::{CompileError, parser};

#[derive(Parser)]
#[command(name = "kaleido")]
#[command(about = "Compiler frontend for a tiny expression language", version)]
struct Cli {
    /// Подробный лог (то же, что RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Компилирует исходник в выбранный формат IR
    Compile {
        /// Исходник
        input: String,

        /// Формат вывода: ir или llvm
        #[arg(short, long, default_value = "llvm")]
        target: String,

        /// Выходной файл; "-" пишет в stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Показать ast
        #[arg(long)]
        show_ast: bool,
    },

    /// Показать токены и ast без компиляции
    Parse {
        /// Исходник
        input: String,
    },

    /// Список поддерживаемых форматов
    Targets,
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn run(command: Commands) -> Result<(), CompileError> {
    match command {
        Commands::Compile { input, target, output, show_ast } => {
            let backend_type = BackendType::from_name(&target)?;
            info!("compiling {} for {}", input, backend_type.name());

            let source = fs::read_to_string(&input)?;
            let program = parser::parse(&source)?;

            if show_ast {
                println!("=== AST ===");
                println!("{:#?}", program);
            }

            let mut backend = backend_type.create();
            let code = backend.compile(&program)?;

            let output_path = match output {
                Some(path) => path,
                None => {
                    // Автоматическое имя: input.ll или input.kir
                    let base_name = input.trim_end_matches(".ks");
                    format!("{}.{}", base_name, backend_type.extension())
                }
            };

            if output_path == "-" {
                print!("{}", String::from_utf8_lossy(&code));
            } else {
                fs::write(&output_path, &code)?;
                println!("Compiled to: {}", output_path);
                println!("IR size: {} bytes", code.len());
            }
        }
        Commands::Parse { input } => {
            let source = fs::read_to_string(&input)?;

            println!("=== SOURCE ===");
            println!("{}", source);
            println!("=== TOKENS ===");

            for lexeme in parser::lexer::tokenize(&source)? {
                println!("{:>4}:{:<3} {}", lexeme.span.line, lexeme.span.column, lexeme.token);
            }

            println!("=== AST ===");
            let program = parser::parse(&source)?;
            println!("{:#?}", program);
        }
        Commands::Targets => {
            println!("Supported targets:");
            for backend in BackendType::all() {
                println!("  {:8} - {}", backend.name(), backend.description());
            }
        }
    }

    Ok(())
}
