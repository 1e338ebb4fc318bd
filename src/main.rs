//! awlower
//!
//! Command-line driver for the async/await lowering pass.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use aw_lower::backend::{CodeGen, CppCodeGen};
use aw_lower::feedback::LoweringFeedback;
use aw_lower::frontend;
use aw_lower::middle::{LowerOptions, Lowerer, LoweringStats};
use aw_lower::utils::{Error, EXIT_PARSE};

/// async/await lowering tool
#[derive(Parser, Debug)]
#[command(name = "awlower")]
#[command(author = "Z1529")]
#[command(version)]
#[command(about = "Lowers async functions, async lambdas and await expressions to std::async and std::future")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Function treated as the synchronous entry point
    #[arg(long, global = true, value_name = "NAME", default_value = "main")]
    entry: String,

    /// How results and errors are reported on stderr
    #[arg(long, global = true, value_enum, default_value_t = MessageFormat::Human)]
    message_format: MessageFormat,

    /// Debug logging, and dump the parsed AST to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Lower a source file
    Lower {
        /// Input source file
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Parse and validate a source file without lowering it
    Check {
        /// Input source file
        input: PathBuf,
    },
}

impl Commands {
    fn input(&self) -> &Path {
        match self {
            Commands::Lower { input, .. } | Commands::Check { input } => input.as_path(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum MessageFormat {
    Human,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(&cli);
    report(&result, &cli.command.input().display().to_string(), cli.message_format);

    let code = exit_code(&result);
    if code != 0 {
        process::exit(code);
    }
}

/// Print the outcome of a run on stderr
fn report(result: &anyhow::Result<Option<LoweringStats>>, source_file: &str, format: MessageFormat) {
    match result {
        Ok(stats) => {
            if format == MessageFormat::Json {
                eprintln!("{}", LoweringFeedback::success(source_file.to_string(), *stats).to_json());
            }
        }
        Err(err) => match (err.downcast_ref::<Error>(), format) {
            (Some(error), MessageFormat::Human) => eprintln!("{}", error.diagnostic()),
            (Some(error), MessageFormat::Json) => {
                eprintln!("{}", LoweringFeedback::failure(source_file.to_string(), error).to_json())
            }
            (None, _) => eprintln!("error: {:#}", err),
        },
    }
}

/// 0 on success, the error's own code for lowering errors, 1 for anything else
fn exit_code<T>(result: &anyhow::Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => err.downcast_ref::<Error>().map_or(EXIT_PARSE, Error::exit_code),
    }
}

/// `warn` by default, `debug` with `--verbose`; `RUST_LOG` wins over both
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<Option<LoweringStats>> {
    let options = LowerOptions {
        entry_point: cli.entry.clone(),
    };

    match &cli.command {
        Commands::Lower { input, output } => {
            let stats = lower_file(input, output.as_deref(), &options, cli.verbose)?;
            Ok(Some(stats))
        }
        Commands::Check { input } => {
            let source = read_source(input)?;
            let census = aw_lower::check(&source, &options)?;
            info!(
                "{}: {} async function(s), {} async lambda(s), {} await(s)",
                input.display(),
                census.async_functions,
                census.async_lambdas,
                census.awaits
            );
            Ok(None)
        }
    }
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn lower_file(input: &Path, output: Option<&Path>, options: &LowerOptions, verbose: bool) -> anyhow::Result<LoweringStats> {
    let source = read_source(input)?;

    let program = frontend::parse(&source)?;
    debug!("parsed {} item(s) from {}", program.items.len(), input.display());
    if verbose {
        eprintln!("{:#?}", program);
    }

    let (program, stats) = Lowerer::new(options).lower(program)?;
    info!(
        "lowered {} function(s), {} lambda(s), {} await(s)",
        stats.functions, stats.lambdas, stats.awaits
    );

    let mut codegen = CppCodeGen::new();
    let text = codegen.generate_source(&program);
    debug!("{} backend produced {} bytes", codegen.name(), text.len());

    match output {
        Some(path) => {
            fs::write(path, &text).with_context(|| format!("failed to write {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => print!("{}", text),
    }

    Ok(stats)
}
