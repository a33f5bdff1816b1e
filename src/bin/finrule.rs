use clap::{Parser, Subcommand};
use finrule::{
    config::{self, EngineConfig},
    error::{RuleError, RuleResult},
    RuleEngine, Variables,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to an engine config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a rule file and print the execution report
    Run(RunArgs),

    /// Check a rule file for syntax errors and warnings
    Check(FileArgs),

    /// Format a rule file
    Fmt(FmtArgs),

    /// Print structural metrics of a rule file
    Analyze(FileArgs),
}

#[derive(Parser)]
struct RunArgs {
    /// Path to the rule file
    file: PathBuf,

    /// Initial variables (JSON object)
    #[arg(long)]
    vars: Option<PathBuf>,

    /// Record call entry and exit in the report
    #[arg(long)]
    trace: bool,

    /// Keep going after a failing top-level statement
    #[arg(long)]
    continue_on_error: bool,
}

#[derive(Parser)]
struct FileArgs {
    /// Path to the rule file
    file: PathBuf,
}

#[derive(Parser)]
struct FmtArgs {
    /// Path to the rule file to format
    file: PathBuf,

    /// Write formatted output to stdout instead of modifying the file
    #[arg(short, long)]
    stdout: bool,
}

fn load_config(path: Option<&Path>) -> RuleResult<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path),
        None => Ok(EngineConfig::default()),
    }
}

fn read_source(path: &Path) -> RuleResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        RuleError::config(format!("failed to read {}: {}", path.display(), e))
    })
}

fn print_json<T: Serialize>(value: &T) -> RuleResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| RuleError::config(format!("failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Returns whether the command succeeded.
async fn run(cli: &Cli) -> RuleResult<bool> {
    let mut engine_config = load_config(cli.config.as_deref())?;
    debug!("config: {:?}", engine_config);

    match &cli.command {
        Commands::Run(args) => {
            if args.trace {
                engine_config.execution.trace = true;
            }
            if args.continue_on_error {
                engine_config.execution.continue_on_error = true;
            }
            let variables: Variables = match &args.vars {
                Some(path) => config::from_file(path)?,
                None => Variables::new(),
            };
            let engine = RuleEngine::new(engine_config);
            let source = read_source(&args.file)?;
            let report = engine.run(&source, variables).await?;
            info!(status = %report.status, elapsed_ms = report.elapsed_ms, "run finished");
            print_json(&report)?;
            Ok(report.success)
        }
        Commands::Check(args) => {
            let engine = RuleEngine::new(engine_config);
            let validation = engine.validate(&read_source(&args.file)?);
            print_json(&validation)?;
            Ok(validation.valid)
        }
        Commands::Fmt(args) => {
            let engine = RuleEngine::new(engine_config);
            let formatted = engine.format(&read_source(&args.file)?)?;
            if args.stdout {
                print!("{}", formatted);
            } else {
                std::fs::write(&args.file, formatted)?;
            }
            Ok(true)
        }
        Commands::Analyze(args) => {
            let engine = RuleEngine::new(engine_config);
            print_json(&engine.analyze(&read_source(&args.file)?)?)?;
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
