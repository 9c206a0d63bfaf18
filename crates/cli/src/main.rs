//! PatternWatch CLI - Main Entry Point

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use patternwatch_cli::commands::{self, case, category, compare, gc, pattern, run, session};
use patternwatch_cli::config::PatternWatchConfig;
use patternwatch_cli::output::{self, print_error};

/// PatternWatch - visual regression checks with blind regions
#[derive(Parser)]
#[command(name = "patternwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "PATTERNWATCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Store directory, overrides the configured path
    #[arg(long, env = "PATTERNWATCH_STORE", global = true)]
    store: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage categories
    #[command(subcommand)]
    Category(category::CategoryCommands),

    /// Manage test cases
    #[command(subcommand)]
    Case(case::CaseCommands),

    /// Manage browser patterns and their blind regions
    #[command(subcommand)]
    Pattern(pattern::PatternCommands),

    /// Compare one screenshot against a pattern
    Compare(compare::CompareArgs),

    /// Check a directory of screenshots against a category
    Run(run::RunArgs),

    /// Inspect past runs
    #[command(subcommand)]
    Session(session::SessionCommands),

    /// Remove stored artifacts no result refers to
    Gc,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    if let Commands::Version = cli.command {
        println!("PatternWatch CLI v{}", patternwatch_common::VERSION);
        println!("Store: {}", patternwatch_common::default_store_path().display());
        return Ok(());
    }

    let config_path = cli
        .config
        .unwrap_or_else(patternwatch_common::default_config_path);
    let mut config = PatternWatchConfig::load(&config_path)?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }

    let ctx = commands::Context::open(config)?;

    match cli.command {
        Commands::Category(cmd) => category::execute(cmd, &ctx, cli.format)?,
        Commands::Case(cmd) => case::execute(cmd, &ctx, cli.format)?,
        Commands::Pattern(cmd) => pattern::execute(cmd, &ctx, cli.format)?,
        Commands::Compare(args) => {
            if !compare::execute(args, &ctx, cli.format)? {
                print_error("Screenshot does not match the pattern");
                std::process::exit(1);
            }
        }
        Commands::Run(args) => {
            if !run::execute(args, &ctx, cli.format).await? {
                print_error("Some screenshots do not match their patterns");
                std::process::exit(1);
            }
        }
        Commands::Session(cmd) => session::execute(cmd, &ctx, cli.format).await?,
        Commands::Gc => gc::execute(&ctx, cli.format).await?,
        Commands::Version => {}
    }

    Ok(())
}
