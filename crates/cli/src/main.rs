//! AnonCheck CLI - Main Entry Point
//!
//! Drives the customer-lookup application in a reference and an anonymized
//! deployment and reports, per record, whether anonymization holds.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use anoncheck_common::AppConfig;

mod commands;
mod output;

use commands::{check_ids, init_config, report, run, status};

/// Exit code for a run that could not complete
const EXIT_FATAL: i32 = 2;

/// AnonCheck - cross-environment anonymization validator
#[derive(Parser)]
#[command(name = "anoncheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "anoncheck.toml", env = "ANONCHECK_CONFIG", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the record source against both environments
    Run(run::RunArgs),

    /// Regenerate the spreadsheet and dashboard from a ledger
    Report(report::ReportArgs),

    /// Show ledger totals and failed records
    Status(status::StatusArgs),

    /// Check the identifier check digits in the record source
    CheckIds,

    /// Write a default configuration file
    InitConfig(init_config::InitConfigArgs),

    /// Show version information
    Version,
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(path)?;
    config.apply_env()?;
    Ok(config)
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Commands::Run(args) => run::execute(args, load_config(&cli.config)?, format).await,
        Commands::Report(args) => report::execute(args, &load_config(&cli.config)?).await,
        Commands::Status(args) => status::execute(args, &load_config(&cli.config)?, format).await,
        Commands::CheckIds => check_ids::execute(&load_config(&cli.config)?, format).await,
        Commands::InitConfig(args) => init_config::execute(args, cli.config).await,
        Commands::Version => {
            println!("AnonCheck CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Core library v{}", anoncheck_common::VERSION);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let fatal_code = match cli.command {
        Commands::Run(_) => EXIT_FATAL,
        _ => 1,
    };

    if let Err(e) = dispatch(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(fatal_code);
    }
}
