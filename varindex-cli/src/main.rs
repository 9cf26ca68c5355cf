//! VarIndex CLI - inspect and query a package library index.
//!
//! The index is built from a scan manifest (a JSON array of scan entries
//! produced by the package parser) together with the configured roots and
//! external destinations.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use varindex::logging::{init_logging, level_for_verbosity};

use commands::common::{load_config, open_index};
use commands::filter::FilterArgs;
use commands::query::QueryAction;
use commands::refresh::RefreshArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "varindex")]
#[command(version = varindex::VERSION)]
#[command(about = "Package library index: dependencies, duplicates and filters", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.varindex/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Scan manifest to build the index from
    #[arg(long, short, global = true, default_value = "manifest.json")]
    manifest: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print index totals
    Summary,

    /// Look up packages, dependencies and duplicates
    Query {
        #[command(subcommand)]
        action: QueryAction,
    },

    /// List packages matching a filter
    Filter(FilterArgs),

    /// Pick up file changes under the scan roots without a full rescan
    Refresh(RefreshArgs),
}

fn main() {
    let cli = Cli::parse();

    let _log_guard = match init_logging(level_for_verbosity(cli.verbose), cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;
    let index = open_index(config, &cli.manifest)?;
    tracing::info!(
        generation = index.generation(),
        records = index.snapshot().len(),
        "Index loaded"
    );

    match cli.command {
        Commands::Summary => commands::summary::run(&index),
        Commands::Query { action } => commands::query::run(&index, action),
        Commands::Filter(args) => commands::filter::run(&index, args),
        Commands::Refresh(args) => commands::refresh::run(&index, args),
    }
}
