//! CVKit E2E CLI - Main Entry Point
//!
//! Runs declarative UI suites against the browser-control service and
//! exits with 0 (all passed), 1 (a test failed) or 2 (the run could not
//! be carried out).

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{list, run};

/// CVKit end-to-end test runner
#[derive(Parser)]
#[command(name = "cvkit-e2e")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, env = "CVKIT_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run suites and report results
    Run(run::RunArgs),

    /// List suites or tests without running them
    List(list::ListArgs),
}

/// Exit code for failures outside any test
const INFRASTRUCTURE_ERROR: i32 = 2;

#[tokio::main]
async fn main() {
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

    let outcome = match cli.command {
        Commands::Run(args) => run::execute(args, cli.verbose).await,
        Commands::List(args) => list::execute(args).map(|_| 0),
    };

    let code = match outcome {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            INFRASTRUCTURE_ERROR
        }
    };
    std::process::exit(code);
}
