//! Radar Command-Line Tool
//!
//! Rebuilds the Astroluna matrix and refreshes every downstream table that
//! can be populated from it.

mod args;
mod error;
mod executor;
mod formatter;
mod report;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use args::Args;
use error::CliError;
use formatter::create_formatter;

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "radar=info,radar_core=info";

/// Exit status when some tables failed but the run completed.
const EXIT_PARTIAL: i32 = 2;

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<i32, CliError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting radar");

    let formatter = create_formatter(args.format);
    let outcome = executor::execute(&args)?;

    println!("{}", formatter.format_run(&outcome));

    if let Some(path) = &args.report {
        report::write_report_file(path, &outcome.report)?;
    }

    match outcome.report.partial_run_error() {
        Some(e) => {
            eprintln!("Error: {}", e);
            Ok(EXIT_PARTIAL)
        }
        None => Ok(0),
    }
}
