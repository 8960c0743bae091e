//! Upserter binary.
//!
//! Loads a CSV file of current positions, upserts it into a versioned table and
//! optionally rewrites a per-group aggregate file from the new version.

use clap::{Parser, Subcommand};
use telemetry::init_tracing;
use tracing::error;

use crate::configuration::load_upserter_config;
use crate::core::start_upserter_with_config;

mod aggregate;
mod configuration;
mod core;
mod source;

/// Upserts change data into a versioned table.
#[derive(Parser, Debug)]
#[command(name = "upserter")]
#[command(about = "Upserts a CSV snapshot into a versioned table")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Bootstraps or merges the configured source file (default)
    Run,
    /// Prints the most recent versions of the table, newest first
    History {
        /// Maximum number of versions to print
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_upserter_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_upserter_with_config(
            config,
            args.command.unwrap_or(Command::Run),
        ));

    if let Err(err) = &result {
        error!(error = %err, "upserter failed");
    }

    result
}
