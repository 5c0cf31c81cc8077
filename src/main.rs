//! Lottery - unified CLI entrypoint.
//!
//! Usage:
//!   lottery run --time-scale 0.0333
//!   lottery serve --config config/lottery.toml --bind 0.0.0.0:5000
//!   lottery check --json

use anyhow::Result;
use clap::Parser;
use lottery::cli::commands::{run_check, run_run, run_serve};
use lottery::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_run(args).await,
        Commands::Serve(args) => run_serve(args).await,
        Commands::Check(args) => run_check(args),
    }
}
