//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Lottery - time-boxed registration window with a uniform random draw.
#[derive(Parser)]
#[command(name = "lottery")]
#[command(version)]
#[command(about = "Lottery registration window and draw")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a window and register participants from the terminal
    Run(RunArgs),

    /// Serve the HTTP endpoint
    Serve(ServeArgs),

    /// Validate configuration and print the effective window timing
    Check(CheckArgs),
}

// -----------------------------------------------------------------------------
// Shared options
// -----------------------------------------------------------------------------

#[derive(Args, Clone, Debug)]
pub struct CommonArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Multiplier applied to every window duration (0.0333 runs an hour in two minutes)
    #[arg(short = 's', long)]
    pub time_scale: Option<f64>,

    /// Audit log path
    #[arg(long, value_name = "PATH")]
    pub audit_log: Option<PathBuf>,

    /// Disable the audit log file
    #[arg(long)]
    pub no_audit: bool,

    /// Fixed RNG seed for a reproducible draw
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log filter directive (e.g. "info", "lottery=debug")
    #[arg(long)]
    pub log_level: Option<String>,
}

// -----------------------------------------------------------------------------
// Run command
// -----------------------------------------------------------------------------

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

// -----------------------------------------------------------------------------
// Serve command
// -----------------------------------------------------------------------------

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Address for the HTTP endpoint
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Open a window immediately instead of waiting for POST /start
    #[arg(long)]
    pub autostart: bool,
}

// -----------------------------------------------------------------------------
// Check command
// -----------------------------------------------------------------------------

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Print the effective settings as JSON
    #[arg(long)]
    pub json: bool,
}
