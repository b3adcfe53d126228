//! # CLI Interface
//!
//! Command-line argument structure for `ballot-server` using `clap`
//! derive. Most tuning lives in `BALLOT_*` environment variables (see
//! `ballot_core::config`); the flags here cover what an operator wants to
//! override per invocation.

use clap::{Parser, Subcommand};

/// Ballot election server.
///
/// Serves the society-election REST API: house and candidate
/// registration, rate-limited and fraud-tracked voting, and aggregated
/// results. Prometheus metrics are exposed on a separate port.
#[derive(Parser, Debug)]
#[command(
    name = "ballot-server",
    about = "Society election backend",
    version,
    propagate_version = true
)]
pub struct BallotCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the election server.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the public REST API. Overrides `BALLOT_PORT`.
    #[arg(long)]
    pub port: Option<u16>,

    /// Port for the Prometheus metrics endpoint. Overrides
    /// `BALLOT_METRICS_PORT`.
    #[arg(long)]
    pub metrics_port: Option<u16>,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "BALLOT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        BallotCli::command().debug_assert();
    }
}
