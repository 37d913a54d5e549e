//! CLI command definitions for the `convoy` binary.

pub mod check;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Round-robin message delivery over a pool of messaging sessions.
#[derive(Parser)]
#[command(name = "convoy", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit log lines as JSON objects.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Directory holding the delivery files and the optional convoy.toml.
    #[arg(long, global = true, env = "CONVOY_CONFIG_DIR", default_value = ".")]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the control API and run the delivery loop.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value_t = 4000)]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Wait for POST /api/v1/start instead of starting on boot.
        #[arg(long)]
        no_autostart: bool,
    },

    /// Validate the delivery files without contacting the gateway.
    Check,
}
