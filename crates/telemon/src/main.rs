//! telemon - cached, throttled usage lookups for carrier accounts
//!
//! Main entry point for the telemon CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::{config, serve, token};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// telemon - cached, throttled usage lookups for carrier accounts
#[derive(Parser)]
#[command(name = "telemon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to config file (replaces ./telemon.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for tokens and logs (overrides config)
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `telemon_monitor=trace` (overrides config)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log file encoding: console or json (overrides config)
    #[arg(long, global = true)]
    pub log_encoding: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve(serve::ServeArgs),

    /// Inspect or clear stored session tokens
    Token(token::TokenArgs),

    /// Show the effective configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = commands::load_config(&cli)?;
    for warning in &loaded.warnings {
        eprintln!("warning: {}", warning);
    }

    // Only the server writes a log file; one-shot commands log to stderr.
    let file_logging = matches!(cli.command, Commands::Serve(_));
    let _guard = logging::init(&loaded.config, cli.verbose, file_logging)?;

    let ctx = commands::Context {
        config: loaded.config,
        sources: loaded
            .sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.clone())
            .collect(),
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Token(args) => token::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
