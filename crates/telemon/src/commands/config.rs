//! Config command - show the effective configuration.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the merged configuration as TOML
    Show,

    /// List config file locations and whether each was loaded
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    // Print every section with its effective values, secrets redacted.
    let mut config = ctx.config.clone();
    config.server = Some(config.server());
    config.monitor = Some(config.monitor());
    config.upstream = Some(config.upstream());
    config.paths = Some(telemon_config::PathsSection {
        data_path: Some(config.paths().effective_data_path()),
    });
    config.logging = Some(config.logging());
    if let Some(server) = config.server.as_mut()
        && server.api_key.is_some()
    {
        server.api_key = Some("********".to_string());
    }

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!("{}", config.to_toml()?);
    }
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    match telemon_config::user_config_path() {
        Some(path) => println!("User config:    {}", path.display()),
        None => println!("User config:    (no config directory)"),
    }
    if ctx.sources.is_empty() {
        println!("Loaded:         (none)");
    }
    for source in &ctx.sources {
        println!("Loaded:         {}", source.display());
    }
    Ok(())
}
