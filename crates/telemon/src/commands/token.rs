//! Token command - inspect or clear persisted upstream sessions.
//!
//! Operates on the token files directly; a running server picks up the
//! change on its next refresh for that user.

use anyhow::Result;
use clap::{Args, Subcommand};
use telemon_token::{FileTokenStore, TokenStore, validate_username};

use super::Context;

/// Arguments for the token command.
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Show the stored token record for a user
    Show {
        /// Account username
        username: String,
    },

    /// Delete the stored token record, resetting the login cooldown
    Clear {
        /// Account username
        username: String,
    },
}

/// Run the token command.
pub async fn run(args: TokenArgs, ctx: &Context) -> Result<()> {
    let store = FileTokenStore::new(&ctx.config.paths().effective_data_path());

    match args.command {
        TokenCommand::Show { username } => cmd_show(&store, &username, ctx).await,
        TokenCommand::Clear { username } => cmd_clear(&store, &username).await,
    }
}

async fn cmd_show(store: &FileTokenStore, username: &str, ctx: &Context) -> Result<()> {
    validate_username(username)?;
    let session = store.get(username).await;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    match session {
        None => println!("No token stored for {username}"),
        Some(session) => {
            let last_login = chrono::DateTime::from_timestamp(session.login_last_time, 0)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| session.login_last_time.to_string());
            println!("User:        {username}");
            println!(
                "Token:       {}",
                if session.has_token() { "present" } else { "blank (invalidated)" }
            );
            println!("Last login:  {last_login}");
            if ctx.verbose {
                println!("Record:      {}", store.record_path(username)?.display());
            }
        }
    }
    Ok(())
}

async fn cmd_clear(store: &FileTokenStore, username: &str) -> Result<()> {
    store.delete(username).await?;
    println!("Cleared token for {username}");
    Ok(())
}
