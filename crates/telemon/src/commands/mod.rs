//! CLI command handlers.

pub mod config;
pub mod serve;
pub mod token;

use std::path::PathBuf;

use anyhow::Result;
use telemon_config::{LoadOptions, LoadedConfig, LogEncoding};

use crate::Cli;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Configuration after files, environment and global flags.
    pub config: telemon_config::TelemonConfig,
    /// Config files that were actually read.
    pub sources: Vec<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Load config files, then apply `TELEMON_*` variables and global flags.
///
/// Command-specific flags are applied by the command itself.
pub fn load_config(cli: &Cli) -> Result<LoadedConfig> {
    let mut loaded = telemon_config::load_config_with_options(&LoadOptions {
        explicit: cli.config.clone(),
        ..Default::default()
    })?;

    let config = &mut loaded.config;
    config.apply_env()?;

    if let Some(data) = &cli.data {
        config.paths.get_or_insert_with(Default::default).data_path = Some(data.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.get_or_insert_with(Default::default).level = level.clone();
    }
    if let Some(encoding) = &cli.log_encoding {
        config.logging.get_or_insert_with(Default::default).encoding =
            encoding.parse::<LogEncoding>()?;
    }

    Ok(loaded)
}
