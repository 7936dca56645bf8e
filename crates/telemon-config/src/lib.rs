//! Configuration for telemon.
//!
//! Provides TOML-based configuration with:
//! - Sections for the server, monitor, upstream, paths and logging
//! - Config file layering (user config + project-local or explicit file)
//! - `TELEMON_*` environment overrides
//!
//! [`TelemonConfig`] implements the cache and throttle provider traits from
//! `telemon-types`, so it can be handed straight to those components.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadOptions, LoadedConfig, load_config, load_config_file,
    load_config_with_options, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
