//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/telemon/config.toml` (user config, or `$TELEMON_CONFIG_DIR`)
//! 2. `./telemon.toml` (project-local), or an explicit `--config` file
//! 3. `TELEMON_*` environment variables
//! 4. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::types::TelemonConfig;

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "telemon.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for config directory resolution.
const APP_NAME: &str = "telemon";

/// Environment variable to override the user config directory.
const CONFIG_DIR_ENV: &str = "TELEMON_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: TelemonConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading, for the caller to log.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Where to look for config files.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Directory holding `telemon.toml`. Defaults to the working directory.
    pub project_dir: Option<PathBuf>,
    /// User config directory. Defaults to `$TELEMON_CONFIG_DIR` or the platform one.
    pub config_dir: Option<PathBuf>,
    /// Explicit config file, used instead of the project-local one. Must exist.
    pub explicit: Option<PathBuf>,
}

/// Load configuration by discovering and merging all file layers.
///
/// Environment overrides are not applied here; see
/// [`TelemonConfig::apply_env`].
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(&LoadOptions {
        project_dir: project_dir.map(Path::to_path_buf),
        ..Default::default()
    })
}

/// Load configuration with explicit control over every location.
pub fn load_config_with_options(options: &LoadOptions) -> Result<LoadedConfig> {
    let mut config = TelemonConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config
    let user_config_path = match &options.config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    // 2. Explicit file, or project-local config
    if let Some(path) = &options.explicit {
        config.merge(load_config_file(path)?);
        sources.push(ConfigSource {
            path: path.clone(),
            loaded: true,
        });
    } else {
        let project_path = options
            .project_dir
            .as_ref()
            .map(|d| d.join(PROJECT_CONFIG_FILE))
            .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
        sources.push(load_layer(&mut config, &project_path, &mut warnings));
    }

    check_open_access(&config, &mut warnings);

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<TelemonConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    TelemonConfig::from_toml(&contents)
}

/// Path of the user config file.
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// User config directory: `$TELEMON_CONFIG_DIR`, else the platform default.
pub fn user_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
///
/// A missing file is skipped; a broken one is skipped with a warning so a
/// stray user file cannot stop the service.
fn load_layer(config: &mut TelemonConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

fn check_open_access(config: &TelemonConfig, warnings: &mut Vec<String>) {
    if config.server().api_key.is_none() {
        warnings.push(
            "No [server] api_key configured; the query endpoints are open to anyone \
             who can reach the port."
                .to_string(),
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
