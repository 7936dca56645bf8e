//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]      # listener, API key, dev routes, rate limiting
//! [monitor]     # login cooldown, cache TTLs, sweeping
//! [upstream]    # provider base URL, timeout, client version
//! [paths]       # data directory
//! [logging]     # level and file encoding
//! ```
//!
//! Legacy flat names are accepted as aliases (`loginIntervalTime`,
//! `intervalsTime`, `timeOut`, `dataPath`, `apiKey`).

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use telemon_types::{ConfigProvider, HasCacheConfig, HasThrottleConfig, ResultKind, config_defaults};

use crate::error::{ConfigError, Result};

/// Upstream base URL used when none is configured.
pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:9900";

/// Client version sent to the upstream on login.
pub const DEFAULT_CLIENT_VERSION: &str = "telemon/0.1";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemonConfig {
    pub server: Option<ServerSection>,
    pub monitor: Option<MonitorSection>,
    pub upstream: Option<UpstreamSection>,
    pub paths: Option<PathsSection>,
    pub logging: Option<LoggingSection>,
}

impl TelemonConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: TelemonConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.monitor.is_some() {
            self.monitor = other.monitor;
        }
        if other.upstream.is_some() {
            self.upstream = other.upstream;
        }
        if other.paths.is_some() {
            self.paths = other.paths;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Effective server section.
    pub fn server(&self) -> ServerSection {
        self.server.clone().unwrap_or_default()
    }

    pub fn monitor(&self) -> MonitorSection {
        self.monitor.clone().unwrap_or_default()
    }

    pub fn upstream(&self) -> UpstreamSection {
        self.upstream.clone().unwrap_or_default()
    }

    pub fn paths(&self) -> PathsSection {
        self.paths.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingSection {
        self.logging.clone().unwrap_or_default()
    }

    /// Apply `TELEMON_*` overrides read through `lookup`.
    ///
    /// Taking the lookup as a function keeps tests away from the process
    /// environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(port) = get("TELEMON_PORT") {
            let port = port
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid("TELEMON_PORT", e.to_string()))?;
            self.server.get_or_insert_with(Default::default).port = port;
        }
        if let Some(key) = get("TELEMON_API_KEY") {
            self.server.get_or_insert_with(Default::default).api_key = Some(key);
        }
        if let Some(path) = get("TELEMON_DATA_PATH") {
            self.paths.get_or_insert_with(Default::default).data_path = Some(PathBuf::from(path));
        }
        if let Some(url) = get("TELEMON_UPSTREAM_URL") {
            self.upstream.get_or_insert_with(Default::default).base_url = url;
        }
        if let Some(version) = get("TELEMON_CLIENT_VERSION") {
            self.upstream
                .get_or_insert_with(Default::default)
                .client_version = version;
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_overrides(|key| std::env::var(key).ok())
    }

    /// Reject values that would produce a broken service.
    pub fn validate(&self) -> Result<()> {
        let monitor = self.monitor();
        if monitor.cache_ttl_secs == 0 {
            return Err(ConfigError::invalid("monitor.intervalsTime", "must be positive"));
        }
        if monitor.max_users == 0 {
            return Err(ConfigError::invalid("monitor.max_users", "must be positive"));
        }
        if monitor.sweep_interval_secs == 0 {
            return Err(ConfigError::invalid("monitor.sweep_interval_secs", "must be positive"));
        }
        for name in monitor.kind_ttls.keys() {
            ResultKind::from_str(name)
                .map_err(|e| ConfigError::invalid(format!("monitor.kind_ttls.{name}"), e.to_string()))?;
        }
        if self.upstream().timeout_secs == 0 {
            return Err(ConfigError::invalid("upstream.timeOut", "must be positive"));
        }
        if self.server().api_rpm == 0 {
            return Err(ConfigError::invalid("server.api_rpm", "must be positive"));
        }
        Ok(())
    }
}

impl ConfigProvider for TelemonConfig {}

impl HasCacheConfig for TelemonConfig {
    fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.monitor().cache_ttl_secs)
    }

    fn kind_ttls(&self) -> HashMap<ResultKind, Duration> {
        self.monitor()
            .kind_ttls
            .iter()
            .filter_map(|(name, secs)| {
                ResultKind::from_str(name)
                    .ok()
                    .map(|kind| (kind, Duration::from_secs(*secs)))
            })
            .collect()
    }

    fn max_users(&self) -> usize {
        self.monitor().max_users
    }

    fn idle_horizon(&self) -> Duration {
        Duration::from_secs(self.monitor().idle_horizon_secs)
    }

    fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.monitor().sweep_interval_secs)
    }
}

impl HasThrottleConfig for TelemonConfig {
    fn login_interval(&self) -> Duration {
        Duration::from_secs(self.monitor().login_interval_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP facade settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
    /// Shared secret required as the `key` query parameter. Open when unset.
    #[serde(alias = "apiKey")]
    pub api_key: Option<String>,
    /// Enable diagnostic routes and unmasked usernames.
    pub dev: bool,
    /// Enable rate limiting.
    pub rate_limiting: bool,
    /// Request limit per minute.
    pub api_rpm: u32,
    /// Enable request logging.
    pub request_logging: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: config_defaults::DEFAULT_PORT,
            bind: config_defaults::DEFAULT_BIND.to_string(),
            api_key: None,
            dev: false,
            rate_limiting: true,
            api_rpm: config_defaults::REQUESTS_PER_MINUTE,
            request_logging: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Monitor
// ─────────────────────────────────────────────────────────────────────────────

/// Cache and login pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    /// Minimum seconds between logins for one user.
    #[serde(alias = "loginIntervalTime")]
    pub login_interval_secs: u64,
    /// Seconds a cached result stays fresh.
    #[serde(alias = "intervalsTime")]
    pub cache_ttl_secs: u64,
    /// Per-kind TTL overrides in seconds, keyed by `summary`, `detail`, `flux-package`.
    pub kind_ttls: HashMap<String, u64>,
    /// Users kept in memory before LRU eviction.
    pub max_users: usize,
    /// Seconds without access before a user is swept.
    pub idle_horizon_secs: u64,
    /// Seconds between sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            login_interval_secs: config_defaults::LOGIN_INTERVAL_SECS,
            cache_ttl_secs: config_defaults::CACHE_TTL_SECS,
            kind_ttls: HashMap::new(),
            max_users: config_defaults::MAX_USERS,
            idle_horizon_secs: config_defaults::IDLE_HORIZON_SECS,
            sweep_interval_secs: config_defaults::SWEEP_INTERVAL_SECS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Upstream
// ─────────────────────────────────────────────────────────────────────────────

/// Upstream provider connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSection {
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(alias = "timeOut")]
    pub timeout_secs: u64,
    pub client_version: String,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_URL.to_string(),
            timeout_secs: config_defaults::UPSTREAM_TIMEOUT_SECS,
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
        }
    }
}

impl UpstreamSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Paths
// ─────────────────────────────────────────────────────────────────────────────

/// Where persisted state lives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    /// Root for token records and log files. Default: `./data`.
    #[serde(alias = "dataPath")]
    pub data_path: Option<PathBuf>,
}

impl PathsSection {
    pub fn effective_data_path(&self) -> PathBuf {
        self.data_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(config_defaults::DEFAULT_DATA_PATH))
    }

    /// Directory for rolling log files.
    pub fn log_dir(&self) -> PathBuf {
        self.effective_data_path().join("log")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Encoding of the log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogEncoding {
    #[default]
    Console,
    Json,
}

impl FromStr for LogEncoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "console" | "text" => Ok(Self::Console),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::invalid(
                "logging.encoding",
                format!("unknown encoding '{other}'"),
            )),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Filter directive, e.g. `info` or `telemon=debug`.
    pub level: String,
    pub encoding: LogEncoding,
    /// Write a daily rolling file under `{data_path}/log/`.
    pub file: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            encoding: LogEncoding::Console,
            file: true,
        }
    }
}
