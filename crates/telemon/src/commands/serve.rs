//! Serve command - runs the HTTP facade.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use telemon_config::TelemonConfig;
use telemon_monitor::{MonitorConfig, UsageMonitor};
use telemon_server::{Server, ServerConfig};
use telemon_session::{CacheConfig, MaintenanceTask, SweepHook, UserCache};
use telemon_token::{FileTokenStore, LoginThrottle, SharedTokenStore};
use telemon_types::{SharedClock, SystemClock};
use telemon_upstream::{HttpUpstream, UpstreamConfig};

use super::Context;

/// Arguments for the serve command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Required `key` query parameter (or set TELEMON_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Upstream base URL (overrides config)
    #[arg(long)]
    pub upstream_url: Option<String>,

    /// Mount diagnostic routes and log unmasked usernames
    #[arg(long)]
    pub dev: bool,

    /// Disable the global request limit
    #[arg(long)]
    pub no_rate_limit: bool,
}

impl ServeArgs {
    fn apply(&self, config: &mut TelemonConfig) {
        let server = config.server.get_or_insert_with(Default::default);
        if let Some(port) = self.port {
            server.port = port;
        }
        if let Some(bind) = &self.bind {
            server.bind = bind.clone();
        }
        if let Some(key) = &self.api_key {
            server.api_key = Some(key.clone());
        }
        if self.dev {
            server.dev = true;
        }
        if self.no_rate_limit {
            server.rate_limiting = false;
        }
        if let Some(url) = &self.upstream_url {
            config.upstream.get_or_insert_with(Default::default).base_url = url.clone();
        }
    }
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let mut config = ctx.config.clone();
    args.apply(&mut config);
    config.validate()?;

    if ctx.verbose {
        if ctx.sources.is_empty() {
            eprintln!("No config files found, using defaults + CLI args");
        }
        for source in &ctx.sources {
            eprintln!("Loaded config: {}", source.display());
        }
    }

    let server_section = config.server();
    let upstream_section = config.upstream();
    let data_dir = config.paths().effective_data_path();

    // ── Build the lookup stack ──────────────────────────────────────────

    let store: SharedTokenStore = Arc::new(FileTokenStore::new(&data_dir));
    let throttle = LoginThrottle::from_config(store, &config);
    let cache = UserCache::new(CacheConfig::from_config(&config))?;
    let upstream = HttpUpstream::new(
        UpstreamConfig::new(upstream_section.base_url.clone())
            .with_timeout(upstream_section.timeout())
            .with_client_version(upstream_section.client_version.clone()),
    )?;
    let clock: SharedClock = Arc::new(SystemClock);

    let monitor = UsageMonitor::new(cache.clone(), throttle, Arc::new(upstream), clock.clone())
        .with_config(MonitorConfig::new().with_dev(server_section.dev));

    let shutdown = CancellationToken::new();
    let hook: Arc<dyn SweepHook> = monitor.inflight();
    let maintenance = MaintenanceTask::spawn(cache, clock, Some(hook), shutdown.child_token());

    // ── Server ──────────────────────────────────────────────────────────

    let ip: IpAddr = server_section
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", server_section.bind))?;
    let addr = SocketAddr::new(ip, server_section.port);

    let server_config = ServerConfig::new(server_section.api_key.clone())
        .with_bind_address(addr)
        .with_dev(server_section.dev)
        .with_rate_limiting(server_section.rate_limiting)
        .with_api_rpm(server_section.api_rpm)
        .with_request_logging(server_section.request_logging);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        data_dir = %data_dir.display(),
        upstream = %upstream_section.base_url,
        login_interval_secs = config.monitor().login_interval_secs,
        cache_ttl_secs = config.monitor().cache_ttl_secs,
        "telemon ready"
    );

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                signal.cancel();
            }
            Err(e) => warn!(error = %e, "Cannot listen for shutdown signal"),
        }
    });

    let server_shutdown = shutdown.clone();
    Server::new(monitor, server_config)
        .serve(listener, async move { server_shutdown.cancelled().await })
        .await?;

    shutdown.cancel();
    maintenance.shutdown().await?;
    Ok(())
}
