//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use telemon_monitor::UsageMonitor;
use telemon_server::{Server, ServerConfig};
use telemon_session::{CacheConfig, UserCache};
use telemon_token::{FileTokenStore, LoginThrottle};
use telemon_types::SystemClock;
use telemon_upstream::MockUpstream;

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// The API key for the server.
    pub key: String,
    /// HTTP client configured for this server.
    pub client: Client,
    /// The scripted upstream behind the server.
    pub upstream: Arc<MockUpstream>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server with its own data directory.
    pub async fn start(temp_dir: &TempDir) -> Result<Self> {
        Self::start_with(temp_dir.path(), MockUpstream::new(), ServerConfig::default()).await
    }

    /// Start a server over `data_dir` with the given upstream and config.
    ///
    /// The API key is always `test-key`; rate limiting and request logging
    /// are off.
    pub async fn start_with(
        data_dir: &Path,
        upstream: MockUpstream,
        config: ServerConfig,
    ) -> Result<Self> {
        let key = "test-key".to_string();
        let upstream = Arc::new(upstream);

        let store = Arc::new(FileTokenStore::new(data_dir));
        let throttle = LoginThrottle::new(store, Duration::from_secs(600));
        let cache = UserCache::new(CacheConfig::new())?;
        let monitor = UsageMonitor::new(cache, throttle, upstream.clone(), Arc::new(SystemClock));

        let config = ServerConfig {
            api_key: Some(key.clone()),
            rate_limiting: false,
            request_logging: false,
            ..config
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let server = Server::new(monitor, config);
        let signal = shutdown.clone();
        let handle = tokio::spawn(async move {
            let _ = server
                .serve(listener, async move { signal.cancelled().await })
                .await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            key,
            client,
            upstream,
            shutdown,
            handle,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// GET `path` with the API key appended to `query`.
    pub fn get(&self, path: &str, query: &[(&str, &str)]) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .query(query)
            .query(&[("key", self.key.as_str())])
    }

    /// Check if server is healthy.
    pub async fn health(&self) -> Result<bool> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url()))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Trigger graceful shutdown and wait for the server task.
    pub async fn stop(self) -> Result<()> {
        self.shutdown.cancel();
        timeout(Duration::from_secs(5), self.handle).await??;
        Ok(())
    }
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
