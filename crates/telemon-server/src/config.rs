//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};

use telemon_types::config_defaults;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Required value of the `key` query parameter. `None` leaves the
    /// query routes open.
    pub api_key: Option<String>,

    /// Mount diagnostic routes and return unmasked usernames.
    pub dev: bool,

    /// Enable rate limiting.
    pub rate_limiting: bool,

    /// Rate limit: requests per minute across all clients.
    pub api_rpm: u32,

    /// Enable request logging.
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, config_defaults::DEFAULT_PORT)),
            api_key: None,
            dev: false,
            rate_limiting: true,
            api_rpm: config_defaults::REQUESTS_PER_MINUTE,
            request_logging: true,
        }
    }
}

impl ServerConfig {
    /// Create a new server config with an optional API key.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            ..Default::default()
        }
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Enable or disable dev mode.
    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    /// Enable or disable rate limiting.
    pub fn with_rate_limiting(mut self, enabled: bool) -> Self {
        self.rate_limiting = enabled;
        self
    }

    /// Set the API rate limit (requests per minute).
    pub fn with_api_rpm(mut self, rpm: u32) -> Self {
        self.api_rpm = rpm;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }
}
