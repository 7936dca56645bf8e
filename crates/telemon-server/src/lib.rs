//! HTTP facade for telemon.
//!
//! Exposes cached, throttled usage lookups over plain GET endpoints. The
//! API key and the account credentials are query parameters, matching what
//! the existing dashboard clients send.
//!
//! # Routes
//!
//! - `GET /health`: liveness and cache occupancy, no key required
//! - `GET /show/flow`: account summary
//! - `GET /show/qryImportantData`, `/show/userFluxPackage`, `/show/logout`,
//!   `/show/stats`: dev mode only
//!
//! # Example
//!
//! ```ignore
//! use telemon_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::new(Some("secret".to_string()))
//!     .with_bind_address("127.0.0.1:8080".parse()?);
//!
//! let server = Server::new(monitor, config);
//! server.run().await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::auth_middleware;
pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use ratelimit::{rate_limit_middleware, request_logging_middleware};
pub use routes::{FlowResponse, LogoutResponse, StatsResponse};
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, middleware, routing::get};
use telemon_monitor::UsageMonitor;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The telemon HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server with the given monitor and configuration.
    pub fn new(monitor: UsageMonitor, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(monitor, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            // Health routes (no auth required)
            .merge(routes::health_routes())
            .nest("/show", self.show_routes())
            // Request logging (inner layer, runs first)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                ratelimit::request_logging_middleware,
            ))
            // Rate limiting (outer layer, runs before request logging)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                ratelimit::rate_limit_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Query routes, all behind the API key.
    fn show_routes(&self) -> Router<AppState> {
        let mut router = Router::new().route("/flow", get(routes::flow_handler));

        if self.state.config.dev {
            router = router
                .route(
                    "/qryImportantData",
                    get(routes::qry_important_data_handler),
                )
                .route(
                    "/userFluxPackage",
                    get(routes::user_flux_package_handler),
                )
                .route("/logout", get(routes::logout_handler))
                .route("/stats", get(routes::stats_handler));
        }

        router.layer(middleware::from_fn_with_state(
            self.state.clone(),
            auth::auth_middleware,
        ))
    }

    /// Run the server on the configured address until the process exits.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind {addr}: {e}")))?;
        self.serve(listener, std::future::pending()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// In-flight requests are allowed to finish.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(format!("Listener error: {e}")))?;

        info!(
            %addr,
            dev = self.state.config.dev,
            auth = self.state.config.api_key.is_some(),
            "Starting server"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {e}")))?;

        info!("Server stopped");
        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }

    /// Get the application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }
}
