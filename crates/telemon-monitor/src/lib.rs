//! Usage lookups for telemon.
//!
//! [`UsageMonitor`] sits between the HTTP facade and the upstream provider.
//! It answers from the user cache while entries are fresh and otherwise
//! runs a refresh: throttle check, login or persisted-token reuse, fetch,
//! token write, cache write. Refreshes are serialized per user so
//! concurrent requests never log in twice.
//!
//! # Components
//!
//! - [`monitor`]: the orchestrator and its lookup results
//! - [`inflight`]: per-user refresh markers
//! - [`credential`]: salted digests that tie cached data to a password
//! - [`error`]: `MonitorError`

pub mod config;
pub mod credential;
pub mod error;
pub mod inflight;
pub mod monitor;

pub use config::MonitorConfig;
pub use credential::CredentialDigester;
pub use error::{MonitorError, Result};
pub use inflight::InFlightRegistry;
pub use monitor::{Lookup, UsageMonitor};
