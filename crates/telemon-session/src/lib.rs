//! In-memory cache of upstream results, keyed by user and result kind.
//!
//! This crate provides:
//! - [`UserCache`]: per-user entries with per-kind TTL and an LRU bound
//! - [`MaintenanceTask`]: a periodic sweep that drops idle users
//!
//! # Example
//!
//! ```rust,ignore
//! use telemon_session::{CacheConfig, UserCache};
//!
//! let config = CacheConfig::default()
//!     .with_max_users(1000)
//!     .with_ttl(Duration::from_secs(180));
//!
//! let cache: UserCache<UsageData> = UserCache::new(config)?;
//! ```

mod cache;
mod config;
mod error;
mod maintenance;

pub use cache::{CacheStats, Cached, UserCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use maintenance::{MaintenanceTask, SweepHook, SweepReport, sweep_once};
