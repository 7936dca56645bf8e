//! Session-token persistence and login throttling.
//!
//! The upstream provider locks accounts that log in too often, so every
//! login goes through the [`LoginThrottle`]. The throttle keeps no state
//! of its own: it reads the last login time from the [`TokenStore`], which
//! is also where the session token issued by that login is kept.
//!
//! # Components
//!
//! - [`store`] — `TokenStore` trait, file-backed and in-memory stores
//! - [`throttle`] — per-user login cooldown on top of a token store

pub mod error;
pub mod store;
pub mod throttle;

pub use error::{Result, TokenError};
pub use store::{
    FileTokenStore, InMemoryTokenStore, SharedTokenStore, TOKENS_DIR, TokenStore, UserSession,
    validate_username,
};
pub use throttle::LoginThrottle;
