//! Client for the upstream account provider.
//!
//! The provider exposes a login call that issues a session token and a
//! couple of data calls that require it. Logins are expensive and
//! rate-limited on the provider side, so this crate makes exactly one
//! request per call and leaves pacing to the caller.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  UpstreamClient trait                │
//! │  - login() -> LoginTicket            │
//! │  - important_data() -> ImportantData │
//! │  - flux_package() -> FluxPackage     │
//! └──────────────────────────────────────┘
//!                  │
//!          ┌───────┴───────┐
//!          ▼               ▼
//!    ┌────────────┐  ┌──────────────┐
//!    │HttpUpstream│  │ MockUpstream │
//!    └────────────┘  └──────────────┘
//! ```

pub mod client;
pub mod error;
pub mod http;
#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use client::{LoginTicket, SharedUpstream, UpstreamClient, UpstreamSession};
pub use error::{Result, UpstreamError};
pub use http::{HttpUpstream, UpstreamConfig};
#[cfg(any(test, feature = "testing"))]
pub use mock::{MockUpstream, sample_flux_package, sample_important_data};
