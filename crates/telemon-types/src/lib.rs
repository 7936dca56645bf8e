//! Shared types for the telemon usage monitor.
//!
//! Everything that more than one crate needs to agree on lives here:
//! the result kinds the cache is keyed by, the payloads returned by the
//! upstream provider, the derived public [`Summary`], and the [`Clock`]
//! used to stamp cache and login times.

pub mod clock;
pub mod config;
pub mod kind;
pub mod mask;
pub mod usage;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock, Timestamp};
pub use config::{
    CacheConfigProvider, ConfigProvider, HasCacheConfig, HasThrottleConfig,
    ThrottleConfigProvider, defaults as config_defaults,
};
pub use kind::{ParseKindError, ResultKind};
pub use mask::mask_username;
pub use usage::{
    Credentials, FlowCategory, FlowItem, FluxPackage, ImportantData, PackageProduct,
    ResourcePackage, Summary, SummaryFlowItem, UsageData,
};
