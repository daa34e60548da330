//! Proxy pool: addresses, health tracking and list loading
//!
//! The pool is the only shared mutable state of the fetch layer. It is an
//! explicit object handed to the [`Fetcher`](crate::fetch::Fetcher), so tests
//! and callers can run isolated pools side by side.

mod address;
mod loader;
mod state;

pub use address::ProxyAddress;
pub use loader::{FileProxySource, ProxySource, StaticProxySource, parse_proxy_list};
pub use state::{
    DEFAULT_REMOVE_AFTER, DEFAULT_SOFT_EXCLUDE_AFTER, FailureVerdict, HealthThresholds, PoolStats,
    ProxyPool,
};
