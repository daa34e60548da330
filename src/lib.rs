pub mod config;
pub mod fetch;
pub mod humanize;
pub mod observability;
pub mod pool;

pub use fetch::{FetchError, FetchOptions, FetchResponse, Fetcher, HttpTransport};
pub use pool::{HealthThresholds, PoolStats, ProxyAddress, ProxyPool};
