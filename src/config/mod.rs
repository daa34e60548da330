//! Configuration management for the proxyfetch binary
//!
//! The library itself takes every tunable as a parameter; this module only
//! builds those parameters for the CLI. Settings are layered:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use proxyfetch::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Proxy list: {}", config.pool.proxy_file.display());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `PROXYFETCH__<section>__<key>`
//!
//! Examples:
//! - `PROXYFETCH__POOL__PROXY_FILE=/srv/proxies.txt`
//! - `PROXYFETCH__FETCH__MAX_ATTEMPTS=50`
//! - `PROXYFETCH__FETCH__READ_TIMEOUT=10s`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/proxyfetch.toml`.
//! This can be overridden using the `PROXYFETCH_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{Config, FetchConfig, PoolConfig, TelemetryConfig};
pub use validation::ValidationError;

use crate::fetch::{Fetcher, HttpTransport, TransportError};
use crate::observability::FetchMetrics;
use crate::pool::{FileProxySource, ProxyPool};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Failed to build HTTP transport: {0}")]
    TransportError(#[from] TransportError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation
    /// fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Empty pool seeded lazily from `pool.proxy_file`
    pub fn proxy_pool(&self) -> ProxyPool {
        ProxyPool::new(
            Arc::new(FileProxySource::new(&self.pool.proxy_file)),
            self.pool.thresholds(),
        )
    }

    /// Fetcher over a fresh pool and a reqwest transport
    pub fn fetcher(&self, metrics: Arc<FetchMetrics>) -> Result<Fetcher, ConfigError> {
        let transport = HttpTransport::new(self.fetch.transport())?;

        Ok(Fetcher::new(Arc::new(self.proxy_pool()), Arc::new(transport))
            .with_options(self.fetch.options())
            .with_user_agents(self.fetch.user_agents.clone())
            .with_metrics(metrics))
    }
}
