use crate::fetch::{
    DEFAULT_ACCEPT_LANGUAGE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_IDLE_PER_HOST,
    DEFAULT_MAX_JITTER, DEFAULT_READ_TIMEOUT, DEFAULT_USER_AGENTS, FetchOptions, TransportConfig,
};
use crate::humanize::HumanDuration;
use crate::pool::{DEFAULT_REMOVE_AFTER, DEFAULT_SOFT_EXCLUDE_AFTER, HealthThresholds};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Proxy pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Line-delimited proxy list, re-read whenever the pool drains
    #[serde(default = "default_proxy_file")]
    pub proxy_file: PathBuf,
    #[serde(default = "default_remove_after")]
    pub remove_after: u32,
    #[serde(default = "default_soft_exclude_after")]
    pub soft_exclude_after: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            proxy_file: default_proxy_file(),
            remove_after: default_remove_after(),
            soft_exclude_after: default_soft_exclude_after(),
        }
    }
}

impl PoolConfig {
    pub fn thresholds(&self) -> HealthThresholds {
        HealthThresholds {
            remove_after: self.remove_after,
            soft_exclude_after: self.soft_exclude_after,
        }
    }
}

fn default_proxy_file() -> PathBuf {
    PathBuf::from("out/working_proxies_all.txt")
}

fn default_remove_after() -> u32 {
    DEFAULT_REMOVE_AFTER
}

fn default_soft_exclude_after() -> u32 {
    DEFAULT_SOFT_EXCLUDE_AFTER
}

/// Fetch and transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    #[serde(default = "default_read_timeout")]
    pub read_timeout: HumanDuration,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_max_jitter")]
    pub max_jitter: HumanDuration,
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            max_attempts: default_max_attempts(),
            max_jitter: default_max_jitter(),
            user_agents: default_user_agents(),
            accept_language: default_accept_language(),
            max_idle_per_host: default_max_idle_per_host(),
        }
    }
}

impl FetchConfig {
    pub fn options(&self) -> FetchOptions {
        FetchOptions::builder()
            .connect_timeout(self.connect_timeout.as_duration())
            .read_timeout(self.read_timeout.as_duration())
            .max_attempts(self.max_attempts)
            .max_jitter(self.max_jitter.as_duration())
            .build()
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            accept_language: self.accept_language.clone(),
            max_idle_per_host: self.max_idle_per_host,
        }
    }
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration(DEFAULT_CONNECT_TIMEOUT)
}

fn default_read_timeout() -> HumanDuration {
    HumanDuration(DEFAULT_READ_TIMEOUT)
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_max_jitter() -> HumanDuration {
    HumanDuration(DEFAULT_MAX_JITTER)
}

fn default_user_agents() -> Vec<String> {
    DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect()
}

fn default_accept_language() -> String {
    DEFAULT_ACCEPT_LANGUAGE.to_string()
}

fn default_max_idle_per_host() -> usize {
    DEFAULT_MAX_IDLE_PER_HOST
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
