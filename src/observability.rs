//! Logging setup and in-process fetch counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_level` when set. Calling this twice is a
/// no-op for the second call.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Counters for fetch calls and their attempts
#[derive(Debug, Default)]
pub struct FetchMetrics {
    fetches_started: AtomicU64,
    fetches_succeeded: AtomicU64,
    fetches_exhausted: AtomicU64,
    attempts: AtomicU64,
    retryable_statuses: AtomicU64,
    transient_errors: AtomicU64,
    proxies_removed: AtomicU64,
}

impl FetchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_started(&self) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_succeeded(&self) {
        self.fetches_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "fetches_succeeded", "Metric incremented");
    }

    pub fn fetch_exhausted(&self) {
        self.fetches_exhausted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "fetches_exhausted", "Metric incremented");
    }

    pub fn attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retryable_status(&self) {
        self.retryable_statuses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transient_error(&self) {
        self.transient_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn proxy_removed(&self) {
        self.proxies_removed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "proxies_removed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetches_succeeded: self.fetches_succeeded.load(Ordering::Relaxed),
            fetches_exhausted: self.fetches_exhausted.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            retryable_statuses: self.retryable_statuses.load(Ordering::Relaxed),
            transient_errors: self.transient_errors.load(Ordering::Relaxed),
            proxies_removed: self.proxies_removed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub fetches_started: u64,
    pub fetches_succeeded: u64,
    pub fetches_exhausted: u64,
    pub attempts: u64,
    pub retryable_statuses: u64,
    pub transient_errors: u64,
    pub proxies_removed: u64,
}
