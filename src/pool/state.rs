//! Shared proxy pool with per-address health tracking
//!
//! All mutations go through one exclusive lock. The lock is never held across
//! I/O: callers take a snapshot, release, do their network call, then report
//! the outcome.

use super::address::ProxyAddress;
use super::loader::ProxySource;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_REMOVE_AFTER: u32 = 2;
pub const DEFAULT_SOFT_EXCLUDE_AFTER: u32 = 1;

/// Failure thresholds driving exclusion and removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthThresholds {
    /// Consecutive failures after which a proxy is dropped for good.
    pub remove_after: u32,
    /// Failures after which a proxy is skipped when taking snapshots.
    pub soft_exclude_after: u32,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            remove_after: DEFAULT_REMOVE_AFTER,
            soft_exclude_after: DEFAULT_SOFT_EXCLUDE_AFTER,
        }
    }
}

/// Result of recording a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureVerdict {
    /// Failure count after this failure; 0 if the address was not in the pool.
    pub failures: u32,
    /// The address reached the removal threshold and was purged.
    pub removed: bool,
}

/// Read-only pool snapshot for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total_proxies: usize,
    pub healthy_proxies: usize,
    pub failure_counts: BTreeMap<ProxyAddress, u32>,
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failing = self.failure_counts.values().filter(|c| **c > 0).count();
        write!(
            f,
            "total={} healthy={} failing={}",
            self.total_proxies, self.healthy_proxies, failing
        )
    }
}

#[derive(Debug, Default)]
struct PoolState {
    addresses: Vec<ProxyAddress>,
    failure_counts: HashMap<ProxyAddress, u32>,
}

impl PoolState {
    fn contains(&self, address: &ProxyAddress) -> bool {
        self.addresses.iter().any(|a| a == address)
    }

    fn failures(&self, address: &ProxyAddress) -> u32 {
        self.failure_counts.get(address).copied().unwrap_or(0)
    }
}

/// Process-wide proxy pool, seeded lazily from a [`ProxySource`].
pub struct ProxyPool {
    state: Mutex<PoolState>,
    thresholds: HealthThresholds,
    source: Arc<dyn ProxySource>,
}

impl ProxyPool {
    /// Create an empty pool; it is filled from `source` on first use.
    pub fn new(source: Arc<dyn ProxySource>, thresholds: HealthThresholds) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            thresholds,
            source,
        }
    }

    pub fn thresholds(&self) -> HealthThresholds {
        self.thresholds
    }

    pub fn len(&self) -> usize {
        self.state.lock().addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().addresses.is_empty()
    }

    /// Seed the pool from its source if it is empty.
    ///
    /// The source is read without holding the lock; the loaded list is only
    /// installed if the pool is still empty once the lock is re-acquired, so a
    /// concurrent seeding is never clobbered. Returns the pool size afterwards.
    pub async fn ensure_seeded(&self) -> usize {
        if !self.is_empty() {
            return self.len();
        }

        let loaded = self.source.load().await;

        let mut state = self.state.lock();
        if state.addresses.is_empty() && !loaded.is_empty() {
            info!(count = loaded.len(), "Seeded proxy pool");
            state.addresses = loaded;
        }
        state.addresses.len()
    }

    /// Reset the failure count of `address`.
    pub fn record_success(&self, address: &ProxyAddress) {
        let mut state = self.state.lock();
        if state.contains(address) {
            state.failure_counts.insert(address.clone(), 0);
        }
    }

    /// Count a failure against `address`, purging it once it reaches the
    /// removal threshold. Addresses no longer in the pool are ignored.
    pub fn record_failure(&self, address: &ProxyAddress) -> FailureVerdict {
        let mut state = self.state.lock();
        if !state.contains(address) {
            return FailureVerdict {
                failures: 0,
                removed: false,
            };
        }

        let failures = state.failures(address) + 1;
        if failures >= self.thresholds.remove_after {
            state.addresses.retain(|a| a != address);
            state.failure_counts.remove(address);
            info!(
                proxy = %address,
                failures,
                remaining = state.addresses.len(),
                "Removed failing proxy"
            );
            return FailureVerdict {
                failures,
                removed: true,
            };
        }

        state.failure_counts.insert(address.clone(), failures);
        debug!(proxy = %address, failures, "Recorded proxy failure");
        FailureVerdict {
            failures,
            removed: false,
        }
    }

    /// Current failure count of `address` (0 if unknown).
    pub fn failure_count(&self, address: &ProxyAddress) -> u32 {
        self.state.lock().failures(address)
    }

    /// Addresses below the soft-exclude threshold, or every address if all of
    /// them are soft-excluded.
    pub fn snapshot_usable(&self) -> Vec<ProxyAddress> {
        let state = self.state.lock();
        let usable: Vec<ProxyAddress> = state
            .addresses
            .iter()
            .filter(|a| state.failures(a) < self.thresholds.soft_exclude_after)
            .cloned()
            .collect();

        if usable.is_empty() {
            state.addresses.clone()
        } else {
            usable
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            total_proxies: state.addresses.len(),
            healthy_proxies: state
                .addresses
                .iter()
                .filter(|a| state.failures(a) < self.thresholds.remove_after)
                .count(),
            failure_counts: state
                .failure_counts
                .iter()
                .map(|(a, c)| (a.clone(), *c))
                .collect(),
        }
    }
}

impl fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyPool")
            .field("thresholds", &self.thresholds)
            .field("len", &self.len())
            .finish()
    }
}
