//! Proxy list sources
//!
//! A source yields candidate addresses; it never fails. An unreadable or
//! malformed source is reported as an empty list and the fetch layer treats
//! that as "no proxies available".

use super::address::ProxyAddress;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Supplier of proxy addresses used to seed an empty pool.
#[async_trait]
pub trait ProxySource: Send + Sync {
    async fn load(&self) -> Vec<ProxyAddress>;
}

/// Line-delimited proxy file, re-read every time the pool drains.
#[derive(Debug, Clone)]
pub struct FileProxySource {
    path: PathBuf,
}

impl FileProxySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProxySource for FileProxySource {
    async fn load(&self) -> Vec<ProxyAddress> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let proxies = parse_proxy_list(&contents);
                debug!(path = %self.path.display(), count = proxies.len(), "Loaded proxy list");
                proxies
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Proxy list unreadable");
                Vec::new()
            }
        }
    }
}

/// Fixed in-memory list; every load returns the same addresses.
#[derive(Debug, Clone, Default)]
pub struct StaticProxySource {
    proxies: Vec<ProxyAddress>,
}

impl StaticProxySource {
    pub fn new<I, S>(proxies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ProxyAddress>,
    {
        Self {
            proxies: proxies.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ProxySource for StaticProxySource {
    async fn load(&self) -> Vec<ProxyAddress> {
        self.proxies.clone()
    }
}

/// Parse a proxy list: one address per line, trimmed. Blank lines and lines
/// without a `:` are skipped.
pub fn parse_proxy_list(contents: &str) -> Vec<ProxyAddress> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.contains(':'))
        .map(ProxyAddress::from)
        .collect()
}
