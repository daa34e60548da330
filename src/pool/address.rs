//! Proxy endpoint addresses

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Opaque proxy endpoint, `host:port` or `user:pass@host:port`.
///
/// Equality is exact string equality. `Display` and `Debug` redact credentials
/// so addresses can be logged safely; use [`ProxyAddress::as_str`] for the raw value.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProxyAddress(String);

impl ProxyAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Proxy URL suitable for an HTTP client. Bare `host:port` entries are
    /// treated as plain HTTP proxies.
    pub fn to_proxy_url(&self) -> String {
        if self.0.contains("://") {
            self.0.clone()
        } else {
            format!("http://{}", self.0)
        }
    }

    /// Address with any `user:pass@` part replaced by `***@`.
    pub fn redacted(&self) -> String {
        let (scheme, rest) = match self.0.split_once("://") {
            Some((scheme, rest)) => (Some(scheme), rest),
            None => (None, self.0.as_str()),
        };

        let host = match rest.rsplit_once('@') {
            Some((_, host)) => format!("***@{}", host),
            None => rest.to_string(),
        };

        match scheme {
            Some(scheme) => format!("{}://{}", scheme, host),
            None => host,
        }
    }
}

impl fmt::Display for ProxyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for ProxyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProxyAddress").field(&self.redacted()).finish()
    }
}

impl From<&str> for ProxyAddress {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProxyAddress {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ProxyAddress {
    fn borrow(&self) -> &str {
        &self.0
    }
}
