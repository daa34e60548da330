//! HTTP transport for single proxied attempts
//!
//! reqwest binds proxies per client, so [`HttpTransport`] keeps one pooled
//! client per proxy and timeout pair. Every client shares the same settings:
//! no redirects, no environment proxies, a large idle pool and a fixed
//! `Accept-Language` header. Timeouts bound the connect and each read, not
//! the whole transfer. Retries are the orchestrator's job.

use super::error::{FetchError, TransportError, TransportErrorKind};
use crate::pool::ProxyAddress;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Proxy, StatusCode, redirect};
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ACCEPT_LANGUAGE: &str = "de-DE,de;q=0.9,en;q=0.8";
pub const DEFAULT_MAX_IDLE_PER_HOST: usize = 512;

/// One GET through one proxy.
#[derive(Debug, Clone, Copy)]
pub struct AttemptRequest<'a> {
    pub url: &'a str,
    pub proxy: &'a ProxyAddress,
    pub user_agent: Option<&'a str>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

/// Fully read response of a successful attempt.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    /// Final URL as reported by the client
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Proxy that served the response
    pub proxy: ProxyAddress,
}

impl FetchResponse {
    pub fn new(status: StatusCode, url: impl Into<String>, proxy: ProxyAddress) -> Self {
        Self {
            status,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            proxy,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Turn a non-2xx response into [`FetchError::Status`].
    pub fn error_for_status(self) -> Result<Self, FetchError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                status: self.status,
                url: self.url,
            })
        }
    }
}

/// Performs exactly one HTTP attempt; never retries or follows redirects.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: AttemptRequest<'_>) -> Result<FetchResponse, TransportError>;

    /// Release resources tied to a proxy that left the pool.
    fn evict(&self, _proxy: &ProxyAddress) {}
}

/// Shared client settings
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub accept_language: String,
    pub max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            max_idle_per_host: DEFAULT_MAX_IDLE_PER_HOST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    proxy: ProxyAddress,
    connect_timeout: Duration,
    read_timeout: Duration,
}

/// reqwest-backed transport shared by every fetch call.
pub struct HttpTransport {
    default_headers: HeaderMap,
    max_idle_per_host: usize,
    clients: Mutex<HashMap<ClientKey, Client>>,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let language = HeaderValue::from_str(&config.accept_language).map_err(|e| {
            TransportError::new(
                TransportErrorKind::Request,
                format!("Invalid Accept-Language header: {}", e),
            )
        })?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT_LANGUAGE, language);

        Ok(Self {
            default_headers,
            max_idle_per_host: config.max_idle_per_host,
            clients: Mutex::new(HashMap::new()),
        })
    }

    /// Number of cached per-proxy clients
    pub fn cached_clients(&self) -> usize {
        self.clients.lock().len()
    }

    fn client_for(&self, key: ClientKey) -> Result<Client, TransportError> {
        if let Some(client) = self.clients.lock().get(&key) {
            return Ok(client.clone());
        }

        // Built outside the lock; a concurrent build for the same key loses
        let client = self.build_client(&key)?;
        Ok(self.clients.lock().entry(key).or_insert(client).clone())
    }

    fn build_client(&self, key: &ClientKey) -> Result<Client, TransportError> {
        let proxy = Proxy::all(key.proxy.to_proxy_url()).map_err(|e| {
            TransportError::new(
                TransportErrorKind::InvalidProxy,
                format!("Invalid proxy {}: {}", key.proxy, e),
            )
        })?;

        debug!(proxy = %key.proxy, "Building proxied HTTP client");

        // Setting an explicit proxy also disables HTTP(S)_PROXY lookups
        Client::builder()
            .proxy(proxy)
            .redirect(redirect::Policy::none())
            .connect_timeout(key.connect_timeout)
            .read_timeout(key.read_timeout)
            .pool_max_idle_per_host(self.max_idle_per_host)
            .default_headers(self.default_headers.clone())
            .build()
            .map_err(TransportError::from)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: AttemptRequest<'_>) -> Result<FetchResponse, TransportError> {
        let client = self.client_for(ClientKey {
            proxy: request.proxy.clone(),
            connect_timeout: request.connect_timeout,
            read_timeout: request.read_timeout,
        })?;

        let mut builder = client.get(request.url);
        if let Some(user_agent) = request.user_agent {
            builder = builder.header(USER_AGENT, user_agent);
        }

        let response = builder.send().await?;

        let status = response.status();
        let url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            TransportError::new(
                TransportErrorKind::Body,
                format!("Failed to read body: {}", e),
            )
        })?;

        Ok(FetchResponse {
            status,
            url,
            headers,
            body,
            proxy: request.proxy.clone(),
        })
    }

    fn evict(&self, proxy: &ProxyAddress) {
        self.clients.lock().retain(|key, _| &key.proxy != proxy);
    }
}
