//! Retry loop over the proxy pool

use super::error::{FetchError, Result};
use super::outcome::AttemptOutcome;
use super::transport::{AttemptRequest, FetchResponse, Transport};
use crate::observability::FetchMetrics;
use crate::pool::{PoolStats, ProxyAddress, ProxyPool};
use bon::Builder;
use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 200;
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(150);

pub const DEFAULT_USER_AGENTS: [&str; 2] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
];

/// Per-call fetch limits
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct FetchOptions {
    #[builder(default = DEFAULT_CONNECT_TIMEOUT)]
    pub connect_timeout: Duration,
    #[builder(default = DEFAULT_READ_TIMEOUT)]
    pub read_timeout: Duration,
    /// Attempts across all proxies for one call
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
    /// Upper bound of the random pause after a failed attempt
    #[builder(default = DEFAULT_MAX_JITTER)]
    pub max_jitter: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Called before every attempt with the 1-based attempt number and the proxy.
pub type AttemptObserver = Arc<dyn Fn(u32, &ProxyAddress) + Send + Sync>;

/// Fetches URLs through a rotating pool of proxies.
///
/// Each call shuffles a snapshot of usable proxies and walks it, one attempt
/// per proxy, re-snapshotting when it runs out. Blocked statuses and transport
/// errors count against the proxy and move on to the next; the first other
/// response is returned. A call either yields such a response or fails with
/// [`FetchError::Exhausted`] / [`FetchError::NoProxiesAvailable`].
///
/// The fetcher is cheap to share behind an `Arc`; concurrent calls only
/// contend on the pool lock, which is never held across network I/O.
pub struct Fetcher {
    pool: Arc<ProxyPool>,
    transport: Arc<dyn Transport>,
    user_agents: Vec<String>,
    options: FetchOptions,
    metrics: Arc<FetchMetrics>,
    observer: Option<AttemptObserver>,
}

impl Fetcher {
    pub fn new(pool: Arc<ProxyPool>, transport: Arc<dyn Transport>) -> Self {
        Self {
            pool,
            transport,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            options: FetchOptions::default(),
            metrics: Arc::new(FetchMetrics::new()),
            observer: None,
        }
    }

    /// Options used by [`Fetcher::fetch`]
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// User agents picked at random per attempt. An empty list sends none.
    pub fn with_user_agents(mut self, user_agents: Vec<String>) -> Self {
        self.user_agents = user_agents;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<FetchMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn on_attempt<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32, &ProxyAddress) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub fn metrics(&self) -> &FetchMetrics {
        &self.metrics
    }

    /// Pool diagnostics; no side effects.
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Fetch `url` with the fetcher's default options.
    pub async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        self.fetch_with(url, &self.options).await
    }

    /// Fetch `url` with explicit limits.
    pub async fn fetch_with(&self, url: &str, options: &FetchOptions) -> Result<FetchResponse> {
        reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let span = info_span!("fetch", request_id = %Uuid::new_v4(), url);
        self.run(url, options).instrument(span).await
    }

    async fn run(&self, url: &str, options: &FetchOptions) -> Result<FetchResponse> {
        self.metrics.fetch_started();
        self.pool.ensure_seeded().await;

        let mut candidates = self.shuffled_snapshot();
        let mut next = 0;
        let mut attempt = 0;

        while attempt < options.max_attempts {
            if next >= candidates.len() {
                self.pool.ensure_seeded().await;
                candidates = self.shuffled_snapshot();
                next = 0;
                if candidates.is_empty() {
                    warn!(attempt, "Proxy pool is empty");
                    self.metrics.fetch_exhausted();
                    return Err(FetchError::NoProxiesAvailable);
                }
            }

            let proxy = candidates[next].clone();
            next += 1;
            attempt += 1;

            if let Some(observer) = &self.observer {
                observer(attempt, &proxy);
            }
            self.metrics.attempt();

            let request = AttemptRequest {
                url,
                proxy: &proxy,
                user_agent: self.pick_user_agent(),
                connect_timeout: options.connect_timeout,
                read_timeout: options.read_timeout,
            };

            match AttemptOutcome::classify(self.transport.get(request).await) {
                AttemptOutcome::Success(response) => {
                    self.pool.record_success(&proxy);
                    self.metrics.fetch_succeeded();
                    debug!(attempt, proxy = %proxy, status = response.status.as_u16(), "Fetch succeeded");
                    return Ok(response);
                }
                AttemptOutcome::RetryableStatus(status) => {
                    self.metrics.retryable_status();
                    debug!(attempt, proxy = %proxy, status = status.as_u16(), "Retryable status");
                }
                AttemptOutcome::TransientError(kind) => {
                    self.metrics.transient_error();
                    debug!(attempt, proxy = %proxy, error = %kind, "Transport error");
                }
            }

            self.record_failure(&proxy);

            if attempt < options.max_attempts {
                tokio::time::sleep(jitter(options.max_jitter)).await;
            }
        }

        let stats = self.pool.stats();
        warn!(attempts = attempt, %stats, "Fetch attempts exhausted");
        self.metrics.fetch_exhausted();
        Err(FetchError::Exhausted {
            attempts: attempt,
            stats,
        })
    }

    fn record_failure(&self, proxy: &ProxyAddress) {
        if self.pool.record_failure(proxy).removed {
            self.transport.evict(proxy);
            self.metrics.proxy_removed();
        }
    }

    fn shuffled_snapshot(&self) -> Vec<ProxyAddress> {
        let mut snapshot = self.pool.snapshot_usable();
        snapshot.shuffle(&mut rand::thread_rng());
        snapshot
    }

    fn pick_user_agent(&self) -> Option<&str> {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }
}

/// Uniform random pause in `[0, max]`.
pub fn jitter(max: Duration) -> Duration {
    let max_micros = u64::try_from(max.as_micros()).unwrap_or(u64::MAX);
    if max_micros == 0 {
        return Duration::ZERO;
    }
    Duration::from_micros(rand::thread_rng().gen_range(0..=max_micros))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::error::{TransportError, TransportErrorKind};
    use crate::pool::{HealthThresholds, ProxySource, StaticProxySource};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use reqwest::StatusCode;
    use std::collections::{HashMap, VecDeque};

    type Scripted = std::result::Result<u16, TransportErrorKind>;

    /// Replays scripted outcomes per proxy; unscripted proxies refuse connections.
    #[derive(Default)]
    struct ScriptedTransport {
        scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
        calls: Mutex<Vec<(ProxyAddress, Option<String>)>>,
        evicted: Mutex<Vec<ProxyAddress>>,
    }

    impl ScriptedTransport {
        fn script(self, proxy: &str, outcomes: Vec<Scripted>) -> Self {
            self.scripts
                .lock()
                .insert(proxy.to_string(), outcomes.into_iter().collect());
            self
        }

        fn calls(&self) -> Vec<(ProxyAddress, Option<String>)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(
            &self,
            request: AttemptRequest<'_>,
        ) -> std::result::Result<FetchResponse, TransportError> {
            self.calls.lock().push((
                request.proxy.clone(),
                request.user_agent.map(str::to_string),
            ));

            let next = self
                .scripts
                .lock()
                .get_mut(request.proxy.as_str())
                .and_then(VecDeque::pop_front)
                .unwrap_or(Err(TransportErrorKind::Connect));

            match next {
                Ok(code) => Ok(FetchResponse::new(
                    StatusCode::from_u16(code).unwrap(),
                    request.url,
                    request.proxy.clone(),
                )
                .with_body(format!("status {}", code))),
                Err(kind) => Err(TransportError::new(kind, "scripted failure")),
            }
        }

        fn evict(&self, proxy: &ProxyAddress) {
            self.evicted.lock().push(proxy.clone());
        }
    }

    fn pool_of(addresses: &[&str]) -> Arc<ProxyPool> {
        Arc::new(ProxyPool::new(
            Arc::new(StaticProxySource::new(addresses.iter().copied())),
            HealthThresholds::default(),
        ))
    }

    fn fast_options(max_attempts: u32) -> FetchOptions {
        FetchOptions::builder()
            .max_attempts(max_attempts)
            .max_jitter(Duration::from_millis(1))
            .build()
    }

    const URL: &str = "http://example.test/page";

    #[test]
    fn test_default_options() {
        let options = FetchOptions::default();
        assert_eq!(options.connect_timeout, Duration::from_secs(3));
        assert_eq!(options.read_timeout, Duration::from_secs(5));
        assert_eq!(options.max_attempts, 200);
        assert_eq!(options.max_jitter, Duration::from_millis(150));
    }

    #[test]
    fn test_jitter_bounds() {
        let max = Duration::from_millis(150);
        for _ in 0..1000 {
            assert!(jitter(max) <= max);
        }
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_retry_after_429_then_success() {
        let transport = Arc::new(ScriptedTransport::default().script("p1:8080", vec![Ok(429), Ok(200)]));
        let pool = pool_of(&["p1:8080"]);
        let fetcher = Fetcher::new(pool.clone(), transport.clone()).with_options(fast_options(10));

        let response = fetcher.fetch(URL).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "status 200");
        assert_eq!(pool.failure_count(&ProxyAddress::from("p1:8080")), 0);
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_after_budget() {
        let transport = Arc::new(ScriptedTransport::default());
        let pool = pool_of(&["p1:8080", "p2:8080"]);
        let fetcher = Fetcher::new(pool.clone(), transport.clone()).with_options(fast_options(3));

        let err = fetcher.fetch(URL).await.unwrap_err();

        match err {
            FetchError::Exhausted { attempts, stats } => {
                assert_eq!(attempts, 3);
                // Three failures over two proxies: one of them hit the removal threshold
                assert_eq!(stats.total_proxies, 1);
                assert_eq!(stats.failure_counts.values().sum::<u32>(), 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.calls().len(), 3);
        assert_eq!(transport.evicted.lock().len(), 1);
        assert_eq!(fetcher.metrics().snapshot().proxies_removed, 1);
    }

    #[tokio::test]
    async fn test_never_returns_retryable_status() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .script("p1:8080", vec![Ok(403), Ok(503)])
                .script("p2:8080", vec![Ok(302), Ok(407)]),
        );
        let pool = pool_of(&["p1:8080", "p2:8080"]);
        let fetcher = Fetcher::new(pool, transport).with_options(fast_options(4));

        let err = fetcher.fetch(URL).await.unwrap_err();
        assert!(matches!(err, FetchError::Exhausted { .. }));
    }

    #[tokio::test]
    async fn test_non_retryable_error_status_is_returned() {
        let transport = Arc::new(ScriptedTransport::default().script("p1:8080", vec![Ok(404)]));
        let fetcher = Fetcher::new(pool_of(&["p1:8080"]), transport).with_options(fast_options(5));

        let response = fetcher.fetch(URL).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(response.error_for_status().is_err());
    }

    #[tokio::test]
    async fn test_empty_pool_fails_without_attempts() {
        let transport = Arc::new(ScriptedTransport::default());
        let fetcher = Fetcher::new(pool_of(&[]), transport.clone()).with_options(fast_options(5));

        let err = fetcher.fetch(URL).await.unwrap_err();

        assert!(matches!(err, FetchError::NoProxiesAvailable));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_pool_drained_mid_call() {
        let pool = Arc::new(ProxyPool::new(
            Arc::new(StaticProxySource::new(["p1:8080"])),
            HealthThresholds::default(),
        ));
        let transport = Arc::new(ScriptedTransport::default());
        let fetcher = Fetcher::new(pool.clone(), transport.clone()).with_options(fast_options(50));

        // p1 fails twice and is removed, then the pool re-seeds from the source
        // and the cycle repeats until the attempt budget is spent
        let err = fetcher.fetch(URL).await.unwrap_err();
        assert!(matches!(err, FetchError::Exhausted { attempts: 50, .. }));
        assert_eq!(transport.calls().len(), 50);
    }

    struct OneShotSource {
        proxies: Mutex<Vec<ProxyAddress>>,
    }

    #[async_trait]
    impl ProxySource for OneShotSource {
        async fn load(&self) -> Vec<ProxyAddress> {
            std::mem::take(&mut *self.proxies.lock())
        }
    }

    #[tokio::test]
    async fn test_pool_not_replenished_fails_fast() {
        let pool = Arc::new(ProxyPool::new(
            Arc::new(OneShotSource {
                proxies: Mutex::new(vec![ProxyAddress::from("p1:8080")]),
            }),
            HealthThresholds::default(),
        ));
        let transport = Arc::new(ScriptedTransport::default());
        let fetcher = Fetcher::new(pool, transport.clone()).with_options(fast_options(50));

        let err = fetcher.fetch(URL).await.unwrap_err();
        assert!(matches!(err, FetchError::NoProxiesAvailable));
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts() {
        let transport = Arc::new(ScriptedTransport::default());
        let fetcher = Fetcher::new(pool_of(&["p1:8080"]), transport.clone()).with_options(fast_options(0));

        let err = fetcher.fetch(URL).await.unwrap_err();
        assert!(matches!(err, FetchError::Exhausted { attempts: 0, .. }));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_attempts() {
        let transport = Arc::new(ScriptedTransport::default());
        let fetcher = Fetcher::new(pool_of(&["p1:8080"]), transport.clone());

        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert!(transport.calls().is_empty());
        assert!(fetcher.pool().is_empty());
    }

    #[tokio::test]
    async fn test_resnapshot_after_first_pass() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .script("p1:8080", vec![Ok(503), Ok(200)])
                .script("p2:8080", vec![Ok(503), Ok(200)]),
        );
        let pool = pool_of(&["p1:8080", "p2:8080"]);
        let fetcher = Fetcher::new(pool.clone(), transport.clone()).with_options(fast_options(3));

        let response = fetcher.fetch(URL).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(transport.calls().len(), 3);

        // Both were soft-excluded, so the second pass fell back to the full list
        let winner = response.proxy.clone();
        let stats = fetcher.stats();
        assert_eq!(stats.total_proxies, 2);
        assert_eq!(stats.failure_counts.get(&winner), Some(&0));
        assert_eq!(stats.failure_counts.values().sum::<u32>(), 1);
    }

    #[tokio::test]
    async fn test_user_agents_and_observer() {
        let transport = Arc::new(ScriptedTransport::default().script("p1:8080", vec![Ok(200)]));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let fetcher = Fetcher::new(pool_of(&["p1:8080"]), transport.clone())
            .with_user_agents(vec!["test-agent/1.0".to_string()])
            .on_attempt(move |attempt, proxy| {
                seen_clone.lock().push((attempt, proxy.clone()));
            });

        fetcher.fetch(URL).await.unwrap();

        assert_eq!(*seen.lock(), vec![(1, ProxyAddress::from("p1:8080"))]);
        assert_eq!(transport.calls()[0].1.as_deref(), Some("test-agent/1.0"));
    }

    #[tokio::test]
    async fn test_empty_user_agent_pool() {
        let transport = Arc::new(ScriptedTransport::default().script("p1:8080", vec![Ok(200)]));
        let fetcher = Fetcher::new(pool_of(&["p1:8080"]), transport.clone()).with_user_agents(Vec::new());

        fetcher.fetch(URL).await.unwrap();
        assert_eq!(transport.calls()[0].1, None);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_pool() {
        let mut transport = ScriptedTransport::default();
        for p in ["p1:8080", "p2:8080", "p3:8080"] {
            transport = transport.script(p, vec![Ok(200); 20]);
        }
        let transport = Arc::new(transport);
        let fetcher = Arc::new(
            Fetcher::new(pool_of(&["p1:8080", "p2:8080", "p3:8080"]), transport)
                .with_options(fast_options(5)),
        );

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let fetcher = fetcher.clone();
                tokio::spawn(async move { fetcher.fetch(URL).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let snapshot = fetcher.metrics().snapshot();
        assert_eq!(snapshot.fetches_succeeded, 10);
        assert_eq!(fetcher.stats().total_proxies, 3);
    }
}
