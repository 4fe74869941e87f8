use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    cache::{
        keys::{identity, rate_limit_key},
        models::rate_limit::{DeniedRequestPolicy, RateLimitEntry, RateLimitPolicy, RateLimitResult},
        operations::{WindowHit, WindowStore},
    },
    config::Config,
    error::AppError,
};

/// 无法识别客户端地址时使用的标识
pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// 分布式滑动窗口限流器
///
/// 自身不持有任何计数状态，所有协调都通过 [`WindowStore`] 完成。
/// 存储出错或超时时放行请求并记录错误，从不向调用方返回错误。
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    timeout: Duration,
    denied: DeniedRequestPolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn WindowStore>, timeout: Duration, denied: DeniedRequestPolicy) -> Self {
        Self {
            store,
            timeout,
            denied,
        }
    }

    pub fn from_config(store: Arc<dyn WindowStore>, config: &Config) -> Self {
        Self::new(store, config.rate_limit_timeout(), config.denied_request_policy)
    }

    pub async fn check(&self, identity: &str, policy: RateLimitPolicy) -> RateLimitResult {
        self.check_at(identity, policy, chrono::Utc::now().timestamp())
            .await
    }

    pub async fn check_at(
        &self,
        identity: &str,
        policy: RateLimitPolicy,
        now: i64,
    ) -> RateLimitResult {
        let window = i64::try_from(policy.window_secs).unwrap_or(i64::MAX);
        let hit = WindowHit {
            key: rate_limit_key(identity),
            window_start: now.saturating_sub(window),
            entry: RateLimitEntry::new(now),
            limit: policy.limit,
            ttl_secs: policy.window_secs,
            denied: self.denied,
        };

        match tokio::time::timeout(self.timeout, self.store.hit(&hit)).await {
            Ok(Ok(count)) => {
                let result = RateLimitResult::from_count(policy, count, now);
                tracing::debug!(
                    "rate limit {}: count={} limit={} success={}",
                    identity,
                    count,
                    policy.limit,
                    result.success
                );
                result
            }
            Ok(Err(e)) => {
                tracing::error!("Rate limit store error for {}, failing open: {}", identity, e);
                RateLimitResult::fail_open(policy, now)
            }
            Err(_) => {
                tracing::error!(
                    "Rate limit store timed out after {:?} for {}, failing open",
                    self.timeout,
                    identity
                );
                RateLimitResult::fail_open(policy, now)
            }
        }
    }
}

/// 单个接口的限流配置，作为中间件状态使用
#[derive(Clone)]
pub struct RouteGuard {
    pub limiter: Arc<RateLimiter>,
    pub bucket: &'static str,
    pub policy: RateLimitPolicy,
    pub trust_proxy_headers: bool,
}

impl RouteGuard {
    pub fn new(limiter: Arc<RateLimiter>, bucket: &'static str, policy: RateLimitPolicy) -> Self {
        Self {
            limiter,
            bucket,
            policy,
            trust_proxy_headers: false,
        }
    }

    pub fn with_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }
}

/// 获取客户端地址：x-real-ip > x-forwarded-for 首个非空项 > 连接地址
///
/// 这两个请求头由客户端任意设置，`trust_proxy_headers` 为 false 时忽略，
/// 只使用连接地址。
pub fn client_ip(req: &Request<Body>, trust_proxy_headers: bool) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    let forwarded = trust_proxy_headers
        .then(|| {
            req.headers()
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .or_else(|| {
                    req.headers()
                        .get("x-forwarded-for")
                        .and_then(|h| h.to_str().ok())
                        .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
                })
        })
        .flatten();

    forwarded
        .or(remote_ip.as_deref())
        .unwrap_or(ANONYMOUS_CLIENT)
        .to_string()
}

pub async fn enforce(State(guard): State<RouteGuard>, req: Request<Body>, next: Next) -> Response {
    let identity = identity(guard.bucket, &client_ip(&req, guard.trust_proxy_headers));
    let result = guard.limiter.check(&identity, guard.policy).await;

    if !result.success {
        tracing::warn!("Rate limit exceeded for {}", identity);
        let mut response = AppError::RateLimited(guard.policy.window_secs).into_response();
        result.apply_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(req).await;
    result.apply_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::operations::MemoryWindowStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FailingStore;

    #[async_trait]
    impl WindowStore for FailingStore {
        async fn hit(&self, _hit: &WindowHit) -> Result<u64, redis::RedisError> {
            Err(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            )))
        }
    }

    /// 可切换为故障状态的内存存储
    struct FlakyStore {
        inner: MemoryWindowStore,
        down: AtomicBool,
    }

    #[async_trait]
    impl WindowStore for FlakyStore {
        async fn hit(&self, hit: &WindowHit) -> Result<u64, redis::RedisError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(redis::RedisError::from((redis::ErrorKind::IoError, "broken pipe")));
            }
            self.inner.hit(hit).await
        }
    }

    struct StallingStore;

    #[async_trait]
    impl WindowStore for StallingStore {
        async fn hit(&self, _hit: &WindowHit) -> Result<u64, redis::RedisError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(0)
        }
    }

    fn limiter_with(store: Arc<dyn WindowStore>, denied: DeniedRequestPolicy) -> RateLimiter {
        RateLimiter::new(store, Duration::from_millis(200), denied)
    }

    fn memory_limiter() -> RateLimiter {
        limiter_with(Arc::new(MemoryWindowStore::new()), DeniedRequestPolicy::Count)
    }

    #[tokio::test]
    async fn health_advice_scenario() {
        let limiter = memory_limiter();
        let policy = RateLimitPolicy::new(5, 60);
        let now = 1_700_000_000;

        let mut remaining = Vec::new();
        for _ in 0..5 {
            let result = limiter.check_at("health-advice:1.2.3.4", policy, now).await;
            assert!(result.success);
            remaining.push(result.remaining);
        }
        assert_eq!(remaining, vec![4, 3, 2, 1, 0]);

        let sixth = limiter.check_at("health-advice:1.2.3.4", policy, now).await;
        assert!(!sixth.success);
        assert_eq!(sixth.remaining, 0);
        assert_eq!(sixth.reset, now + 60);
    }

    #[tokio::test]
    async fn limit_plus_one_is_denied() {
        let limiter = memory_limiter();
        let policy = RateLimitPolicy::new(20, 60);
        for i in 0..20 {
            assert!(limiter.check_at("chat:10.0.0.1", policy, 1_000 + i % 30).await.success);
        }
        assert!(!limiter.check_at("chat:10.0.0.1", policy, 1_030).await.success);
    }

    #[tokio::test]
    async fn zero_limit_always_denies() {
        let limiter = memory_limiter();
        let policy = RateLimitPolicy::new(0, 60);
        for identity in ["chat:a", "chat:b", "health-advice:anonymous"] {
            for now in [100, 200, 10_000] {
                let result = limiter.check_at(identity, policy, now).await;
                assert!(!result.success);
                assert_eq!(result.remaining, 0);
            }
        }
    }

    #[tokio::test]
    async fn window_rolls_over() {
        let limiter = memory_limiter();
        let policy = RateLimitPolicy::new(3, 60);
        for _ in 0..3 {
            assert!(limiter.check_at("chat:roll", policy, 1_000).await.success);
        }
        assert!(!limiter.check_at("chat:roll", policy, 1_059).await.success);

        // 首批请求之后满 60 秒，旧记录移出窗口；1059 被拒绝的请求仍占一个名额
        let result = limiter.check_at("chat:roll", policy, 1_060).await;
        assert!(result.success);
        assert_eq!(result.remaining, 1);

        let result = limiter.check_at("chat:roll", policy, 1_200).await;
        assert!(result.success);
        assert_eq!(result.remaining, 2);
    }

    #[tokio::test]
    async fn window_rolls_over_when_denied_are_discarded() {
        let limiter = limiter_with(Arc::new(MemoryWindowStore::new()), DeniedRequestPolicy::Discard);
        let policy = RateLimitPolicy::new(3, 60);
        for _ in 0..3 {
            assert!(limiter.check_at("chat:roll", policy, 1_000).await.success);
        }
        assert!(!limiter.check_at("chat:roll", policy, 1_059).await.success);
        assert!(limiter.check_at("chat:roll", policy, 1_060).await.success);
    }

    #[tokio::test]
    async fn denied_requests_consume_window_under_count_policy() {
        let store = Arc::new(MemoryWindowStore::new());
        let limiter = limiter_with(store.clone(), DeniedRequestPolicy::Count);
        let policy = RateLimitPolicy::new(2, 60);
        for _ in 0..5 {
            limiter.check_at("chat:flood", policy, 1_000).await;
        }
        assert_eq!(store.cardinality(&rate_limit_key("chat:flood")).await, 5);
    }

    #[tokio::test]
    async fn denied_requests_are_not_recorded_under_discard_policy() {
        let store = Arc::new(MemoryWindowStore::new());
        let limiter = limiter_with(store.clone(), DeniedRequestPolicy::Discard);
        let policy = RateLimitPolicy::new(2, 60);
        for _ in 0..5 {
            limiter.check_at("chat:flood", policy, 1_000).await;
        }
        assert_eq!(store.cardinality(&rate_limit_key("chat:flood")).await, 2);
    }

    #[tokio::test]
    async fn identities_are_independent() {
        let limiter = memory_limiter();
        let policy = RateLimitPolicy::new(2, 60);
        assert!(limiter.check_at("chat:a", policy, 1_000).await.success);
        assert!(limiter.check_at("chat:a", policy, 1_000).await.success);
        assert!(!limiter.check_at("chat:a", policy, 1_000).await.success);

        let other = limiter.check_at("chat:b", policy, 1_000).await;
        assert!(other.success);
        assert_eq!(other.remaining, 1);
        let other_bucket = limiter.check_at("health-advice:a", policy, 1_000).await;
        assert!(other_bucket.success);
    }

    #[tokio::test]
    async fn remaining_is_non_increasing() {
        let limiter = memory_limiter();
        let policy = RateLimitPolicy::new(10, 60);
        let mut last = u32::MAX;
        for i in 0..15 {
            let result = limiter.check_at("chat:mono", policy, 1_000 + i).await;
            assert!(result.remaining <= last);
            last = result.remaining;
        }
        assert_eq!(last, 0);
    }

    #[tokio::test]
    async fn store_error_fails_open() {
        let limiter = limiter_with(Arc::new(FailingStore), DeniedRequestPolicy::Count);
        let policy = RateLimitPolicy::new(1, 60);
        for _ in 0..5 {
            let result = limiter.check_at("chat:down", policy, 1_000).await;
            assert_eq!(result, RateLimitResult::fail_open(policy, 1_000));
        }
    }

    #[tokio::test]
    async fn exhausted_quota_fails_open_when_store_goes_down() {
        let store = Arc::new(FlakyStore {
            inner: MemoryWindowStore::new(),
            down: AtomicBool::new(false),
        });
        let limiter = limiter_with(store.clone(), DeniedRequestPolicy::Count);
        let policy = RateLimitPolicy::new(3, 60);
        for _ in 0..3 {
            assert!(limiter.check_at("chat:flaky", policy, 1_000).await.success);
        }
        assert!(!limiter.check_at("chat:flaky", policy, 1_001).await.success);

        store.down.store(true, Ordering::SeqCst);
        let result = limiter.check_at("chat:flaky", policy, 1_002).await;
        assert_eq!(result, RateLimitResult::fail_open(policy, 1_002));

        // 恢复后之前的计数仍然有效
        store.down.store(false, Ordering::SeqCst);
        assert!(!limiter.check_at("chat:flaky", policy, 1_003).await.success);
    }

    #[tokio::test]
    async fn zero_limit_fails_open_when_store_is_down() {
        let limiter = limiter_with(Arc::new(FailingStore), DeniedRequestPolicy::Count);
        let result = limiter.check_at("chat:down", RateLimitPolicy::new(0, 60), 1_000).await;
        assert!(result.success);
        assert_eq!(result.remaining, 0);
    }

    #[tokio::test]
    async fn store_timeout_fails_open() {
        let limiter = limiter_with(Arc::new(StallingStore), DeniedRequestPolicy::Count);
        let policy = RateLimitPolicy::new(5, 60);
        let started = std::time::Instant::now();
        let result = limiter.check_at("chat:slow", policy, 1_000).await;
        assert!(result.success);
        assert_eq!(result.remaining, 5);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn concurrent_checks_admit_exactly_limit() {
        let limiter = Arc::new(memory_limiter());
        let policy = RateLimitPolicy::new(20, 60);

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check_at("chat:burst", policy, 1_000).await })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().success {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 20);
    }

    #[test]
    fn client_ip_prefers_real_ip_then_forwarded_for() {
        let req = Request::builder()
            .header("x-real-ip", " 9.9.9.9 ")
            .header("x-forwarded-for", "1.1.1.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req, true), "9.9.9.9");

        let req = Request::builder()
            .header("x-forwarded-for", " , 2.2.2.2, 3.3.3.3")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req, true), "2.2.2.2");
    }

    #[test]
    fn client_ip_falls_back_to_connection_then_anonymous() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req, true), ANONYMOUS_CLIENT);

        let addr: SocketAddr = "4.4.4.4:5555".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_ip(&req, true), "4.4.4.4");
    }

    #[test]
    fn client_ip_ignores_forwarding_headers_unless_trusted() {
        let addr: SocketAddr = "4.4.4.4:5555".parse().unwrap();
        let mut req = Request::builder()
            .header("x-real-ip", "9.9.9.9")
            .header("x-forwarded-for", "1.1.1.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req, false), ANONYMOUS_CLIENT);

        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_ip(&req, false), "4.4.4.4");
        assert_eq!(client_ip(&req, true), "9.9.9.9");
    }
}
