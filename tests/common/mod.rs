#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use guide_api::{
    AppState, build_router,
    cache::{MemoryWindowStore, WindowHit, WindowStore, models::rate_limit::{DeniedRequestPolicy, RateLimitPolicy}},
    config::{Config, RateLimitStoreKind},
    llm::{GenerationError, TextGenerator},
    middleware::RateLimiter,
};

pub struct StubGenerator {
    pub fail: bool,
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _system: &str,
        _max_tokens: u32,
    ) -> Result<String, GenerationError> {
        if self.fail {
            return Err(GenerationError::Status {
                status: 503,
                body: "overloaded".into(),
            });
        }
        Ok(format!("echo: {}", prompt))
    }
}

pub struct UnreachableStore;

#[async_trait]
impl WindowStore for UnreachableStore {
    async fn hit(&self, _hit: &WindowHit) -> Result<u64, redis::RedisError> {
        Err(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        )))
    }
}

pub fn test_config() -> Config {
    Config {
        redis_url: "redis://127.0.0.1:6379".into(),
        redis_token: None,
        rate_limit_store: RateLimitStoreKind::Memory,
        trust_proxy_headers: true,
        rate_limit_timeout_ms: 200,
        denied_request_policy: DeniedRequestPolicy::Count,
        chat_rate_limit: RateLimitPolicy::new(20, 60),
        health_advice_rate_limit: RateLimitPolicy::new(5, 60),
        llm_api_url: "http://127.0.0.1:9".into(),
        llm_api_key: "test".into(),
        llm_model: "test-model".into(),
        llm_timeout_secs: 1,
        server_host: "127.0.0.1".into(),
        server_port: 0,
    }
}

pub fn app_with(config: Config, store: Arc<dyn WindowStore>, generator: StubGenerator) -> Router {
    let limiter = Arc::new(RateLimiter::from_config(store, &config));
    build_router(AppState {
        config,
        limiter,
        generator: Arc::new(generator),
    })
}

pub fn app() -> Router {
    app_with(
        test_config(),
        Arc::new(MemoryWindowStore::new()),
        StubGenerator { fail: false },
    )
}
