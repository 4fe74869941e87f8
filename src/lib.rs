use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use config::Config;
use llm::TextGenerator;
use middleware::{RateLimiter, RouteGuard, enforce, log_errors};

pub mod cache;
pub mod config;
pub mod error;
pub mod llm;
pub mod middleware;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub limiter: Arc<RateLimiter>,
    pub generator: Arc<dyn TextGenerator>,
}

/// 构建 `/api` 路由，限流只作用于调用文本生成的接口
pub fn build_router(state: AppState) -> Router {
    let chat_guard = RouteGuard::new(
        state.limiter.clone(),
        routes::CHAT_BUCKET,
        state.config.chat_rate_limit,
    )
    .with_proxy_headers(state.config.trust_proxy_headers);
    let health_advice_guard = RouteGuard::new(
        state.limiter.clone(),
        routes::HEALTH_ADVICE_BUCKET,
        state.config.health_advice_rate_limit,
    )
    .with_proxy_headers(state.config.trust_proxy_headers);

    let api = Router::new()
        .route(
            "/chat",
            post(routes::chat::chat)
                .layer(axum::middleware::from_fn_with_state(chat_guard, enforce)),
        )
        .route(
            "/health-advice",
            post(routes::health_advice::health_advice).layer(
                axum::middleware::from_fn_with_state(health_advice_guard, enforce),
            ),
        )
        .route("/ping", get(routes::ping::ping));

    Router::new()
        .nest("/api", api)
        .layer(axum::middleware::from_fn(log_errors))
        .with_state(state)
}
