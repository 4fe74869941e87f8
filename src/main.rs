use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use guide_api::{
    AppState, build_router,
    cache::{MemoryWindowStore, RedisWindowStore, WindowStore},
    config::{Config, RateLimitStoreKind},
    llm::HttpTextGenerator,
    middleware::RateLimiter,
};
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置，缺少必需项时直接退出
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置限流存储，连接在首次请求时建立并在请求间复用
    let store: Arc<dyn WindowStore> = match config.rate_limit_store {
        RateLimitStoreKind::Redis => {
            let info = config
                .redis_connection_info()
                .expect("Invalid Redis configuration");
            let client = redis::Client::open(info).expect("Failed to create Redis client");
            // Redis 不可用时不阻塞启动，限流器放行并在后续请求中重连
            Arc::new(RedisWindowStore::new(client))
        }
        RateLimitStoreKind::Memory => {
            tracing::warn!("Using in-memory rate limit store; counts are not shared across instances");
            Arc::new(MemoryWindowStore::new())
        }
    };
    tracing::info!(
        "Rate limiting: store={:?}, denied requests={:?}, timeout={:?}",
        config.rate_limit_store,
        config.denied_request_policy,
        config.rate_limit_timeout()
    );

    let limiter = Arc::new(RateLimiter::from_config(store, &config));
    let generator =
        Arc::new(HttpTextGenerator::from_config(&config).expect("Failed to build LLM client"));

    // 设置应用状态
    let state = AppState {
        config: config.clone(),
        limiter,
        generator,
    };

    let router = build_router(state);

    // 开发模式允许跨域
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
