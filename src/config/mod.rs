use std::env;
use std::time::Duration;

use redis::{ConnectionInfo, IntoConnectionInfo, RedisResult};
use thiserror::Error;

use crate::cache::models::rate_limit::{DeniedRequestPolicy, RateLimitPolicy};

/// 限流计数后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitStoreKind {
    Redis,
    /// 仅限单实例开发环境，多实例之间不共享计数
    Memory,
}

impl RateLimitStoreKind {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(RateLimitStoreKind::Memory),
            "redis" => Ok(RateLimitStoreKind::Redis),
            _ => Err(ConfigError::Invalid {
                name: "RATE_LIMIT_STORE",
                value: value.to_string(),
            }),
        }
    }
}

/// 启动阶段的配置错误，进程直接退出
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub redis_url: String,
    pub redis_token: Option<String>,
    pub rate_limit_store: RateLimitStoreKind,
    /// 是否信任 x-real-ip / x-forwarded-for，只应在会覆盖这两个头的反向代理之后开启
    pub trust_proxy_headers: bool,
    pub rate_limit_timeout_ms: u64,
    pub denied_request_policy: DeniedRequestPolicy,
    pub chat_rate_limit: RateLimitPolicy,
    pub health_advice_rate_limit: RateLimitPolicy,
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    pub server_host: String,
    pub server_port: u16,
}

/// 可选变量：缺失或无法解析时使用默认值
fn var_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {}: '{}', using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let denied_request_policy = if var_or("RATE_LIMIT_COUNT_DENIED", true) {
            DeniedRequestPolicy::Count
        } else {
            DeniedRequestPolicy::Discard
        };

        let rate_limit_store = match env::var("RATE_LIMIT_STORE") {
            Ok(value) => RateLimitStoreKind::parse(&value)?,
            Err(_) => RateLimitStoreKind::Redis,
        };

        Ok(Config {
            redis_url: required("REDIS_URL")?,
            redis_token: env::var("REDIS_TOKEN").ok().filter(|t| !t.is_empty()),
            rate_limit_store,
            trust_proxy_headers: var_or("TRUST_PROXY_HEADERS", false),
            rate_limit_timeout_ms: var_or("RATE_LIMIT_TIMEOUT_MS", 500),
            denied_request_policy,
            chat_rate_limit: RateLimitPolicy::new(
                var_or("CHAT_RATE_LIMIT_REQUESTS", 20),
                var_or("CHAT_RATE_LIMIT_WINDOW", 60),
            ),
            health_advice_rate_limit: RateLimitPolicy::new(
                var_or("HEALTH_ADVICE_RATE_LIMIT_REQUESTS", 5),
                var_or("HEALTH_ADVICE_RATE_LIMIT_WINDOW", 60),
            ),
            llm_api_url: env::var("LLM_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            llm_api_key: required("LLM_API_KEY")?,
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
            llm_timeout_secs: var_or("LLM_TIMEOUT_SECS", 30),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: var_or("SERVER_PORT", 3000),
        })
    }

    pub fn rate_limit_timeout(&self) -> Duration {
        Duration::from_millis(self.rate_limit_timeout_ms)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// 解析 Redis 连接参数，设置了 REDIS_TOKEN 时作为密码覆盖 URL 中的值
    pub fn redis_connection_info(&self) -> RedisResult<ConnectionInfo> {
        let mut info = self.redis_url.as_str().into_connection_info()?;
        if let Some(token) = &self.redis_token {
            info.redis.password = Some(token.clone());
        }
        Ok(info)
    }
}
