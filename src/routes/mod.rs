pub mod chat;
pub mod health_advice;
pub mod ping;

/// 限流桶名称，作为调用方标识前缀
pub const CHAT_BUCKET: &str = "chat";
pub const HEALTH_ADVICE_BUCKET: &str = "health-advice";
