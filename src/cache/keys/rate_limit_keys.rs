/// 限流有序集合键前缀
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 生成限流键，identity 原样拼接，不做解析
pub fn rate_limit_key(identity: &str) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, identity)
}

/// 生成调用方标识，例如 `chat:1.2.3.4`
pub fn identity(bucket: &str, client: &str) -> String {
    format!("{}:{}", bucket, client)
}
