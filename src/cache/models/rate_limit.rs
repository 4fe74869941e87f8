use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
pub const HEADER_RESET: &str = "X-RateLimit-Reset";

/// 限流策略，由调用方按接口提供，不持久化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window_secs: u64,
}

impl RateLimitPolicy {
    /// 窗口至少为 1 秒；limit 为 0 表示拒绝所有请求
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self {
            limit,
            window_secs: window_secs.max(1),
        }
    }
}

/// 被拒绝的请求是否仍占用窗口名额
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeniedRequestPolicy {
    /// 先写入再判断，被拒绝的请求同样计数
    #[default]
    Count,
    /// 先判断，只有放行的请求才写入
    Discard,
}

/// 有序集合中的一条记录，score 为请求时间（秒）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub score: i64,
    pub member: String,
}

impl RateLimitEntry {
    /// 同一秒内的并发请求通过随机后缀区分
    pub fn new(now: i64) -> Self {
        Self {
            score: now,
            member: format!("{}:{}", now, Uuid::new_v4().simple()),
        }
    }
}

/// 单次限流判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitResult {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset: i64, // Unix timestamp
}

impl RateLimitResult {
    /// `current_count` 为写入本次请求之前窗口内的记录数
    pub fn from_count(policy: RateLimitPolicy, current_count: u64, now: i64) -> Self {
        let limit = u64::from(policy.limit);
        let remaining = limit.saturating_sub(current_count).saturating_sub(1);
        Self {
            success: current_count < limit,
            limit: policy.limit,
            remaining: remaining as u32,
            reset: reset_at(policy, now),
        }
    }

    /// 后端不可用时放行
    pub fn fail_open(policy: RateLimitPolicy, now: i64) -> Self {
        Self {
            success: true,
            limit: policy.limit,
            remaining: policy.limit,
            reset: reset_at(policy, now),
        }
    }

    pub fn header_pairs(&self) -> [(&'static str, String); 3] {
        [
            (HEADER_LIMIT, self.limit.to_string()),
            (HEADER_REMAINING, self.remaining.to_string()),
            (HEADER_RESET, self.reset.to_string()),
        ]
    }

    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(HeaderName::from_static("x-ratelimit-limit"), HeaderValue::from(self.limit));
        headers.insert(
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from(self.remaining),
        );
        headers.insert(HeaderName::from_static("x-ratelimit-reset"), HeaderValue::from(self.reset));
    }
}

fn reset_at(policy: RateLimitPolicy, now: i64) -> i64 {
    now.saturating_add(i64::try_from(policy.window_secs).unwrap_or(i64::MAX))
}
