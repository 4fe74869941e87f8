/// 限流存储操作
/// 定义滑动窗口的原子操作接口及其实现
use async_trait::async_trait;

use crate::cache::models::rate_limit::{DeniedRequestPolicy, RateLimitEntry};

// Redis 有序集合实现
pub mod rate_limit;

// 进程内实现
pub mod memory;

pub use memory::MemoryWindowStore;
pub use rate_limit::RedisWindowStore;

/// 一次滑动窗口访问所需的全部参数
#[derive(Debug, Clone)]
pub struct WindowHit {
    pub key: String,
    /// 分数在 `[0, window_start]` 内的记录视为过期
    pub window_start: i64,
    pub entry: RateLimitEntry,
    pub limit: u32,
    pub ttl_secs: u64,
    pub denied: DeniedRequestPolicy,
}

/// 滑动窗口存储后端
///
/// `hit` 必须作为一个不可分割的整体执行：清理过期记录、读取基数、
/// 写入本次记录、刷新过期时间。返回值为写入前的基数。
#[async_trait]
pub trait WindowStore: Send + Sync {
    async fn hit(&self, hit: &WindowHit) -> Result<u64, redis::RedisError>;
}
