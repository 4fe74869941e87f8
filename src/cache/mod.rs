// 缓存模块
// 包含限流键、数据结构和存储后端

pub mod keys;
pub mod models;
pub mod operations;

pub use models::rate_limit::{RateLimitPolicy, RateLimitResult};
pub use operations::{MemoryWindowStore, RedisWindowStore, WindowHit, WindowStore};
