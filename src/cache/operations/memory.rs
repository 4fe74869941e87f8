use std::collections::HashMap;

use async_trait::async_trait;
use redis::RedisError;
use tokio::sync::Mutex;

use super::{WindowHit, WindowStore};
use crate::cache::models::rate_limit::DeniedRequestPolicy;

#[derive(Debug, Default)]
struct Window {
    entries: Vec<(i64, String)>,
    expires_at: i64,
}

/// 进程内滑动窗口，语义与 Redis 实现一致
///
/// 计数不跨实例共享，只适用于单实例开发环境和测试。
#[derive(Debug, Default)]
pub struct MemoryWindowStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前保存的记录数（不做过期清理）
    pub async fn cardinality(&self, key: &str) -> usize {
        self.windows
            .lock()
            .await
            .get(key)
            .map_or(0, |w| w.entries.len())
    }
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn hit(&self, hit: &WindowHit) -> Result<u64, RedisError> {
        let now = hit.entry.score;
        let mut windows = self.windows.lock().await;

        // 模拟 Redis 的键过期
        windows.retain(|_, w| w.expires_at > now);

        let window = windows.entry(hit.key.clone()).or_default();
        window
            .entries
            .retain(|(score, _)| !(0..=hit.window_start).contains(score));

        let count = window.entries.len() as u64;
        let admit = count < u64::from(hit.limit);
        if hit.denied == DeniedRequestPolicy::Count || admit {
            window
                .entries
                .push((hit.entry.score, hit.entry.member.clone()));
        }
        window.expires_at = now.saturating_add(i64::try_from(hit.ttl_secs).unwrap_or(i64::MAX));

        Ok(count)
    }
}
