use async_trait::async_trait;
use redis::{Client as RedisClient, RedisError, Script, aio::ConnectionManager};
use tokio::sync::OnceCell;

use super::{WindowHit, WindowStore};
use crate::cache::models::rate_limit::DeniedRequestPolicy;

/// 先判断再写入：只有窗口未满时才 ZADD
const DISCARD_DENIED_SCRIPT: &str = r#"
redis.call('ZREMRANGEBYSCORE', KEYS[1], 0, ARGV[1])
local count = redis.call('ZCARD', KEYS[1])
if count < tonumber(ARGV[4]) then
    redis.call('ZADD', KEYS[1], ARGV[2], ARGV[3])
end
redis.call('EXPIRE', KEYS[1], ARGV[5])
return count
"#;

/// 基于 Redis 有序集合的滑动窗口计数
///
/// 连接在第一次访问时建立，之后所有请求复用；建立失败时返回错误，
/// 由限流器放行，下一次请求重新尝试连接。
pub struct RedisWindowStore {
    client: RedisClient,
    conn: OnceCell<ConnectionManager>,
    discard_script: Script,
}

impl RedisWindowStore {
    pub fn new(client: RedisClient) -> Self {
        Self {
            client,
            conn: OnceCell::new(),
            discard_script: Script::new(DISCARD_DENIED_SCRIPT),
        }
    }

    async fn connection(&self) -> Result<ConnectionManager, RedisError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let conn = ConnectionManager::new(self.client.clone()).await?;
                tracing::info!("Connected to Redis rate limit store");
                Ok::<_, RedisError>(conn)
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn hit(&self, hit: &WindowHit) -> Result<u64, RedisError> {
        let mut conn = self.connection().await?;
        let ttl = i64::try_from(hit.ttl_secs).unwrap_or(i64::MAX);

        match hit.denied {
            DeniedRequestPolicy::Count => {
                // MULTI/EXEC 保证四条命令整体执行
                let (count,): (u64,) = redis::pipe()
                    .atomic()
                    .zrembyscore(&hit.key, 0, hit.window_start)
                    .ignore()
                    .zcard(&hit.key)
                    .zadd(&hit.key, &hit.entry.member, hit.entry.score)
                    .ignore()
                    .expire(&hit.key, ttl)
                    .ignore()
                    .query_async(&mut conn)
                    .await?;
                Ok(count)
            }
            DeniedRequestPolicy::Discard => {
                let mut invocation = self.discard_script.prepare_invoke();
                invocation
                    .key(&hit.key)
                    .arg(hit.window_start)
                    .arg(hit.entry.score)
                    .arg(&hit.entry.member)
                    .arg(hit.limit)
                    .arg(ttl);
                invocation.invoke_async(&mut conn).await
            }
        }
    }
}
