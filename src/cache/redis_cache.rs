use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};

use super::backend::{CacheBackend, CacheError};

/// Redis 实现，配置了 REDIS_URL 时使用
#[derive(Clone)]
pub struct RedisCache {
    redis: Arc<RedisClient>,
}

impl RedisCache {
    pub fn new(redis: RedisClient) -> Self {
        Self {
            redis: Arc::new(redis),
        }
    }

    pub fn open(url: &str) -> Result<Self, CacheError> {
        Ok(Self::new(RedisClient::open(url)?))
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        match ttl {
            // SET EX 不接受 0
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn incr(&self, key: &str, window: Duration) -> Result<u64, CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let (count,): (u64,) = counter_pipeline(key, window).query_async(&mut conn).await?;
        Ok(count)
    }
}

/// 在同一个事务里建键并设置过期再自增，计数器不会丢失过期时间
fn counter_pipeline(key: &str, window: Duration) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(key)
        .arg(0)
        .arg("EX")
        .arg(window.as_secs().max(1))
        .arg("NX")
        .ignore()
        .cmd("INCR")
        .arg(key);
    pipe
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_expiry_and_increment_share_one_transaction() {
        let packed = counter_pipeline("login:attempt:alice", Duration::from_secs(900))
            .get_packed_pipeline();
        let text = String::from_utf8(packed).unwrap();

        let multi = text.find("MULTI").unwrap();
        let set = text.find("SET").unwrap();
        let incr = text.find("INCR").unwrap();
        let exec = text.find("EXEC").unwrap();
        assert!(multi < set && set < incr && incr < exec);
        assert!(text.contains("NX"));
        assert!(text.contains("900"));
        assert!(!text.contains("EXPIRE"));
    }
}
