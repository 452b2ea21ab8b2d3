use std::time::Duration;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("unexpected value under key {0}")]
    Corrupt(String),
}

/// 最小的字符串键值缓存契约：get / 带过期的 set / delete / 计数器
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// 不存在或已过期时返回 None，两者对调用方不可区分
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// `ttl` 为 None 时永久有效
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// 自增计数，首次自增时设置 `window` 过期
    async fn incr(&self, key: &str, window: Duration) -> Result<u64, CacheError>;
}
