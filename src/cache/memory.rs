use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::backend::{CacheBackend, CacheError};
use crate::tasks::BackgroundTasks;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expire_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expire_at.is_some_and(|at| now > at)
    }
}

/// 进程内缓存，替代分布式缓存
///
/// `get` 自身会检查过期；定期清理只是为了回收内存。
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 包含已过期但尚未清理的条目
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// 清除所有过期条目，返回清除数量
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut map = self.entries.lock();
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired(now));
        before - map.len()
    }

    pub fn start_sweeper(&self, tasks: &mut BackgroundTasks, interval: Duration) {
        let cache = self.clone();
        tasks.spawn_periodic("cache-sweep", interval, move || {
            let cache = cache.clone();
            async move {
                let removed = cache.sweep();
                if removed > 0 {
                    debug!(removed, remaining = cache.len(), "expired cache entries purged");
                }
            }
        });
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut map = self.entries.lock();

        match map.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }

        // 过期即视为不存在
        map.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expire_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .lock()
            .insert(key.to_string(), CacheEntry { value, expire_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str, window: Duration) -> Result<u64, CacheError> {
        let now = Instant::now();
        let mut map = self.entries.lock();

        let live = map.get(key).filter(|entry| !entry.is_expired(now));
        let (count, expire_at) = match live {
            Some(entry) => {
                let current: u64 = entry
                    .value
                    .parse()
                    .map_err(|_| CacheError::Corrupt(key.to_string()))?;
                (current + 1, entry.expire_at)
            }
            None => (1, Some(now + window)),
        };

        map.insert(
            key.to_string(),
            CacheEntry {
                value: count.to_string(),
                expire_at,
            },
        );
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[tokio::test(start_paused = true)]
    async fn entry_expires_strictly_after_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v".into(), Some(Duration::from_secs(10)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        // 过期条目在读取时被移除
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_without_ttl_never_expires() {
        let cache = MemoryCache::new();
        cache.set("k", "v".into(), None).await.unwrap();
        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_only_removes_expired() {
        let cache = MemoryCache::new();
        cache.set("short", "1".into(), Some(Duration::from_secs(1))).await.unwrap();
        cache.set("long", "2".into(), Some(Duration::from_secs(100))).await.unwrap();
        cache.set("forever", "3".into(), None).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.sweep(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_purges_in_background() {
        let cache = MemoryCache::new();
        let mut tasks = BackgroundTasks::new(CancellationToken::new());
        cache.start_sweeper(&mut tasks, Duration::from_secs(60));

        cache.set("k", "v".into(), Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(cache.len(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(cache.is_empty());

        tasks.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn counter_window_starts_on_first_increment() {
        let cache = MemoryCache::new();
        let window = Duration::from_secs(60);

        assert_eq!(cache.incr("c", window).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.incr("c", window).await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get("c").await.unwrap(), None);
        assert_eq!(cache.incr("c", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let cache = MemoryCache::new();
        cache.set("k", "v".into(), None).await.unwrap();
        cache.delete("k").await.unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
