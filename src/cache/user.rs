use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::backend::CacheBackend;
use super::keys::user_info_key;
use crate::database::{PublicUser, StoreError, UserRepository};

/// 用户资料的读穿缓存
///
/// 缓存只是性能优化，持久化存储才是数据来源：缓存读写失败一律记日志并按未命中处理。
#[derive(Clone)]
pub struct UserCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl UserCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub async fn get(&self, user_id: i64) -> Option<PublicUser> {
        let key = user_info_key(user_id);
        let json = match self.backend.get(&key).await {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                warn!(user_id, error = %e, "user cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&json) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(user_id, error = %e, "undecodable user cache entry, dropping it");
                self.invalidate(user_id).await;
                None
            }
        }
    }

    /// 以 `now + ttl` 为绝对过期时间写入
    pub async fn set(&self, user_id: i64, profile: &PublicUser, ttl: Duration) {
        let json = match serde_json::to_string(profile) {
            Ok(json) => json,
            Err(e) => {
                warn!(user_id, error = %e, "failed to serialize user profile");
                return;
            }
        };

        if let Err(e) = self
            .backend
            .set(&user_info_key(user_id), json, Some(ttl))
            .await
        {
            warn!(user_id, error = %e, "user cache write failed");
        }
    }

    /// 使用默认 TTL 写入
    pub async fn put(&self, profile: &PublicUser) {
        self.set(profile.id, profile, self.ttl).await;
    }

    pub async fn invalidate(&self, user_id: i64) {
        if let Err(e) = self.backend.delete(&user_info_key(user_id)).await {
            warn!(user_id, error = %e, "user cache invalidation failed");
        }
    }

    /// 读穿：未命中时从用户存储加载并回填
    pub async fn get_or_load(
        &self,
        user_id: i64,
        users: &dyn UserRepository,
    ) -> Result<Option<PublicUser>, StoreError> {
        if let Some(profile) = self.get(user_id).await {
            return Ok(Some(profile));
        }

        let Some(user) = users.find_by_id(user_id).await? else {
            return Ok(None);
        };

        let profile = PublicUser::from(&user);
        self.put(&profile).await;
        Ok(Some(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::database::{MemoryUserRepository, NewUser};

    fn cache() -> (UserCache, MemoryCache) {
        let backend = MemoryCache::new();
        (
            UserCache::new(Arc::new(backend.clone()), Duration::from_secs(3600)),
            backend,
        )
    }

    async fn seeded_repo() -> (MemoryUserRepository, PublicUser) {
        let repo = MemoryUserRepository::new();
        let user = repo
            .create(NewUser {
                username: "alice".into(),
                email: Some("alice@example.com".into()),
                password_hash: "digest".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        (repo, PublicUser::from(&user))
    }

    #[tokio::test(start_paused = true)]
    async fn set_then_get_until_ttl() {
        let (cache, _) = cache();
        let (_, profile) = seeded_repo().await;

        cache.set(profile.id, &profile, Duration::from_secs(30)).await;
        assert_eq!(cache.get(profile.id).await, Some(profile.clone()));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get(profile.id).await, None);
    }

    #[tokio::test]
    async fn invalidate_removes_regardless_of_ttl() {
        let (cache, _) = cache();
        let (_, profile) = seeded_repo().await;

        cache.set(profile.id, &profile, Duration::from_secs(3600)).await;
        cache.invalidate(profile.id).await;
        assert_eq!(cache.get(profile.id).await, None);
    }

    #[tokio::test]
    async fn miss_loads_from_store_and_populates() {
        let (cache, backend) = cache();
        let (repo, profile) = seeded_repo().await;

        assert!(backend.is_empty());
        let loaded = cache.get_or_load(profile.id, &repo).await.unwrap();
        assert_eq!(loaded, Some(profile.clone()));
        assert_eq!(cache.get(profile.id).await, Some(profile));
    }

    #[tokio::test]
    async fn unknown_user_is_none_and_not_cached() {
        let (cache, backend) = cache();
        let (repo, _) = seeded_repo().await;

        assert_eq!(cache.get_or_load(42, &repo).await.unwrap(), None);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn corrupt_entry_reads_as_miss() {
        let (cache, backend) = cache();
        backend
            .set(&user_info_key(5), "{not json".into(), None)
            .await
            .unwrap();

        assert_eq!(cache.get(5).await, None);
        assert!(backend.is_empty());
    }
}
