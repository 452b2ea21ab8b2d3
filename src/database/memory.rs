//! 内存版存储库，用于本地开发（未配置 DATABASE_URL）和测试。

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::StoreError;
use super::entities::{NewSession, NewUser, UserEntity, UserPatch, UserSession};
use super::repositories::{SessionRepository, UserRepository};

#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<i64, UserEntity>>,
    next_id: AtomicI64,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// 直接修改账号状态（管理操作 / 测试）
    pub fn set_status(&self, id: i64, status: &str) -> bool {
        match self.users.write().get_mut(&id) {
            Some(user) => {
                user.status = status.to_string();
                user.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    fn conflict(users: &HashMap<i64, UserEntity>, candidate: &UserEntity) -> Option<&'static str> {
        users.values().find_map(|u| {
            if u.id == candidate.id {
                None
            } else if u.username == candidate.username {
                Some("users_username_key")
            } else if candidate.email.is_some() && u.email == candidate.email {
                Some("users_email_key")
            } else if candidate.phone.is_some() && u.phone == candidate.phone {
                Some("users_phone_key")
            } else {
                None
            }
        })
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<UserEntity>, StoreError> {
        let users = self.users.read();
        let mut matches: Vec<&UserEntity> = users
            .values()
            .filter(|u| u.username == identifier || u.email.as_deref() == Some(identifier))
            .collect();
        matches.sort_by_key(|u| (u.username != identifier, u.id));
        Ok(matches.first().map(|u| (*u).clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserEntity>, StoreError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, StoreError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserEntity>, StoreError> {
        Ok(self.users.read().get(&id).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<UserEntity>, StoreError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<UserEntity, StoreError> {
        let now = Utc::now();
        let mut users = self.users.write();

        let entity = UserEntity {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            role: user.role_or_default().to_string(),
            status: user.status_or_default().to_string(),
            username: user.username,
            email: user.email,
            phone: user.phone,
            password_hash: user.password_hash,
            nickname: user.nickname,
            avatar_url: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        if let Some(constraint) = Self::conflict(&users, &entity) {
            return Err(StoreError::Conflict(constraint.to_string()));
        }

        users.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn update(&self, id: i64, patch: &UserPatch) -> Result<Option<UserEntity>, StoreError> {
        let mut users = self.users.write();

        let Some(current) = users.get(&id) else {
            return Ok(None);
        };
        let mut updated = current.clone();
        patch.apply(&mut updated);
        updated.updated_at = Utc::now();

        if let Some(constraint) = Self::conflict(&users, &updated) {
            return Err(StoreError::Conflict(constraint.to_string()));
        }

        users.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn touch_last_login(&self, id: i64) -> Result<(), StoreError> {
        if let Some(user) = self.users.write().get_mut(&id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// 以 token_hash 为键，对应表上的唯一约束
#[derive(Default)]
pub struct MemorySessionRepository {
    sessions: RwLock<HashMap<String, UserSession>>,
    next_id: AtomicI64,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 包含已过期但尚未清理的行
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn count_for_user(&self, user_id: i64) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn create(&self, session: NewSession) -> Result<UserSession, StoreError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&session.token_hash) {
            return Err(StoreError::Conflict("user_sessions_token_hash_key".into()));
        }

        let row = UserSession {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id: session.user_id,
            token_hash: session.token_hash,
            device_info: session.device_info,
            ip_address: session.ip_address,
            created_at: Utc::now(),
            expires_at: session.expires_at,
        };
        sessions.insert(row.token_hash.clone(), row.clone());
        Ok(row)
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> Result<Option<UserSession>, StoreError> {
        let now = Utc::now();
        Ok(self
            .sessions
            .read()
            .get(token_hash)
            .filter(|s| s.is_active_at(now))
            .cloned())
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<(), StoreError> {
        self.sessions.write().remove(token_hash);
        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: i64) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn sweep_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.is_active_at(now));
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::hash_token;
    use chrono::Duration;

    fn new_session(user_id: i64, token: &str, ttl: Duration) -> NewSession {
        NewSession {
            user_id,
            token_hash: hash_token(token),
            device_info: Some("test-agent".into()),
            ip_address: Some("127.0.0.1".into()),
            expires_at: Utc::now() + ttl,
        }
    }

    #[tokio::test]
    async fn identifier_lookup_prefers_username_column() {
        let repo = MemoryUserRepository::new();
        let legacy = repo
            .create(NewUser {
                username: "shared@mail.com".into(),
                password_hash: "x".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let owner = repo
            .create(NewUser {
                username: "owner".into(),
                email: Some("owner@mail.com".into()),
                password_hash: "x".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let by_email = repo.find_by_email("owner@mail.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, owner.id);
        assert!(repo.find_by_email("shared@mail.com").await.unwrap().is_none());
        let by_name = repo.find_by_username("shared@mail.com").await.unwrap().unwrap();
        assert_eq!(by_name.id, legacy.id);
        assert!(repo.find_by_username("owner@mail.com").await.unwrap().is_none());

        repo.create(NewUser {
            username: "later".into(),
            email: Some("shared@mail.com".into()),
            password_hash: "x".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        let resolved = repo
            .find_by_username_or_email("shared@mail.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, legacy.id);
    }

    #[tokio::test]
    async fn delete_revokes_unexpired_session() {
        let repo = MemorySessionRepository::new();
        let created = repo.create(new_session(1, "tok-a", Duration::hours(1))).await.unwrap();

        let found = repo.get_by_token_hash(&created.token_hash).await.unwrap();
        assert_eq!(found, Some(created.clone()));

        repo.delete_by_token_hash(&created.token_hash).await.unwrap();
        assert!(repo.get_by_token_hash(&created.token_hash).await.unwrap().is_none());

        // 再次删除不报错
        repo.delete_by_token_hash(&created.token_hash).await.unwrap();
    }

    #[tokio::test]
    async fn expired_rows_are_invisible_until_swept() {
        let repo = MemorySessionRepository::new();
        repo.create(new_session(1, "old", -Duration::seconds(5))).await.unwrap();
        repo.create(new_session(1, "new", Duration::hours(1))).await.unwrap();

        assert!(repo.get_by_token_hash(&hash_token("old")).await.unwrap().is_none());
        assert_eq!(repo.len(), 2);

        assert_eq!(repo.sweep_expired().await.unwrap(), 1);
        assert_eq!(repo.sweep_expired().await.unwrap(), 0);
        assert_eq!(repo.len(), 1);
        assert!(repo.get_by_token_hash(&hash_token("new")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_all_only_touches_one_user() {
        let repo = MemorySessionRepository::new();
        repo.create(new_session(1, "a1", Duration::hours(1))).await.unwrap();
        repo.create(new_session(1, "a2", Duration::hours(1))).await.unwrap();
        repo.create(new_session(2, "b1", Duration::hours(1))).await.unwrap();

        assert_eq!(repo.delete_all_for_user(1).await.unwrap(), 2);
        assert_eq!(repo.count_for_user(1), 0);
        assert_eq!(repo.count_for_user(2), 1);
    }

    #[tokio::test]
    async fn duplicate_token_hash_conflicts() {
        let repo = MemorySessionRepository::new();
        repo.create(new_session(1, "same", Duration::hours(1))).await.unwrap();
        let err = repo.create(new_session(2, "same", Duration::hours(1))).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn created_user_gets_default_role_and_status() {
        let repo = MemoryUserRepository::new();
        let user = repo
            .create(NewUser {
                username: "alice".into(),
                email: Some("alice@example.com".into()),
                password_hash: "x".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(user.role, "user");
        assert_eq!(user.status, "active");

        let by_email = repo.find_by_username_or_email("alice@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let repo = MemoryUserRepository::new();
        let new_user = NewUser {
            username: "alice".into(),
            password_hash: "x".into(),
            ..Default::default()
        };
        repo.create(new_user.clone()).await.unwrap();
        let err = repo.create(new_user).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(c) if c == "users_username_key"));
    }

    #[tokio::test]
    async fn patch_clears_optional_fields() {
        let repo = MemoryUserRepository::new();
        let user = repo
            .create(NewUser {
                username: "bob".into(),
                phone: Some("13800000000".into()),
                password_hash: "x".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let patch = UserPatch {
            nickname: Some("Bobby".into()),
            phone: Some(None),
            ..Default::default()
        };
        let updated = repo.update(user.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.nickname.as_deref(), Some("Bobby"));
        assert!(updated.phone.is_none());

        assert!(repo.update(999, &patch).await.unwrap().is_none());
    }
}
