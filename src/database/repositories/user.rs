use async_trait::async_trait;
use sqlx::PgPool;

use super::map_unique_violation;
use crate::database::StoreError;
use crate::database::entities::{NewUser, UserEntity, UserPatch};

/// 持久化用户存储
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 用户名或邮箱任一匹配即返回，用户名匹配优先
    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<UserEntity>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserEntity>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<UserEntity>, StoreError>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<UserEntity>, StoreError>;

    async fn create(&self, user: NewUser) -> Result<UserEntity, StoreError>;

    /// 用户不存在时返回 None
    async fn update(&self, id: i64, patch: &UserPatch) -> Result<Option<UserEntity>, StoreError>;

    async fn touch_last_login(&self, id: i64) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<UserEntity>, StoreError> {
        let user = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, username, email, phone, password_hash, nickname, avatar_url,
                   status, role, created_at, updated_at, last_login_at
            FROM users
            WHERE username = $1 OR email = $1
            ORDER BY (username = $1) DESC, id
            LIMIT 1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserEntity>, StoreError> {
        let user = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, username, email, phone, password_hash, nickname, avatar_url,
                   status, role, created_at, updated_at, last_login_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, StoreError> {
        let user = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, username, email, phone, password_hash, nickname, avatar_url,
                   status, role, created_at, updated_at, last_login_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserEntity>, StoreError> {
        let user = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, username, email, phone, password_hash, nickname, avatar_url,
                   status, role, created_at, updated_at, last_login_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<UserEntity>, StoreError> {
        let user = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, username, email, phone, password_hash, nickname, avatar_url,
                   status, role, created_at, updated_at, last_login_at
            FROM users
            WHERE phone = $1
            "#,
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<UserEntity, StoreError> {
        tracing::debug!(username = %user.username, "creating user");

        sqlx::query_as::<_, UserEntity>(
            r#"
            INSERT INTO users (username, email, phone, password_hash, nickname, role, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, username, email, phone, password_hash, nickname, avatar_url,
                      status, role, created_at, updated_at, last_login_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.nickname)
        .bind(user.role_or_default())
        .bind(user.status_or_default())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "users"))
    }

    async fn update(&self, id: i64, patch: &UserPatch) -> Result<Option<UserEntity>, StoreError> {
        sqlx::query_as::<_, UserEntity>(
            r#"
            UPDATE users
            SET nickname = COALESCE($2, nickname),
                email = COALESCE($3, email),
                phone = CASE WHEN $4 THEN $5 ELSE phone END,
                avatar_url = CASE WHEN $6 THEN $7 ELSE avatar_url END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, username, email, phone, password_hash, nickname, avatar_url,
                      status, role, created_at, updated_at, last_login_at
            "#,
        )
        .bind(id)
        .bind(&patch.nickname)
        .bind(&patch.email)
        .bind(patch.phone.is_some())
        .bind(patch.phone.clone().flatten())
        .bind(patch.avatar_url.is_some())
        .bind(patch.avatar_url.clone().flatten())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "users"))
    }

    async fn touch_last_login(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
