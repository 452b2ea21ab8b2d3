use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use super::map_unique_violation;
use crate::database::StoreError;
use crate::database::entities::{NewSession, UserSession};

/// 令牌的确定性摘要（SHA-256 十六进制），数据库中只保存该值
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// 会话存储，撤销即删除行
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: NewSession) -> Result<UserSession, StoreError>;

    /// 已过期但尚未清理的行视为不存在
    async fn get_by_token_hash(&self, token_hash: &str) -> Result<Option<UserSession>, StoreError>;

    /// 幂等，不存在时不报错
    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<(), StoreError>;

    /// 返回删除的行数
    async fn delete_all_for_user(&self, user_id: i64) -> Result<u64, StoreError>;

    /// 删除所有 expires_at <= now 的行，返回删除的行数
    async fn sweep_expired(&self) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create(&self, session: NewSession) -> Result<UserSession, StoreError> {
        sqlx::query_as::<_, UserSession>(
            r#"
            INSERT INTO user_sessions (user_id, token_hash, device_info, ip_address, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, token_hash, device_info, ip_address, created_at, expires_at
            "#,
        )
        .bind(session.user_id)
        .bind(&session.token_hash)
        .bind(&session.device_info)
        .bind(&session.ip_address)
        .bind(session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "user_sessions_token_hash_key"))
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> Result<Option<UserSession>, StoreError> {
        let session = sqlx::query_as::<_, UserSession>(
            r#"
            SELECT id, user_id, token_hash, device_info, ip_address, created_at, expires_at
            FROM user_sessions
            WHERE token_hash = $1 AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM user_sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn sweep_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_deterministic_hex() {
        let first = hash_token("abc");
        assert_eq!(first, hash_token("abc"));
        assert_eq!(
            first,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(first, hash_token("abd"));
    }
}
