use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// 用户会话实体，对应 user_sessions 表
///
/// 只保存令牌的哈希；行存在即表示令牌仍然有效，删除即撤销。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct UserSession {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: i64,
    pub token_hash: String,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: DateTime<Utc>,
}
