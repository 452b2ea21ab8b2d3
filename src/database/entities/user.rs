use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_ROLE: &str = "user";
pub const DEFAULT_STATUS: &str = "active";

/// 用户实体，对应 users 表
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// 密码哈希，永远不会出现在对外数据中
    pub password_hash: String,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    /// 账号状态，例如 active / banned
    pub status: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// 对外公开的用户资料（不含密码哈希）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub status: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&UserEntity> for PublicUser {
    fn from(user: &UserEntity) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            nickname: user.nickname.clone(),
            avatar_url: user.avatar_url.clone(),
            phone: user.phone.clone(),
            status: user.status.clone(),
            role: user.role.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// 创建用户所需字段，role / status 缺省时使用默认值
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub nickname: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

impl NewUser {
    pub fn role_or_default(&self) -> &str {
        self.role.as_deref().unwrap_or(DEFAULT_ROLE)
    }

    pub fn status_or_default(&self) -> &str {
        self.status.as_deref().unwrap_or(DEFAULT_STATUS)
    }
}

/// 资料更新；`Some(None)` 表示清空该字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.nickname.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.avatar_url.is_none()
    }

    pub fn apply(&self, user: &mut UserEntity) {
        if let Some(nickname) = &self.nickname {
            user.nickname = Some(nickname.clone());
        }
        if let Some(email) = &self.email {
            user.email = Some(email.clone());
        }
        if let Some(phone) = &self.phone {
            user.phone = phone.clone();
        }
        if let Some(avatar_url) = &self.avatar_url {
            user.avatar_url = avatar_url.clone();
        }
    }
}
