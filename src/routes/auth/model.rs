use serde::{Deserialize, Serialize};

use crate::auth::Registration;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// 用户名或邮箱
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    /// 手机号或邮箱
    pub contact: String,
    pub password: String,
    pub nickname: Option<String>,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Registration {
            username: req.username.trim().to_string(),
            contact: req.contact.trim().to_string(),
            password: req.password,
            nickname: req.nickname,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub revoked: u64,
}
