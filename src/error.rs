use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::auth::token::TokenError;
use crate::cache::CacheError;
use crate::database::StoreError;
use crate::utils::ApiResponse;

/// 请求边界上的错误分类
///
/// 认证相关的三类错误（`InvalidCredentials` / `TokenInvalid` / `SessionRevoked`）
/// 在响应中统一折叠成 401，具体原因只写日志。
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token rejected: {0}")]
    TokenInvalid(#[from] TokenError),
    #[error("session revoked or expired")]
    SessionRevoked,
    #[error("account disabled")]
    AccountDisabled,
    #[error("too many failed login attempts")]
    TooManyAttempts { retry_after_secs: u64 },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("token issuance failed: {0}")]
    TokenIssue(#[from] jsonwebtoken::errors::Error),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::TokenInvalid(_) | AppError::SessionRevoked => {
                StatusCode::UNAUTHORIZED
            }
            AppError::AccountDisabled => StatusCode::FORBIDDEN,
            AppError::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(_)
            | AppError::Cache(_)
            | AppError::Hash(_)
            | AppError::TokenIssue(_)
            | AppError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 认证失败类错误，对调用方不可区分
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            AppError::InvalidCredentials | AppError::TokenInvalid(_) | AppError::SessionRevoked
        )
    }

    fn public_message(&self) -> String {
        match self {
            AppError::InvalidCredentials => "用户名或密码错误".into(),
            AppError::TokenInvalid(_) | AppError::SessionRevoked => "未授权访问".into(),
            AppError::AccountDisabled => "账号已被禁用".into(),
            AppError::TooManyAttempts { retry_after_secs } => {
                format!("登录失败次数过多，请在{}秒后重试", retry_after_secs)
            }
            AppError::Validation(msg) | AppError::Conflict(msg) | AppError::NotFound(msg) => {
                msg.clone()
            }
            _ => "内部服务器错误".into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed with internal error");
        } else if self.is_auth_failure() {
            tracing::debug!(reason = %self, "request rejected");
        }

        let body = Json(ApiResponse::<()>::error(status, self.public_message()));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_collapse_to_unauthorized() {
        let errors = [
            AppError::InvalidCredentials,
            AppError::TokenInvalid(TokenError::Expired),
            AppError::TokenInvalid(TokenError::BadSignature),
            AppError::SessionRevoked,
        ];
        for err in errors {
            assert!(err.is_auth_failure());
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn revocation_reason_is_not_exposed() {
        let expired = AppError::TokenInvalid(TokenError::Expired).public_message();
        let revoked = AppError::SessionRevoked.public_message();
        assert_eq!(expired, revoked);
    }

    #[test]
    fn internal_errors_are_generic() {
        let err = AppError::Store(StoreError::Conflict("token_hash".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "内部服务器错误");
    }
}
