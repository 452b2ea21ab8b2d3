use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::auth::{Claims, TokenError, extract_from_header};
use crate::error::AppError;

/// 认证通过的请求上下文，由 [`auth_middleware`] 放入请求扩展
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub claims: Claims,
    pub token: String,
}

impl CurrentUser {
    pub fn user_id(&self) -> i64 {
        self.claims.user_id
    }
}

/// 受保护路由的认证中间件，任何认证失败都返回统一的 401
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| extract_from_header(Some(h)))
        .map(str::to_string)
        .ok_or(TokenError::Missing)?;

    let claims = state.auth.authenticate_token(&token).await?;
    tracing::debug!(user_id = claims.user_id, "request authenticated");

    req.extensions_mut().insert(CurrentUser { claims, token });
    Ok(next.run(req).await)
}
