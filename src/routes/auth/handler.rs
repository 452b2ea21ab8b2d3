use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::LoginOutcome,
    database::PublicUser,
    error::AppError,
    middleware::CurrentUser,
    utils::{ApiResponse, ClientInfo, empty_success, success_to_api_response},
};

use super::model::{LoginRequest, LogoutAllResponse, RegisterRequest};

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<LoginOutcome> {
    let outcome = state.auth.register(req.into(), &client).await?;
    Ok(success_to_api_response("注册成功", outcome))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginOutcome> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("用户名和密码不能为空".into()));
    }

    let outcome = state.auth.login(username, &req.password, &client).await?;
    Ok(success_to_api_response("登录成功", outcome))
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<()> {
    state.auth.logout(&current.token).await?;
    Ok(empty_success("登出成功"))
}

/// 退出所有设备
#[axum::debug_handler]
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<LogoutAllResponse> {
    let revoked = state.auth.logout_everywhere(current.user_id()).await?;
    Ok(success_to_api_response("已退出所有设备", LogoutAllResponse { revoked }))
}

#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<PublicUser> {
    let profile = state.auth.profile(current.user_id()).await?;
    Ok(success_to_api_response("success", profile))
}
