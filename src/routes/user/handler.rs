use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    database::PublicUser,
    error::AppError,
    middleware::CurrentUser,
    utils::{ApiResponse, success_to_api_response},
};

use super::model::UpdateProfileRequest;

#[axum::debug_handler]
pub async fn update_me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PublicUser>>), AppError> {
    let profile = state
        .auth
        .update_profile(current.user_id(), req.into())
        .await?;
    Ok(success_to_api_response("用户信息更新成功", profile))
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<(StatusCode, Json<ApiResponse<PublicUser>>), AppError> {
    let profile = state.auth.profile(user_id).await?;
    Ok(success_to_api_response("获取成功", profile))
}
