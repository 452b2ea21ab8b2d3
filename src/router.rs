use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    middleware::{auth_middleware, log_errors},
    routes,
};

/// 公开路由：注册与登录
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
}

/// 需要认证的路由，统一经过 [`auth_middleware`]
fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/logout-all", post(routes::auth::logout_all))
        .route("/auth/me", get(routes::auth::me))
        .route("/users/me", put(routes::user::update_me))
        .route("/users/{id}", get(routes::user::get_user))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
}

/// 规范化 API 前缀；返回 `None` 表示挂在根路径
fn base_path(uri: &str) -> Option<String> {
    let trimmed = uri.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("/{trimmed}"))
    }
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(public_routes())
        .merge(protected_routes(&state));

    // nest 不接受根路径，前缀为空时直接合并
    let router = match base_path(&state.config.api_base_uri) {
        Some(base) => Router::new().nest(&base, api),
        None => api,
    };

    let router = router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(from_fn(log_errors)),
    );

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_is_normalized() {
        assert_eq!(base_path("/api").as_deref(), Some("/api"));
        assert_eq!(base_path("/api/").as_deref(), Some("/api"));
        assert_eq!(base_path("v1").as_deref(), Some("/v1"));
        assert_eq!(base_path("/"), None);
        assert_eq!(base_path(""), None);
    }
}
