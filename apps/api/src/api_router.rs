use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use helpdesk_core::AppError;
use helpdesk_domain::{ADMIN_ROLE_NAME, Permission};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let refresh_routes = middleware::require_role(
        Router::new().route(
            "/api/rbac/refresh",
            post(handlers::rbac::refresh_permissions_handler),
        ),
        &app_state,
        [ADMIN_ROLE_NAME],
    );

    let cache_routes = middleware::require_permission(
        Router::new().route(
            "/api/rbac/cache",
            get(handlers::rbac::permission_cache_handler),
        ),
        &app_state,
        [Permission::RbacManage],
    );

    let member_routes = Router::new()
        .route(
            "/api/rbac/my-permissions",
            get(handlers::rbac::my_permissions_handler),
        )
        .route(
            "/api/rbac/check",
            get(handlers::rbac::check_permission_handler),
        );

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(refresh_routes)
        .merge(cache_routes)
        .merge(member_routes)
        .layer(from_fn_with_state(app_state.clone(), middleware::authenticate))
        .layer(TraceLayer::new_for_http())
        .layer(cors::build_cors_layer(frontend_url)?)
        .with_state(app_state))
}
