use std::collections::HashMap;

use axum::Json;
use axum::extract::{Query, Request, State};
use helpdesk_core::AppError;
use helpdesk_domain::PermissionSlug;
use tracing::info;

use crate::dto::{
    AccessGrantResponse, CheckPermissionQuery, CheckPermissionResponse, PermissionCacheResponse,
};
use crate::error::ApiResult;
use crate::middleware::{request_actor, scope_context_from_parts};
use crate::state::AppState;

pub async fn refresh_permissions_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<PermissionCacheResponse>> {
    let snapshot = state.access_service.reload_permissions().await?;
    info!(
        generation = snapshot.generation(),
        "permission cache reloaded on request"
    );

    Ok(Json(PermissionCacheResponse::from(snapshot.stats())))
}

pub async fn permission_cache_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<PermissionCacheResponse>> {
    let stats = state.access_service.cache().stats().await.ok_or_else(|| {
        AppError::CacheUnavailable("permission cache has not completed a load".to_owned())
    })?;

    Ok(Json(PermissionCacheResponse::from(stats)))
}

pub async fn my_permissions_handler(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<Json<AccessGrantResponse>> {
    let actor = request_actor(&request)?;
    let context =
        scope_context_from_parts(request.headers(), request.uri(), &HashMap::new(), None)?;

    let grant = state
        .access_service
        .effective_permissions(Some(&actor), &context)
        .await?;

    Ok(Json(AccessGrantResponse::from(grant)))
}

pub async fn check_permission_handler(
    State(state): State<AppState>,
    Query(query): Query<CheckPermissionQuery>,
    request: Request,
) -> ApiResult<Json<CheckPermissionResponse>> {
    let actor = request_actor(&request)?;
    let permission = PermissionSlug::new(query.permission)?;
    let context =
        scope_context_from_parts(request.headers(), request.uri(), &HashMap::new(), None)?;

    let allowed = state
        .access_service
        .check_permission(Some(&actor), &context, &permission)
        .await?;

    Ok(Json(CheckPermissionResponse {
        permission: permission.to_string(),
        allowed,
    }))
}
