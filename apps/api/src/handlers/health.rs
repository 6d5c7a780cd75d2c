use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::dto::{HealthDependencyStatus, HealthResponse};
use crate::state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let postgres = check_postgres(state.postgres_pool.clone()).await;
    let permission_cache = check_permission_cache(&state).await;

    let ready = postgres.status != "error" && permission_cache.status == "ok";
    let status = if ready { "ok" } else { "degraded" };
    let http_status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            ready,
            postgres,
            permission_cache,
        }),
    )
}

async fn check_postgres(pool: Option<sqlx::PgPool>) -> HealthDependencyStatus {
    let Some(pool) = pool else {
        return HealthDependencyStatus {
            status: "disabled",
            detail: None,
        };
    };

    let check = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&pool)
        .await;

    match check {
        Ok(_) => HealthDependencyStatus {
            status: "ok",
            detail: None,
        },
        Err(error) => HealthDependencyStatus {
            status: "error",
            detail: Some(format!("postgres check failed: {error}")),
        },
    }
}

async fn check_permission_cache(state: &AppState) -> HealthDependencyStatus {
    match state.access_service.cache().stats().await {
        Some(stats) => HealthDependencyStatus {
            status: "ok",
            detail: Some(format!(
                "generation {} with {} roles",
                stats.generation, stats.role_count
            )),
        },
        None => HealthDependencyStatus {
            status: "error",
            detail: Some("permission cache has not completed a load".to_owned()),
        },
    }
}
