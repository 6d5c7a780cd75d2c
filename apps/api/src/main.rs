//! Helpdesk API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use helpdesk_application::{AccessService, PermissionCache, RbacStore, ScopeResolver};
use helpdesk_core::AppError;
use helpdesk_infrastructure::{JwtIdentityVerifier, PostgresRbacStore};
use sqlx::postgres::PgPoolOptions;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::api_config::{ApiConfig, init_tracing};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let rbac_store: Arc<dyn RbacStore> = Arc::new(PostgresRbacStore::new(pool.clone()));
    let access_service = AccessService::new(
        PermissionCache::new(rbac_store.clone()),
        ScopeResolver::new(rbac_store),
        config.admin_role_bypass.clone(),
    );

    if let Some(bypass) = &config.admin_role_bypass {
        warn!(
            role = bypass.role_name(),
            "admin role bypass enabled, holders of this role pass every access check"
        );
    }

    // Requests fail closed until a load succeeds.
    if let Err(error) = access_service.load_permissions().await {
        error!(%error, "initial permission cache load failed");
    }

    if let Some(interval) = config.refresh_interval {
        spawn_permission_refresh(access_service.clone(), interval);
    }

    let identity_verifier = Arc::new(JwtIdentityVerifier::new(&config.jwt_secret)?);

    let app_state = AppState {
        access_service,
        identity_verifier,
        postgres_pool: Some(pool),
    };

    let app = api_router::build_router(app_state, &config.frontend_url)?;

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind {address}: {error}")))?;

    info!(%address, "helpdesk api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("server error: {error}")))
}

fn spawn_permission_refresh(access_service: AccessService, period: Duration) {
    info!(
        interval_seconds = period.as_secs(),
        "periodic permission cache refresh enabled"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and the startup load already ran.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            // Failures are logged by the cache and keep the previous snapshot.
            let _ = access_service.reload_permissions().await;
        }
    });
}
