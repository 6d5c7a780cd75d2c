use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use helpdesk_application::AdminRoleBypass;
use helpdesk_core::AppError;
use helpdesk_infrastructure::MIN_JWT_SECRET_LEN;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub admin_role_bypass: Option<AdminRoleBypass>,
    pub refresh_interval: Option<Duration>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_non_empty_env("DATABASE_URL")?;
        let database_max_connections = parsed_env("DATABASE_MAX_CONNECTIONS", 10)?;
        let jwt_secret = required_env("JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(AppError::Validation(format!(
                "JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} characters"
            )));
        }

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = parsed_env("API_PORT", 4000)?;

        let admin_role_bypass = env::var("RBAC_ADMIN_ROLE_BYPASS")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| AdminRoleBypass::new(value.trim()))
            .transpose()?;

        let refresh_seconds: u64 = parsed_env("RBAC_REFRESH_INTERVAL_SECONDS", 0)?;
        let refresh_interval = (refresh_seconds > 0).then(|| Duration::from_secs(refresh_seconds));

        Ok(Self {
            migrate_only,
            database_url,
            database_max_connections,
            jwt_secret,
            frontend_url,
            api_host,
            api_port,
            admin_role_bypass,
            refresh_interval,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parsed_env<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        _ => Ok(default),
    }
}
