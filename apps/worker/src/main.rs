//! Amora maintenance worker: prunes expired rate-limit buckets and orphaned
//! upload tickets on a fixed interval.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use amora_application::RateLimitService;
use amora_core::{AppError, AppResult};
use amora_infrastructure::PostgresRateLimitRepository;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    sweep_interval_ms: u64,
    ticket_max_age_hours: i64,
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let sweep_interval_ms = parse_env_u64("WORKER_SWEEP_INTERVAL_MS", 60_000)?;
        let ticket_max_age_hours = parse_env_i64("WORKER_TICKET_MAX_AGE_HOURS", 24)?;

        if sweep_interval_ms == 0 {
            return Err(AppError::Validation(
                "WORKER_SWEEP_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        if ticket_max_age_hours <= 0 {
            return Err(AppError::Validation(
                "WORKER_TICKET_MAX_AGE_HOURS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            sweep_interval_ms,
            ticket_max_age_hours,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let rate_limit_service =
        RateLimitService::new(Arc::new(PostgresRateLimitRepository::new(pool.clone())));

    info!(
        sweep_interval_ms = config.sweep_interval_ms,
        ticket_max_age_hours = config.ticket_max_age_hours,
        "amora-worker started"
    );

    loop {
        match rate_limit_service.cleanup().await {
            Ok(removed) if removed > 0 => {
                info!(removed, "pruned expired rate limit buckets");
            }
            Ok(_) => {}
            Err(error) => {
                warn!(error = %error, "rate limit cleanup failed");
            }
        }

        match prune_stale_upload_tickets(&pool, config.ticket_max_age_hours).await {
            Ok(removed) if removed > 0 => {
                info!(removed, "pruned stale upload tickets");
            }
            Ok(_) => {}
            Err(error) => {
                warn!(error = %error, "upload ticket cleanup failed");
            }
        }

        tokio::time::sleep(Duration::from_millis(config.sweep_interval_ms)).await;
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

/// Deletes upload tickets that were issued but never consumed. An abandoned
/// ticket just wastes a row; the upload it pointed at never registered.
async fn prune_stale_upload_tickets(pool: &PgPool, max_age_hours: i64) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM upload_tickets
        WHERE created_at < now() - make_interval(hours => $1::int)
        "#,
    )
    .bind(max_age_hours)
    .execute(pool)
    .await
    .map_err(|error| AppError::Internal(format!("failed to prune upload tickets: {error}")))?;

    Ok(result.rows_affected())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        Err(_) => Ok(default),
    }
}

fn parse_env_i64(name: &str, default: i64) -> AppResult<i64> {
    match env::var(name) {
        Ok(value) => value
            .parse::<i64>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        Err(_) => Ok(default),
    }
}
