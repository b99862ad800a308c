//! Amora gallery API composition root.

#![forbid(unsafe_code)]

mod dto;
mod error;
mod handlers;
mod state;

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, post, put};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use amora_application::{GalleryService, RateLimitRepository, RateLimitService};
use amora_core::AppError;
use amora_domain::MAX_UPLOAD_BYTES;
use amora_infrastructure::{
    InMemoryRateLimitRepository, PostgresProfileImageStore, PostgresRateLimitRepository,
    RedisRateLimitRepository,
};

use crate::state::AppState;

/// Default per-user gallery size.
const DEFAULT_IMAGE_CAP: usize = 5;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

    let database_url = required_env("DATABASE_URL")?;
    let frontend_url =
        env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
    let public_base_url = env::var("PUBLIC_BASE_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:3001".to_owned())
        .trim_end_matches('/')
        .to_owned();

    let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let api_port = env::var("API_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3001);

    let image_cap = env::var("IMAGE_CAP")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(DEFAULT_IMAGE_CAP);
    if image_cap == 0 {
        return Err(AppError::Validation(
            "IMAGE_CAP must be greater than zero".to_owned(),
        ));
    }

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let rate_limit_backend =
        env::var("RATE_LIMIT_BACKEND").unwrap_or_else(|_| "postgres".to_owned());
    let rate_limit_repository: Arc<dyn RateLimitRepository> = match rate_limit_backend.as_str() {
        "postgres" => Arc::new(PostgresRateLimitRepository::new(pool.clone())),
        "redis" => {
            let redis_url = required_env("REDIS_URL")?;
            let client = redis::Client::open(redis_url).map_err(|error| {
                AppError::Validation(format!("invalid REDIS_URL: {error}"))
            })?;
            Arc::new(RedisRateLimitRepository::new(client, "amora:rate-limit"))
        }
        "memory" => Arc::new(InMemoryRateLimitRepository::new()),
        _ => {
            return Err(AppError::Validation(format!(
                "RATE_LIMIT_BACKEND must be 'postgres', 'redis' or 'memory', \
                 got '{rate_limit_backend}'"
            )));
        }
    };
    let rate_limit_service = RateLimitService::new(rate_limit_repository);

    let gallery_service = GalleryService::new(
        Arc::new(PostgresProfileImageStore::new(pool.clone())),
        rate_limit_service,
        image_cap,
        MAX_UPLOAD_BYTES,
        public_base_url,
    );

    let app_state = AppState { gallery_service };

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&frontend_url)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE]);

    let app = Router::new()
        .route("/api/health", get(handlers::health::health_handler))
        .route("/api/images", get(handlers::images::list_images_handler))
        .route(
            "/api/images/upload-url",
            post(handlers::images::generate_upload_url_handler),
        )
        .route(
            "/api/images/upload/{token}",
            put(handlers::images::upload_image_handler)
                // Leave headroom above the validated limit so oversized files
                // get the service's error message, not a bare 413.
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024)),
        )
        .route(
            "/api/images/order",
            put(handlers::images::update_order_handler),
        )
        .route(
            "/api/images/{storage_id}",
            delete(handlers::images::delete_image_handler),
        )
        .route(
            "/api/images/{storage_id}/content",
            get(handlers::images::image_content_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state);

    let host = IpAddr::from_str(&api_host)
        .map_err(|error| AppError::Internal(format!("invalid API_HOST '{api_host}': {error}")))?;
    let address = SocketAddr::from((host, api_port));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "amora-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}

fn init_tracing() {
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
