//! PostgreSQL-backed rate limit repository using the `mutation_rate_limits`
//! table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use amora_application::RateLimitRepository;
use amora_core::{AppError, AppResult};
use amora_domain::{RateLimitDecision, RateLimitRecord};

/// PostgreSQL implementation of the rate limit repository port.
///
/// Applies the domain transition under a `SELECT ... FOR UPDATE` row lock so
/// two callers racing on one key observe the counter serially; a race on the
/// very first request for a key falls through the insert's conflict clause
/// and retries against the now-existing row.
#[derive(Clone)]
pub struct PostgresRateLimitRepository {
    pool: PgPool,
}

impl PostgresRateLimitRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn check_once(
        &self,
        key: &str,
        window_ms: i64,
        max_requests: u32,
    ) -> AppResult<Option<RateLimitDecision>> {
        let mut tx = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin rate limit transaction: {error}"))
        })?;

        let row = sqlx::query_as::<_, BucketRow>(
            r#"
            SELECT attempt_count, window_started_at
            FROM mutation_rate_limits
            WHERE key = $1
            FOR UPDATE
            "#,
        )
        .bind(key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read rate limit row: {error}")))?;

        let Some(row) = row else {
            let inserted = sqlx::query(
                r#"
                INSERT INTO mutation_rate_limits (key, window_started_at, attempt_count)
                VALUES ($1, now(), 1)
                ON CONFLICT (key) DO NOTHING
                "#,
            )
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to create rate limit row: {error}"))
            })?;

            tx.commit().await.map_err(|error| {
                AppError::Internal(format!("failed to commit rate limit row: {error}"))
            })?;

            if inserted.rows_affected() == 1 {
                return Ok(Some(RateLimitDecision::Allowed));
            }

            // Lost the first-request race; the caller retries against the
            // row the winner created.
            return Ok(None);
        };

        let attempt_count = u32::try_from(row.attempt_count).map_err(|error| {
            AppError::Internal(format!("invalid stored attempt count: {error}"))
        })?;
        let mut record = RateLimitRecord {
            window_started_at_ms: row.window_started_at.timestamp_millis(),
            count: attempt_count,
        };
        let decision = record.observe(Utc::now().timestamp_millis(), window_ms, max_requests);

        sqlx::query(
            r#"
            UPDATE mutation_rate_limits
            SET attempt_count = $2,
                window_started_at = to_timestamp($3::float8 / 1000.0)
            WHERE key = $1
            "#,
        )
        .bind(key)
        .bind(i32::try_from(record.count).unwrap_or(i32::MAX))
        .bind(record.window_started_at_ms as f64)
        .execute(&mut *tx)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to update rate limit row: {error}"))
        })?;

        tx.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit rate limit update: {error}"))
        })?;

        Ok(Some(decision))
    }
}

#[async_trait]
impl RateLimitRepository for PostgresRateLimitRepository {
    async fn check(
        &self,
        key: &str,
        window_ms: i64,
        max_requests: u32,
    ) -> AppResult<RateLimitDecision> {
        if window_ms <= 0 {
            return Err(AppError::Validation(
                "window_ms must be greater than zero".to_owned(),
            ));
        }

        if let Some(decision) = self.check_once(key, window_ms, max_requests).await? {
            return Ok(decision);
        }

        // Single retry after losing the first-request insert race.
        match self.check_once(key, window_ms, max_requests).await? {
            Some(decision) => Ok(decision),
            None => Err(AppError::Internal(
                "rate limit row vanished during retry".to_owned(),
            )),
        }
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM mutation_rate_limits
            WHERE window_started_at < $1
            "#,
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to cleanup expired rate limits: {error}"))
        })?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BucketRow {
    attempt_count: i32,
    window_started_at: DateTime<Utc>,
}
