//! PostgreSQL-backed profile image store using the `profile_images` and
//! `upload_tickets` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use amora_application::{ImageRecord, NewImageRecord, OrderUpdate, ProfileImageStore};
use amora_core::{AppError, AppResult, UserId};
use amora_domain::StorageId;

/// PostgreSQL implementation of the profile image store port.
#[derive(Clone)]
pub struct PostgresProfileImageStore {
    pool: PgPool,
}

impl PostgresProfileImageStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileImageStore for PostgresProfileImageStore {
    async fn save_upload_ticket(&self, user_id: UserId, token: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO upload_tickets (token, user_id, created_at)
            VALUES ($1, $2, now())
            "#,
        )
        .bind(token)
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to save upload ticket: {error}")))?;
        Ok(())
    }

    async fn take_upload_ticket(&self, token: &str) -> AppResult<Option<UserId>> {
        let row = sqlx::query_as::<_, TicketRow>(
            r#"
            DELETE FROM upload_tickets
            WHERE token = $1
            RETURNING user_id
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to take upload ticket: {error}")))?;

        Ok(row.map(|row| UserId::from_uuid(row.user_id)))
    }

    async fn register_image(&self, record: NewImageRecord) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO profile_images
                (storage_id, user_id, file_name, content_type, content, url, position, created_at)
            SELECT $1, $2, $3, $4, $5, $6, COALESCE(MAX(position) + 1, 0), now()
            FROM profile_images
            WHERE user_id = $2
            ON CONFLICT (storage_id) DO NOTHING
            "#,
        )
        .bind(record.storage_id.as_str())
        .bind(record.user_id.as_uuid())
        .bind(&record.file_name)
        .bind(&record.content_type)
        .bind(&record.bytes)
        .bind(&record.url)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to register image: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "image {} is already registered",
                record.storage_id
            )));
        }
        Ok(())
    }

    async fn list_images(&self, user_id: UserId) -> AppResult<Vec<ImageRecord>> {
        let rows = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT storage_id, user_id, file_name, url, position, created_at
            FROM profile_images
            WHERE user_id = $1
            ORDER BY position
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list images: {error}")))?;

        rows.into_iter().map(ImageRow::into_record).collect()
    }

    async fn fetch_content(
        &self,
        storage_id: &StorageId,
    ) -> AppResult<Option<(String, Vec<u8>)>> {
        let row = sqlx::query_as::<_, ContentRow>(
            r#"
            SELECT content_type, content
            FROM profile_images
            WHERE storage_id = $1
            "#,
        )
        .bind(storage_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to fetch image content: {error}")))?;

        Ok(row.map(|row| (row.content_type, row.content)))
    }

    async fn update_order(&self, user_id: UserId, order: &[StorageId]) -> AppResult<OrderUpdate> {
        let mut tx = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin order transaction: {error}"))
        })?;

        let owned = sqlx::query_as::<_, OwnedIdRow>(
            r#"
            SELECT storage_id
            FROM profile_images
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read owned images: {error}")))?;

        // The submitted order must be a permutation of the registered set.
        let valid = order.len() == owned.len()
            && order
                .iter()
                .all(|id| owned.iter().any(|row| row.storage_id == id.as_str()));
        if !valid {
            tx.rollback().await.map_err(|error| {
                AppError::Internal(format!("failed to roll back order transaction: {error}"))
            })?;
            return Ok(OrderUpdate::InvalidImageIds);
        }

        for (position, storage_id) in order.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|error| AppError::Internal(format!("order too long: {error}")))?;
            sqlx::query(
                r#"
                UPDATE profile_images
                SET position = $3
                WHERE user_id = $1 AND storage_id = $2
                "#,
            )
            .bind(user_id.as_uuid())
            .bind(storage_id.as_str())
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to update image position: {error}"))
            })?;
        }

        tx.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit order transaction: {error}"))
        })?;
        Ok(OrderUpdate::Applied)
    }

    async fn delete_image(&self, user_id: UserId, storage_id: &StorageId) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM profile_images
            WHERE user_id = $1 AND storage_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(storage_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete image: {error}")))?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    user_id: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    storage_id: String,
    user_id: Uuid,
    file_name: String,
    url: String,
    position: i32,
    created_at: DateTime<Utc>,
}

impl ImageRow {
    fn into_record(self) -> AppResult<ImageRecord> {
        Ok(ImageRecord {
            storage_id: StorageId::new(self.storage_id)?,
            user_id: UserId::from_uuid(self.user_id),
            file_name: self.file_name,
            url: self.url,
            position: self.position,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ContentRow {
    content_type: String,
    content: Vec<u8>,
}

#[derive(Debug, sqlx::FromRow)]
struct OwnedIdRow {
    storage_id: String,
}
