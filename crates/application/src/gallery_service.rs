//! Server-side gallery mutations.
//!
//! Every mutating operation consults the rate limiter with an
//! `"{operation}:{user}"` composite key before touching storage, per the
//! system-wide throttling policy. Denials surface as
//! [`amora_core::AppError::RateLimited`] so the HTTP layer can render a
//! structured "try again in N seconds" response instead of a failure.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use amora_core::{AppError, AppResult, NonEmptyString, UserId};
use amora_domain::{StorageId, validate_content_type, validate_file_size};

use crate::image_store::{ImageRecord, NewImageRecord, OrderUpdate, ProfileImageStore};
use crate::rate_limit_service::{RateLimitService, operation_rules};

/// An issued upload destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    /// Absolute URL the client must PUT the blob to.
    pub upload_url: String,
    /// Single-use token embedded in the URL.
    pub token: String,
}

/// Outcome of registering a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredImage {
    /// Identity assigned to the image.
    pub storage_id: StorageId,
    /// Durable display URL.
    pub url: String,
}

/// Application service behind the image collaborator endpoints.
#[derive(Clone)]
pub struct GalleryService {
    store: Arc<dyn ProfileImageStore>,
    rate_limits: RateLimitService,
    image_cap: usize,
    max_upload_bytes: usize,
    public_base_url: String,
}

impl GalleryService {
    /// Creates the service. `public_base_url` is the externally reachable
    /// API origin used to mint upload and content URLs.
    #[must_use]
    pub fn new(
        store: Arc<dyn ProfileImageStore>,
        rate_limits: RateLimitService,
        image_cap: usize,
        max_upload_bytes: usize,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            rate_limits,
            image_cap,
            max_upload_bytes,
            public_base_url: public_base_url.into(),
        }
    }

    /// Issues a single-use upload destination for the user.
    pub async fn issue_upload_ticket(&self, user_id: UserId) -> AppResult<UploadTicket> {
        self.rate_limits
            .enforce(
                &operation_rules::generate_upload_url(),
                user_id.to_string().as_str(),
            )
            .await?;

        let existing = self.store.list_images(user_id).await?;
        if existing.len() >= self.image_cap {
            return Err(AppError::Validation(format!(
                "you can add up to {} photos",
                self.image_cap
            )));
        }

        let token = Uuid::new_v4().to_string();
        self.store.save_upload_ticket(user_id, token.as_str()).await?;

        Ok(UploadTicket {
            upload_url: format!("{}/api/images/upload/{token}", self.public_base_url),
            token,
        })
    }

    /// Stores an uploaded blob against a previously issued ticket and
    /// registers the image at the end of the owner's gallery.
    pub async fn register_upload(
        &self,
        token: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> AppResult<RegisteredImage> {
        let Some(user_id) = self.store.take_upload_ticket(token).await? else {
            return Err(AppError::NotFound(
                "upload token is unknown or already used".to_owned(),
            ));
        };

        let file_name = NonEmptyString::new(file_name)
            .map_err(|_| AppError::Validation("file name must not be empty".to_owned()))?;
        validate_content_type(content_type)?;
        validate_file_size(bytes.len(), self.max_upload_bytes)?;

        let storage_id = StorageId::new(Uuid::new_v4().to_string())?;
        let url = format!(
            "{}/api/images/{storage_id}/content",
            self.public_base_url
        );
        self.store
            .register_image(NewImageRecord {
                user_id,
                storage_id: storage_id.clone(),
                file_name: file_name.into(),
                content_type: content_type.to_owned(),
                bytes,
                url: url.clone(),
            })
            .await?;

        info!(%user_id, %storage_id, "image registered");
        Ok(RegisteredImage { storage_id, url })
    }

    /// Authoritative image list in display order.
    pub async fn list_images(&self, user_id: UserId) -> AppResult<Vec<ImageRecord>> {
        self.store.list_images(user_id).await
    }

    /// Serves a stored blob.
    pub async fn fetch_content(
        &self,
        storage_id: &StorageId,
    ) -> AppResult<Option<(String, Vec<u8>)>> {
        self.store.fetch_content(storage_id).await
    }

    /// Persists a full gallery order atomically.
    pub async fn update_order(
        &self,
        user_id: UserId,
        order: &[StorageId],
    ) -> AppResult<OrderUpdate> {
        self.rate_limits
            .enforce(
                &operation_rules::update_image_order(),
                user_id.to_string().as_str(),
            )
            .await?;

        let outcome = self.store.update_order(user_id, order).await?;
        if outcome == OrderUpdate::Applied {
            info!(%user_id, image_count = order.len(), "gallery order updated");
        }

        Ok(outcome)
    }

    /// Deletes one image for the user.
    pub async fn delete_image(&self, user_id: UserId, storage_id: &StorageId) -> AppResult<()> {
        self.rate_limits
            .enforce(
                &operation_rules::delete_image(),
                user_id.to_string().as_str(),
            )
            .await?;

        let deleted = self.store.delete_image(user_id, storage_id).await?;
        if !deleted {
            return Err(AppError::NotFound(format!(
                "no photo {storage_id} for user {user_id}"
            )));
        }

        info!(%user_id, %storage_id, "image deleted");
        Ok(())
    }
}
