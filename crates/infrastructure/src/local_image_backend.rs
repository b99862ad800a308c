//! In-process backend collaborator wrapping the gallery service directly.
//!
//! Used where the pipeline and the server-side service run in one process
//! (tests, single-binary deployments): the collaborator contract is honored
//! without HTTP in between, including rate limiting and the all-or-nothing
//! order semantics.

use async_trait::async_trait;

use amora_application::{
    BackendError, GalleryService, ImageDeleter, OrderUpdate, ProfileImageBackend, ProgressSender,
    StoredImage, UploadTarget,
};
use amora_core::{AppError, UserId};
use amora_domain::{StorageId, UploadProgress};

/// Backend adapter calling a [`GalleryService`] in-process.
#[derive(Clone)]
pub struct LocalImageBackend {
    service: GalleryService,
}

impl LocalImageBackend {
    /// Creates a backend over the given service.
    #[must_use]
    pub fn new(service: GalleryService) -> Self {
        Self { service }
    }
}

fn map_app_error(error: AppError) -> BackendError {
    match error {
        AppError::RateLimited { retry_after_ms } => BackendError::Throttled { retry_after_ms },
        other => BackendError::Transport(other.to_string()),
    }
}

#[async_trait]
impl ProfileImageBackend for LocalImageBackend {
    async fn generate_upload_url(&self, user_id: UserId) -> Result<UploadTarget, BackendError> {
        let ticket = self
            .service
            .issue_upload_ticket(user_id)
            .await
            .map_err(map_app_error)?;

        Ok(UploadTarget {
            upload_url: ticket.upload_url,
            token: ticket.token,
        })
    }

    async fn upload(
        &self,
        target: &UploadTarget,
        file_name: &str,
        body: Vec<u8>,
        progress: &ProgressSender,
    ) -> Result<StoredImage, BackendError> {
        let total_bytes = body.len() as u64;

        // No transport to meter here; report a single completed tick so
        // progress consumers still observe the terminal state.
        let registered = self
            .service
            .register_upload(target.token.as_str(), file_name, "image/jpeg", body)
            .await
            .map_err(map_app_error)?;
        let _ = progress.send(UploadProgress {
            bytes_sent: total_bytes,
            total_bytes,
            elapsed_ms: 0,
        });

        Ok(StoredImage {
            storage_id: registered.storage_id,
            url: registered.url,
        })
    }

    async fn update_image_order(
        &self,
        user_id: UserId,
        order: &[StorageId],
    ) -> Result<(), BackendError> {
        match self
            .service
            .update_order(user_id, order)
            .await
            .map_err(map_app_error)?
        {
            OrderUpdate::Applied => Ok(()),
            OrderUpdate::InvalidImageIds => Err(BackendError::InvalidImageIds),
        }
    }
}

#[async_trait]
impl ImageDeleter for LocalImageBackend {
    async fn delete_image(
        &self,
        user_id: UserId,
        storage_id: &StorageId,
    ) -> Result<(), BackendError> {
        self.service
            .delete_image(user_id, storage_id)
            .await
            .map_err(map_app_error)
    }
}
