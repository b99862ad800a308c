use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use amora_core::{AppResult, UserId};
use amora_domain::{CropParams, StorageId, UploadProgress};

/// Channel used to report transfer progress to whoever is rendering it.
pub type ProgressSender = watch::Sender<UploadProgress>;

/// Backend-issued destination for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// URL the blob must be sent to.
    pub upload_url: String,
    /// Opaque token tying the upload to the issuance.
    pub token: String,
}

/// Identity and URL assigned to a successfully uploaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Stable backend identity.
    pub storage_id: StorageId,
    /// Durable display URL.
    pub url: String,
}

/// Typed failure contract for every backend collaborator call.
///
/// Callers match on this exhaustively instead of probing loosely shaped
/// response objects; each variant carries the most specific user-facing
/// message available.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The operation's rate limit bucket is exhausted.
    #[error("too many requests: try again in {} seconds", retry_after_ms.div_euclid(1000) + i64::from(retry_after_ms.rem_euclid(1000) != 0))]
    Throttled {
        /// Milliseconds until the bucket's window expires.
        retry_after_ms: i64,
    },

    /// One or more submitted storage ids are unknown or still processing.
    #[error("some photos are invalid or still being processed")]
    InvalidImageIds,

    /// Network or server failure with the underlying message.
    #[error("{0}")]
    Transport(String),
}

/// Backend collaborator consumed by the pipeline.
///
/// Every mutating call is rate-limited server-side before it writes; a
/// throttled call returns [`BackendError::Throttled`] rather than a generic
/// failure.
#[async_trait]
pub trait ProfileImageBackend: Send + Sync {
    /// Issues an upload destination for the given user.
    async fn generate_upload_url(&self, user_id: UserId) -> Result<UploadTarget, BackendError>;

    /// Transfers the blob to the issued destination, publishing progress on
    /// every tick. The transfer is aborted by dropping the returned future;
    /// the pipeline races it against a cancellation token.
    async fn upload(
        &self,
        target: &UploadTarget,
        file_name: &str,
        body: Vec<u8>,
        progress: &ProgressSender,
    ) -> Result<StoredImage, BackendError>;

    /// Persists the full gallery order as an ordered storage-id list.
    ///
    /// Must reject with [`BackendError::InvalidImageIds`] when any id is
    /// unrecognized or still being processed; must never apply a partial
    /// order.
    async fn update_image_order(
        &self,
        user_id: UserId,
        order: &[StorageId],
    ) -> Result<(), BackendError>;
}

/// Server-side delete capability.
///
/// Kept separate from [`ProfileImageBackend`] because some call paths have
/// no delete endpoint wired; the pipeline treats it as optional and lets the
/// optimistic removal stand either way.
#[async_trait]
pub trait ImageDeleter: Send + Sync {
    /// Deletes the image from the backend.
    async fn delete_image(&self, user_id: UserId, storage_id: &StorageId)
    -> Result<(), BackendError>;
}

/// Raster processing port: dimension probing and crop rendering.
#[async_trait]
pub trait ImageCodec: Send + Sync {
    /// Decodes the image header and returns `(width, height)`.
    async fn probe_dimensions(&self, bytes: &[u8]) -> AppResult<(u32, u32)>;

    /// Renders the confirmed crop (rotation, zoomed rectangle) into a fresh
    /// JPEG at the configured quality.
    async fn render_crop(&self, bytes: &[u8], crop: &CropParams) -> AppResult<Vec<u8>>;
}
