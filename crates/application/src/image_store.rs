//! Server-side persistence port for profile images.
//!
//! This is the backend half of the collaborator contract the pipeline
//! consumes: upload-ticket issuance, image registration, order persistence,
//! and deletion, all partitioned by owning user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use amora_core::{AppResult, UserId};
use amora_domain::StorageId;

/// A registered image row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// Stable identity assigned at registration.
    pub storage_id: StorageId,
    /// Owning user.
    pub user_id: UserId,
    /// Original file name.
    pub file_name: String,
    /// Durable display URL.
    pub url: String,
    /// Zero-based display position; 0 is the primary photo.
    pub position: i32,
    /// When the upload finished processing.
    pub created_at: DateTime<Utc>,
}

/// Input for registering a completed upload.
#[derive(Debug, Clone)]
pub struct NewImageRecord {
    /// Owning user.
    pub user_id: UserId,
    /// Identity assigned to the image.
    pub storage_id: StorageId,
    /// Original file name.
    pub file_name: String,
    /// MIME type of the stored blob.
    pub content_type: String,
    /// The processed image bytes.
    pub bytes: Vec<u8>,
    /// Durable display URL.
    pub url: String,
}

/// Result of an order-persistence attempt.
///
/// `InvalidImageIds` is a domain outcome, not a transport failure: the
/// caller raced an in-flight upload or submitted a stale id, and the stored
/// order is untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderUpdate {
    /// The full order was applied atomically.
    Applied,
    /// At least one id is unknown or still being processed; nothing changed.
    InvalidImageIds,
}

/// Repository port for server-side profile image state.
#[async_trait]
pub trait ProfileImageStore: Send + Sync {
    /// Records a single-use upload ticket for the user.
    async fn save_upload_ticket(&self, user_id: UserId, token: &str) -> AppResult<()>;

    /// Consumes an upload ticket, returning its owner. `None` when the
    /// token is unknown or already used.
    async fn take_upload_ticket(&self, token: &str) -> AppResult<Option<UserId>>;

    /// Registers a completed upload at the end of the user's gallery.
    async fn register_image(&self, record: NewImageRecord) -> AppResult<()>;

    /// Lists the user's images in display order.
    async fn list_images(&self, user_id: UserId) -> AppResult<Vec<ImageRecord>>;

    /// Fetches the stored blob for serving: `(content_type, bytes)`.
    async fn fetch_content(&self, storage_id: &StorageId)
    -> AppResult<Option<(String, Vec<u8>)>>;

    /// Replaces the user's gallery order atomically.
    ///
    /// The submitted list must contain exactly the user's registered images;
    /// otherwise returns [`OrderUpdate::InvalidImageIds`] without applying
    /// anything.
    async fn update_order(&self, user_id: UserId, order: &[StorageId]) -> AppResult<OrderUpdate>;

    /// Deletes one image. Returns false when the id was not found for the
    /// user.
    async fn delete_image(&self, user_id: UserId, storage_id: &StorageId) -> AppResult<bool>;
}
