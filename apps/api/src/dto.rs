//! API request and response payloads.
//!
//! Mutation endpoints share one envelope shape: `data` on success, a coded
//! `error` on failure, never both. Clients branch on `error.code` instead of
//! parsing messages.

use amora_application::ImageRecord;
use amora_core::AppError;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Error code for an exhausted rate-limit bucket.
pub const RATE_LIMITED: &str = "RATE_LIMITED";

/// Error code for an order referencing unknown or in-flight images.
pub const INVALID_IMAGE_IDS: &str = "INVALID_IMAGE_IDS";

/// Error code for a missing resource.
pub const NOT_FOUND: &str = "NOT_FOUND";

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Coded error carried inside a mutation envelope.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/mutation-error.ts"
)]
pub struct MutationError {
    pub code: String,
    pub message: String,
    /// Milliseconds until the caller may retry; present only for
    /// `RATE_LIMITED`.
    pub retry_after_ms: Option<i64>,
}

/// Envelope returned by every mutation endpoint.
#[derive(Debug, Serialize)]
pub struct MutationResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<MutationError>,
}

impl<T: Serialize> MutationResponse<T> {
    /// Successful envelope carrying the payload.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed envelope with a code and a user-facing message.
    pub fn failed(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(MutationError {
                code: code.to_owned(),
                message: message.into(),
                retry_after_ms: None,
            }),
        }
    }

    /// Failed envelope for an exhausted rate-limit bucket.
    pub fn rate_limited(retry_after_ms: i64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(MutationError {
                code: RATE_LIMITED.to_owned(),
                message: AppError::RateLimited { retry_after_ms }.to_string(),
                retry_after_ms: Some(retry_after_ms),
            }),
        }
    }
}

/// Issued upload destination.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/upload-url-response.ts"
)]
pub struct UploadUrlResponse {
    pub upload_url: String,
    pub token: String,
}

/// Identity assigned to a completed upload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/uploaded-image-response.ts"
)]
pub struct UploadedImageResponse {
    pub storage_id: String,
    pub url: String,
}

/// Full gallery order submitted by the client.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/update-order-request.ts"
)]
pub struct UpdateOrderRequest {
    /// Every registered storage id, in the desired display order.
    pub image_ids: Vec<String>,
}

/// Acknowledgement for an applied order.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/order-applied-response.ts"
)]
pub struct OrderAppliedResponse {
    pub image_count: usize,
}

/// Acknowledgement for a deleted image.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/image-deleted-response.ts"
)]
pub struct ImageDeletedResponse {
    pub storage_id: String,
}

/// One gallery image in display order.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/image-response.ts"
)]
pub struct ImageResponse {
    pub storage_id: String,
    pub url: String,
    pub file_name: String,
    pub position: i32,
}

impl From<ImageRecord> for ImageResponse {
    fn from(record: ImageRecord) -> Self {
        Self {
            storage_id: record.storage_id.as_str().to_owned(),
            url: record.url,
            file_name: record.file_name,
            position: record.position,
        }
    }
}
