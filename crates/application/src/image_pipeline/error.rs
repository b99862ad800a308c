use thiserror::Error;

use amora_core::AppError;

use super::ports::BackendError;

/// Failures surfaced by pipeline operations.
///
/// Each variant renders the user-facing message directly; validation
/// failures are raised before any collaborator call and mutate nothing.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The gallery already holds the configured maximum number of photos.
    #[error("you can add up to {cap} photos")]
    LimitReached {
        /// The configured per-user cap.
        cap: usize,
    },

    /// The same file content was already added in this session.
    #[error("this photo was already added")]
    DuplicateImage,

    /// A reorder was attempted while some photos have no storage id yet.
    #[error("some photos are still uploading, please try again in a moment")]
    PhotosStillUploading,

    /// Server-side throttling, retryable after the given delay.
    #[error("too many requests: try again in {} seconds", retry_after_ms.div_euclid(1000) + i64::from(retry_after_ms.rem_euclid(1000) != 0))]
    Throttled {
        /// Milliseconds until the rate limit window expires.
        retry_after_ms: i64,
    },

    /// The backend rejected the submitted storage ids.
    #[error("some photos are invalid or still being processed")]
    InvalidImageIds,

    /// Client-side validation failure with a specific reason.
    #[error("{0}")]
    Validation(String),

    /// The referenced photo is not in the gallery.
    #[error("{0}")]
    NotFound(String),

    /// Network or server failure with the underlying message.
    #[error("{0}")]
    Backend(String),
}

impl From<AppError> for PipelineError {
    fn from(value: AppError) -> Self {
        match value {
            AppError::Validation(message) | AppError::Conflict(message) => {
                Self::Validation(message)
            }
            AppError::NotFound(message) => Self::NotFound(message),
            AppError::RateLimited { retry_after_ms } => Self::Throttled { retry_after_ms },
            AppError::Unauthorized(message) | AppError::Internal(message) => {
                Self::Backend(message)
            }
        }
    }
}

impl From<BackendError> for PipelineError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::Throttled { retry_after_ms } => Self::Throttled { retry_after_ms },
            BackendError::InvalidImageIds => Self::InvalidImageIds,
            BackendError::Transport(message) => Self::Backend(message),
        }
    }
}
