//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod crop;
mod image;
mod rate_limit;
mod upload;

pub use crop::{AspectRatio, CropParams, JPEG_QUALITY, MAX_ZOOM, MIN_ZOOM, Rotation};
pub use image::{ImageSequence, ProfileImage, StorageId};
pub use rate_limit::{
    DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS, RateLimitDecision, RateLimitRecord,
};
pub use upload::{
    ImageDigest, MAX_UPLOAD_BYTES, MIN_IMAGE_DIMENSION, SelectedFile, UploadProgress,
    validate_content_type, validate_dimensions, validate_file_size,
};
