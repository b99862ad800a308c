//! Application services and ports.

#![forbid(unsafe_code)]

mod gallery_service;
mod image_pipeline;
mod image_store;
mod rate_limit_service;

pub use gallery_service::{GalleryService, RegisteredImage, UploadTicket};
pub use image_pipeline::{
    BackendError, ImageCodec, ImageDeleter, ImagePipeline, OptimisticMutation, PipelineConfig,
    PipelineError, ProfileImageBackend, ProgressSender, SessionDedup, StoredImage, UploadOutcome,
    UploadTarget,
};
pub use image_store::{ImageRecord, NewImageRecord, OrderUpdate, ProfileImageStore};
pub use rate_limit_service::{
    RateLimitRepository, RateLimitRule, RateLimitService, operation_rules,
};
