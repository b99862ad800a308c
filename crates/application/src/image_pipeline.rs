//! Optimistic profile-image pipeline.
//!
//! Orchestrates the client-visible gallery: local (deferred) adds, immediate
//! uploads with progress and cancellation, reorders, and deletes. Mutations
//! are applied to the in-memory sequence first and rolled back to the exact
//! pre-operation snapshot when persistence fails, so the gallery stays
//! responsive without ever drifting from what the backend accepted.

mod error;
mod optimistic;
mod pipeline;
mod ports;
mod session;

#[cfg(test)]
mod tests;

pub use error::PipelineError;
pub use optimistic::OptimisticMutation;
pub use pipeline::{ImagePipeline, PipelineConfig, UploadOutcome};
pub use ports::{
    BackendError, ImageCodec, ImageDeleter, ProfileImageBackend, ProgressSender, StoredImage,
    UploadTarget,
};
pub use session::SessionDedup;
