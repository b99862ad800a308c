use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use amora_core::{AppResult, UserId};
use amora_domain::{
    CropParams, ImageSequence, MAX_UPLOAD_BYTES, MIN_IMAGE_DIMENSION, ProfileImage, SelectedFile,
    validate_content_type, validate_dimensions, validate_file_size,
};

use super::error::PipelineError;
use super::optimistic::OptimisticMutation;
use super::ports::{ImageCodec, ImageDeleter, ProfileImageBackend, ProgressSender};
use super::session::SessionDedup;

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of photos in the gallery.
    pub image_cap: usize,
    /// Maximum accepted raw file size in bytes.
    pub max_upload_bytes: usize,
    /// Minimum accepted width and height in pixels.
    pub min_dimension: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image_cap: 5,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            min_dimension: MIN_IMAGE_DIMENSION,
        }
    }
}

/// Result of an immediate-mode upload.
///
/// Cancellation is a distinct outcome, never an error: the caller aborted
/// on purpose and nothing needs surfacing as a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The upload finished and the image was appended to the gallery.
    Completed(ProfileImage),
    /// The user cancelled mid-transfer; the gallery is unchanged.
    Cancelled,
}

/// Client-side orchestration of the profile image gallery.
///
/// The pipeline owns the visible sequence and applies every mutation
/// optimistically; persistence failures roll the sequence back to the
/// snapshot taken when the operation began. Operations on one instance are
/// user-serialized by `&mut self`; overlapping operations across instances
/// sharing a backend are not coordinated, matching the source behavior.
pub struct ImagePipeline {
    user_id: UserId,
    config: PipelineConfig,
    sequence: ImageSequence,
    dedup: SessionDedup,
    backend: Arc<dyn ProfileImageBackend>,
    codec: Arc<dyn ImageCodec>,
    deleter: Option<Arc<dyn ImageDeleter>>,
}

impl ImagePipeline {
    /// Creates a pipeline with an empty gallery.
    pub fn new(
        user_id: UserId,
        config: PipelineConfig,
        backend: Arc<dyn ProfileImageBackend>,
        codec: Arc<dyn ImageCodec>,
        deleter: Option<Arc<dyn ImageDeleter>>,
    ) -> AppResult<Self> {
        let sequence = ImageSequence::new(config.image_cap)?;
        Ok(Self {
            user_id,
            config,
            sequence,
            dedup: SessionDedup::new(),
            backend,
            codec,
            deleter,
        })
    }

    /// Seeds the gallery from the authoritative backend list.
    pub fn hydrate(&mut self, images: Vec<ProfileImage>) -> Result<(), PipelineError> {
        for image in images {
            self.sequence.push(image)?;
        }

        Ok(())
    }

    /// The images in display order. Position 0 is the primary photo.
    #[must_use]
    pub fn images(&self) -> &[ProfileImage] {
        self.sequence.images()
    }

    /// Number of images in the gallery.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Returns true when the gallery is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Deferred-mode add: validates and appends a local-only image without
    /// any network call.
    ///
    /// Checks run in order: cap, content type, file size, session duplicate,
    /// decoded minimum dimensions. The digest is recorded only once the
    /// photo is accepted, so a photo rejected for size can be retried after
    /// resizing without tripping the duplicate check.
    pub async fn add_local_image(
        &mut self,
        file: &SelectedFile,
    ) -> Result<ProfileImage, PipelineError> {
        if self.sequence.is_full() {
            return Err(PipelineError::LimitReached {
                cap: self.config.image_cap,
            });
        }

        self.validate_file(file)?;

        let digest = file.digest();
        if self.dedup.contains(&digest) {
            return Err(PipelineError::DuplicateImage);
        }

        let (width, height) = self.codec.probe_dimensions(file.bytes.as_slice()).await?;
        validate_dimensions(width, height, self.config.min_dimension)?;

        let image = ProfileImage::local(
            format!("local://{}", Uuid::new_v4()),
            file.file_name.as_str(),
        );
        self.sequence.push(image.clone())?;
        self.dedup.record(digest);
        Ok(image)
    }

    /// Immediate-mode add: renders the confirmed crop, obtains an upload
    /// target, streams the blob with progress ticks, and appends the
    /// persisted image optimistically before any authoritative refetch.
    ///
    /// Cancelling the token mid-transfer aborts the upload and yields
    /// [`UploadOutcome::Cancelled`]; nothing is appended and no error is
    /// reported.
    pub async fn upload_image(
        &mut self,
        file: SelectedFile,
        crop: CropParams,
        progress: ProgressSender,
        cancel: CancellationToken,
    ) -> Result<UploadOutcome, PipelineError> {
        if self.sequence.is_full() {
            return Err(PipelineError::LimitReached {
                cap: self.config.image_cap,
            });
        }

        self.validate_file(&file)?;

        let rendered = self
            .codec
            .render_crop(file.bytes.as_slice(), &crop)
            .await
            .map_err(|error| {
                warn!(user_id = %self.user_id, %error, "crop rendering failed");
                PipelineError::from(error)
            })?;

        let target = self
            .backend
            .generate_upload_url(self.user_id)
            .await
            .map_err(|error| {
                warn!(user_id = %self.user_id, %error, "upload-url issuance failed");
                PipelineError::from(error)
            })?;

        let upload = self
            .backend
            .upload(&target, file.file_name.as_str(), rendered, &progress);
        tokio::pin!(upload);

        let stored = tokio::select! {
            () = cancel.cancelled() => {
                // Dropping the pinned future aborts the transfer.
                info!(user_id = %self.user_id, file_name = %file.file_name, "upload cancelled");
                return Ok(UploadOutcome::Cancelled);
            }
            result = &mut upload => result.map_err(|error| {
                warn!(user_id = %self.user_id, %error, "upload failed");
                PipelineError::from(error)
            })?,
        };

        let image = ProfileImage::persisted(stored.storage_id, stored.url, file.file_name.clone());
        self.sequence.push(image.clone())?;
        Ok(UploadOutcome::Completed(image))
    }

    /// Applies a new gallery ordering optimistically and persists it.
    ///
    /// A fully local gallery (deferred mode, nothing uploaded yet) commits
    /// the new order as pure client state. Once any image is persisted the
    /// full ordered storage-id list must be sent: if some image still lacks
    /// a storage id the persistence call is skipped entirely and the
    /// optimistic reorder is rolled back; a backend rejection likewise rolls
    /// back to the snapshot taken at the start of this call. The order
    /// either persists in full or not at all.
    pub async fn reorder(&mut self, new_order: Vec<ProfileImage>) -> Result<(), PipelineError> {
        let backend = self.backend.clone();
        let user_id = self.user_id;

        let mut mutation = OptimisticMutation::begin(&mut self.sequence);
        mutation.state_mut().apply_order(new_order)?;

        match mutation.state().storage_ids() {
            Some(order) if !order.is_empty() => mutation
                .persist(|| async move {
                    backend.update_image_order(user_id, order.as_slice()).await
                })
                .await
                .map_err(|error| {
                    warn!(user_id = %self.user_id, %error, "order persistence failed, rolled back");
                    PipelineError::from(error)
                }),
            Some(_) => {
                mutation.commit();
                Ok(())
            }
            None if mutation
                .state()
                .images()
                .iter()
                .all(|image| !image.is_persisted()) =>
            {
                mutation.commit();
                Ok(())
            }
            None => {
                mutation.rollback();
                Err(PipelineError::PhotosStillUploading)
            }
        }
    }

    /// Makes the image with the given identity the primary photo by moving
    /// it to the front and persisting the resulting order.
    pub async fn set_primary(&mut self, identity: &str) -> Result<(), PipelineError> {
        let mut new_order = self.sequence.images().to_vec();
        let position = new_order
            .iter()
            .position(|image| image.identity() == identity)
            .ok_or_else(|| {
                PipelineError::NotFound(format!("no photo with identity {identity}"))
            })?;

        let image = new_order.remove(position);
        new_order.insert(0, image);
        self.reorder(new_order).await
    }

    /// Removes an image optimistically and issues the server delete when a
    /// delete capability is wired.
    ///
    /// The optimistic removal always stands: with no deleter configured, or
    /// when the server call fails, the image stays gone locally. That gap is
    /// logged rather than hidden.
    pub async fn delete(&mut self, identity: &str) -> Result<ProfileImage, PipelineError> {
        let removed = self.sequence.remove(identity)?;

        match (&self.deleter, removed.storage_id.as_ref()) {
            (Some(deleter), Some(storage_id)) => {
                if let Err(error) = deleter.delete_image(self.user_id, storage_id).await {
                    warn!(
                        user_id = %self.user_id,
                        %storage_id,
                        %error,
                        "server delete failed; optimistic removal stands"
                    );
                }
            }
            (None, Some(storage_id)) => {
                warn!(
                    user_id = %self.user_id,
                    %storage_id,
                    "no delete capability wired; photo removed locally only"
                );
            }
            (_, None) => {
                // Local-only image, nothing was ever persisted.
            }
        }

        Ok(removed)
    }

    fn validate_file(&self, file: &SelectedFile) -> Result<(), PipelineError> {
        validate_content_type(file.content_type.as_str())?;
        validate_file_size(file.bytes.len(), self.config.max_upload_bytes)?;
        Ok(())
    }
}
