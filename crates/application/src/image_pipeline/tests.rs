use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use amora_core::{AppResult, UserId};
use amora_domain::{CropParams, ProfileImage, SelectedFile, StorageId, UploadProgress};

use super::pipeline::{ImagePipeline, PipelineConfig, UploadOutcome};
use super::ports::{
    BackendError, ImageCodec, ImageDeleter, ProfileImageBackend, ProgressSender, StoredImage,
    UploadTarget,
};
use super::{OptimisticMutation, PipelineError};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Clone, Copy)]
enum OrderBehavior {
    Accept,
    RejectInvalidIds,
    FailTransport,
}

#[derive(Clone, Copy)]
enum UploadBehavior {
    Succeed,
    Hang,
    FailTransport,
}

struct FakeBackend {
    order_behavior: OrderBehavior,
    upload_behavior: UploadBehavior,
    throttle_upload_url_ms: Option<i64>,
    issued: Mutex<u32>,
    upload_url_calls: Mutex<u32>,
    order_calls: Mutex<Vec<Vec<String>>>,
}

impl FakeBackend {
    fn accepting() -> Self {
        Self::new(OrderBehavior::Accept, UploadBehavior::Succeed)
    }

    fn new(order_behavior: OrderBehavior, upload_behavior: UploadBehavior) -> Self {
        Self {
            order_behavior,
            upload_behavior,
            throttle_upload_url_ms: None,
            issued: Mutex::new(0),
            upload_url_calls: Mutex::new(0),
            order_calls: Mutex::new(Vec::new()),
        }
    }

    fn throttled(retry_after_ms: i64) -> Self {
        let mut backend = Self::accepting();
        backend.throttle_upload_url_ms = Some(retry_after_ms);
        backend
    }
}

#[async_trait]
impl ProfileImageBackend for FakeBackend {
    async fn generate_upload_url(&self, _user_id: UserId) -> Result<UploadTarget, BackendError> {
        *self.upload_url_calls.lock().await += 1;
        if let Some(retry_after_ms) = self.throttle_upload_url_ms {
            return Err(BackendError::Throttled { retry_after_ms });
        }

        Ok(UploadTarget {
            upload_url: "https://storage.test/upload".to_owned(),
            token: "token-1".to_owned(),
        })
    }

    async fn upload(
        &self,
        _target: &UploadTarget,
        _file_name: &str,
        body: Vec<u8>,
        progress: &ProgressSender,
    ) -> Result<StoredImage, BackendError> {
        match self.upload_behavior {
            UploadBehavior::Hang => std::future::pending().await,
            UploadBehavior::FailTransport => {
                Err(BackendError::Transport("connection reset".to_owned()))
            }
            UploadBehavior::Succeed => {
                let total = body.len() as u64;
                let _ = progress.send(UploadProgress {
                    bytes_sent: total / 2,
                    total_bytes: total,
                    elapsed_ms: 50,
                });
                let _ = progress.send(UploadProgress {
                    bytes_sent: total,
                    total_bytes: total,
                    elapsed_ms: 100,
                });

                let mut issued = self.issued.lock().await;
                *issued += 1;
                let storage_id = StorageId::new(format!("img-{issued}"))
                    .map_err(|error| BackendError::Transport(error.to_string()))?;
                let url = format!("https://cdn.test/{storage_id}");
                Ok(StoredImage { storage_id, url })
            }
        }
    }

    async fn update_image_order(
        &self,
        _user_id: UserId,
        order: &[StorageId],
    ) -> Result<(), BackendError> {
        self.order_calls
            .lock()
            .await
            .push(order.iter().map(|id| id.as_str().to_owned()).collect());
        match self.order_behavior {
            OrderBehavior::Accept => Ok(()),
            OrderBehavior::RejectInvalidIds => Err(BackendError::InvalidImageIds),
            OrderBehavior::FailTransport => {
                Err(BackendError::Transport("gateway timeout".to_owned()))
            }
        }
    }
}

struct FakeCodec {
    dimensions: (u32, u32),
}

impl FakeCodec {
    fn large() -> Self {
        Self {
            dimensions: (1024, 1024),
        }
    }
}

#[async_trait]
impl ImageCodec for FakeCodec {
    async fn probe_dimensions(&self, _bytes: &[u8]) -> AppResult<(u32, u32)> {
        Ok(self.dimensions)
    }

    async fn render_crop(&self, bytes: &[u8], _crop: &CropParams) -> AppResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

struct FakeDeleter {
    calls: Mutex<Vec<String>>,
    fail: bool,
}

impl FakeDeleter {
    fn accepting() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl ImageDeleter for FakeDeleter {
    async fn delete_image(
        &self,
        _user_id: UserId,
        storage_id: &StorageId,
    ) -> Result<(), BackendError> {
        self.calls.lock().await.push(storage_id.as_str().to_owned());
        if self.fail {
            return Err(BackendError::Transport("delete failed".to_owned()));
        }

        Ok(())
    }
}

fn jpeg_file(name: &str, content: &[u8]) -> SelectedFile {
    SelectedFile::new(name, "image/jpeg", content.to_vec())
}

fn square_crop() -> CropParams {
    CropParams::centered_square(1024, 1024)
}

fn progress_channel() -> (ProgressSender, watch::Receiver<UploadProgress>) {
    watch::channel(UploadProgress::default())
}

fn build_pipeline(
    cap: usize,
    backend: Arc<FakeBackend>,
    deleter: Option<Arc<FakeDeleter>>,
) -> AppResult<ImagePipeline> {
    let config = PipelineConfig {
        image_cap: cap,
        ..PipelineConfig::default()
    };
    let deleter = deleter.map(|deleter| deleter as Arc<dyn ImageDeleter>);
    ImagePipeline::new(
        UserId::new(),
        config,
        backend,
        Arc::new(FakeCodec::large()),
        deleter,
    )
}

fn persisted(id: &str) -> AppResult<ProfileImage> {
    Ok(ProfileImage::persisted(
        StorageId::new(id)?,
        format!("https://cdn.test/{id}"),
        format!("{id}.jpg"),
    ))
}

fn identities(pipeline: &ImagePipeline) -> Vec<&str> {
    pipeline
        .images()
        .iter()
        .map(ProfileImage::identity)
        .collect()
}

// --- reorder -------------------------------------------------------------

#[tokio::test]
async fn reorder_with_pending_upload_skips_persistence_and_rolls_back() -> TestResult {
    let backend = Arc::new(FakeBackend::accepting());
    let mut pipeline = build_pipeline(5, backend.clone(), None)?;
    pipeline.hydrate(vec![
        persisted("a")?,
        persisted("b")?,
        ProfileImage::local("local://pending", "pending.jpg"),
    ])?;
    let snapshot = pipeline.images().to_vec();

    let mut new_order = snapshot.clone();
    new_order.rotate_left(1);
    let result = pipeline.reorder(new_order).await;

    assert!(matches!(result, Err(PipelineError::PhotosStillUploading)));
    assert_eq!(pipeline.images(), snapshot.as_slice());
    assert!(backend.order_calls.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn reorder_rolls_back_to_pre_call_snapshot_on_rejection() -> TestResult {
    let backend = Arc::new(FakeBackend::new(
        OrderBehavior::RejectInvalidIds,
        UploadBehavior::Succeed,
    ));
    let mut pipeline = build_pipeline(5, backend.clone(), None)?;
    pipeline.hydrate(vec![persisted("a")?, persisted("b")?, persisted("c")?])?;
    let snapshot = pipeline.images().to_vec();

    let mut new_order = snapshot.clone();
    new_order.reverse();
    let result = pipeline.reorder(new_order).await;

    assert!(matches!(result, Err(PipelineError::InvalidImageIds)));
    assert_eq!(pipeline.images(), snapshot.as_slice());
    assert_eq!(backend.order_calls.lock().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn reorder_persists_the_full_order_when_all_ids_are_resolved() -> TestResult {
    let backend = Arc::new(FakeBackend::accepting());
    let mut pipeline = build_pipeline(5, backend.clone(), None)?;
    pipeline.hydrate(vec![persisted("a")?, persisted("b")?, persisted("c")?])?;

    let mut new_order = pipeline.images().to_vec();
    new_order.swap(0, 2);
    pipeline.reorder(new_order).await?;

    assert_eq!(identities(&pipeline), vec!["c", "b", "a"]);
    let order_calls = backend.order_calls.lock().await;
    assert_eq!(order_calls.as_slice(), &[vec![
        "c".to_owned(),
        "b".to_owned(),
        "a".to_owned(),
    ]]);
    Ok(())
}

#[tokio::test]
async fn fully_local_gallery_reorders_without_backend_calls() -> TestResult {
    let backend = Arc::new(FakeBackend::accepting());
    let mut pipeline = build_pipeline(5, backend.clone(), None)?;
    pipeline.hydrate(vec![
        ProfileImage::local("local://1", "one.jpg"),
        ProfileImage::local("local://2", "two.jpg"),
    ])?;

    let mut new_order = pipeline.images().to_vec();
    new_order.reverse();
    pipeline.reorder(new_order).await?;

    assert_eq!(identities(&pipeline), vec!["local://2", "local://1"]);
    assert!(backend.order_calls.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn transport_failure_during_reorder_rolls_back() -> TestResult {
    let backend = Arc::new(FakeBackend::new(
        OrderBehavior::FailTransport,
        UploadBehavior::Succeed,
    ));
    let mut pipeline = build_pipeline(5, backend, None)?;
    pipeline.hydrate(vec![persisted("a")?, persisted("b")?])?;
    let snapshot = pipeline.images().to_vec();

    let mut new_order = snapshot.clone();
    new_order.reverse();
    let result = pipeline.reorder(new_order).await;

    assert!(matches!(result, Err(PipelineError::Backend(message)) if message == "gateway timeout"));
    assert_eq!(pipeline.images(), snapshot.as_slice());
    Ok(())
}

#[tokio::test]
async fn set_primary_moves_the_image_to_the_front() -> TestResult {
    let backend = Arc::new(FakeBackend::accepting());
    let mut pipeline = build_pipeline(5, backend, None)?;
    pipeline.hydrate(vec![persisted("a")?, persisted("b")?, persisted("c")?])?;

    pipeline.set_primary("c").await?;

    assert_eq!(identities(&pipeline), vec!["c", "a", "b"]);
    Ok(())
}

// --- local adds ----------------------------------------------------------

#[tokio::test]
async fn cap_is_enforced_before_any_collaborator_call() -> TestResult {
    let backend = Arc::new(FakeBackend::accepting());
    let mut pipeline = build_pipeline(2, backend.clone(), None)?;
    pipeline.add_local_image(&jpeg_file("one.jpg", b"one")).await?;
    pipeline.add_local_image(&jpeg_file("two.jpg", b"two")).await?;

    let rejected = pipeline
        .add_local_image(&jpeg_file("three.jpg", b"three"))
        .await;
    assert!(matches!(rejected, Err(PipelineError::LimitReached { cap: 2 })));
    assert_eq!(pipeline.len(), 2);

    let (progress, _rx) = progress_channel();
    let upload_rejected = pipeline
        .upload_image(
            jpeg_file("four.jpg", b"four"),
            square_crop(),
            progress,
            CancellationToken::new(),
        )
        .await;
    assert!(matches!(
        upload_rejected,
        Err(PipelineError::LimitReached { cap: 2 })
    ));
    assert_eq!(*backend.upload_url_calls.lock().await, 0);
    Ok(())
}

#[tokio::test]
async fn duplicate_content_in_one_session_is_rejected() -> TestResult {
    let backend = Arc::new(FakeBackend::accepting());
    let mut pipeline = build_pipeline(5, backend, None)?;

    pipeline
        .add_local_image(&jpeg_file("first.jpg", b"same content"))
        .await?;
    let duplicate = pipeline
        .add_local_image(&jpeg_file("renamed.jpg", b"same content"))
        .await;

    assert!(matches!(duplicate, Err(PipelineError::DuplicateImage)));
    assert_eq!(pipeline.len(), 1);
    Ok(())
}

#[tokio::test]
async fn non_image_files_are_rejected_with_a_specific_reason() -> TestResult {
    let backend = Arc::new(FakeBackend::accepting());
    let mut pipeline = build_pipeline(5, backend, None)?;

    let rejected = pipeline
        .add_local_image(&SelectedFile::new("resume.pdf", "application/pdf", vec![1]))
        .await;

    assert!(matches!(rejected, Err(PipelineError::Validation(message))
        if message.contains("invalid file type")));
    assert!(pipeline.is_empty());
    Ok(())
}

#[tokio::test]
async fn undersized_photos_are_rejected_before_appending() -> AppResult<()> {
    let config = PipelineConfig::default();
    let mut pipeline = ImagePipeline::new(
        UserId::new(),
        config,
        Arc::new(FakeBackend::accepting()),
        Arc::new(FakeCodec {
            dimensions: (400, 1024),
        }),
        None,
    )?;

    let rejected = pipeline
        .add_local_image(&jpeg_file("small.jpg", b"tiny"))
        .await;
    assert!(matches!(rejected, Err(PipelineError::Validation(message))
        if message.contains("at least")));
    assert!(pipeline.is_empty());

    // The rejected photo was never recorded as seen, so a resized version
    // of different content is accepted normally.
    Ok(())
}

// --- uploads -------------------------------------------------------------

#[tokio::test]
async fn successful_upload_appends_optimistically_with_storage_id() -> TestResult {
    let backend = Arc::new(FakeBackend::accepting());
    let mut pipeline = build_pipeline(5, backend, None)?;
    let (progress, progress_rx) = progress_channel();

    let outcome = pipeline
        .upload_image(
            jpeg_file("portrait.jpg", b"portrait bytes"),
            square_crop(),
            progress,
            CancellationToken::new(),
        )
        .await?;

    match outcome {
        UploadOutcome::Completed(image) => {
            assert!(image.is_persisted());
            assert_eq!(image.file_name, "portrait.jpg");
        }
        UploadOutcome::Cancelled => return Err("upload must complete".into()),
    }
    assert_eq!(pipeline.len(), 1);

    let final_progress = *progress_rx.borrow();
    assert!((final_progress.fraction() - 1.0).abs() < f64::EPSILON);
    Ok(())
}

#[tokio::test]
async fn cancellation_is_a_distinct_outcome_not_an_error() -> TestResult {
    let backend = Arc::new(FakeBackend::new(OrderBehavior::Accept, UploadBehavior::Hang));
    let mut pipeline = build_pipeline(5, backend, None)?;
    let (progress, _rx) = progress_channel();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        trigger.cancel();
    });

    let outcome = pipeline
        .upload_image(
            jpeg_file("slow.jpg", b"slow bytes"),
            square_crop(),
            progress,
            cancel,
        )
        .await?;

    assert_eq!(outcome, UploadOutcome::Cancelled);
    assert!(pipeline.is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_upload_appends_nothing_and_surfaces_the_message() -> TestResult {
    let backend = Arc::new(FakeBackend::new(
        OrderBehavior::Accept,
        UploadBehavior::FailTransport,
    ));
    let mut pipeline = build_pipeline(5, backend, None)?;
    let (progress, _rx) = progress_channel();

    let result = pipeline
        .upload_image(
            jpeg_file("broken.jpg", b"bytes"),
            square_crop(),
            progress,
            CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(PipelineError::Backend(message))
        if message == "connection reset"));
    assert!(pipeline.is_empty());
    Ok(())
}

#[tokio::test]
async fn throttled_upload_url_issuance_is_surfaced_as_retryable() -> TestResult {
    let backend = Arc::new(FakeBackend::throttled(30_000));
    let mut pipeline = build_pipeline(5, backend, None)?;
    let (progress, _rx) = progress_channel();

    let result = pipeline
        .upload_image(
            jpeg_file("busy.jpg", b"bytes"),
            square_crop(),
            progress,
            CancellationToken::new(),
        )
        .await;

    assert!(matches!(
        result,
        Err(PipelineError::Throttled {
            retry_after_ms: 30_000
        })
    ));
    assert!(pipeline.is_empty());
    Ok(())
}

// --- deletes -------------------------------------------------------------

#[tokio::test]
async fn delete_issues_the_server_call_when_a_deleter_is_wired() -> TestResult {
    let backend = Arc::new(FakeBackend::accepting());
    let deleter = Arc::new(FakeDeleter::accepting());
    let mut pipeline = build_pipeline(5, backend, Some(deleter.clone()))?;
    pipeline.hydrate(vec![persisted("a")?, persisted("b")?])?;

    let removed = pipeline.delete("a").await?;

    assert_eq!(removed.identity(), "a");
    assert_eq!(identities(&pipeline), vec!["b"]);
    assert_eq!(deleter.calls.lock().await.as_slice(), &["a".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn optimistic_removal_stands_without_a_delete_capability() -> TestResult {
    let backend = Arc::new(FakeBackend::accepting());
    let mut pipeline = build_pipeline(5, backend, None)?;
    pipeline.hydrate(vec![persisted("a")?])?;

    pipeline.delete("a").await?;

    assert!(pipeline.is_empty());
    Ok(())
}

#[tokio::test]
async fn delete_failure_does_not_roll_back_the_removal() -> TestResult {
    let backend = Arc::new(FakeBackend::accepting());
    let deleter = Arc::new(FakeDeleter::failing());
    let mut pipeline = build_pipeline(5, backend, Some(deleter.clone()))?;
    pipeline.hydrate(vec![persisted("a")?, persisted("b")?])?;

    let removed = pipeline.delete("b").await;

    assert!(removed.is_ok());
    assert_eq!(identities(&pipeline), vec!["a"]);
    assert_eq!(deleter.calls.lock().await.len(), 1);
    Ok(())
}

// --- end to end ----------------------------------------------------------

#[tokio::test]
async fn gallery_lifecycle_with_local_images() -> TestResult {
    let backend = Arc::new(FakeBackend::accepting());
    let mut pipeline = build_pipeline(5, backend.clone(), None)?;

    let mut added = Vec::new();
    for index in 1..=5 {
        let image = pipeline
            .add_local_image(&jpeg_file(
                format!("img{index}.jpg").as_str(),
                format!("content {index}").as_bytes(),
            ))
            .await?;
        added.push(image);
    }
    assert_eq!(pipeline.len(), 5);
    assert_eq!(pipeline.images()[0].file_name, "img1.jpg");

    let sixth = pipeline
        .add_local_image(&jpeg_file("img6.jpg", b"content 6"))
        .await;
    assert!(matches!(sixth, Err(PipelineError::LimitReached { cap: 5 })));
    assert_eq!(pipeline.len(), 5);

    // Move img5 to the front.
    pipeline.set_primary(added[4].identity()).await?;
    let file_names: Vec<&str> = pipeline
        .images()
        .iter()
        .map(|image| image.file_name.as_str())
        .collect();
    assert_eq!(
        file_names,
        vec!["img5.jpg", "img1.jpg", "img2.jpg", "img3.jpg", "img4.jpg"]
    );

    // Delete img3.
    pipeline.delete(added[2].identity()).await?;
    let file_names: Vec<&str> = pipeline
        .images()
        .iter()
        .map(|image| image.file_name.as_str())
        .collect();
    assert_eq!(
        file_names,
        vec!["img5.jpg", "img1.jpg", "img2.jpg", "img4.jpg"]
    );
    assert_eq!(pipeline.len(), 4);

    // Nothing was ever persisted, so the backend saw no calls.
    assert!(backend.order_calls.lock().await.is_empty());
    assert_eq!(*backend.upload_url_calls.lock().await, 0);
    Ok(())
}

// --- optimistic helper over the real sequence ----------------------------

#[tokio::test]
async fn rapid_sequential_operations_restore_their_own_baselines() -> TestResult {
    let backend = Arc::new(FakeBackend::new(
        OrderBehavior::RejectInvalidIds,
        UploadBehavior::Succeed,
    ));
    let mut pipeline = build_pipeline(5, backend, None)?;
    pipeline.hydrate(vec![persisted("a")?, persisted("b")?, persisted("c")?])?;

    // First reorder fails and rolls back to [a, b, c].
    let mut first = pipeline.images().to_vec();
    first.reverse();
    assert!(pipeline.reorder(first).await.is_err());
    assert_eq!(identities(&pipeline), vec!["a", "b", "c"]);

    // A later attempt rolls back to the state at *its* start, not to any
    // older snapshot.
    let mut second = pipeline.images().to_vec();
    second.swap(0, 1);
    assert!(pipeline.reorder(second).await.is_err());
    assert_eq!(identities(&pipeline), vec!["a", "b", "c"]);
    Ok(())
}

#[test]
fn optimistic_mutation_is_reusable_for_arbitrary_state() {
    let mut gallery = vec!["a", "b"];
    let mut mutation = OptimisticMutation::begin(&mut gallery);
    mutation.state_mut().push("c");
    assert_eq!(mutation.state().len(), 3);
    mutation.rollback();
    assert_eq!(gallery, vec!["a", "b"]);
}
