//! HTTP implementation of the profile image backend, speaking the mutation
//! envelope the gallery API returns.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use url::Url;

use amora_application::{
    BackendError, ImageDeleter, ProfileImageBackend, ProgressSender, StoredImage, UploadTarget,
};
use amora_core::UserId;
use amora_domain::{StorageId, UploadProgress};

/// Bytes per streamed upload chunk; each chunk produces one progress tick.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Header carrying the acting user's id on every request.
const USER_HEADER: &str = "x-user-id";

/// Header carrying the original file name on upload requests.
const FILE_NAME_HEADER: &str = "x-file-name";

/// Every mutation endpoint responds with this envelope: either `data` on
/// success or a coded `error` on failure, never both.
#[derive(Debug, Deserialize)]
struct MutationEnvelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
    retry_after_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UploadUrlData {
    upload_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct StoredImageData {
    storage_id: String,
    url: String,
}

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    image_ids: Vec<&'a str>,
}

/// Reqwest-based backend collaborator for a remote gallery API.
#[derive(Clone)]
pub struct HttpImageBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpImageBackend {
    /// Creates a backend targeting the given API base URL.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|error| BackendError::Transport(format!("invalid endpoint url: {error}")))
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let status = response.status();
        let envelope: MutationEnvelope<T> = response
            .json()
            .await
            .map_err(|error| BackendError::Transport(format!("malformed response: {error}")))?;

        if envelope.success {
            return envelope.data.ok_or_else(|| {
                BackendError::Transport("successful response carried no data".to_owned())
            });
        }

        Err(envelope_error(status, envelope.error))
    }

    async fn decode_empty(response: reqwest::Response) -> Result<(), BackendError> {
        let status = response.status();
        let envelope: MutationEnvelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|error| BackendError::Transport(format!("malformed response: {error}")))?;

        if envelope.success {
            return Ok(());
        }

        Err(envelope_error(status, envelope.error))
    }
}

fn envelope_error(status: StatusCode, error: Option<ErrorBody>) -> BackendError {
    let Some(error) = error else {
        return BackendError::Transport(format!("request failed with status {status}"));
    };

    match error.code.as_str() {
        "RATE_LIMITED" => BackendError::Throttled {
            retry_after_ms: error.retry_after_ms.unwrap_or(0),
        },
        "INVALID_IMAGE_IDS" => BackendError::InvalidImageIds,
        _ => BackendError::Transport(error.message),
    }
}

fn transport(error: reqwest::Error) -> BackendError {
    BackendError::Transport(format!("request failed: {error}"))
}

#[async_trait]
impl ProfileImageBackend for HttpImageBackend {
    async fn generate_upload_url(&self, user_id: UserId) -> Result<UploadTarget, BackendError> {
        let url = self.endpoint("api/images/upload-url")?;
        let response = self
            .client
            .post(url)
            .header(USER_HEADER, user_id.as_uuid().to_string())
            .send()
            .await
            .map_err(transport)?;

        let data: UploadUrlData = Self::decode(response).await?;
        Ok(UploadTarget {
            upload_url: data.upload_url,
            token: data.token,
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
        let chunks: Vec<Vec<u8>> = body
            .chunks(UPLOAD_CHUNK_BYTES)
            .map(<[u8]>::to_vec)
            .collect();

        let sender = progress.clone();
        let started = Instant::now();
        let mut bytes_sent: u64 = 0;
        // The iterator is pulled chunk by chunk as reqwest polls the stream,
        // so each tick reflects bytes actually handed to the transport.
        let stream = futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
            bytes_sent += chunk.len() as u64;
            let _ = sender.send(UploadProgress {
                bytes_sent,
                total_bytes,
                elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            });
            Ok::<Vec<u8>, std::convert::Infallible>(chunk)
        }));

        debug!(upload_url = %target.upload_url, total_bytes, "starting image upload");
        let response = self
            .client
            .put(&target.upload_url)
            .header(FILE_NAME_HEADER, file_name)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await
            .map_err(transport)?;

        let data: StoredImageData = Self::decode(response).await?;
        let storage_id = StorageId::new(data.storage_id)
            .map_err(|error| BackendError::Transport(format!("invalid storage id: {error}")))?;
        Ok(StoredImage {
            storage_id,
            url: data.url,
        })
    }

    async fn update_image_order(
        &self,
        user_id: UserId,
        order: &[StorageId],
    ) -> Result<(), BackendError> {
        let url = self.endpoint("api/images/order")?;
        let request = OrderRequest {
            image_ids: order.iter().map(StorageId::as_str).collect(),
        };

        let response = self
            .client
            .put(url)
            .header(USER_HEADER, user_id.as_uuid().to_string())
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        Self::decode_empty(response).await
    }
}

#[async_trait]
impl ImageDeleter for HttpImageBackend {
    async fn delete_image(
        &self,
        user_id: UserId,
        storage_id: &StorageId,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(&format!("api/images/{}", storage_id.as_str()))?;
        let response = self
            .client
            .delete(url)
            .header(USER_HEADER, user_id.as_uuid().to_string())
            .send()
            .await
            .map_err(transport)?;

        Self::decode_empty(response).await
    }
}
