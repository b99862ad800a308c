//! Profile image endpoints.
//!
//! Mutations respond with the shared envelope so clients always see either
//! `data` or a coded `error`; throttling and invalid-order outcomes are
//! envelope errors, not bare HTTP failures.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use amora_application::OrderUpdate;
use amora_core::{AppError, UserId};
use amora_domain::StorageId;

use crate::dto::{
    INVALID_IMAGE_IDS, ImageDeletedResponse, ImageResponse, MutationResponse, NOT_FOUND,
    OrderAppliedResponse, UpdateOrderRequest, UploadUrlResponse, UploadedImageResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Header identifying the acting user.
const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the original file name on upload requests.
const FILE_NAME_HEADER: &str = "x-file-name";

fn require_user(headers: &HeaderMap) -> ApiResult<UserId> {
    let value = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ApiError(AppError::Unauthorized(format!(
                "missing {USER_ID_HEADER} header"
            )))
        })?;

    let uuid = Uuid::parse_str(value).map_err(|error| {
        ApiError(AppError::Unauthorized(format!(
            "invalid {USER_ID_HEADER} header: {error}"
        )))
    })?;
    Ok(UserId::from_uuid(uuid))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str, fallback: &'a str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(fallback)
}

pub async fn generate_upload_url_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<(StatusCode, Json<MutationResponse<UploadUrlResponse>>)> {
    let user_id = require_user(&headers)?;

    match state.gallery_service.issue_upload_ticket(user_id).await {
        Ok(ticket) => Ok((
            StatusCode::OK,
            Json(MutationResponse::ok(UploadUrlResponse {
                upload_url: ticket.upload_url,
                token: ticket.token,
            })),
        )),
        Err(AppError::RateLimited { retry_after_ms }) => Ok((
            StatusCode::TOO_MANY_REQUESTS,
            Json(MutationResponse::rate_limited(retry_after_ms)),
        )),
        Err(other) => Err(ApiError(other)),
    }
}

pub async fn upload_image_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<MutationResponse<UploadedImageResponse>>)> {
    let file_name = header_str(&headers, FILE_NAME_HEADER, "photo.jpg");
    let content_type = header_str(&headers, CONTENT_TYPE.as_str(), "application/octet-stream");

    match state
        .gallery_service
        .register_upload(token.as_str(), file_name, content_type, body.to_vec())
        .await
    {
        Ok(registered) => Ok((
            StatusCode::OK,
            Json(MutationResponse::ok(UploadedImageResponse {
                storage_id: registered.storage_id.as_str().to_owned(),
                url: registered.url,
            })),
        )),
        Err(AppError::NotFound(message)) => Ok((
            StatusCode::NOT_FOUND,
            Json(MutationResponse::failed(NOT_FOUND, message)),
        )),
        Err(other) => Err(ApiError(other)),
    }
}

pub async fn update_order_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateOrderRequest>,
) -> ApiResult<(StatusCode, Json<MutationResponse<OrderAppliedResponse>>)> {
    let user_id = require_user(&headers)?;

    let mut order = Vec::with_capacity(request.image_ids.len());
    for image_id in request.image_ids {
        order.push(StorageId::new(image_id)?);
    }

    match state.gallery_service.update_order(user_id, &order).await {
        Ok(OrderUpdate::Applied) => Ok((
            StatusCode::OK,
            Json(MutationResponse::ok(OrderAppliedResponse {
                image_count: order.len(),
            })),
        )),
        Ok(OrderUpdate::InvalidImageIds) => Ok((
            StatusCode::CONFLICT,
            Json(MutationResponse::failed(
                INVALID_IMAGE_IDS,
                "some photos are invalid or still being processed",
            )),
        )),
        Err(AppError::RateLimited { retry_after_ms }) => Ok((
            StatusCode::TOO_MANY_REQUESTS,
            Json(MutationResponse::rate_limited(retry_after_ms)),
        )),
        Err(other) => Err(ApiError(other)),
    }
}

pub async fn delete_image_handler(
    State(state): State<AppState>,
    Path(storage_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<(StatusCode, Json<MutationResponse<ImageDeletedResponse>>)> {
    let user_id = require_user(&headers)?;
    let storage_id = StorageId::new(storage_id)?;

    match state
        .gallery_service
        .delete_image(user_id, &storage_id)
        .await
    {
        Ok(()) => Ok((
            StatusCode::OK,
            Json(MutationResponse::ok(ImageDeletedResponse {
                storage_id: storage_id.as_str().to_owned(),
            })),
        )),
        Err(AppError::RateLimited { retry_after_ms }) => Ok((
            StatusCode::TOO_MANY_REQUESTS,
            Json(MutationResponse::rate_limited(retry_after_ms)),
        )),
        Err(AppError::NotFound(message)) => Ok((
            StatusCode::NOT_FOUND,
            Json(MutationResponse::failed(NOT_FOUND, message)),
        )),
        Err(other) => Err(ApiError(other)),
    }
}

pub async fn list_images_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<ImageResponse>>> {
    let user_id = require_user(&headers)?;
    let images = state.gallery_service.list_images(user_id).await?;
    Ok(Json(images.into_iter().map(ImageResponse::from).collect()))
}

pub async fn image_content_handler(
    State(state): State<AppState>,
    Path(storage_id): Path<String>,
) -> ApiResult<Response> {
    let storage_id = StorageId::new(storage_id)?;

    match state.gallery_service.fetch_content(&storage_id).await? {
        Some((content_type, bytes)) => {
            Ok(([(CONTENT_TYPE, content_type)], bytes).into_response())
        }
        None => Err(ApiError(AppError::NotFound(format!(
            "no stored photo {storage_id}"
        )))),
    }
}
