use crate::AppState;
use crate::api::models::uploads::{ErrorResponse, UploadResponse};
use crate::errors::Result;
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use tracing::instrument;

#[utoipa::path(
    post,
    path = "/api/uploads",
    tag = "uploads",
    summary = "Upload member images",
    description = "Upload one or more images under the `member_images` form field. Accepted types are jpeg, jpg, png, gif \
    and webp (checked against both the file extension and the declared content type); each file may be at most 2,000,000 \
    bytes. Any rejected file aborts the whole request and nothing is kept on disk.",
    request_body(
        content_type = "multipart/form-data",
        description = "Image files under `member_images`, plus optional text fields"
    ),
    responses(
        (status = 201, description = "Files stored", body = UploadResponse),
        (status = 400, description = "Not an image, unexpected file field, or malformed form", body = ErrorResponse),
        (status = 413, description = "A file or the request body is too large", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn upload_member_images(State(state): State<AppState>, multipart: Multipart) -> Result<(StatusCode, Json<UploadResponse>)> {
    let form = state.uploads.handle(multipart).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse::from_form(&form, &state.config.upload.public_path)),
    ))
}
