//! OpenAPI document for the upload API, served as JSON at `/api-docs/openapi.json` and rendered
//! at `/docs`.

use utoipa::OpenApi;

use crate::api;
use crate::api::models::uploads::{ErrorResponse, StoredFileResponse, UploadResponse};
use crate::upload::ImageType;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "imgup",
        description = "Member image uploads. Stored files are served back under `/uploads/{filename}`."
    ),
    paths(api::handlers::uploads::upload_member_images),
    components(schemas(UploadResponse, StoredFileResponse, ErrorResponse, ImageType)),
    tags(
        (name = "uploads", description = "Image upload and storage")
    )
)]
pub struct ApiDoc;
