use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::upload::{StoredFile, UploadedForm};

/// A stored file as reported to the client.
///
/// Server-side paths are not included; clients address the file through `url`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoredFileResponse {
    /// Multipart field the file was submitted under
    pub field_name: String,
    /// Filename as sent by the client
    pub original_name: String,
    pub encoding: String,
    pub mime_type: String,
    /// Generated name the file is stored under
    pub filename: String,
    /// Size in bytes
    pub size: u64,
    /// Path the stored file is served from
    pub url: String,
}

impl StoredFileResponse {
    pub fn from_stored(file: &StoredFile, public_path: &str) -> Self {
        Self {
            field_name: file.field_name.clone(),
            original_name: file.original_name.clone(),
            encoding: file.encoding.clone(),
            mime_type: file.mime_type.clone(),
            filename: file.filename.clone(),
            size: file.size,
            url: format!("{}/{}", public_path, file.filename),
        }
    }
}

/// Response for a completed upload request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// Accepted files, in the order they were received
    pub files: Vec<StoredFileResponse>,
    /// Non-file form fields submitted with the files
    pub fields: BTreeMap<String, String>,
}

impl UploadResponse {
    pub fn from_form(form: &UploadedForm, public_path: &str) -> Self {
        Self {
            files: form.files.iter().map(|f| StoredFileResponse::from_stored(f, public_path)).collect(),
            fields: form.fields.clone(),
        }
    }
}

/// Error body returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
