//! Member image upload handling.
//!
//! [`UploadHandler`] consumes a multipart request, validates each file part submitted under the
//! configured field name (`member_images` by default) and streams accepted files into the
//! [`UploadDir`] under freshly generated names.
//!
//! ## Outcome of a request
//!
//! Each file is either accepted (written to disk, described by a [`StoredFile`]) or rejected.
//! A rejection is terminal for the whole request: the file being written and every file already
//! stored for the same request are removed before the error is returned. The same cleanup runs
//! when the request is dropped mid-body (for example on client disconnect), so an incomplete
//! request never leaves files behind.
//!
//! Type checks happen on the part headers before anything is written. The size ceiling is
//! enforced while streaming, so an oversized file is cut off as soon as it crosses the limit.
//!
//! Non-file parts are collected into [`UploadedForm::fields`]; file parts under any other field
//! name are rejected with [`Error::UnexpectedField`].

mod naming;
pub mod policy;
mod storage;

use std::collections::BTreeMap;
use std::path::PathBuf;

use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use scopeguard::ScopeGuard;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub use policy::{FilePolicy, ImageType};
pub use storage::UploadDir;

use crate::config::UploadConfig;
use crate::errors::{Error, Result};

/// A file accepted and written to the upload directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Multipart field the file was submitted under
    pub field_name: String,
    /// Filename as sent by the client
    pub original_name: String,
    /// Transfer encoding as reported to clients (always `7bit`)
    pub encoding: String,
    /// Declared content type
    pub mime_type: String,
    /// Directory the file was written to
    pub destination: PathBuf,
    /// Generated name under `destination`
    pub filename: String,
    /// Full path of the stored file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

/// Everything a successful upload request produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadedForm {
    pub files: Vec<StoredFile>,
    /// Non-file form fields. Repeated names keep the last value.
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct UploadHandler {
    dir: UploadDir,
    field_name: String,
    policy: FilePolicy,
    max_files: Option<usize>,
}

impl UploadHandler {
    /// Build the handler, creating the upload directory if it does not exist yet.
    pub fn new(config: &UploadConfig) -> anyhow::Result<Self> {
        let dir = UploadDir::create(&config.dir)?;
        Ok(Self {
            dir,
            field_name: config.field_name.clone(),
            policy: FilePolicy::new(config.allowed_types.clone(), config.max_file_size),
            max_files: (config.max_files > 0).then_some(config.max_files),
        })
    }

    pub fn dir(&self) -> &UploadDir {
        &self.dir
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Receive every part of `multipart`, storing accepted files.
    ///
    /// Files written for the request are removed unless it completes, including when the
    /// returned future is dropped mid-body.
    #[instrument(skip_all, fields(upload_id = %Uuid::new_v4()))]
    pub async fn handle(&self, mut multipart: Multipart) -> Result<UploadedForm> {
        let mut form = UploadedForm::default();

        let mut written = scopeguard::guard(Vec::<String>::new(), |filenames| {
            if !filenames.is_empty() {
                warn!(
                    files = filenames.len(),
                    "Upload did not complete, removing files written for this request"
                );
            }
            for filename in &filenames {
                self.dir.remove(filename);
            }
        });

        self.receive(&mut multipart, &mut form, &mut written).await?;

        ScopeGuard::into_inner(written);
        info!(files = form.files.len(), fields = form.fields.len(), "Upload request completed");
        Ok(form)
    }

    async fn receive(&self, multipart: &mut Multipart, form: &mut UploadedForm, written: &mut Vec<String>) -> Result<()> {
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let field_name = field.name().unwrap_or_default().to_string();

            let Some(original_name) = field.file_name().map(str::to_string) else {
                let value = field.text().await.map_err(multipart_error)?;
                debug!(field = %field_name, "Received text field");
                form.fields.insert(field_name, value);
                continue;
            };

            if field_name != self.field_name {
                return Err(Error::UnexpectedField { field: field_name });
            }

            if let Some(limit) = self.max_files
                && form.files.len() >= limit
            {
                return Err(Error::TooManyFiles { limit });
            }

            let mime_type = field.content_type().unwrap_or_default().to_string();
            self.policy.check_type(&original_name, &mime_type)?;

            let stored = self.store(field, field_name, original_name, mime_type, written).await?;
            form.files.push(stored);
        }

        Ok(())
    }

    async fn store(
        &self,
        mut field: Field<'_>,
        field_name: String,
        original_name: String,
        mime_type: String,
        written: &mut Vec<String>,
    ) -> Result<StoredFile> {
        let (filename, path, mut file) = self.dir.create_file(&field_name, &original_name).await?;
        written.push(filename.clone());

        let size = self.write_field(&mut field, &mut file, &original_name).await?;

        info!(%filename, original_name = %original_name, size, "Stored upload");

        Ok(StoredFile {
            field_name,
            original_name,
            encoding: "7bit".to_string(),
            mime_type,
            destination: self.dir.path().to_path_buf(),
            filename,
            path,
            size,
        })
    }

    async fn write_field(&self, field: &mut Field<'_>, file: &mut File, original_name: &str) -> Result<u64> {
        let mut size = 0u64;

        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            size += chunk.len() as u64;
            self.policy.check_size(original_name, size)?;
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        Ok(size)
    }
}

fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { message: e.body_text() }
    } else {
        Error::BadRequest {
            message: format!("Failed to parse multipart data: {}", e.body_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::stored_files;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{Request, header};
    use futures::stream::{self, StreamExt};
    use std::time::Duration;

    const BOUNDARY: &str = "imgup-test-boundary";

    fn handler(dir: &std::path::Path) -> UploadHandler {
        UploadHandler::new(&UploadConfig {
            dir: dir.to_path_buf(),
            ..Default::default()
        })
        .unwrap()
    }

    fn file_part(name: &str, content: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"member_images\"; filename=\"{name}\"\r\n\
             Content-Type: image/png\r\n\r\n{content}\r\n"
        )
    }

    /// A multipart request whose body yields `prefix` and then never finishes.
    async fn stalled_multipart(prefix: String) -> Multipart {
        let body = stream::iter(vec![Ok::<_, std::io::Error>(prefix.into_bytes())]).chain(stream::pending());
        let request = Request::builder()
            .method("POST")
            .uri("/api/uploads")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from_stream(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_complete_request_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());

        let body = format!("{}{}--{BOUNDARY}--\r\n", file_part("a.png", "AAAA"), file_part("b.png", "BBBB"));
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let form = handler.handle(multipart).await.unwrap();
        assert_eq!(form.files.len(), 2);
        assert_eq!(form.files[0].size, 4);
        assert_eq!(stored_files(dir.path()).len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_request_removes_written_files() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());

        // One complete file, then the headers and some content of a second one
        let prefix = format!(
            "{}--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"member_images\"; filename=\"b.png\"\r\n\
             Content-Type: image/png\r\n\r\nBBBB",
            file_part("a.png", "AAAA")
        );
        let multipart = stalled_multipart(prefix).await;

        let result = tokio::time::timeout(Duration::from_millis(300), handler.handle(multipart)).await;
        assert!(result.is_err(), "handle should still be waiting for the rest of the body");

        assert!(stored_files(dir.path()).is_empty());
    }
}
