use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Extension or declared content type is outside the allowed image set
    #[error("Images Only")]
    InvalidFileType { filename: String, mime_type: String },

    /// A single file exceeded the configured size ceiling
    #[error("File {filename} exceeds the maximum allowed size of {limit} bytes")]
    FileTooLarge { filename: String, limit: u64 },

    /// A file part arrived under a field name other than the upload field
    #[error("Unexpected file field '{field}'")]
    UnexpectedField { field: String },

    /// More files than the per-request cap
    #[error("Too many files: at most {limit} files may be uploaded per request")]
    TooManyFiles { limit: usize },

    /// Malformed request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Request body exceeded the configured body limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Filesystem error while storing a file
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidFileType { .. } => StatusCode::BAD_REQUEST,
            Error::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::UnexpectedField { .. } => StatusCode::BAD_REQUEST,
            Error::TooManyFiles { .. } => StatusCode::BAD_REQUEST,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Internal { .. } | Error::Io(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Internal { .. } | Error::Io(_) | Error::Other(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Internal { .. } | Error::Io(_) | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::InvalidFileType { filename, mime_type } => {
                tracing::info!(%filename, %mime_type, "Rejected upload: {}", self);
            }
            Error::FileTooLarge { .. } | Error::PayloadTooLarge { .. } => {
                tracing::info!("Rejected upload: {}", self);
            }
            Error::UnexpectedField { .. } | Error::TooManyFiles { .. } | Error::BadRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = json!({ "message": self.user_message() });
        (status, axum::response::Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_file_type_message() {
        let err = Error::InvalidFileType {
            filename: "notes.txt".to_string(),
            mime_type: "text/plain".to_string(),
        };
        assert_eq!(err.user_message(), "Images Only");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_file_too_large_names_limit() {
        let err = Error::FileTooLarge {
            filename: "big.png".to_string(),
            limit: 2_000_000,
        };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(err.user_message().contains("2000000 bytes"));
    }

    #[test]
    fn test_internal_errors_do_not_leak_details() {
        let err = Error::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/srv/uploads: denied"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "Internal server error");

        let err = Error::Internal {
            operation: "write upload".to_string(),
        };
        assert_eq!(err.user_message(), "Internal server error");
        assert_eq!(err.to_string(), "Failed to write upload");
    }
}
