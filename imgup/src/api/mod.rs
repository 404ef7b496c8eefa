//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Uploads** (`POST /api/uploads`): multipart image upload under the configured field name
//! - **Stored files** (`GET /uploads/{filename}`): served straight from the upload directory
//!
//! All endpoints are documented with `utoipa`; the rendered documentation is served at `/docs`.

pub mod handlers;
pub mod models;
