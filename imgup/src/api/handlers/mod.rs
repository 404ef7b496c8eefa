//! HTTP request handlers.
//!
//! - [`uploads`]: member image uploads
//!
//! Handlers return [`crate::errors::Result`]; errors render as `{"message": ...}` JSON with the
//! status code chosen by [`crate::errors::Error::status_code`].

pub mod uploads;
