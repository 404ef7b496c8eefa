//! Request and response payloads.

pub mod uploads;
