//! Shared helpers for HTTP-level tests.

use std::path::{Path, PathBuf};

use axum_test::TestServer;
use axum_test::multipart::Part;

use crate::config::Config;

pub fn create_test_app(config: Config) -> TestServer {
    crate::Application::new(config)
        .expect("Failed to create application")
        .into_test_server()
}

/// Default configuration with uploads stored under `dir`
pub fn create_test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.upload.dir = dir.to_path_buf();
    config
}

pub fn image_part(bytes: Vec<u8>, file_name: &str, mime_type: &str) -> Part {
    Part::bytes(bytes).file_name(file_name.to_string()).mime_type(mime_type.to_string())
}

/// Regular files currently present in `dir`
pub fn stored_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .expect("Failed to read upload dir")
        .map(|entry| entry.expect("Failed to read dir entry").path())
        .filter(|path| path.is_file())
        .collect()
}
