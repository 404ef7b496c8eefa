//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `IMGUP_CONFIG`
//! environment variable. A missing file is not an error: every field has a default.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `IMGUP_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `IMGUP_UPLOAD__MAX_FILE_SIZE=5000000` sets the `upload.max_file_size` field.
//!
//! ## Example
//!
//! ```yaml
//! host: 0.0.0.0
//! port: 5000
//! upload:
//!   dir: /var/lib/imgup/uploads
//!   field_name: member_images
//!   max_file_size: 2000000
//!   allowed_types: [jpeg, jpg, png, gif, webp]
//!   max_request_size: 52428800
//! cors:
//!   allowed_origins: ["https://shop.example.com"]
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::errors::Error;
use crate::upload::ImageType;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "IMGUP_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Upload handling (directory, field name, type and size rules)
    pub upload: UploadConfig,
    /// Cross-origin settings for browser clients
    pub cors: CorsConfig,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Upload handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Directory accepted files are written to. Created recursively at startup if missing.
    pub dir: PathBuf,
    /// Multipart field name files must be submitted under
    pub field_name: String,
    /// Maximum size of a single file in bytes. A file of exactly this size is accepted.
    pub max_file_size: u64,
    /// Maximum number of files per request (0 = unlimited)
    pub max_files: usize,
    /// Maximum size of a whole request body in bytes
    pub max_request_size: u64,
    /// Accepted image types, matched against both the file extension and the declared MIME type
    pub allowed_types: Vec<ImageType>,
    /// URL prefix stored files are served under
    pub public_path: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            field_name: "member_images".to_string(),
            max_file_size: 2_000_000,
            max_files: 0,
            max_request_size: 50 * 1024 * 1024, // 50MB
            allowed_types: ImageType::ALL.to_vec(),
            public_path: "/uploads".to_string(),
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allow_credentials: false,
            max_age: Some(3600), // Cache preflight for 1 hour
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            upload: UploadConfig::default(),
            cors: CorsConfig::default(),
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        let upload = &self.upload;

        if upload.field_name.trim().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: upload.field_name cannot be empty".to_string(),
            });
        }

        // The field name becomes the stored filename's prefix
        if upload.field_name.contains(['/', '\\']) || upload.field_name.contains("..") {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: upload.field_name '{}' must not contain '/', '\\' or '..'",
                    upload.field_name
                ),
            });
        }

        if upload.max_file_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: upload.max_file_size must be positive (default: 2000000 bytes)".to_string(),
            });
        }

        if upload.max_request_size < upload.max_file_size {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: upload.max_request_size ({}) cannot be smaller than upload.max_file_size ({})",
                    upload.max_request_size, upload.max_file_size
                ),
            });
        }

        if upload.allowed_types.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: upload.allowed_types cannot be empty. Add at least one image type.".to_string(),
            });
        }

        if !upload.public_path.starts_with('/') || upload.public_path.len() < 2 || upload.public_path.ends_with('/') {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: upload.public_path '{}' must start with '/' and must not end with '/'",
                    upload.public_path
                ),
            });
        }

        let has_wildcard = self.cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can override specific values; IMGUP_CONFIG only picks the file
            .merge(Env::prefixed("IMGUP_").ignore(&["config"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
