//! Acceptance rules for incoming files.
//!
//! A file is accepted when its extension and its declared content type both name one of the
//! allowed image types, and its size stays at or below the configured ceiling. Each check
//! returns a [`Result`] so the upload loop can abort with `?` on the first rejection.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{Error, Result};

/// Image formats the upload endpoint accepts.
///
/// `jpg` and `jpeg` are listed separately because they are matched against both file extensions
/// and MIME subtypes, and clients send either spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Jpeg,
    Jpg,
    Png,
    Gif,
    Webp,
}

impl ImageType {
    pub const ALL: [ImageType; 5] = [ImageType::Jpeg, ImageType::Jpg, ImageType::Png, ImageType::Gif, ImageType::Webp];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Jpeg => "jpeg",
            ImageType::Jpg => "jpg",
            ImageType::Png => "png",
            ImageType::Gif => "gif",
            ImageType::Webp => "webp",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ImageType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported image type '{s}'"))
    }
}

/// Type and size rules applied to every file of an upload request.
#[derive(Debug, Clone)]
pub struct FilePolicy {
    allowed: Vec<ImageType>,
    max_file_size: u64,
}

impl FilePolicy {
    pub fn new(allowed: Vec<ImageType>, max_file_size: u64) -> Self {
        Self { allowed, max_file_size }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    fn allows(&self, candidate: &str) -> Option<ImageType> {
        candidate.parse::<ImageType>().ok().filter(|t| self.allowed.contains(t))
    }

    /// Check the original filename's extension and the declared MIME type.
    ///
    /// Returns the image type named by the extension. Both checks must pass; they are not
    /// required to agree with each other, so `photo.jpg` declared as `image/jpeg` is accepted.
    pub fn check_type(&self, original_name: &str, mime_type: &str) -> Result<ImageType> {
        let extension = Path::new(original_name).extension().and_then(|ext| ext.to_str()).and_then(|ext| self.allows(ext));

        let declared = mime_essence(mime_type)
            .and_then(|(kind, subtype)| kind.eq_ignore_ascii_case("image").then_some(subtype))
            .and_then(|subtype| self.allows(subtype));

        match (extension, declared) {
            (Some(image_type), Some(_)) => Ok(image_type),
            _ => Err(Error::InvalidFileType {
                filename: original_name.to_string(),
                mime_type: mime_type.to_string(),
            }),
        }
    }

    /// Reject once `size` exceeds the ceiling. A file of exactly `max_file_size` bytes passes.
    pub fn check_size(&self, original_name: &str, size: u64) -> Result<()> {
        if size > self.max_file_size {
            return Err(Error::FileTooLarge {
                filename: original_name.to_string(),
                limit: self.max_file_size,
            });
        }
        Ok(())
    }
}

/// Split `type/subtype; params` into `(type, subtype)`.
fn mime_essence(mime_type: &str) -> Option<(&str, &str)> {
    let essence = mime_type.split(';').next()?.trim();
    let (kind, subtype) = essence.split_once('/')?;
    Some((kind.trim(), subtype.trim()))
}
