//! The upload directory and the files written into it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::fs::{File, OpenOptions};
use tracing::{debug, info, warn};

use super::naming::generate_filename;
use crate::errors::{Error, Result};

/// How many fresh names to try before giving up on a colliding filename.
const MAX_NAME_ATTEMPTS: usize = 5;

/// Directory where accepted uploads are persisted.
///
/// Resolved and created once at startup; the handler only ever writes new files into it.
#[derive(Debug, Clone)]
pub struct UploadDir {
    path: PathBuf,
}

impl UploadDir {
    /// Create the directory (recursively) if missing and resolve it to an absolute path.
    ///
    /// Idempotent. Fails if the path exists but is not a directory, or cannot be created.
    pub fn create(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let existed = path.is_dir();

        std::fs::create_dir_all(path).with_context(|| format!("failed to create upload directory {}", path.display()))?;
        let path = std::fs::canonicalize(path).with_context(|| format!("failed to resolve upload directory {}", path.display()))?;

        if existed {
            debug!(dir = %path.display(), "Using existing upload directory");
        } else {
            info!(dir = %path.display(), "Created upload directory");
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new, uniquely named file for an incoming upload.
    ///
    /// Files are opened with create-new semantics, so an existing file is never overwritten: on a
    /// name collision a new name is generated.
    pub(crate) async fn create_file(&self, field_name: &str, original_name: &str) -> Result<(String, PathBuf, File)> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let filename = generate_filename(field_name, original_name);
            let path = self.path.join(&filename);

            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((filename, path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    warn!(%filename, "Generated filename already exists, retrying");
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }

        Err(Error::Internal {
            operation: format!("allocate a unique filename after {MAX_NAME_ATTEMPTS} attempts"),
        })
    }

    /// Remove a previously written file. Failures are logged, not returned.
    ///
    /// Blocking, so it can run from a drop guard when an upload future is cancelled.
    pub(crate) fn remove(&self, filename: &str) {
        let path = self.path.join(filename);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(%filename, "Removed upload"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(%filename, error = %e, "Failed to remove upload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_create_makes_missing_directories() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b").join("uploads");

        let dir = UploadDir::create(&nested).unwrap();

        assert!(nested.is_dir());
        assert!(dir.path().is_absolute());
    }

    #[test]
    fn test_create_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let first = UploadDir::create(root.path()).unwrap();
        let second = UploadDir::create(root.path()).unwrap();
        assert_eq!(first.path(), second.path());
    }

    #[test]
    fn test_create_fails_when_path_is_a_file() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("uploads");
        std::fs::write(&file, b"not a directory").unwrap();

        assert!(UploadDir::create(&file).is_err());
    }

    #[tokio::test]
    async fn test_create_file_and_remove() {
        let root = tempfile::tempdir().unwrap();
        let dir = UploadDir::create(root.path()).unwrap();

        let (filename, path, mut file) = dir.create_file("member_images", "cat.webp").await.unwrap();
        file.write_all(b"RIFF").await.unwrap();
        drop(file);

        assert!(filename.ends_with(".webp"));
        assert_eq!(path, dir.path().join(&filename));
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF");

        dir.remove(&filename);
        assert!(!path.exists());

        // Removing twice is harmless
        dir.remove(&filename);
    }
}
