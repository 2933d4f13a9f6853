//! Filesystem artifact store.
//!
//! Uploaded files and intermediate crops are written under the server's data
//! root for debugging and traceability. Stage hand-offs inside a request are
//! in-memory; these artifacts are write-once audit copies. Identical
//! filenames from concurrent requests can race — uniqueness is not enforced.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use tracing::debug;

use wrinkle_scan_core::FaceRegion;

/// Directory names relative to the store root.
const UPLOADS_DIR: &str = "uploads";
const PROCESSED_DIR: &str = "data/processed_faces";
const REGIONS_DIR: &str = "data/extracted_regions";

/// Stores per-request artifacts under a data root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `root`. Call `ensure_dirs` before use.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Creates the upload/processed/region directories if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.uploads_dir(), self.processed_dir(), self.regions_dir()] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    /// Directory for raw uploads.
    #[must_use]
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    /// Directory for cropped faces.
    #[must_use]
    pub fn processed_dir(&self) -> PathBuf {
        self.root.join(PROCESSED_DIR)
    }

    /// Directory for extracted region crops.
    #[must_use]
    pub fn regions_dir(&self) -> PathBuf {
        self.root.join(REGIONS_DIR)
    }

    /// Saves uploaded bytes under the uploads directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save_upload(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.uploads_dir().join(sanitize_filename(filename));
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to save upload: {}", path.display()))?;
        debug!("Saved upload to {}", path.display());
        Ok(path)
    }

    /// Saves a cropped face as JPEG under the processed directory.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub fn save_processed(&self, filename: &str, face: &RgbImage) -> Result<PathBuf> {
        let path = self
            .processed_dir()
            .join(jpeg_name(&sanitize_filename(filename)));
        face.save_with_format(&path, image::ImageFormat::Jpeg)
            .with_context(|| format!("Failed to save processed face: {}", path.display()))?;
        Ok(path)
    }

    /// Saves a region crop as JPEG under the regions directory, named
    /// `{basename}_{region}.jpg`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub fn save_region(
        &self,
        filename: &str,
        region: FaceRegion,
        image: &RgbImage,
    ) -> Result<PathBuf> {
        let path = self.regions_dir().join(region_filename(filename, region));
        image
            .save_with_format(&path, image::ImageFormat::Jpeg)
            .with_context(|| format!("Failed to save region crop: {}", path.display()))?;
        Ok(path)
    }
}

/// Builds the `{basename}_{region}.jpg` artifact name.
#[must_use]
pub fn region_filename(filename: &str, region: FaceRegion) -> String {
    let sanitized = sanitize_filename(filename);
    let stem = Path::new(&sanitized)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    format!("{stem}_{region}.jpg")
}

/// Swaps a filename's extension for `.jpg`.
fn jpeg_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    format!("{stem}.jpg")
}

/// Strips path components so uploads can't escape the store.
fn sanitize_filename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or("upload.jpg")
        .to_string()
}
