//! Seams to the remote media store and the metadata table.

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Options for one image upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Target identifier, also the object's addressable path.
    pub public_id: String,
    /// Labels attached to the object for later search.
    pub tags: Vec<String>,
    /// Replace an existing object with the same id.
    pub overwrite: bool,
    /// Derive the id from the local file name.
    pub use_filename: bool,
    /// Append a random suffix to the id.
    pub unique_filename: bool,
}

impl UploadRequest {
    /// Deterministic upload: overwrite, no file-name derivation, no suffix.
    #[must_use]
    pub fn deterministic(public_id: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            public_id: public_id.into(),
            tags,
            overwrite: true,
            use_filename: false,
            unique_filename: false,
        }
    }
}

/// A stored image as reported by the media store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub public_id: String,
    pub secure_url: String,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upload rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected upload response: {0}")]
    InvalidResponse(String),
}

/// Remote object storage for captured images.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload_image(
        &self,
        file: &Path,
        request: &UploadRequest,
    ) -> Result<UploadedImage, UploadError>;
}

/// One row of the `screenshots` table. `id` and `created_at` are server-generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewScreenshot {
    pub url: String,
    pub public_id: String,
    pub cloudinary_url: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("metadata insert rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// Table receiving one row per stored screenshot.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert_screenshot(&self, row: &NewScreenshot) -> Result<(), MetadataError>;
}
