//! Ship a captured image to the media store and record it in the metadata table.
//!
//! The upload and the row insert are not transactional. A stored image
//! without a row is accepted and only logged.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::fs_utils::remove_file_if_exists;
use crate::store::{
    MediaStore, MetadataError, MetadataStore, NewScreenshot, UploadError, UploadRequest,
};

/// Result of recording one captured image.
#[derive(Debug)]
pub enum RecordOutcome {
    /// Uploaded, local file removed, row inserted.
    Recorded { secure_url: String },
    /// Uploaded and local file removed, but the row insert failed.
    MetadataFailed {
        secure_url: String,
        error: MetadataError,
    },
    /// Upload failed; the local file is kept and no row was inserted.
    UploadFailed(UploadError),
}

#[derive(Clone)]
pub struct ScreenshotRecorder {
    media: Arc<dyn MediaStore>,
    metadata: Arc<dyn MetadataStore>,
}

impl ScreenshotRecorder {
    #[must_use]
    pub fn new(media: Arc<dyn MediaStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { media, metadata }
    }

    /// Upload `file` under `public_id`, then delete it and insert a metadata row.
    pub async fn record(
        &self,
        file: &Path,
        public_id: &str,
        tags: &[String],
        url: &str,
    ) -> RecordOutcome {
        let request = UploadRequest::deterministic(public_id, tags.to_vec());

        let uploaded = match self.media.upload_image(file, &request).await {
            Ok(uploaded) => uploaded,
            Err(e) => {
                error!(url = %url, public_id = %public_id, file = %file.display(), "Cloudinary upload failed: {e}");
                return RecordOutcome::UploadFailed(e);
            }
        };
        info!(url = %url, secure_url = %uploaded.secure_url, "Uploaded screenshot");

        if let Err(e) = remove_file_if_exists(file).await {
            warn!(file = %file.display(), "Failed to delete uploaded screenshot: {e:#}");
        }

        let row = NewScreenshot {
            url: url.to_string(),
            public_id: public_id.to_string(),
            cloudinary_url: uploaded.secure_url.clone(),
            tags: tags.to_vec(),
        };

        match self.metadata.insert_screenshot(&row).await {
            Ok(()) => {
                info!(url = %url, "Stored metadata in Supabase");
                RecordOutcome::Recorded {
                    secure_url: uploaded.secure_url,
                }
            }
            Err(e) => {
                error!(url = %url, public_id = %public_id, "Supabase insert failed: {e}");
                RecordOutcome::MetadataFailed {
                    secure_url: uploaded.secure_url,
                    error: e,
                }
            }
        }
    }
}

impl std::fmt::Debug for ScreenshotRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenshotRecorder").finish_non_exhaustive()
    }
}
