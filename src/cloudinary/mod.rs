//! Cloudinary upload client.
//!
//! Uses the signed upload endpoint directly over HTTPS; there is no official
//! Rust SDK.

mod signature;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

pub use signature::{sign_params, string_to_sign};

use crate::config::CloudinaryConfig;
use crate::store::{MediaStore, UploadError, UploadRequest, UploadedImage};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
    #[serde(default)]
    bytes: Option<u64>,
    #[serde(default)]
    version: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Cloudinary client wrapper.
#[derive(Clone)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryClient {
    #[must_use]
    pub fn new(http: reqwest::Client, config: CloudinaryConfig) -> Self {
        Self { http, config }
    }

    /// Endpoint for image uploads on this cloud.
    #[must_use]
    pub fn upload_url(&self) -> String {
        format!(
            "{}/v1_1/{}/image/upload",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    /// Form parameters for an upload, including `api_key` and `signature`.
    #[must_use]
    pub fn signed_params(
        &self,
        request: &UploadRequest,
        timestamp: i64,
    ) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        params.insert("public_id", request.public_id.clone());
        params.insert("overwrite", request.overwrite.to_string());
        params.insert("use_filename", request.use_filename.to_string());
        params.insert("unique_filename", request.unique_filename.to_string());
        params.insert("tags", request.tags.join(","));
        params.insert("timestamp", timestamp.to_string());

        let signature = sign_params(&params, &self.config.api_secret);
        params.insert("api_key", self.config.api_key.clone());
        params.insert("signature", signature);
        params
    }
}

#[async_trait]
impl MediaStore for CloudinaryClient {
    async fn upload_image(
        &self,
        file: &Path,
        request: &UploadRequest,
    ) -> Result<UploadedImage, UploadError> {
        let content = tokio::fs::read(file)
            .await
            .map_err(|source| UploadError::ReadFile {
                path: file.display().to_string(),
                source,
            })?;

        let file_name = file
            .file_name()
            .map_or_else(|| "screenshot".to_string(), |n| n.to_string_lossy().into_owned());
        let content_type = mime_guess::from_path(file)
            .first_or_octet_stream()
            .to_string();

        debug!(
            public_id = %request.public_id,
            size = content.len(),
            content_type = %content_type,
            "Uploading image to Cloudinary"
        );

        let part = Part::bytes(content)
            .file_name(file_name)
            .mime_str(&content_type)?;
        let form = self
            .signed_params(request, chrono::Utc::now().timestamp())
            .into_iter()
            .fold(Form::new(), |form, (key, value)| form.text(key, value))
            .part("file", part);

        let response = self.http.post(self.upload_url()).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map_or(body, |e| e.error.message);
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| UploadError::InvalidResponse(format!("{e}: {body}")))?;

        debug!(
            public_id = %parsed.public_id,
            bytes = parsed.bytes,
            version = parsed.version,
            "Cloudinary upload complete"
        );

        Ok(UploadedImage {
            public_id: parsed.public_id,
            secure_url: parsed.secure_url,
        })
    }
}

impl std::fmt::Debug for CloudinaryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryClient")
            .field("cloud_name", &self.config.cloud_name)
            .finish()
    }
}
