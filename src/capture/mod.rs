//! Page capture through an external headless-browser tool.

mod shot_scraper;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use shot_scraper::{check_shot_scraper, ShotScraper};

/// Default wait after page load before the screenshot, in milliseconds.
pub const DEFAULT_WAIT_MS: u64 = 2000;

/// Default viewport width in pixels.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1440;

/// Default viewport height in pixels.
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;

/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 70;

/// Default hard limit on one capture, in seconds.
pub const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 60;

/// Fixed parameters applied to every capture.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Path to the `shot-scraper` executable.
    pub executable: String,
    /// Wait after page load before capturing, in milliseconds.
    pub wait_ms: u64,
    /// Viewport width in pixels.
    pub viewport_width: u32,
    /// Viewport height in pixels.
    pub viewport_height: u32,
    /// JPEG quality (1-100).
    pub quality: u8,
    /// Script evaluated in the page before the screenshot.
    pub cleanup_script: String,
    /// Hard limit on the whole invocation.
    pub timeout: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            executable: "shot-scraper".to_string(),
            wait_ms: DEFAULT_WAIT_MS,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            quality: DEFAULT_JPEG_QUALITY,
            cleanup_script: crate::constants::DEFAULT_CLEANUP_SCRIPT.to_string(),
            timeout: Duration::from_secs(DEFAULT_CAPTURE_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to spawn {executable}: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },
    #[error("capture timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
    #[error("capture exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("capture finished but produced no output at {0}")]
    MissingOutput(String),
}

/// Something that can render `target_url` into an image at `output_path`.
///
/// On `Ok`, the file at `output_path` exists and is non-empty.
#[async_trait]
pub trait Capturer: Send + Sync {
    async fn capture(&self, target_url: &str, output_path: &Path) -> Result<(), CaptureError>;
}
