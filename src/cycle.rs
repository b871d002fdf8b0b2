//! One capture cycle: load the URL list, then capture and record each URL in order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{error, info};

use crate::capture::{CaptureError, Capturer};
use crate::constants::{CYCLE_TIMESTAMP_FORMAT, IMAGE_EXTENSION, SCREENSHOT_TAG, TARGET_SCHEME};
use crate::fs_utils::sanitize_filename;
use crate::recorder::{RecordOutcome, ScreenshotRecorder};
use crate::scheduler::ScheduledJob;
use crate::store::{MetadataError, UploadError};
use crate::urls::{load_urls, UrlListError};

/// Timestamp shared by every URL of one cycle, at minute resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleStamp {
    /// `%Y-%m-%d_%H-%M`
    pub timestamp: String,
    /// `%Y`
    pub year: String,
    /// `%m`
    pub month: String,
}

impl CycleStamp {
    #[must_use]
    pub fn from_datetime<T>(at: &DateTime<T>) -> Self
    where
        T: TimeZone,
        T::Offset: std::fmt::Display,
    {
        Self {
            timestamp: at.format(CYCLE_TIMESTAMP_FORMAT).to_string(),
            year: at.format("%Y").to_string(),
            month: at.format("%m").to_string(),
        }
    }

    /// `{prefix}/{url}/{year}/{month}/{timestamp}`
    #[must_use]
    pub fn public_id(&self, prefix: &str, url: &str) -> String {
        format!(
            "{prefix}/{url}/{}/{}/{}",
            self.year, self.month, self.timestamp
        )
    }

    /// `[prefix, url, year, month, "screenshot"]`
    #[must_use]
    pub fn tags(&self, prefix: &str, url: &str) -> Vec<String> {
        vec![
            prefix.to_string(),
            url.to_string(),
            self.year.clone(),
            self.month.clone(),
            SCREENSHOT_TAG.to_string(),
        ]
    }

    /// Local file for `url` under `output_dir`.
    #[must_use]
    pub fn output_path(&self, output_dir: &Path, url: &str) -> PathBuf {
        output_dir.join(format!(
            "{}_{}.{IMAGE_EXTENSION}",
            sanitize_filename(url),
            self.timestamp
        ))
    }
}

/// What happened to one URL during a cycle.
#[derive(Debug)]
pub enum UrlOutcome {
    Recorded { secure_url: String },
    MetadataFailed {
        secure_url: String,
        error: MetadataError,
    },
    UploadFailed(UploadError),
    CaptureFailed(CaptureError),
}

impl UrlOutcome {
    /// The image reached the media store, whether or not the row was written.
    #[must_use]
    pub fn is_uploaded(&self) -> bool {
        matches!(self, Self::Recorded { .. } | Self::MetadataFailed { .. })
    }
}

impl From<RecordOutcome> for UrlOutcome {
    fn from(outcome: RecordOutcome) -> Self {
        match outcome {
            RecordOutcome::Recorded { secure_url } => Self::Recorded { secure_url },
            RecordOutcome::MetadataFailed { secure_url, error } => {
                Self::MetadataFailed { secure_url, error }
            }
            RecordOutcome::UploadFailed(e) => Self::UploadFailed(e),
        }
    }
}

/// Per-URL outcomes of a finished cycle, in URL list order.
#[derive(Debug)]
pub struct CycleReport {
    pub stamp: CycleStamp,
    pub outcomes: Vec<(String, UrlOutcome)>,
    /// Instant the cycle was stamped with.
    pub started_at: DateTime<Utc>,
    /// Time spent capturing and recording every URL.
    pub elapsed: Duration,
}

impl CycleReport {
    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        TimeDelta::from_std(self.elapsed)
            .ok()
            .and_then(|d| self.started_at.checked_add_signed(d))
            .unwrap_or(self.started_at)
    }

    #[must_use]
    pub fn uploaded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_uploaded()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| !matches!(o, UrlOutcome::Recorded { .. }))
            .count()
    }
}

/// Errors that abort a whole cycle before any URL is attempted.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    UrlList(#[from] UrlListError),
    #[error("failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a cycle reads from and writes to.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub urls_file: PathBuf,
    pub output_dir: PathBuf,
    pub timezone: Tz,
    pub public_id_prefix: String,
}

/// The capture-and-record pipeline run by each scheduler firing.
pub struct CaptureCycle {
    settings: CycleSettings,
    capturer: Arc<dyn Capturer>,
    recorder: ScreenshotRecorder,
}

impl CaptureCycle {
    #[must_use]
    pub fn new(
        settings: CycleSettings,
        capturer: Arc<dyn Capturer>,
        recorder: ScreenshotRecorder,
    ) -> Self {
        Self {
            settings,
            capturer,
            recorder,
        }
    }

    /// Run a cycle stamped with the current wall-clock time.
    ///
    /// # Errors
    ///
    /// See [`CaptureCycle::run_at`].
    pub async fn run_now(&self) -> Result<CycleReport, CycleError> {
        self.run_at(Utc::now()).await
    }

    /// Run a cycle stamped with `now`, converted to the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL list cannot be loaded or the output
    /// directory cannot be created. Per-URL failures are reported in the
    /// [`CycleReport`] instead.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<CycleReport, CycleError> {
        let clock = Instant::now();
        let urls = load_urls(&self.settings.urls_file).await?;
        let stamp = CycleStamp::from_datetime(&now.with_timezone(&self.settings.timezone));

        tokio::fs::create_dir_all(&self.settings.output_dir)
            .await
            .map_err(|source| CycleError::OutputDir {
                path: self.settings.output_dir.clone(),
                source,
            })?;

        info!(urls = urls.len(), timestamp = %stamp.timestamp, "Starting capture cycle");

        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            let outcome = self.process_url(&url, &stamp).await;
            outcomes.push((url, outcome));
        }

        Ok(CycleReport {
            stamp,
            outcomes,
            started_at: now,
            elapsed: clock.elapsed(),
        })
    }

    async fn process_url(&self, url: &str, stamp: &CycleStamp) -> UrlOutcome {
        let target_url = format!("{TARGET_SCHEME}{url}");
        let output_path = stamp.output_path(&self.settings.output_dir, url);
        let prefix = &self.settings.public_id_prefix;

        info!(url = %target_url, "Capturing");

        if let Err(e) = self.capturer.capture(&target_url, &output_path).await {
            error!(url = %target_url, "Screenshot failed: {e}");
            return UrlOutcome::CaptureFailed(e);
        }

        self.recorder
            .record(
                &output_path,
                &stamp.public_id(prefix, url),
                &stamp.tags(prefix, url),
                url,
            )
            .await
            .into()
    }
}

#[async_trait]
impl ScheduledJob for CaptureCycle {
    fn name(&self) -> &'static str {
        "hourly_screenshots"
    }

    async fn run(&self) {
        info!("Starting screenshot job");
        let clock = Instant::now();
        match self.run_now().await {
            Ok(report) => info!(
                timestamp = %report.stamp.timestamp,
                started_at = %report.started_at.to_rfc3339(),
                completed_at = %report.completed_at().to_rfc3339(),
                duration_secs = report.elapsed.as_secs_f64(),
                total = report.outcomes.len(),
                uploaded = report.uploaded(),
                failed = report.failed(),
                "Screenshot job finished"
            ),
            Err(e) => error!(
                duration_secs = clock.elapsed().as_secs_f64(),
                "Screenshot job aborted: {e}"
            ),
        }
    }
}

impl std::fmt::Debug for CaptureCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureCycle")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp() -> CycleStamp {
        let at = chrono_tz::Europe::Warsaw
            .with_ymd_and_hms(2024, 3, 1, 14, 0, 0)
            .unwrap();
        CycleStamp::from_datetime(&at)
    }

    #[test]
    fn test_stamp_format() {
        let stamp = stamp();
        assert_eq!(stamp.timestamp, "2024-03-01_14-00");
        assert_eq!(stamp.year, "2024");
        assert_eq!(stamp.month, "03");
    }

    #[test]
    fn test_stamp_uses_local_time() {
        // 13:05 UTC is 14:05 in Warsaw during winter time.
        let utc = Utc.with_ymd_and_hms(2024, 3, 1, 13, 5, 42).unwrap();
        let stamp = CycleStamp::from_datetime(&utc.with_timezone(&chrono_tz::Europe::Warsaw));
        assert_eq!(stamp.timestamp, "2024-03-01_14-05");
    }

    #[test]
    fn test_public_id_and_tags() {
        let stamp = stamp();
        assert_eq!(
            stamp.public_id("kiosk247", "example.com"),
            "kiosk247/example.com/2024/03/2024-03-01_14-00"
        );
        assert_eq!(
            stamp.tags("kiosk247", "example.com"),
            vec!["kiosk247", "example.com", "2024", "03", "screenshot"]
        );
    }

    #[test]
    fn test_output_path() {
        let stamp = stamp();
        assert_eq!(
            stamp.output_path(Path::new("screenshots"), "example.com"),
            PathBuf::from("screenshots/example.com_2024-03-01_14-00.jpg")
        );
        assert_eq!(
            stamp.output_path(Path::new("screenshots"), "example.com/news"),
            PathBuf::from("screenshots/example.com_news_2024-03-01_14-00.jpg")
        );
    }

    #[test]
    fn test_report_completion_time() {
        let started_at = Utc.with_ymd_and_hms(2024, 3, 1, 13, 0, 0).unwrap();
        let report = CycleReport {
            stamp: stamp(),
            outcomes: Vec::new(),
            started_at,
            elapsed: Duration::from_millis(93_500),
        };
        assert_eq!(
            report.completed_at(),
            Utc.with_ymd_and_hms(2024, 3, 1, 13, 1, 33).unwrap() + TimeDelta::milliseconds(500)
        );
        assert_eq!(report.uploaded(), 0);
        assert_eq!(report.failed(), 0);
    }
}
