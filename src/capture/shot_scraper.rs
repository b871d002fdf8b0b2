//! `shot-scraper` wrapper.
//!
//! shot-scraper drives a headless Chromium through Playwright and writes a
//! single screenshot per invocation. JPEG output is selected by the `.jpg`
//! extension together with `--quality`.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{CaptureError, CaptureSettings, Capturer};
use crate::fs_utils::is_non_empty_file;

/// Longest stderr excerpt kept in a [`CaptureError::Failed`].
const MAX_STDERR_LEN: usize = 2000;

/// Production [`Capturer`] backed by the `shot-scraper` CLI.
#[derive(Debug, Clone)]
pub struct ShotScraper {
    settings: CaptureSettings,
}

impl ShotScraper {
    #[must_use]
    pub fn new(settings: CaptureSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Arguments passed after the executable name.
    #[must_use]
    pub fn build_args(&self, target_url: &str, output_path: &Path) -> Vec<OsString> {
        let s = &self.settings;
        vec![
            target_url.into(),
            "-o".into(),
            output_path.as_os_str().to_owned(),
            "--wait".into(),
            s.wait_ms.to_string().into(),
            "--width".into(),
            s.viewport_width.to_string().into(),
            "--height".into(),
            s.viewport_height.to_string().into(),
            "--quality".into(),
            s.quality.to_string().into(),
            "--javascript".into(),
            s.cleanup_script.clone().into(),
        ]
    }
}

#[async_trait]
impl Capturer for ShotScraper {
    async fn capture(&self, target_url: &str, output_path: &Path) -> Result<(), CaptureError> {
        debug!(url = %target_url, output = %output_path.display(), "Running shot-scraper");

        let mut cmd = Command::new(&self.settings.executable);
        cmd.args(self.build_args(target_url, output_path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the future on timeout must not leave a browser behind.
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.settings.timeout, cmd.output())
            .await
            .map_err(|_| CaptureError::TimedOut(self.settings.timeout))?
            .map_err(|source| CaptureError::Spawn {
                executable: self.settings.executable.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CaptureError::Failed {
                code: output.status.code(),
                stderr: truncate_output(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        if !is_non_empty_file(output_path).await {
            return Err(CaptureError::MissingOutput(
                output_path.display().to_string(),
            ));
        }

        debug!(url = %target_url, output = %output_path.display(), "Screenshot captured");
        Ok(())
    }
}

fn truncate_output(text: &str) -> String {
    let text = text.trim();
    if text.len() <= MAX_STDERR_LEN {
        return text.to_string();
    }
    let mut end = MAX_STDERR_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}...[truncated {} more bytes]",
        &text[..end],
        text.len() - end
    )
}

/// Check if shot-scraper is available and working.
///
/// # Errors
///
/// Returns an error if the executable cannot be run, reports failure, or does
/// not answer within `timeout`.
pub async fn check_shot_scraper(path: &str, timeout: Duration) -> Result<String> {
    let mut cmd = Command::new(path);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .context("shot-scraper version check timed out")?
        .context("Failed to execute shot-scraper")?;

    if !output.status.success() {
        anyhow::bail!("shot-scraper version check failed");
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(version)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    /// Write an executable shell script that ignores its arguments.
    #[cfg(unix)]
    fn write_script(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-shot-scraper");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_default_settings() {
        let settings = CaptureSettings::default();
        assert_eq!(settings.executable, "shot-scraper");
        assert_eq!(settings.wait_ms, 2000);
        assert_eq!(settings.viewport_width, 1440);
        assert_eq!(settings.viewport_height, 1080);
        assert_eq!(settings.quality, 70);
        assert_eq!(settings.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_build_args() {
        let scraper = ShotScraper::new(CaptureSettings {
            cleanup_script: "document.body.remove()".to_string(),
            ..CaptureSettings::default()
        });
        let args = scraper.build_args(
            "https://example.com",
            &PathBuf::from("screenshots/example.com_2024-03-01_14-00.jpg"),
        );
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "https://example.com",
                "-o",
                "screenshots/example.com_2024-03-01_14-00.jpg",
                "--wait",
                "2000",
                "--width",
                "1440",
                "--height",
                "1080",
                "--quality",
                "70",
                "--javascript",
                "document.body.remove()",
            ]
        );
    }

    #[test]
    fn test_truncate_output() {
        assert_eq!(truncate_output("  boom \n"), "boom");
        let long = "x".repeat(MAX_STDERR_LEN + 10);
        let truncated = truncate_output(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_STDERR_LEN)));
        assert!(truncated.ends_with("[truncated 10 more bytes]"));
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = ShotScraper::new(CaptureSettings {
            executable: "/nonexistent/shot-scraper".to_string(),
            ..CaptureSettings::default()
        });
        let result = scraper
            .capture("https://example.com", &dir.path().join("out.jpg"))
            .await;
        assert!(matches!(result, Err(CaptureError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = ShotScraper::new(CaptureSettings {
            executable: "false".to_string(),
            ..CaptureSettings::default()
        });
        let result = scraper
            .capture("https://example.com", &dir.path().join("out.jpg"))
            .await;
        assert!(matches!(result, Err(CaptureError::Failed { code: Some(1), .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_without_output_is_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = ShotScraper::new(CaptureSettings {
            executable: "true".to_string(),
            ..CaptureSettings::default()
        });
        let result = scraper
            .capture("https://example.com", &dir.path().join("out.jpg"))
            .await;
        assert!(matches!(result, Err(CaptureError::MissingOutput(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_capture_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = ShotScraper::new(CaptureSettings {
            executable: write_script(dir.path(), "sleep 30"),
            timeout: Duration::from_millis(300),
            ..CaptureSettings::default()
        });

        let started = std::time::Instant::now();
        let result = scraper
            .capture("https://example.com", &dir.path().join("out.jpg"))
            .await;

        assert!(matches!(result, Err(CaptureError::TimedOut(t)) if t == Duration::from_millis(300)));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!dir.path().join("out.jpg").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_version_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(dir.path(), "echo 'shot-scraper, version 1.5'");
        let version = check_shot_scraper(&path, Duration::from_secs(10)).await.unwrap();
        assert_eq!(version, "shot-scraper, version 1.5");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_version_check_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(dir.path(), "sleep 30");

        let started = std::time::Instant::now();
        let err = check_shot_scraper(&path, Duration::from_millis(300))
            .await
            .expect_err("version check should time out");

        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
