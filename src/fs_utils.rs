use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Remove a file, treating "already gone" as success.
///
/// Returns `true` if a file was removed.
pub async fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "File already removed");
            Ok(false)
        }
        Err(e) => Err(anyhow::Error::new(e))
            .with_context(|| format!("Failed to remove file: {}", path.display())),
    }
}

/// Turn a URL entry into something usable as a single file name component.
///
/// Path separators and characters that are invalid on common filesystems are
/// replaced with `_`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Whether `path` is a regular file with at least one byte.
pub async fn is_non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|m| m.is_file() && m.len() > 0)
}
